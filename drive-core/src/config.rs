//! Runtime configuration (`/etc/drive-tester/config.toml`).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "DRIVE_TESTER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/drive-tester/config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of persisted step outputs.
    pub storage_dir: PathBuf,
    pub lock_dir: PathBuf,
    /// Directory of the status cache backing file.
    pub cache_dir: PathBuf,
    pub cache_slots: usize,
    pub poll_interval_ms: u64,
    pub mattermost_webhook_url: Option<String>,
    pub sys_block_dir: PathBuf,
    pub mountinfo_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let shm = Path::new("/dev/shm");
        let cache_dir = if shm.is_dir() {
            shm.to_path_buf()
        } else {
            std::env::temp_dir()
        };
        Self {
            storage_dir: PathBuf::from("/var/lib/drive-tester"),
            lock_dir: std::env::temp_dir(),
            cache_dir,
            cache_slots: 32,
            poll_interval_ms: 500,
            mattermost_webhook_url: None,
            sys_block_dir: PathBuf::from("/sys/block"),
            mountinfo_path: PathBuf::from("/proc/self/mountinfo"),
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("failed to parse configuration")
    }

    /// Load from `explicit`, else `$DRIVE_TESTER_CONFIG`, else the default path.
    ///
    /// A named file must exist; a missing default file yields built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::load_from(explicit, env.as_deref(), Path::new(DEFAULT_CONFIG_PATH))
    }

    fn load_from(explicit: Option<&Path>, env: Option<&Path>, default: &Path) -> Result<Self> {
        let (path, required) = match explicit.or(env) {
            Some(path) => (path, true),
            None => (default, false),
        };
        if !required && !path.exists() {
            log::debug!("No configuration at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("invalid configuration {}", path.display()))?;
        log::info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Webhook URL, if one is configured and non-empty.
    pub fn webhook_url(&self) -> Option<&str> {
        self.mattermost_webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache_slots, 32);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.webhook_url(), None);
    }

    #[test]
    fn keys_override_defaults() {
        let config = Config::from_toml_str(
            r#"
storage_dir = "/srv/drives"
cache_slots = 8
poll_interval_ms = 250
mattermost_webhook_url = "https://chat.example.com/hooks/x"
"#,
        )
        .unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/srv/drives"));
        assert_eq!(config.cache_slots, 8);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(
            config.webhook_url(),
            Some("https://chat.example.com/hooks/x")
        );
        assert_eq!(config.sys_block_dir, PathBuf::from("/sys/block"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml_str("cache_size = 3").is_err());
    }

    #[test]
    fn blank_webhook_url_is_ignored() {
        let config = Config::from_toml_str("mattermost_webhook_url = \"  \"").unwrap();
        assert_eq!(config.webhook_url(), None);
    }

    #[test]
    fn lookup_order_prefers_explicit_then_env() {
        let tmp = tempdir().unwrap();
        let explicit = tmp.path().join("explicit.toml");
        let env = tmp.path().join("env.toml");
        std::fs::write(&explicit, "cache_slots = 1").unwrap();
        std::fs::write(&env, "cache_slots = 2").unwrap();
        let default = tmp.path().join("missing.toml");

        let c = Config::load_from(Some(&explicit), Some(&env), &default).unwrap();
        assert_eq!(c.cache_slots, 1);
        let c = Config::load_from(None, Some(&env), &default).unwrap();
        assert_eq!(c.cache_slots, 2);
        let c = Config::load_from(None, None, &default).unwrap();
        assert_eq!(c, Config::default());
    }

    #[test]
    fn missing_named_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(Config::load_from(Some(&missing), None, &missing).is_err());
        assert!(Config::load_from(None, Some(&missing), &missing).is_err());
    }
}
