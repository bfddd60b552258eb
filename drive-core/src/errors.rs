use thiserror::Error;

/// Failures of the shared status cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Unable to create status cache in {dir}: {source}")]
    Create {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to attach status cache {path}: {source}")]
    Attach {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Status cache {0} has an unexpected layout")]
    Layout(String),

    #[error("Status cache key too long ({0} bytes)")]
    KeyTooLong(usize),

    #[error("Status cache entry too large ({0} bytes)")]
    EntryTooLarge(usize),

    #[error("Status cache is full ({0} slots)")]
    Full(usize),

    #[error("Unable to lock status cache: {0}")]
    Lock(nix::errno::Errno),

    #[error("Status cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Status serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Run-level failures, each mapped to a distinct process exit code.
#[derive(Error, Debug)]
pub enum TesterError {
    #[error("Invalid drive path or not exists: {0}")]
    InvalidDrive(String),

    #[error("Cannot run on system drive: {0}")]
    SystemDrive(String),

    #[error("No drives to test")]
    NoDrives,

    #[error("{0}")]
    Infrastructure(String),
}

impl TesterError {
    pub fn exit_code(&self) -> i32 {
        match self {
            TesterError::NoDrives => 1,
            TesterError::SystemDrive(_) => 2,
            TesterError::InvalidDrive(_) => 3,
            TesterError::Infrastructure(_) => 4,
        }
    }
}

impl From<CacheError> for TesterError {
    fn from(err: CacheError) -> Self {
        TesterError::Infrastructure(err.to_string())
    }
}
