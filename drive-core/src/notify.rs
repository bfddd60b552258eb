//! Mattermost incoming webhook notification for finished runs.

use crate::events::{EventSubscriber, RunEvent};
use crate::report::render_report;
use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use std::time::Duration;

const WEBHOOK_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct MattermostWebHook {
    url: String,
    client: Client,
}

impl MattermostWebHook {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            bail!("Mattermost webhook URL is empty");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .user_agent("drive-tester")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { url, client })
    }

    pub fn payload(event: &RunEvent) -> String {
        serde_json::json!({ "text": render_report(&event.results) }).to_string()
    }

    pub fn send(&self, event: &RunEvent) -> Result<()> {
        let payload = Self::payload(event);
        self.client
            .post(&self.url)
            .form(&[("payload", payload.as_str())])
            .send()
            .context("Failed to reach Mattermost webhook")?
            .error_for_status()
            .context("Mattermost webhook rejected the notification")?;
        log::info!("Run result sent to Mattermost");
        Ok(())
    }
}

impl EventSubscriber for MattermostWebHook {
    fn name(&self) -> &str {
        "mattermost"
    }

    fn on_run_completed(&self, event: &RunEvent) -> Result<()> {
        self.send(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{State, Status};
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use std::collections::BTreeMap;

    fn run_event() -> RunEvent {
        let mut status = Status::with(State::Done, "OK");
        status.set_serial_number(Some("SN-1"));
        let mut results = BTreeMap::new();
        results.insert("/dev/sdb".to_string(), status);
        RunEvent { results }
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(MattermostWebHook::new("").is_err());
        assert!(MattermostWebHook::new("   ").is_err());
    }

    #[test]
    fn payload_carries_report_text() {
        let payload: serde_json::Value =
            serde_json::from_str(&MattermostWebHook::payload(&run_event())).unwrap();
        assert_eq!(
            payload["text"],
            "Drive tester result:\n   /dev/sdb (SN-1): <info>OK</info>\n"
        );
    }

    #[test]
    fn send_posts_form_payload() {
        let server = MockServer::start();
        let expected = MattermostWebHook::payload(&run_event());
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/hooks/abc")
                .x_www_form_urlencoded_tuple("payload", &expected);
            then.status(200).body("ok");
        });

        let hook = MattermostWebHook::new(server.url("/hooks/abc")).unwrap();
        hook.on_run_completed(&run_event()).unwrap();
        mock.assert();
    }

    #[test]
    fn server_error_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/hooks/abc");
            then.status(500);
        });
        let hook = MattermostWebHook::new(server.url("/hooks/abc")).unwrap();
        assert!(hook.send(&run_event()).is_err());
    }
}
