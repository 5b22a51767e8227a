//! Webhook notifier: POSTs celebrations as JSON.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tokio::runtime::{Builder, Runtime};

use super::{CelebrationKind, Notifier};
use crate::error::NotifyError;

/// Posts each celebration to a fixed URL.
///
/// Owns a single-threaded runtime so it can be called from synchronous code.
/// Must not be called from inside another tokio runtime.
pub struct WebhookNotifier {
    url: String,
    client: Client,
    timeout: Duration,
    runtime: Runtime,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(NotifyError::Runtime)?;
        Ok(Self {
            url: url.to_string(),
            client: Client::new(),
            timeout,
            runtime,
        })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<(), NotifyError> {
        let resp = self.client.post(&self.url).json(body).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status {
                status: status.as_u16(),
            })
        }
    }
}

impl Notifier for WebhookNotifier {
    fn celebrate(
        &self,
        user_id: &str,
        kind: CelebrationKind,
        payload: &serde_json::Value,
    ) -> Result<(), NotifyError> {
        let body = json!({
            "user_id": user_id,
            "kind": kind,
            "payload": payload,
        });
        self.runtime.block_on(async {
            match tokio::time::timeout(self.timeout, self.post(&body)).await {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn posts_kind_and_payload() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/hooks/focus")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "user_id": "u1",
                "kind": "streak_milestone",
                "payload": { "streak_current": 7 },
            })))
            .with_status(204)
            .create();

        let notifier =
            WebhookNotifier::new(&format!("{}/hooks/focus", server.url()), Duration::from_secs(3))
                .unwrap();
        notifier
            .celebrate(
                "u1",
                CelebrationKind::StreakMilestone,
                &json!({ "streak_current": 7 }),
            )
            .unwrap();
        mock.assert();
    }

    #[test]
    fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/hooks/focus").with_status(500).create();

        let notifier =
            WebhookNotifier::new(&format!("{}/hooks/focus", server.url()), Duration::from_secs(3))
                .unwrap();
        let err = notifier
            .celebrate(
                "u1",
                CelebrationKind::FocusSessionCompleted,
                &json!({}),
            )
            .unwrap_err();
        assert!(matches!(err, NotifyError::Status { status: 500 }));
        mock.assert();
    }

    #[test]
    fn silent_endpoint_times_out() {
        // Accepted by the kernel backlog but never answered.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let notifier =
            WebhookNotifier::new(&format!("http://{addr}/hooks"), Duration::from_millis(200))
                .unwrap();
        let err = notifier
            .celebrate("u1", CelebrationKind::FocusSessionCompleted, &json!({}))
            .unwrap_err();
        assert!(matches!(err, NotifyError::Timeout { .. }), "{err:?}");
        drop(listener);
    }

    #[test]
    fn unreachable_host_is_an_error() {
        let notifier =
            WebhookNotifier::new("http://127.0.0.1:9/hooks", Duration::from_secs(2)).unwrap();
        assert!(notifier
            .celebrate("u1", CelebrationKind::FocusSessionCompleted, &json!({}))
            .is_err());
    }
}
