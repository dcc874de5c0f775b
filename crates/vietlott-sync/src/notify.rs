//! Alert delivery. Best effort: one attempt per alert, failures are logged.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use vietlott_core::Evaluation;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification relay rejected credentials ({status})")]
    Auth { status: u16 },
    #[error("notification transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notification relay returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers a message to a list of recipients.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError>;
}

/// Writes alerts to the log instead of sending them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        info!(recipients = ?recipients, subject, "alert (not sent)\n{body}");
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    to: &'a [String],
    subject: &'a str,
    text: &'a str,
}

/// Posts alerts as JSON to a mail relay.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            token,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        let message = RelayMessage {
            to: recipients,
            subject,
            text: body,
        };
        let mut req = self.client.post(&self.url).json(&message);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(NotifyError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Send one notification per fired rule. Delivery errors never propagate.
pub async fn dispatch_alerts(
    notifier: &dyn Notifier,
    recipients: &[String],
    game: &str,
    evaluations: &[Evaluation],
) -> DispatchReport {
    let mut report = DispatchReport::default();
    for alert in evaluations.iter().filter_map(|e| e.alert.as_ref()) {
        let subject = alert.subject(game);
        match notifier.notify(recipients, &subject, &alert.body()).await {
            Ok(()) => {
                info!(game, threshold = alert.threshold, streak = alert.streak, "alert sent");
                report.sent += 1;
            }
            Err(e) => {
                warn!(game, threshold = alert.threshold, error = %e, "alert delivery failed");
                report.failed += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use httpmock::prelude::*;
    use vietlott_core::{Alert, RuleConfig};

    use super::*;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(Vec<String>, String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(
            &self,
            recipients: &[String],
            subject: &str,
            body: &str,
        ) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((recipients.to_vec(), subject.into(), body.into()));
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _: &[String], _: &str, _: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Auth { status: 401 })
        }
    }

    fn evaluation(threshold: u32, streak: Option<u32>) -> Evaluation {
        Evaluation {
            rule: RuleConfig {
                streak_threshold: threshold,
                recommended_number: "08".into(),
            },
            final_streak: streak.unwrap_or(0),
            alert: streak.map(|streak| Alert {
                threshold,
                recommended_number: "08".into(),
                streak,
                trace: "2024-05-02 #01051 [1, 2, 6] sum=9 streak=1\n".into(),
            }),
        }
    }

    #[tokio::test]
    async fn one_notification_per_alert() {
        let notifier = RecordingNotifier::default();
        let recipients = vec!["ops@example.com".to_string()];
        let evals = [evaluation(10, Some(7)), evaluation(20, None), evaluation(9, Some(7))];

        let report = dispatch_alerts(&notifier, &recipients, "bingo18", &evals).await;
        assert_eq!(report, DispatchReport { sent: 2, failed: 0 });

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, recipients);
        assert_eq!(sent[0].1, "[bingo18] streak 7/10: pick 08");
        assert!(sent[0].2.contains("#01051"));
    }

    #[tokio::test]
    async fn delivery_failures_are_counted_not_raised() {
        let evals = [evaluation(10, Some(7))];
        let report = dispatch_alerts(&FailingNotifier, &[], "bingo18", &evals).await;
        assert_eq!(report, DispatchReport { sent: 0, failed: 1 });
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let result = LogNotifier.notify(&[], "subject", "body").await;
        assert!(result.is_ok());
    }

    #[test]
    fn relay_message_shape() {
        let to = vec!["a@example.com".to_string()];
        let json = serde_json::to_value(RelayMessage {
            to: &to,
            subject: "s",
            text: "t",
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"to": ["a@example.com"], "subject": "s", "text": "t"}));
    }

    #[tokio::test]
    async fn webhook_posts_message_with_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/send")
                    .header("authorization", "Bearer secret")
                    .json_body(serde_json::json!({
                        "to": ["ops@example.com"],
                        "subject": "s",
                        "text": "t"
                    }));
                then.status(202);
            })
            .await;

        let notifier = WebhookNotifier::new(server.url("/send"), Some("secret".into()));
        notifier
            .notify(&["ops@example.com".to_string()], "s", "t")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn webhook_maps_unauthorized_and_forbidden_to_auth() {
        for code in [401, 403] {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(POST);
                    then.status(code);
                })
                .await;

            let notifier = WebhookNotifier::new(server.url("/send"), None);
            let err = notifier.notify(&[], "s", "t").await.unwrap_err();
            assert!(matches!(err, NotifyError::Auth { status } if status == code));
        }
    }

    #[tokio::test]
    async fn webhook_maps_other_failures_to_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(422).body("unknown recipient");
            })
            .await;

        let notifier = WebhookNotifier::new(server.url("/send"), None);
        let err = notifier.notify(&[], "s", "t").await.unwrap_err();
        match err {
            NotifyError::Rejected { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "unknown recipient");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn webhook_transport_failure() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let notifier = WebhookNotifier::new(format!("http://127.0.0.1:{port}/send"), None);
        let err = notifier.notify(&[], "s", "t").await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }
}
