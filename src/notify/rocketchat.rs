use super::notifier::{Notifier, Operation, RunResult};
use crate::config::RocketChatConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

const SUCCESS_COLOR: &str = "#00AA00";
const FAILURE_COLOR: &str = "#FF0000";

/// Incoming-webhook notifier (Rocket.Chat / Slack attachment format).
pub struct RocketChatNotifier {
    config: RocketChatConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct Field<'a> {
    title: &'a str,
    value: String,
    short: bool,
}

#[derive(Debug, Serialize)]
struct Attachment<'a> {
    title: &'a str,
    text: &'a str,
    color: &'a str,
    fields: Vec<Field<'a>>,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: String,
    attachments: Vec<Attachment<'a>>,
}

fn build_payload<'a>(result: &'a RunResult, prefix: Option<&str>, time: DateTime<Tz>) -> WebhookPayload<'a> {
    let subject = match result.operation {
        Operation::Archive => "Database archiving",
        Operation::Restore => "Database restore",
    };
    let (outcome, color, status, label_title) = if result.success {
        ("completed successfully", SUCCESS_COLOR, "Success", "Filename")
    } else {
        ("failed", FAILURE_COLOR, "Failure", "Error")
    };
    let message = format!("{} {}", subject, outcome);

    let text = match prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{} {}", prefix, message),
        None => message,
    };

    WebhookPayload {
        text,
        attachments: vec![Attachment {
            title: "Details",
            text: "",
            color,
            fields: vec![
                Field {
                    title: "Status",
                    value: status.to_string(),
                    short: false,
                },
                Field {
                    title: "Time",
                    value: time.format("%Y-%m-%d %H:%M:%S").to_string(),
                    short: false,
                },
                Field {
                    title: label_title,
                    value: result.label.clone(),
                    short: false,
                },
            ],
        }],
    }
}

impl RocketChatNotifier {
    pub fn new(config: &RocketChatConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("dbarchive/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BackupError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for RocketChatNotifier {
    async fn send(&self, result: &RunResult, tz: Tz) -> Result<()> {
        if result.success && self.config.notify_on_failure_only {
            debug!("Skipping success notification (failure-only mode)");
            return Ok(());
        }

        let payload = build_payload(result, self.config.prefix.as_deref(), Utc::now().with_timezone(&tz));
        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BackupError::Notification(format!(
                "webhook returned {} - {}",
                status, text
            )));
        }

        info!("Sent {} notification", if result.success { "success" } else { "failure" });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RocketChat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::TimeZone;
    use serde_json::Value;
    use tokio::sync::mpsc;

    async fn receiver(status: StatusCode) -> (String, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new()
            .route(
                "/hooks/test",
                post(
                    move |State(tx): State<mpsc::UnboundedSender<Value>>, Json(body): Json<Value>| async move {
                        let _ = tx.send(body);
                        status
                    },
                ),
            )
            .with_state(tx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hooks/test", addr), rx)
    }

    fn notifier(url: String, failure_only: bool) -> RocketChatNotifier {
        RocketChatNotifier::new(&RocketChatConfig {
            webhook_url: url,
            prefix: Some("[prod]".to_string()),
            notify_on_failure_only: failure_only,
        })
        .unwrap()
    }

    #[test]
    fn test_payload_uses_zone_and_labels() {
        let tz: Tz = "Asia/Tokyo".parse().unwrap();
        let time = tz.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let result = RunResult::failure("upload to AWS S3 failed");

        let payload = serde_json::to_value(build_payload(&result, None, time)).unwrap();
        assert_eq!(payload["text"], "Database archiving failed");
        let fields = &payload["attachments"][0]["fields"];
        assert_eq!(payload["attachments"][0]["color"], FAILURE_COLOR);
        assert_eq!(fields[0]["value"], "Failure");
        assert_eq!(fields[1]["value"], "2024-05-01 09:30:00");
        assert_eq!(fields[2]["title"], "Error");
        assert_eq!(fields[2]["value"], "upload to AWS S3 failed");
    }

    #[test]
    fn test_restore_results_are_worded_as_restores() {
        let time = Tz::UTC.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let failed = RunResult::failure("tool exited with 1").with_operation(Operation::Restore);
        let payload = serde_json::to_value(build_payload(&failed, Some("[prod]"), time)).unwrap();
        assert_eq!(payload["text"], "[prod] Database restore failed");

        let restored = RunResult::success("a.tar.gz").with_operation(Operation::Restore);
        let payload = serde_json::to_value(build_payload(&restored, None, time)).unwrap();
        assert_eq!(payload["text"], "Database restore completed successfully");
        assert_eq!(payload["attachments"][0]["fields"][2]["title"], "Filename");
    }

    #[tokio::test]
    async fn test_posts_success_payload() {
        let (url, mut rx) = receiver(StatusCode::OK).await;
        let result = RunResult::success("8299999999999-2023-11-14T221320.000Z.tar.gz");

        notifier(url, false).send(&result, Tz::UTC).await.unwrap();

        let body = rx.recv().await.unwrap();
        assert_eq!(body["text"], "[prod] Database archiving completed successfully");
        let fields = &body["attachments"][0]["fields"];
        assert_eq!(fields[0]["value"], "Success");
        assert_eq!(fields[2]["title"], "Filename");
        assert_eq!(fields[2]["value"], result.label);
    }

    #[tokio::test]
    async fn test_failure_only_skips_success() {
        let (url, mut rx) = receiver(StatusCode::OK).await;
        let notifier = notifier(url, true);

        notifier.send(&RunResult::success("a.tar.gz"), Tz::UTC).await.unwrap();
        notifier.send(&RunResult::failure("boom"), Tz::UTC).await.unwrap();

        let body = rx.recv().await.unwrap();
        assert_eq!(body["attachments"][0]["fields"][2]["value"], "boom");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (url, _rx) = receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
        let err = notifier(url, false)
            .send(&RunResult::failure("x"), Tz::UTC)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Notification(_)));
    }
}
