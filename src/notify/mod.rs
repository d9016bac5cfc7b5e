mod notifier;
mod rocketchat;

pub use notifier::{Notifier, Operation, RunResult};
pub use rocketchat::RocketChatNotifier;

use crate::config::NotificationConfig;
use crate::error::Result;
use chrono_tz::Tz;
use tracing::{info, warn};

pub fn create_notifiers(config: &NotificationConfig) -> Result<Vec<Box<dyn Notifier>>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

    if let Some(rocketchat) = config.rocketchat.as_ref().filter(|c| !c.webhook_url.is_empty()) {
        notifiers.push(Box::new(RocketChatNotifier::new(rocketchat)?));
        info!("Found notification option: RocketChat");
    }

    Ok(notifiers)
}

/// Delivers `result` to every notifier. Failures are logged and never change
/// the outcome of the run.
pub async fn notify_all(notifiers: &[Box<dyn Notifier>], result: &RunResult, tz: Tz) {
    for notifier in notifiers {
        if let Err(e) = notifier.send(result, tz).await {
            warn!("Failed to send {} notification: {}", notifier.name(), e);
        }
    }
}
