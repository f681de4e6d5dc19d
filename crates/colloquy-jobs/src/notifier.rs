//! Notification delivery.

use async_trait::async_trait;
use tracing::info;

use colloquy_core::{Notifier, Result, ScheduledTask};

/// Notifier that records each fired task in the log. Delivery channels
/// (email, push) plug in through [`Notifier`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, task: &ScheduledTask) -> Result<()> {
        info!(
            subsystem = "jobs",
            component = "notifier",
            owner = %task.owner,
            task_id = %task.id,
            task_type = task.task_type.as_str(),
            priority = task.metadata.priority.as_str(),
            channels = ?task.metadata.notification_channels,
            title = %task.title,
            "Task due"
        );
        Ok(())
    }
}
