//! Notification dispatcher: renders and sends notification e-mails.

use std::sync::Arc;

use async_trait::async_trait;
use framex_models::{decode, NotificationRequest};
use framex_notify::{Mailer, NotifyResult, Template};
use tracing::warn;

use crate::consumer::{Disposition, MessageHandler};
use crate::logging::JobLogger;
use crate::metrics;

/// Handles `NotificationRequest` deliveries from the notifications queue.
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Render and send one notification.
    pub async fn send(&self, notification: &NotificationRequest) -> NotifyResult<Template> {
        let template = Template::for_status(&notification.status);
        let email = template.render(notification);
        self.mailer
            .send(&notification.user_email, &notification.user_name, &email)
            .await?;
        Ok(template)
    }
}

#[async_trait]
impl MessageHandler for NotificationDispatcher {
    fn name(&self) -> &'static str {
        "notification_dispatcher"
    }

    async fn handle(&self, payload: &[u8], _redelivered: bool) -> Disposition {
        let notification: NotificationRequest = match decode(payload) {
            Ok(notification) => notification,
            Err(e) => {
                warn!(error = %e, "Rejecting undecodable notification");
                return Disposition::Reject;
            }
        };

        let logger = JobLogger::new(&notification.video_id, "notification");
        let template = Template::for_status(&notification.status);

        match self.send(&notification).await {
            Ok(_) => {
                metrics::record_notification(template.as_str(), true);
                logger.completed(&format!("{:?} e-mail sent to {}", template, notification.user_email));
                Disposition::Ack
            }
            Err(e) if e.is_retryable() => {
                metrics::record_notification(template.as_str(), false);
                logger.warning(&format!("send failed, requeueing: {}", e));
                Disposition::Requeue
            }
            Err(e) => {
                // Retrying cannot fix a bad address or an unbuildable message
                metrics::record_notification(template.as_str(), false);
                logger.failed(&format!("notification cannot be delivered: {}", e));
                Disposition::Reject
            }
        }
    }
}
