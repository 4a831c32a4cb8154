//! Result consumer: records results in the catalog and queues notifications.

use std::sync::Arc;

use async_trait::async_trait;
use framex_models::{decode, encode, NotificationRequest, ProcessingResult, VideoRecord};
use framex_notify::RecipientDirectory;
use framex_queue::Broker;
use framex_storage::Catalog;
use tracing::warn;

use crate::consumer::{Disposition, MessageHandler};
use crate::logging::JobLogger;
use crate::metrics;

/// Handles `ProcessingResult` deliveries from the results queue.
///
/// The catalog write is a keyed upsert, so a redelivered result rewrites the
/// same entry; its notification may be sent twice.
pub struct ResultConsumer {
    catalog: Arc<dyn Catalog>,
    directory: Arc<dyn RecipientDirectory>,
    broker: Arc<dyn Broker>,
    notifications_queue: String,
}

impl ResultConsumer {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        directory: Arc<dyn RecipientDirectory>,
        broker: Arc<dyn Broker>,
        notifications_queue: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            directory,
            broker,
            notifications_queue: notifications_queue.into(),
        }
    }
}

#[async_trait]
impl MessageHandler for ResultConsumer {
    fn name(&self) -> &'static str {
        "result_consumer"
    }

    async fn handle(&self, payload: &[u8], _redelivered: bool) -> Disposition {
        let result: ProcessingResult = match decode(payload) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Rejecting undecodable processing result");
                return Disposition::Reject;
            }
        };

        let logger = JobLogger::new(&result.video_id, "catalog_update");
        let record = VideoRecord::from_result(&result);
        let title = record.title.clone();
        self.catalog.put(record).await;
        metrics::record_catalog_upsert(result.status.as_str());
        logger.progress(&format!("catalog entry stored with status {}", result.status));

        let Some(recipient) = self.directory.resolve(&result.user_id).await else {
            logger.warning(&format!("no e-mail address for user '{}', notification skipped", result.user_id));
            return Disposition::Ack;
        };

        let notification = NotificationRequest::for_result(&result, &recipient, &title);
        let payload = match encode(&notification) {
            Ok(payload) => payload,
            Err(e) => {
                logger.failed(&format!("cannot encode notification: {}", e));
                return Disposition::Requeue;
            }
        };

        match self.broker.publish(&self.notifications_queue, &payload).await {
            Ok(()) => {
                logger.completed(&format!("notification queued for {}", recipient.email));
                Disposition::Ack
            }
            Err(e) => {
                logger.warning(&format!("notification publish failed, requeueing result: {}", e));
                Disposition::Requeue
            }
        }
    }
}
