//! Processing worker: turns intake requests into results.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use framex_models::{decode, encode, ProcessingRequest, ProcessingResult};
use framex_queue::{Broker, QueueStatusProjector};
use tracing::{warn, Instrument};

use crate::consumer::{Disposition, MessageHandler};
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::ExtractionPipeline;

/// Handles `ProcessingRequest` deliveries from the intake queue.
///
/// Domain failures become error results and are acknowledged; only a failed
/// result publish hands the request back for redelivery. Both queue
/// projections are invalidated when a job starts and after it is acked.
pub struct FrameProcessor {
    pipeline: ExtractionPipeline,
    broker: Arc<dyn Broker>,
    results_queue: String,
    projector: Arc<QueueStatusProjector>,
}

impl FrameProcessor {
    pub fn new(
        pipeline: ExtractionPipeline,
        broker: Arc<dyn Broker>,
        results_queue: impl Into<String>,
        projector: Arc<QueueStatusProjector>,
    ) -> Self {
        Self {
            pipeline,
            broker,
            results_queue: results_queue.into(),
            projector,
        }
    }

    /// Run the pipeline and build the terminal result.
    pub async fn process(&self, request: &ProcessingRequest) -> ProcessingResult {
        let logger = JobLogger::new(&request.video_id, "frame_extraction");
        logger.started(&format!("{} from {}/{}", request.filename, request.bucket, request.object_name));
        metrics::record_job_started();

        let started = Instant::now();
        match self.pipeline.run(request).await {
            Ok(output) => {
                logger.completed(&format!(
                    "{} frames, {} bytes in {}",
                    output.frame_count, output.zip_size, output.zip_object_name
                ));
                metrics::record_job_completed(output.frame_count, started.elapsed().as_secs_f64());
                ProcessingResult::completed(
                    request,
                    output.frame_count,
                    output.zip_size,
                    output.zip_object_name,
                )
            }
            Err(failure) => {
                logger.failed(&failure.message);
                metrics::record_job_failed(failure.stage);
                ProcessingResult::failed(request, failure.stage.as_str(), failure.message)
            }
        }
    }
}

#[async_trait]
impl MessageHandler for FrameProcessor {
    fn name(&self) -> &'static str {
        "frame_processor"
    }

    async fn handle(&self, payload: &[u8], redelivered: bool) -> Disposition {
        let request: ProcessingRequest = match decode(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(queue = %self.projector.intake_queue(), error = %e, "Rejecting undecodable processing request");
                return Disposition::Reject;
            }
        };

        let logger = JobLogger::new(&request.video_id, "frame_extraction");
        let span = logger.span();

        async {
            if redelivered {
                logger.warning("redelivered request, processing again");
            }

            self.projector.invalidate().await;
            let result = self.process(&request).await;

            let payload = match encode(&result) {
                Ok(payload) => payload,
                Err(e) => {
                    logger.failed(&format!("cannot encode result: {}", e));
                    return Disposition::Requeue;
                }
            };

            match self.broker.publish(&self.results_queue, &payload).await {
                Ok(()) => {
                    logger.progress(&format!("{} result published", result.status));
                    Disposition::Ack
                }
                Err(e) => {
                    logger.warning(&format!("result publish failed, requeueing request: {}", e));
                    Disposition::Requeue
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn on_settled(&self, disposition: Disposition) {
        if disposition == Disposition::Ack {
            self.projector.invalidate().await;
        }
    }
}
