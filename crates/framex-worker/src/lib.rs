//! FrameX pipeline workers.
//!
//! - [`FrameProcessor`]: intake queue → frames archive → results queue
//! - [`ResultConsumer`]: results queue → catalog → notifications queue
//! - [`NotificationDispatcher`]: notifications queue → e-mail
//!
//! Each runs inside a [`ConsumerLoop`], one delivery at a time.

pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod processor;
pub mod result_consumer;
pub mod retry;
pub mod runtime;

pub use config::WorkerConfig;
pub use consumer::{shutdown_on_signal, wait_for_shutdown, ConsumerLoop, Disposition, MessageHandler};
pub use dispatcher::NotificationDispatcher;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use pipeline::{ExtractionPipeline, PipelineOutput, Stage, StageFailure};
pub use processor::FrameProcessor;
pub use result_consumer::ResultConsumer;
pub use retry::{with_retries, LogThrottle, RetryPolicy};
