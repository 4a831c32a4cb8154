//! Subscriber set-up for the worker binaries and per-job log events.

use framex_models::VideoId;
use tracing::{error, info, info_span, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "framex=info,lapin=warn,aws_config=warn";

/// `LOG_FORMAT=json` switches to JSON lines; `RUST_LOG` replaces the
/// default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

/// Tags every event of one job with its video ID and the work being done.
#[derive(Debug, Clone)]
pub struct JobLogger {
    video_id: VideoId,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(video_id: &VideoId, operation: &'static str) -> Self {
        Self {
            video_id: video_id.clone(),
            operation,
        }
    }

    pub fn started(&self, detail: &str) {
        info!(video_id = %self.video_id, operation = self.operation, "Job started: {}", detail);
    }

    pub fn progress(&self, detail: &str) {
        info!(video_id = %self.video_id, operation = self.operation, "{}", detail);
    }

    pub fn warning(&self, detail: &str) {
        warn!(video_id = %self.video_id, operation = self.operation, "{}", detail);
    }

    pub fn failed(&self, detail: &str) {
        error!(video_id = %self.video_id, operation = self.operation, "Job failed: {}", detail);
    }

    pub fn completed(&self, detail: &str) {
        info!(video_id = %self.video_id, operation = self.operation, "Job completed: {}", detail);
    }

    pub fn span(&self) -> Span {
        info_span!("job", video_id = %self.video_id, operation = self.operation)
    }
}
