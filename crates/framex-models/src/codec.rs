//! Envelope codec.
//!
//! Every producer serializes through [`encode`] and every consumer parses
//! through [`decode`], so a message that fails here is a poison message
//! regardless of which stage received it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::envelope::{NotificationRequest, ProcessingRequest, ProcessingResult};
use crate::video::VideoId;

pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed {kind} envelope: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid {kind} envelope: {reason}")]
    Invalid { kind: &'static str, reason: String },

    #[error("Failed to encode {kind} envelope: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl CodecError {
    pub fn invalid(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            kind,
            reason: reason.into(),
        }
    }
}

/// A message type carried on one of the pipeline queues.
pub trait Envelope: Serialize + DeserializeOwned {
    /// Short name used in errors and logs.
    const KIND: &'static str;

    fn video_id(&self) -> &VideoId;

    /// Structural checks beyond what the JSON shape enforces.
    fn check(&self) -> Result<(), String> {
        if self.video_id().is_empty() {
            return Err("video_id is empty".to_string());
        }
        Ok(())
    }
}

impl Envelope for ProcessingRequest {
    const KIND: &'static str = "processing request";

    fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    fn check(&self) -> Result<(), String> {
        if self.video_id.is_empty() {
            return Err("video_id is empty".to_string());
        }
        if self.bucket.trim().is_empty() {
            return Err("bucket is empty".to_string());
        }
        if self.object_name.trim().is_empty() {
            return Err("object_name is empty".to_string());
        }
        Ok(())
    }
}

impl Envelope for ProcessingResult {
    const KIND: &'static str = "processing result";

    fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    fn check(&self) -> Result<(), String> {
        if self.video_id.is_empty() {
            return Err("video_id is empty".to_string());
        }
        if !self.status.is_terminal() {
            return Err(format!("status '{}' is not terminal", self.status));
        }
        let has_error = self.error.as_deref().is_some_and(|e| !e.is_empty());
        if self.is_success() && has_error {
            return Err("completed result carries an error".to_string());
        }
        if !self.is_success() && !has_error {
            return Err("error result without an error message".to_string());
        }
        Ok(())
    }
}

impl Envelope for NotificationRequest {
    const KIND: &'static str = "notification";

    fn video_id(&self) -> &VideoId {
        &self.video_id
    }
}

/// Serialize an envelope to its wire form.
pub fn encode<E: Envelope>(envelope: &E) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(envelope).map_err(|source| CodecError::Encode {
        kind: E::KIND,
        source,
    })
}

/// Parse and check an envelope from its wire form.
pub fn decode<E: Envelope>(payload: &[u8]) -> CodecResult<E> {
    let envelope: E = serde_json::from_slice(payload).map_err(|source| CodecError::Malformed {
        kind: E::KIND,
        source,
    })?;
    envelope
        .check()
        .map_err(|reason| CodecError::invalid(E::KIND, reason))?;
    Ok(envelope)
}
