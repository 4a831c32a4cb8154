//! Object storage and video catalog.
//!
//! Provides the [`ObjectStore`] trait with an S3-compatible client (AWS S3,
//! MinIO) and an in-memory store, plus the [`Catalog`] of processed videos.

pub mod catalog;
pub mod client;
pub mod error;
pub mod memory;

pub use catalog::{Catalog, MemoryCatalog};
pub use client::{ObjectStore, S3Config, S3Store, DEFAULT_PROCESSED_BUCKET, ZIP_CONTENT_TYPE};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
