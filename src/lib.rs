//! DICOM Metadata Service
//!
//! Extracts a fixed set of descriptive fields from DICOM files held in S3,
//! persists the extracted records as sparse JSON documents, and indexes them
//! in DynamoDB under an identifier derived from the storage path. Records
//! are ingested synchronously over HTTP or asynchronously from S3
//! blob-creation events delivered through SQS; both paths terminate at the
//! same index-write contract and derive identifiers the same way.
//!
//! ## Architecture
//!
//! ```text
//! HTTP API                      S3 Buckets                DynamoDB
//! ┌─────────────────┐          ┌──────────────┐          ┌──────────────┐
//! │ /dicom-metadata │─ get ───▶│ scans (dcm)  │          │ metadata     │
//! │ /upload-json-…  │─ put ───▶│ json/<id>…   │── event ─│ index        │
//! │ /fetch-dicom-…  │          └──────────────┘    │     └──────────────┘
//! └─────────────────┘                 │            ▼            ▲
//!          │                          │     ┌──────────────┐    │
//!          ▼                          │     │ SQS consumer │────┘
//! ┌─────────────────┐                 │     └──────────────┘
//! │ Metadata        │◀── authoritative┘
//! │ Pipeline        │    (reconcile rebuilds index entries)
//! └─────────────────┘
//! ```
//!
//! The blob store and the index share no transaction: the JSON document is
//! written first and is authoritative; the index entry is a best-effort
//! cache rebuilt on demand by the pipeline's reconcile operation.

pub mod api;
pub mod blob_store;
pub mod config;
pub mod dicom;
pub mod error;
pub mod events;
pub mod index_store;
pub mod metadata;
pub mod pipeline;
pub mod s3path;

#[cfg(test)]
pub(crate) mod testing;

pub use blob_store::{BlobStore, S3BlobStore};
pub use config::Config;
pub use dicom::{DicomTagReader, ExtractedTags, TagReader};
pub use error::MetadataError;
pub use events::{EventAck, EventHandler, S3Event, SqsEventConsumer};
pub use index_store::{DynamoIndexStore, IndexStore};
pub use metadata::DicomMetadata;
pub use pipeline::MetadataPipeline;
pub use s3path::{derive_id, S3Path};
