use crate::blob_store::BlobStore;
use crate::dicom::TagReader;
use crate::error::MetadataError;
use crate::index_store::IndexStore;
use crate::metadata::DicomMetadata;
use crate::s3path::{derive_id, S3Path};
use metrics::counter;
use std::sync::Arc;
use tracing::{info, instrument};

/// Orchestrates extraction, dual persistence, and lookup.
///
/// Every operation derives the record identifier the same way, regardless of
/// whether the caller came in over HTTP or from a blob-creation event, so
/// the JSON document in the blob store and the index entry stay addressable
/// by a single key.
///
/// The two stores share no transaction. `persist` writes the blob document
/// first and the index entry second; a crash in between leaves the blob
/// store ahead. The blob store is authoritative and `reconcile` rebuilds the
/// index entry from it.
pub struct MetadataPipeline {
    blob_store: Arc<dyn BlobStore>,
    index_store: Arc<dyn IndexStore>,
    tag_reader: Arc<dyn TagReader>,
    json_bucket: String,
    json_prefix: String,
}

impl MetadataPipeline {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        index_store: Arc<dyn IndexStore>,
        tag_reader: Arc<dyn TagReader>,
        json_bucket: String,
        json_prefix: String,
    ) -> Self {
        Self {
            blob_store,
            index_store,
            tag_reader,
            json_bucket,
            json_prefix,
        }
    }

    /// Fetch a DICOM file from the blob store and extract its metadata.
    ///
    /// The returned record carries `S3Path = path` and has empty extractor
    /// values already collapsed to absent. Failures propagate unchanged; no
    /// retry at this layer.
    #[instrument(skip(self))]
    pub async fn extract_from_blob(&self, path: &str) -> Result<DicomMetadata, MetadataError> {
        S3Path::parse(path)?;

        let bytes = self.blob_store.get_bytes(path).await?;
        let tags = self.tag_reader.extract(&bytes)?;
        let record = DicomMetadata::from_tags(tags, path);

        counter!("metadata.extractions").increment(1);
        info!(path = %path, "extracted DICOM metadata");

        Ok(record)
    }

    /// Write a record to both stores under the identifier derived from its
    /// source path.
    ///
    /// The JSON document goes to the configured bucket/prefix as
    /// `<id>.json`; the index entry is a full replacement keyed by the same
    /// identifier. Both writes are last-writer-wins.
    #[instrument(skip(self, record))]
    pub async fn persist(&self, record: &DicomMetadata) -> Result<(), MetadataError> {
        let source_path = record.s3_path.as_deref().ok_or_else(|| {
            MetadataError::Validation("record has no S3Path to derive an identifier from".into())
        })?;
        let id = self.record_id(source_path)?;

        let destination = self.document_path(&id);
        self.blob_store.put_json(&destination, record).await?;
        self.index_store.put(&id, &record.to_fields()).await?;

        counter!("metadata.persisted").increment(1);
        info!(id = %id, destination = %destination, "persisted metadata record");

        Ok(())
    }

    /// Look up the record indexed for a path's identifier.
    ///
    /// An identifier that was never persisted yields `Ok(None)`, not a
    /// failure.
    #[instrument(skip(self))]
    pub async fn lookup(&self, path: &str) -> Result<Option<DicomMetadata>, MetadataError> {
        let id = self.record_id(path)?;

        let record = match self.index_store.get(&id).await? {
            Some(fields) => {
                info!(id = %id, "index entry found");
                Some(DicomMetadata::from_fields(&fields))
            }
            None => {
                info!(id = %id, "no index entry");
                None
            }
        };

        counter!("metadata.lookups").increment(1);

        Ok(record)
    }

    /// Rebuild the index entry for a stored JSON document.
    ///
    /// Reads the document at `path` from the authoritative blob store,
    /// parses it (malformed JSON is a validation failure), and upserts the
    /// index entry under the identifier derived from `path`. This is both
    /// the repair operation for interrupted dual writes and the terminal
    /// step of event-driven ingestion of pre-extracted documents.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, path: &str) -> Result<DicomMetadata, MetadataError> {
        let id = self.record_id(path)?;

        let bytes = self.blob_store.get_bytes(path).await?;
        let record: DicomMetadata = serde_json::from_slice(&bytes).map_err(|err| {
            MetadataError::Validation(format!("malformed metadata document at {path}: {err}"))
        })?;

        self.index_store.put(&id, &record.to_fields()).await?;

        counter!("metadata.reconciled").increment(1);
        info!(id = %id, path = %path, "reconciled index entry from blob store");

        Ok(record)
    }

    fn record_id(&self, path: &str) -> Result<String, MetadataError> {
        S3Path::parse(path)?;
        let id = derive_id(path);
        if id.is_empty() {
            return Err(MetadataError::InvalidPath(path.to_string()));
        }
        Ok(id)
    }

    fn document_path(&self, id: &str) -> String {
        format!("s3://{}/{}{}.json", self.json_bucket, self.json_prefix, id)
    }
}
