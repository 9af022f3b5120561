//! In-memory store doubles for pipeline and event-handler tests.

use crate::blob_store::BlobStore;
use crate::error::MetadataError;
use crate::index_store::IndexStore;
use crate::metadata::DicomMetadata;
use crate::s3path::S3Path;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Blob store double holding objects in a map keyed by full `s3://` path.
#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn with_object(self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.into());
        self
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, MetadataError> {
        S3Path::parse(path)?;
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(path.to_string()))
    }

    async fn put_json(&self, path: &str, record: &DicomMetadata) -> Result<(), MetadataError> {
        S3Path::parse(path)?;
        let payload = serde_json::to_vec(record)
            .map_err(|err| MetadataError::Validation(err.to_string()))?;
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), payload);
        Ok(())
    }
}

/// Index store double. Can be told to fail writes for one identifier, to
/// exercise fail-fast batch semantics.
#[derive(Default)]
pub struct InMemoryIndexStore {
    items: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    fail_put_for: Option<String>,
}

impl InMemoryIndexStore {
    pub fn failing_put_for(id: &str) -> Self {
        Self {
            items: Mutex::default(),
            fail_put_for: Some(id.to_string()),
        }
    }

    pub fn entry(&self, id: &str) -> Option<BTreeMap<String, String>> {
        self.items.lock().unwrap().get(id).cloned()
    }

    pub fn entry_count(&self) -> usize {
        self.items.lock().unwrap().len()
    }
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn put(&self, id: &str, fields: &BTreeMap<String, String>) -> Result<(), MetadataError> {
        if self.fail_put_for.as_deref() == Some(id) {
            return Err(MetadataError::transport(
                id,
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, "injected failure"),
            ));
        }
        self.items
            .lock()
            .unwrap()
            .insert(id.to_string(), fields.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<BTreeMap<String, String>>, MetadataError> {
        Ok(self.items.lock().unwrap().get(id).cloned())
    }
}
