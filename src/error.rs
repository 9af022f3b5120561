use thiserror::Error;

/// Boxed cause kept alongside a failure for operator diagnosis.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure taxonomy for the metadata pipeline and its store gateways.
///
/// Every failure is terminal for the current request or event; there is no
/// internal retry. Adapters map each kind to an HTTP status or an event
/// acknowledgment.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The storage path does not match `s3://<bucket>/<key>`.
    #[error("invalid S3 path: {0}")]
    InvalidPath(String),

    /// The object or record does not exist in the backing store.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backing store rejected the call for authorization reasons.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Network or backend error talking to a store, original cause preserved.
    #[error("transport error while accessing {context}")]
    Transport {
        context: String,
        #[source]
        source: BoxedCause,
    },

    /// The DICOM parser rejected the file. Extraction is all-or-nothing.
    #[error("failed to parse DICOM data")]
    Extraction(#[source] BoxedCause),

    /// Malformed record payload on an inbound write.
    #[error("invalid metadata payload: {0}")]
    Validation(String),
}

impl MetadataError {
    /// Wrap a backend error as a transport failure, keeping the cause chain.
    pub fn transport<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
