use crate::error::MetadataError;

/// A parsed `s3://<bucket>/<key>` storage path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Path {
    pub bucket: String,
    pub key: String,
}

impl S3Path {
    /// Parse a storage path of the form `s3://<bucket>/<key>`.
    ///
    /// Both bucket and key must be non-empty; anything else fails with
    /// [`MetadataError::InvalidPath`] before any network call is made.
    pub fn parse(path: &str) -> Result<Self, MetadataError> {
        let rest = path
            .strip_prefix("s3://")
            .ok_or_else(|| MetadataError::InvalidPath(path.to_string()))?;

        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| MetadataError::InvalidPath(path.to_string()))?;

        if bucket.is_empty() || key.is_empty() {
            return Err(MetadataError::InvalidPath(path.to_string()));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Render back to `s3://<bucket>/<key>` form.
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// Derive the stable record identifier from a storage path.
///
/// Takes the final `/`-delimited segment of the key and strips one trailing
/// extension (everything after the last `.`). Only the last extension is
/// stripped, so `anon-17.dcm` becomes `anon-17` and `file.tar.gz` becomes
/// `file.tar`.
///
/// This never fails; degenerate input yields an empty string and callers
/// must validate non-emptiness before using the result as a key. The same
/// derivation is used by every ingestion path so blob documents and index
/// entries stay addressable by a single key.
pub fn derive_id(path: &str) -> String {
    let rest = path.strip_prefix("s3://").unwrap_or(path);
    let rest = rest.trim_start_matches('/');

    let basename = rest.rsplit('/').next().unwrap_or_default();

    match basename.rsplit_once('.') {
        Some((stem, _extension)) => stem.to_string(),
        None => basename.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_path() {
        let path = S3Path::parse("s3://data-apps-ex/json/anon-17.json").unwrap();
        assert_eq!(path.bucket, "data-apps-ex");
        assert_eq!(path.key, "json/anon-17.json");
        assert_eq!(path.uri(), "s3://data-apps-ex/json/anon-17.json");
    }

    #[test]
    fn test_parse_rejects_missing_scheme() {
        assert!(matches!(
            S3Path::parse("data-apps-ex/json/anon-17.json"),
            Err(MetadataError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_key() {
        assert!(matches!(
            S3Path::parse("s3://bucket-only"),
            Err(MetadataError::InvalidPath(_))
        ));
        assert!(matches!(
            S3Path::parse("s3://bucket/"),
            Err(MetadataError::InvalidPath(_))
        ));
        assert!(matches!(
            S3Path::parse("s3:///key"),
            Err(MetadataError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_derive_id_strips_last_extension_only() {
        assert_eq!(derive_id("s3://b/k/anon-17.dcm"), "anon-17");
        assert_eq!(derive_id("s3://b/k/file.tar.gz"), "file.tar");
        assert_eq!(derive_id("s3://b/json/anon-17.dcm.json"), "anon-17.dcm");
    }

    #[test]
    fn test_derive_id_without_extension() {
        assert_eq!(derive_id("s3://b/k/no-extension"), "no-extension");
    }

    #[test]
    fn test_derive_id_is_source_agnostic() {
        // HTTP path and event path must produce the same identifier.
        assert_eq!(derive_id("s3://in/scans/anon-17.dcm"), "anon-17");
        assert_eq!(derive_id("s3://out/json/anon-17.json"), "anon-17");
    }

    #[test]
    fn test_derive_id_degenerate_input() {
        assert_eq!(derive_id(""), "");
        assert_eq!(derive_id("s3://bucket/"), "");
    }
}
