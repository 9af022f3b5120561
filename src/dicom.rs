use crate::error::MetadataError;
use dicom_object::DefaultDicomObject;
use tracing::debug;

/// The fixed set of tags read from each DICOM file, as raw strings.
///
/// A tag missing from the file yields an empty string here, not an error and
/// not absence. The empty-to-absent collapse happens later, when the record
/// is constructed (`DicomMetadata::from_tags`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedTags {
    pub patient_id: String,
    pub study_date: String,
    pub modality: String,
    pub institution_name: String,
    pub study_description: String,
}

/// Seam over the DICOM parser so the pipeline can be exercised without
/// real imaging files.
#[cfg_attr(test, mockall::automock)]
pub trait TagReader: Send + Sync {
    /// Extract the fixed tag set from a DICOM file.
    ///
    /// All-or-nothing: a malformed file fails with
    /// [`MetadataError::Extraction`]; a partial tag set is never returned.
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedTags, MetadataError>;
}

/// Tag reader backed by the `dicom-object` crate.
pub struct DicomTagReader;

impl TagReader for DicomTagReader {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedTags, MetadataError> {
        let object = dicom_object::from_reader(strip_preamble(bytes))
            .map_err(|err| MetadataError::Extraction(Box::new(err)))?;

        let tags = ExtractedTags {
            patient_id: tag_value(&object, "PatientID"),
            study_date: tag_value(&object, "StudyDate"),
            modality: tag_value(&object, "Modality"),
            institution_name: tag_value(&object, "InstitutionName"),
            study_description: tag_value(&object, "StudyDescription"),
        };

        debug!(
            patient_id = %tags.patient_id,
            modality = %tags.modality,
            "extracted DICOM tags"
        );

        Ok(tags)
    }
}

/// Read a single tag as a trimmed string, empty if the tag is missing or
/// cannot be rendered as text.
fn tag_value(object: &DefaultDicomObject, name: &str) -> String {
    object
        .element_by_name(name)
        .ok()
        .and_then(|element| element.to_str().ok())
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

const PREAMBLE_LEN: usize = 128;
const DICM_MAGIC: &[u8] = b"DICM";

/// `dicom_object::from_reader` expects the stream to start at the file meta
/// group; DICOM Part 10 files carry a 128-byte preamble before the "DICM"
/// magic code, so skip it when present.
fn strip_preamble(bytes: &[u8]) -> &[u8] {
    if bytes.len() > PREAMBLE_LEN + DICM_MAGIC.len()
        && &bytes[PREAMBLE_LEN..PREAMBLE_LEN + DICM_MAGIC.len()] == DICM_MAGIC
    {
        &bytes[PREAMBLE_LEN..]
    } else {
        bytes
    }
}
