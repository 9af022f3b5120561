use crate::dicom::ExtractedTags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical DICOM metadata record.
///
/// All fields are optional. The persisted JSON form is sparse: absent fields
/// are omitted entirely, never written as null or empty string. The
/// empty-vs-absent distinction from the tag extractor (which yields empty
/// strings for missing tags) is collapsed here, at record construction, and
/// nowhere else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DicomMetadata {
    #[serde(rename = "PatientID", default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,

    /// Opaque date-like string; the format is not validated.
    #[serde(rename = "StudyDate", default, skip_serializing_if = "Option::is_none")]
    pub study_date: Option<String>,

    #[serde(rename = "Modality", default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,

    #[serde(
        rename = "InstitutionName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub institution_name: Option<String>,

    #[serde(
        rename = "StudyDescription",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub study_description: Option<String>,

    /// The storage path this record was derived from.
    #[serde(rename = "S3Path", default, skip_serializing_if = "Option::is_none")]
    pub s3_path: Option<String>,
}

impl DicomMetadata {
    /// Build a record from extracted tags, collapsing empty strings to absent
    /// and stamping the source path.
    pub fn from_tags(tags: ExtractedTags, source_path: &str) -> Self {
        Self {
            patient_id: collapse(tags.patient_id),
            study_date: collapse(tags.study_date),
            modality: collapse(tags.modality),
            institution_name: collapse(tags.institution_name),
            study_description: collapse(tags.study_description),
            s3_path: Some(source_path.to_string()),
        }
    }

    /// The sparse flat-mapping form stored in the index: only present fields
    /// appear, keyed by their persisted names.
    pub fn to_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();

        let mut insert = |name: &str, value: &Option<String>| {
            if let Some(value) = value {
                fields.insert(name.to_string(), value.clone());
            }
        };

        insert("PatientID", &self.patient_id);
        insert("StudyDate", &self.study_date);
        insert("Modality", &self.modality);
        insert("InstitutionName", &self.institution_name);
        insert("StudyDescription", &self.study_description);
        insert("S3Path", &self.s3_path);

        fields
    }

    /// Reconstruct a record from its sparse flat-mapping form. Missing keys
    /// stay absent; unknown keys are ignored.
    pub fn from_fields(fields: &BTreeMap<String, String>) -> Self {
        Self {
            patient_id: fields.get("PatientID").cloned(),
            study_date: fields.get("StudyDate").cloned(),
            modality: fields.get("Modality").cloned(),
            institution_name: fields.get("InstitutionName").cloned(),
            study_description: fields.get("StudyDescription").cloned(),
            s3_path: fields.get("S3Path").cloned(),
        }
    }
}

fn collapse(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
