use std::path::Path;

use serde_json::Value;
use shared::types::StaffDraft;

use crate::error::StaffSyncError;

/// Extensions the staff API accepts for proof-of-identity uploads.
const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "png", "jpg", "jpeg"];

/// Form part name the document is uploaded under.
pub const DOCUMENT_FIELD: &str = "proof_of_id";

/// An identity document attached to a create or update.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    filename: String,
    content_type: &'static str,
    bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, StaffSyncError> {
        let filename = filename.into();
        let extension = Path::new(&filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| {
                StaffSyncError::Validation(
                    "Invalid file type. Allowed: PDF, PNG, JPG, JPEG".to_owned(),
                )
            })?;

        let content_type = match extension.as_str() {
            "pdf" => "application/pdf",
            "png" => "image/png",
            _ => "image/jpeg",
        };

        Ok(Self {
            filename,
            content_type,
            bytes,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Request body for a create or update, chosen by whether a document is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffPayload {
    /// Sent as JSON. Carries no document key at all.
    Structured(StaffDraft),
    /// Sent as multipart form data: non-empty scalar fields plus the document.
    Multipart {
        fields: Vec<(&'static str, String)>,
        document: Document,
    },
}

impl StaffPayload {
    pub fn new(draft: StaffDraft, document: Option<Document>) -> Self {
        match document {
            Some(document) => Self::Multipart {
                fields: draft.form_fields(),
                document,
            },
            None => Self::Structured(draft),
        }
    }

    pub fn has_document(&self) -> bool {
        matches!(self, Self::Multipart { .. })
    }
}

/// Overlays a JSON object of changed fields onto `current`.
///
/// Without a current draft `changes` must decode as a complete draft on its own.
pub fn merge_draft(
    current: Option<StaffDraft>,
    changes: Value,
) -> Result<StaffDraft, serde_json::Error> {
    let merged = match (current, changes) {
        (Some(current), Value::Object(changes)) => {
            let mut fields = match serde_json::to_value(current)? {
                Value::Object(fields) => fields,
                _ => serde_json::Map::new(),
            };
            fields.extend(changes);
            Value::Object(fields)
        }
        (_, changes) => changes,
    };
    serde_json::from_value(merged)
}

pub fn validate_draft(draft: &StaffDraft) -> Result<(), StaffSyncError> {
    let required = [
        ("firstname", &draft.firstname),
        ("lastname", &draft.lastname),
        ("national_insurance_number", &draft.national_insurance_number),
        ("home_address", &draft.home_address),
        ("telephone_number", &draft.telephone_number),
    ];

    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StaffSyncError::Validation(format!(
            "Required fields missing: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::types::{EmploymentStatus, Sex};

    fn draft() -> StaffDraft {
        StaffDraft {
            firstname: "Ann".into(),
            lastname: "Lee".into(),
            national_insurance_number: "QQ123456C".into(),
            home_address: "1 High Street".into(),
            telephone_number: "07700900123".into(),
            employment_status: EmploymentStatus::FullTime,
            immigration_status: Some("British citizen".into()),
            visa_type: None,
            visa_sharecode: None,
            sex: Sex::Female,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 1).unwrap(),
        }
    }

    #[test]
    fn document_accepts_known_extensions_case_insensitively() {
        let doc = Document::new("passport.JPG", vec![1, 2, 3]).unwrap();
        assert_eq!(doc.content_type(), "image/jpeg");
        assert_eq!(
            Document::new("scan.pdf", vec![]).unwrap().content_type(),
            "application/pdf"
        );
    }

    #[test]
    fn document_rejects_other_extensions() {
        for name in ["notes.txt", "archive.tar.gz", "no_extension"] {
            assert!(matches!(
                Document::new(name, vec![]),
                Err(StaffSyncError::Validation(_))
            ));
        }
    }

    #[test]
    fn payload_without_document_is_structured() {
        let payload = StaffPayload::new(draft(), None);
        assert_eq!(payload, StaffPayload::Structured(draft()));
        assert!(!payload.has_document());
    }

    #[test]
    fn payload_with_document_is_multipart_without_empty_fields() {
        let doc = Document::new("id.png", vec![0x89]).unwrap();
        let payload = StaffPayload::new(draft(), Some(doc.clone()));

        let StaffPayload::Multipart { fields, document } = payload else {
            panic!("expected multipart payload");
        };
        assert_eq!(document, doc);
        assert!(fields.iter().all(|(name, _)| *name != "visa_type"));
        assert!(fields.iter().all(|(name, _)| *name != DOCUMENT_FIELD));
        assert!(fields.contains(&("immigration_status", "British citizen".to_owned())));
    }

    #[test]
    fn validation_lists_blank_fields() {
        let mut draft = draft();
        draft.firstname = "  ".into();
        draft.telephone_number.clear();

        let err = validate_draft(&draft).unwrap_err();
        assert_eq!(
            err,
            StaffSyncError::Validation(
                "Required fields missing: firstname, telephone_number".into()
            )
        );
    }

    #[test]
    fn merge_keeps_current_values_for_missing_fields() {
        let record: shared::types::StaffRecord = serde_json::from_value(serde_json::json!({
            "id": 4,
            "firstname": "Ann",
            "lastname": "Lee",
            "national_insurance_number": "QQ123456C",
            "home_address": "1 High Street",
            "telephone_number": "07700900123",
            "employment_status": "Full-time",
            "immigration_status": "British citizen",
            "sex": "Female",
            "date_of_birth": "1990-04-01",
            "proof_of_id": "uploads/4/passport.pdf",
        }))
        .unwrap();

        let merged = merge_draft(
            record.to_draft(),
            serde_json::json!({
                "telephone_number": "07700900999",
                "employment_status": "Contract",
            }),
        )
        .unwrap();

        assert_eq!(merged.telephone_number, "07700900999");
        assert_eq!(merged.employment_status, EmploymentStatus::Contract);
        assert_eq!(merged.firstname, "Ann");
        assert_eq!(merged.immigration_status.as_deref(), Some("British citizen"));
    }

    #[test]
    fn merge_without_current_draft_needs_every_field() {
        let partial = serde_json::json!({ "telephone_number": "07700900999" });
        assert!(merge_draft(None, partial).is_err());

        let complete = serde_json::to_value(draft()).unwrap();
        assert_eq!(merge_draft(None, complete).unwrap(), draft());
    }
}
