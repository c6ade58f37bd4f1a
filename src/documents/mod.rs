//! Document upload: validation, mock OCR and per-document records.
//!
//! Three documents are collected — Aadhaar card, PAN card and income proof.
//! Validation (file type and size) is synchronous and local; extraction runs
//! behind the async [`DocumentService`] trait. The bundled
//! [`MockDocumentService`] answers with fixed details after a configurable
//! delay, standing in for a real OCR backend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted upload.
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

const ACCEPTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "pdf"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The documents a loan application requires, in upload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Aadhaar,
    Pan,
    IncomeProof,
}

impl DocumentType {
    pub const ALL: [DocumentType; 3] = [
        DocumentType::Aadhaar,
        DocumentType::Pan,
        DocumentType::IncomeProof,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentType::Aadhaar => "Aadhaar Card",
            DocumentType::Pan => "PAN Card",
            DocumentType::IncomeProof => "Income Proof",
        }
    }

    /// The document the user should upload next, in the fixed order.
    pub fn next(&self) -> Option<DocumentType> {
        match self {
            DocumentType::Aadhaar => Some(DocumentType::Pan),
            DocumentType::Pan => Some(DocumentType::IncomeProof),
            DocumentType::IncomeProof => None,
        }
    }
}

/// Fields extracted from a document. Which fields are present depends on the
/// document type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub income: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
}

/// Where an uploaded document stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Verified,
    Rejected,
}

/// One uploaded document with its extraction result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_type: DocumentType,
    pub file_name: String,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<DocumentDetails>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid file type. Please upload an image (JPEG, PNG, WEBP) or PDF.")]
    UnsupportedType,

    #[error("File is too large. Maximum file size is 5MB.")]
    TooLarge,

    #[error("Could not read file: {0}")]
    Unreadable(String),
}

/// Checks extension and size before any processing happens. The mock OCR
/// never sees an invalid file.
pub fn validate_upload(path: &Path) -> Result<(), ValidationError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::UnsupportedType);
    }

    let metadata =
        std::fs::metadata(path).map_err(|e| ValidationError::Unreadable(e.to_string()))?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Document extraction backend.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Extracts details from an already-validated upload.
    async fn process(
        &self,
        path: &Path,
        doc_type: DocumentType,
    ) -> Result<DocumentDetails, ValidationError>;
}

/// Mock OCR: waits out its configured delay and returns fixed details per
/// document type.
pub struct MockDocumentService {
    delay: Duration,
}

impl MockDocumentService {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl DocumentService for MockDocumentService {
    async fn process(
        &self,
        path: &Path,
        doc_type: DocumentType,
    ) -> Result<DocumentDetails, ValidationError> {
        tokio::time::sleep(self.delay).await;
        log::info!(
            "Processed {} upload: {}",
            doc_type.display_name(),
            path.display()
        );

        Ok(match doc_type {
            DocumentType::Aadhaar => DocumentDetails {
                name: Some("Sample User".into()),
                dob: Some("1990-01-01".into()),
                number: Some("XXXX-XXXX-XXXX".into()),
                address: Some("123 Sample Street, Sample City, 123456".into()),
                ..DocumentDetails::default()
            },
            DocumentType::Pan => DocumentDetails {
                name: Some("Sample User".into()),
                dob: Some("1990-01-01".into()),
                number: Some("ABCDE1234F".into()),
                ..DocumentDetails::default()
            },
            DocumentType::IncomeProof => DocumentDetails {
                income: Some("75000".into()),
                employment_type: Some("Salaried".into()),
                ..DocumentDetails::default()
            },
        })
    }
}

/// File name shown in the document list for a path.
pub fn display_file_name(path: &PathBuf) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(&vec![0u8; len]).expect("write");
        path
    }

    #[test]
    fn accepts_images_and_pdfs() {
        let dir = tempdir().expect("tempdir");
        for name in ["card.jpg", "card.JPEG", "card.png", "card.webp", "slip.pdf"] {
            let path = write_file(dir.path(), name, 128);
            assert!(validate_upload(&path).is_ok(), "{name} should validate");
        }
    }

    #[test]
    fn rejects_unsupported_types() {
        let dir = tempdir().expect("tempdir");
        for name in ["notes.txt", "movie.mp4", "noextension"] {
            let path = write_file(dir.path(), name, 128);
            assert!(matches!(
                validate_upload(&path),
                Err(ValidationError::UnsupportedType)
            ));
        }
    }

    #[test]
    fn rejects_oversized_files() {
        let dir = tempdir().expect("tempdir");
        let path = write_file(dir.path(), "big.png", (MAX_FILE_SIZE + 1) as usize);
        assert!(matches!(
            validate_upload(&path),
            Err(ValidationError::TooLarge)
        ));
    }

    #[test]
    fn exactly_max_size_is_accepted() {
        let dir = tempdir().expect("tempdir");
        let path = write_file(dir.path(), "edge.png", MAX_FILE_SIZE as usize);
        assert!(validate_upload(&path).is_ok());
    }

    #[test]
    fn missing_file_is_unreadable() {
        assert!(matches!(
            validate_upload(Path::new("/nonexistent/card.png")),
            Err(ValidationError::Unreadable(_))
        ));
    }

    #[tokio::test]
    async fn mock_extracts_per_type_details() {
        let service = MockDocumentService::new(Duration::ZERO);
        let path = Path::new("aadhaar.png");

        let aadhaar = service
            .process(path, DocumentType::Aadhaar)
            .await
            .expect("process");
        assert_eq!(aadhaar.name.as_deref(), Some("Sample User"));
        assert_eq!(aadhaar.number.as_deref(), Some("XXXX-XXXX-XXXX"));
        assert!(aadhaar.income.is_none());

        let pan = service
            .process(path, DocumentType::Pan)
            .await
            .expect("process");
        assert_eq!(pan.number.as_deref(), Some("ABCDE1234F"));
        assert!(pan.address.is_none());

        let income = service
            .process(path, DocumentType::IncomeProof)
            .await
            .expect("process");
        assert_eq!(income.income.as_deref(), Some("75000"));
        assert_eq!(income.employment_type.as_deref(), Some("Salaried"));
    }

    #[test]
    fn upload_order_is_fixed() {
        assert_eq!(DocumentType::Aadhaar.next(), Some(DocumentType::Pan));
        assert_eq!(DocumentType::Pan.next(), Some(DocumentType::IncomeProof));
        assert_eq!(DocumentType::IncomeProof.next(), None);
    }
}
