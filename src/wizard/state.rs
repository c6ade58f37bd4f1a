//! Application state: the current step and everything collected so far.
//!
//! Held and mutated exclusively by the wizard controller; the UI only ever
//! sees snapshots through updates.

use crate::documents::{DocumentRecord, DocumentStatus, DocumentType};
use crate::record::Clip;

/// The wizard's steps, in order, plus the three terminal decision screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStep {
    Initial,
    VideoIntro,
    DocumentUpload,
    VideoQuestions,
    Processing,
    Approved,
    Rejected,
    MoreInfo,
}

/// A recorded answer to one interview question.
#[derive(Debug, Clone)]
pub struct VideoResponse {
    pub question_id: String,
    pub clip: Clip,
}

#[derive(Debug, Default)]
pub struct ApplicationState {
    pub step: ApplicationStep,
    pub customer_name: String,
    pub documents: Vec<DocumentRecord>,
    pub responses: Vec<VideoResponse>,
    /// Index into [`crate::wizard::QUESTIONS`].
    pub current_question: usize,
}

impl Default for ApplicationStep {
    fn default() -> Self {
        ApplicationStep::Initial
    }
}

impl ApplicationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a response, replacing any earlier take for the same question.
    pub fn record_response(&mut self, question_id: &str, clip: Clip) {
        if let Some(existing) = self
            .responses
            .iter_mut()
            .find(|r| r.question_id == question_id)
        {
            existing.clip = clip;
        } else {
            self.responses.push(VideoResponse {
                question_id: question_id.to_owned(),
                clip,
            });
        }
    }

    /// Adds or replaces the record for a document type.
    pub fn upsert_document(&mut self, record: DocumentRecord) {
        if let Some(existing) = self
            .documents
            .iter_mut()
            .find(|d| d.doc_type == record.doc_type)
        {
            *existing = record;
        } else {
            self.documents.push(record);
        }
    }

    /// All three required documents uploaded and verified.
    pub fn documents_complete(&self) -> bool {
        DocumentType::ALL.iter().all(|doc_type| {
            self.documents
                .iter()
                .any(|d| d.doc_type == *doc_type && d.status == DocumentStatus::Verified)
        })
    }

    /// Back to a blank application.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
