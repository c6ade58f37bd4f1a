//! Eligibility decision.
//!
//! The decision sits behind the async [`EligibilityService`] trait. The
//! bundled [`MockEligibilityService`] applies fixed income thresholds to the
//! extracted income-proof details; [`MoreInfoFallback`] wraps any service so
//! that a backend failure degrades into a "more information needed" decision
//! instead of stranding the application in processing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::documents::{DocumentRecord, DocumentType};

/// Monthly income below which applications are declined.
const MIN_INCOME: u64 = 25_000;
/// Income at or above which the larger multiplier applies.
const HIGH_INCOME: u64 = 50_000;
/// Approved amount multipliers for the two income bands.
const BASE_MULTIPLIER: u64 = 10;
const HIGH_MULTIPLIER: u64 = 15;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Approved,
    Rejected,
    MoreInfo,
}

/// The outcome shown on the final screen and persisted with the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub status: DecisionStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum EligibilityError {
    #[error("eligibility backend failed: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Decision backend.
#[async_trait]
pub trait EligibilityService: Send + Sync {
    async fn check(&self, documents: &[DocumentRecord]) -> Result<Decision, EligibilityError>;
}

/// Mock decision engine using fixed income thresholds.
pub struct MockEligibilityService {
    delay: Duration,
}

impl MockEligibilityService {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl EligibilityService for MockEligibilityService {
    async fn check(&self, documents: &[DocumentRecord]) -> Result<Decision, EligibilityError> {
        tokio::time::sleep(self.delay).await;

        let income = documents
            .iter()
            .find(|d| d.doc_type == DocumentType::IncomeProof)
            .and_then(|d| d.details.as_ref())
            .and_then(|details| details.income.as_deref())
            .and_then(|income| income.parse::<u64>().ok());

        let Some(income) = income else {
            return Ok(Decision {
                status: DecisionStatus::MoreInfo,
                message: "We need more information about your income to process your application."
                    .into(),
                approved_amount: None,
                reason: None,
            });
        };

        let decision = if income < MIN_INCOME {
            Decision {
                status: DecisionStatus::Rejected,
                message: "We regret to inform you that your loan application has been declined."
                    .into(),
                approved_amount: None,
                reason: Some("Minimum income requirement not met.".into()),
            }
        } else {
            let multiplier = if income < HIGH_INCOME {
                BASE_MULTIPLIER
            } else {
                HIGH_MULTIPLIER
            };
            Decision {
                status: DecisionStatus::Approved,
                message: "Congratulations! Your loan has been pre-approved.".into(),
                approved_amount: Some(income * multiplier),
                reason: None,
            }
        };

        log::info!("Eligibility decision: {:?}", decision.status);
        Ok(decision)
    }
}

// ---------------------------------------------------------------------------
// Fallback wrapper
// ---------------------------------------------------------------------------

/// Wraps a service so a backend error degrades into a `MoreInfo` decision.
/// The wizard always gets a decision to show.
pub struct MoreInfoFallback {
    inner: Arc<dyn EligibilityService>,
}

impl MoreInfoFallback {
    pub fn new(inner: Arc<dyn EligibilityService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl EligibilityService for MoreInfoFallback {
    async fn check(&self, documents: &[DocumentRecord]) -> Result<Decision, EligibilityError> {
        match self.inner.check(documents).await {
            Ok(decision) => Ok(decision),
            Err(e) => {
                log::warn!("Eligibility check failed, degrading to more-info: {e}");
                Ok(Decision {
                    status: DecisionStatus::MoreInfo,
                    message: "There was an error processing your application. Please try again later."
                        .into(),
                    approved_amount: None,
                    reason: None,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{DocumentDetails, DocumentStatus};

    fn income_proof(income: &str) -> DocumentRecord {
        DocumentRecord {
            doc_type: DocumentType::IncomeProof,
            file_name: "slip.pdf".into(),
            status: DocumentStatus::Verified,
            details: Some(DocumentDetails {
                income: Some(income.into()),
                employment_type: Some("Salaried".into()),
                ..DocumentDetails::default()
            }),
        }
    }

    fn service() -> MockEligibilityService {
        MockEligibilityService::new(Duration::ZERO)
    }

    #[tokio::test]
    async fn low_income_is_rejected() {
        let decision = service().check(&[income_proof("10000")]).await.expect("ok");
        assert_eq!(decision.status, DecisionStatus::Rejected);
        assert_eq!(
            decision.reason.as_deref(),
            Some("Minimum income requirement not met.")
        );
        assert!(decision.approved_amount.is_none());
    }

    #[tokio::test]
    async fn mid_income_gets_ten_times_multiplier() {
        let decision = service().check(&[income_proof("30000")]).await.expect("ok");
        assert_eq!(decision.status, DecisionStatus::Approved);
        assert_eq!(decision.approved_amount, Some(300_000));
    }

    #[tokio::test]
    async fn high_income_gets_fifteen_times_multiplier() {
        let decision = service().check(&[income_proof("60000")]).await.expect("ok");
        assert_eq!(decision.status, DecisionStatus::Approved);
        assert_eq!(decision.approved_amount, Some(900_000));
    }

    #[tokio::test]
    async fn threshold_boundaries() {
        // 25,000 is the lowest approvable income.
        let decision = service().check(&[income_proof("25000")]).await.expect("ok");
        assert_eq!(decision.status, DecisionStatus::Approved);
        assert_eq!(decision.approved_amount, Some(250_000));

        // 50,000 already lands in the high band.
        let decision = service().check(&[income_proof("50000")]).await.expect("ok");
        assert_eq!(decision.approved_amount, Some(750_000));
    }

    #[tokio::test]
    async fn missing_income_proof_needs_more_info() {
        let decision = service().check(&[]).await.expect("ok");
        assert_eq!(decision.status, DecisionStatus::MoreInfo);
    }

    #[tokio::test]
    async fn unparseable_income_needs_more_info() {
        let decision = service()
            .check(&[income_proof("seventy-five thousand")])
            .await
            .expect("ok");
        assert_eq!(decision.status, DecisionStatus::MoreInfo);
    }

    struct FailingService;

    #[async_trait]
    impl EligibilityService for FailingService {
        async fn check(&self, _: &[DocumentRecord]) -> Result<Decision, EligibilityError> {
            Err(EligibilityError::Backend("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn fallback_degrades_errors_to_more_info() {
        let service = MoreInfoFallback::new(Arc::new(FailingService));
        let decision = service.check(&[]).await.expect("fallback never errors");
        assert_eq!(decision.status, DecisionStatus::MoreInfo);
        assert!(decision.message.contains("error processing your application"));
    }

    #[tokio::test]
    async fn fallback_passes_successes_through() {
        let service = MoreInfoFallback::new(Arc::new(service()));
        let decision = service
            .check(&[income_proof("30000")])
            .await
            .expect("ok");
        assert_eq!(decision.status, DecisionStatus::Approved);
    }
}
