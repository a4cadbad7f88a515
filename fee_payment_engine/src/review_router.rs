//! Maps a fraud assessment to a review path.
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{OcrStatus, Route},
    fpe_api::errors::FeeEngineError,
};

/// What to do with evidence that scores above the rejection threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighRiskAction {
    AutoReject,
    ManualReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    /// Scores at or below this value (with a completed extraction) are approved automatically.
    pub auto_approve_max_score: u32,
    /// Scores strictly above this value are high risk.
    pub auto_reject_above: u32,
    pub high_risk_action: HighRiskAction,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self { auto_approve_max_score: 10, auto_reject_above: 70, high_risk_action: HighRiskAction::AutoReject }
    }
}

impl RoutingPolicy {
    pub fn new(
        auto_approve_max_score: u32,
        auto_reject_above: u32,
        high_risk_action: HighRiskAction,
    ) -> Result<Self, FeeEngineError> {
        let policy = Self { auto_approve_max_score, auto_reject_above, high_risk_action };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), FeeEngineError> {
        if self.auto_approve_max_score >= self.auto_reject_above {
            return Err(FeeEngineError::InvalidConfiguration(format!(
                "The auto-approve ceiling ({}) must be below the auto-reject threshold ({})",
                self.auto_approve_max_score, self.auto_reject_above
            )));
        }
        Ok(())
    }

    pub fn route(&self, score: u32, ocr_status: OcrStatus) -> Route {
        if score <= self.auto_approve_max_score && ocr_status == OcrStatus::Completed {
            return Route::AutoApprove;
        }
        if score > self.auto_reject_above {
            return match self.high_risk_action {
                HighRiskAction::AutoReject => Route::AutoReject,
                HighRiskAction::ManualReview => Route::ManualReview,
            };
        }
        Route::ManualReview
    }
}
