use chrono::{DateTime, Utc};
use cucumber::World;
use fee_payment_engine::{
    db_types::{SubmissionId, UserId},
    objects::{BillingRunReport, CreateOrderResponse, VerificationOutcome},
    FeeEngineError,
};

use crate::support::TestSystem;

#[derive(Default, Debug, World)]
pub struct FeeWorld {
    pub system: Option<TestSystem>,
    /// When billing started for the contracts created in the scenario.
    pub accepted_at: Option<DateTime<Utc>>,
    pub order: Option<CreateOrderResponse>,
    pub payer: Option<UserId>,
    pub submission: Option<SubmissionId>,
    pub outcome: Option<VerificationOutcome>,
    pub report: Option<BillingRunReport>,
    pub last_error: Option<FeeEngineError>,
}

impl FeeWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("Fee engine not initialised")
    }

    pub fn accepted_at(&self) -> DateTime<Utc> {
        self.accepted_at.expect("No contract has been accepted")
    }

    pub fn submission(&self) -> &SubmissionId {
        self.submission.as_ref().expect("Nothing has been submitted")
    }
}
