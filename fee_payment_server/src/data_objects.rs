use chrono::{DateTime, Utc};
use fee_payment_engine::{
    db_types::{BidId, Contract, Decision, FraudFlag, Order, PaymentSubmission, Route},
    fee_calculator::BidTerms,
    objects::VerificationOutcome,
    ResolutionOutcome,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub bid_id: BidId,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRequest {
    /// Where the uploaded screenshot is stored, e.g. an object store key.
    pub evidence_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub decision: Decision,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterContractRequest {
    #[serde(flatten)]
    pub terms: BidTerms,
    /// Defaults to the time of the request.
    #[serde(default)]
    pub billing_started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingRunRequest {
    /// Run the billing clock as of this time instead of now.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

/// The result of scoring a submission, as returned to the extraction service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub submission: PaymentSubmission,
    pub fraud_score: u32,
    pub fraud_flags: Vec<FraudFlag>,
    pub route: Route,
    pub resolved: bool,
}

impl From<VerificationOutcome> for VerificationResult {
    fn from(outcome: VerificationOutcome) -> Self {
        Self {
            submission: outcome.submission,
            fraud_score: outcome.assessment.score,
            fraud_flags: outcome.assessment.flags,
            route: outcome.route,
            resolved: outcome.resolution.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub success: bool,
    pub submission: PaymentSubmission,
    pub order: Order,
    pub contract: Option<Contract>,
}

impl From<ResolutionOutcome> for ResolutionResult {
    fn from(outcome: ResolutionOutcome) -> Self {
        Self { success: true, submission: outcome.submission, order: outcome.order, contract: outcome.contract }
    }
}
