use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db::traits::ResolutionOutcome,
    db_types::{Centavos, ContractId, OrderId, PaymentSubmission, Route, UserId},
    fraud::FraudAssessment,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: OrderId,
    pub amount: Centavos,
    /// True if an existing order was returned instead of a new one being opened.
    pub reused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRegistration {
    pub contract_id: ContractId,
    pub platform_fee_payer_id: UserId,
    pub platform_fee: Centavos,
    pub platform_fee_due_date: Option<DateTime<Utc>>,
    pub reused: bool,
}

/// What happened to a submission once its extraction results arrived.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    /// The submission as it stands after scoring and any automatic decision.
    pub submission: PaymentSubmission,
    pub assessment: FraudAssessment,
    pub route: Route,
    /// Set when the route was automatic and the decision went through.
    pub resolution: Option<ResolutionOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRunReport {
    pub examined: usize,
    pub day1_reminders: usize,
    pub day2_reminders: usize,
    pub suspended: usize,
    pub skipped: usize,
    pub failures: Vec<(ContractId, String)>,
}

impl Display for BillingRunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} examined, {} first reminders, {} final warnings, {} suspended, {} skipped, {} failed",
            self.examined,
            self.day1_reminders,
            self.day2_reminders,
            self.suspended,
            self.skipped,
            self.failures.len()
        )
    }
}
