use chrono::{DateTime, Utc};

use crate::{
    billing_schedule::BillingStage,
    db_types::{Contract, Decision, LedgerEntry, Order, PaymentSubmission, SubmissionId, UserAccount, UserId},
};

/// The result of an idempotent insert: either a freshly written record, or the one that was already there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult<T> {
    Inserted(T),
    AlreadyExists(T),
}

impl<T> InsertResult<T> {
    pub fn is_reused(&self) -> bool {
        matches!(self, InsertResult::AlreadyExists(_))
    }

    pub fn record(&self) -> &T {
        match self {
            InsertResult::Inserted(r) | InsertResult::AlreadyExists(r) => r,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            InsertResult::Inserted(r) | InsertResult::AlreadyExists(r) => r,
        }
    }
}

/// Permission for the review router to decide a submission without an admin.
///
/// The engine mints this only on the automatic routing path. It cannot be constructed outside the crate, and storage
/// backends only honour it for submissions that are still `pending` and whose recorded route matches the decision.
#[derive(Debug)]
pub struct AutomaticReview {
    _private: (),
}

impl AutomaticReview {
    pub(crate) fn grant() -> Self {
        Self { _private: () }
    }
}

#[derive(Debug)]
pub enum Resolver {
    Admin(UserId),
    Automatic(AutomaticReview),
}

impl Resolver {
    /// The value written to `resolved_by` and the audit log.
    pub fn actor_id(&self) -> String {
        match self {
            Resolver::Admin(id) => id.to_string(),
            Resolver::Automatic(_) => AUTO_REVIEW_ACTOR.to_string(),
        }
    }
}

pub const AUTO_REVIEW_ACTOR: &str = "system:auto_review";

#[derive(Debug)]
pub struct Resolution {
    pub submission_id: SubmissionId,
    pub decision: Decision,
    pub resolver: Resolver,
    pub notes: Option<String>,
    pub reason: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub submission: PaymentSubmission,
    pub order: Order,
    /// The activated contract, on approval.
    pub contract: Option<Contract>,
    pub ledger_entry: Option<LedgerEntry>,
    /// The payer's account after settlement, on approval.
    pub payer_account: Option<UserAccount>,
    /// True if the approval lifted a suspension.
    pub reinstated: bool,
    /// Other open submissions on the same order, closed as rejected because the order is no longer pending.
    pub superseded: Vec<PaymentSubmission>,
}

#[derive(Debug, Clone)]
pub struct BillingOutcome {
    pub contract: Contract,
    pub stage: BillingStage,
    /// The payer's account, on suspension.
    pub account: Option<UserAccount>,
}

#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub submission_id: SubmissionId,
    pub payer_id: UserId,
    pub reference_normalized: Option<String>,
    pub submissions_since: DateTime<Utc>,
    pub images_since: DateTime<Utc>,
}
