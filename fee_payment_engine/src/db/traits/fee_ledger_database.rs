use chrono::{DateTime, Utc};

use crate::{
    billing_schedule::BillingPolicy,
    db::traits::{BillingOutcome, HistoryQuery, InsertResult, Resolution, ResolutionOutcome},
    db_types::{
        AuditLogEntry,
        BidId,
        Contract,
        ContractId,
        LedgerEntry,
        NewContract,
        NewOrder,
        NewSubmission,
        Order,
        OrderId,
        PaymentSubmission,
        ScoredEvidence,
        SubmissionId,
        UserAccount,
        UserId,
    },
    fpe_api::errors::FeeEngineError,
    fraud::ScoringHistory,
};

/// This trait defines the behaviour of storage backends for the platform fee engine.
///
/// This behaviour includes:
/// * Registering contracts and the payer's outstanding fee when a bid is accepted
/// * Opening and deduplicating payment orders
/// * Recording evidence submissions and their fraud assessments
/// * Resolving submissions, which activates contracts and posts the fee ledger
/// * Advancing unpaid contracts along the billing clock
#[allow(async_fn_in_trait)]
pub trait FeeLedgerDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Records when a marketplace user joined. Idempotent; an existing account is returned unchanged.
    async fn register_user(&self, user_id: &UserId, created_at: DateTime<Utc>) -> Result<UserAccount, FeeEngineError>;

    async fn fetch_user_account(&self, user_id: &UserId) -> Result<Option<UserAccount>, FeeEngineError>;

    /// Stores a newly accepted contract. In a single atomic transaction,
    /// * returns the existing contract if one is already registered for the bid,
    /// * otherwise inserts the contract in `pending_payment` with an unpaid fee,
    /// * creates the payer's account if it does not exist yet,
    /// * adds the fee and the contract to the payer's outstanding totals.
    async fn register_contract(&self, contract: NewContract) -> Result<InsertResult<Contract>, FeeEngineError>;

    async fn fetch_contract(&self, contract_id: &ContractId) -> Result<Option<Contract>, FeeEngineError>;

    async fn fetch_contract_for_bid(&self, bid_id: &BidId) -> Result<Option<Contract>, FeeEngineError>;

    /// Contracts that are on the billing clock: unpaid, billing started, and neither cancelled nor in draft.
    async fn fetch_billable_contracts(&self) -> Result<Vec<Contract>, FeeEngineError>;

    /// Re-reads the contract in a transaction and applies the billing stage that is due at `now`, if any. Returns
    /// `None` if the contract no longer needs anything (it was paid, cancelled, or the stage already ran).
    async fn apply_billing_stage(
        &self,
        contract_id: &ContractId,
        policy: &BillingPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<BillingOutcome>, FeeEngineError>;

    /// Opens the platform fee order for a bid, or returns the one that should be reused. In a single atomic
    /// transaction,
    /// * an order with the same idempotency key is returned unchanged,
    /// * the contract for the bid must exist, must not be paid or cancelled, and the caller must be its fee payer,
    /// * a pending order for the same bid and payer is returned instead of creating another,
    /// * otherwise a new pending order for the contract's fee is inserted.
    async fn create_or_reuse_order(&self, order: NewOrder) -> Result<InsertResult<Order>, FeeEngineError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, FeeEngineError>;

    async fn fetch_pending_orders_for_payer(&self, payer_id: &UserId) -> Result<Vec<Order>, FeeEngineError>;

    /// Expires pending orders created before `cutoff` that have no submission awaiting a decision.
    async fn expire_stale_orders(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, FeeEngineError>;

    /// Stores new evidence against an order. The caller must be the order's payer and the order must be pending.
    async fn insert_submission(&self, submission: NewSubmission) -> Result<PaymentSubmission, FeeEngineError>;

    async fn fetch_submission(&self, submission_id: &SubmissionId)
        -> Result<Option<PaymentSubmission>, FeeEngineError>;

    async fn fetch_submissions_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentSubmission>, FeeEngineError>;

    async fn fetch_scoring_history(&self, query: HistoryQuery) -> Result<ScoringHistory, FeeEngineError>;

    /// Writes extraction results, the fraud assessment and the chosen route. Submissions routed to manual review
    /// move to `manual_review`. Fails if the submission has already been scored.
    async fn record_scored_evidence(
        &self,
        submission_id: &SubmissionId,
        evidence: ScoredEvidence,
    ) -> Result<PaymentSubmission, FeeEngineError>;

    /// Moves a scored submission that could not be decided automatically onto the manual review queue.
    async fn escalate_to_manual_review(
        &self,
        submission_id: &SubmissionId,
        now: DateTime<Utc>,
    ) -> Result<PaymentSubmission, FeeEngineError>;

    /// Submissions waiting for an admin, oldest first.
    async fn fetch_review_queue(&self) -> Result<Vec<PaymentSubmission>, FeeEngineError>;

    /// Applies a decision to a submission. In a single atomic transaction,
    /// * checks the resolver may decide this submission and that neither it nor its order has been resolved,
    /// * on approval, checks that no completed ledger entry exists for the bid, activates the contract, writes the
    ///   ledger entry, and settles the payer's outstanding fee (lifting a suspension if nothing is overdue any more),
    /// * on rejection, rejects the order and leaves the contract untouched,
    /// * appends an audit entry.
    async fn resolve_submission(&self, resolution: Resolution) -> Result<ResolutionOutcome, FeeEngineError>;

    async fn fetch_ledger_entries_for_bid(&self, bid_id: &BidId) -> Result<Vec<LedgerEntry>, FeeEngineError>;

    async fn fetch_audit_log(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditLogEntry>, FeeEngineError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), FeeEngineError> {
        Ok(())
    }
}
