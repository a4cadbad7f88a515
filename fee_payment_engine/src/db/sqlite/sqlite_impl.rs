//! `SqliteDatabase` is a concrete implementation of a platform fee engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`FeeLedgerDatabase`] trait. Every method that
//! writes more than one record runs in its own transaction, wrapped in a retry loop so that a transaction that loses
//! a write race is re-run against the winner's data.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};

use super::{
    audit::{self, NewAuditEntry},
    contracts,
    db_url,
    ledger,
    new_pool,
    orders,
    retry::retry_on_conflict,
    submissions::{self, ResolutionFields},
    user_accounts,
};
use crate::{
    billing_schedule::{BillingPolicy, BillingStage},
    contract_activator,
    db::traits::{
        BillingOutcome,
        FeeLedgerDatabase,
        HistoryQuery,
        InsertResult,
        Resolution,
        ResolutionOutcome,
        Resolver,
    },
    db_types::{
        AccountStatus,
        AuditLogEntry,
        BidId,
        Contract,
        ContractId,
        ContractStatus,
        Decision,
        LedgerEntry,
        NewContract,
        NewOrder,
        NewSubmission,
        Order,
        OrderId,
        OrderStatusType,
        PaymentSubmission,
        PlatformFeeStatus,
        Route,
        ScoredEvidence,
        SubmissionId,
        SubmissionStatus,
        UserAccount,
        UserId,
    },
    fpe_api::errors::FeeEngineError,
    fraud::ScoringHistory,
};

const SYSTEM_ACTOR: &str = "system";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl FeeLedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn register_user(&self, user_id: &UserId, created_at: DateTime<Utc>) -> Result<UserAccount, FeeEngineError> {
        let pool = &self.pool;
        retry_on_conflict("register user", move || async move {
            let mut conn = pool.acquire().await?;
            user_accounts::fetch_or_create_account(user_id, created_at, &mut conn).await
        })
        .await
    }

    async fn fetch_user_account(&self, user_id: &UserId) -> Result<Option<UserAccount>, FeeEngineError> {
        let mut conn = self.pool.acquire().await?;
        user_accounts::fetch_account(user_id, &mut conn).await
    }

    async fn register_contract(&self, contract: NewContract) -> Result<InsertResult<Contract>, FeeEngineError> {
        let pool = &self.pool;
        let contract = &contract;
        retry_on_conflict("register contract", move || register_contract_tx(pool, contract)).await
    }

    async fn fetch_contract(&self, contract_id: &ContractId) -> Result<Option<Contract>, FeeEngineError> {
        let mut conn = self.pool.acquire().await?;
        contracts::fetch_contract(contract_id, &mut conn).await
    }

    async fn fetch_contract_for_bid(&self, bid_id: &BidId) -> Result<Option<Contract>, FeeEngineError> {
        let mut conn = self.pool.acquire().await?;
        contracts::fetch_for_bid(bid_id, &mut conn).await
    }

    async fn fetch_billable_contracts(&self) -> Result<Vec<Contract>, FeeEngineError> {
        let mut conn = self.pool.acquire().await?;
        contracts::fetch_billable(&mut conn).await
    }

    async fn apply_billing_stage(
        &self,
        contract_id: &ContractId,
        policy: &BillingPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<BillingOutcome>, FeeEngineError> {
        let pool = &self.pool;
        retry_on_conflict("billing stage", move || apply_billing_stage_tx(pool, contract_id, policy, now)).await
    }

    async fn create_or_reuse_order(&self, order: NewOrder) -> Result<InsertResult<Order>, FeeEngineError> {
        let pool = &self.pool;
        let order = &order;
        retry_on_conflict("create order", move || create_or_reuse_order_tx(pool, order)).await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, FeeEngineError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_pending_orders_for_payer(&self, payer_id: &UserId) -> Result<Vec<Order>, FeeEngineError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_pending_for_payer(payer_id, &mut conn).await
    }

    async fn expire_stale_orders(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Order>, FeeEngineError> {
        let pool = &self.pool;
        retry_on_conflict("expire orders", move || expire_stale_orders_tx(pool, cutoff, now)).await
    }

    async fn insert_submission(&self, submission: NewSubmission) -> Result<PaymentSubmission, FeeEngineError> {
        let pool = &self.pool;
        let submission = &submission;
        retry_on_conflict("insert submission", move || insert_submission_tx(pool, submission)).await
    }

    async fn fetch_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<PaymentSubmission>, FeeEngineError> {
        let mut conn = self.pool.acquire().await?;
        submissions::fetch_submission(submission_id, &mut conn).await
    }

    async fn fetch_submissions_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentSubmission>, FeeEngineError> {
        let mut conn = self.pool.acquire().await?;
        submissions::fetch_for_order(order_id, &mut conn).await
    }

    async fn fetch_scoring_history(&self, query: HistoryQuery) -> Result<ScoringHistory, FeeEngineError> {
        let mut tx = self.pool.begin().await?;
        let approved_with_same_reference = match &query.reference_normalized {
            Some(reference) => submissions::approved_with_reference(reference, &query.submission_id, &mut tx).await?,
            None => vec![],
        };
        let prior_image_hashes =
            submissions::image_hashes_since(query.images_since, &query.submission_id, &mut tx).await?;
        let recent_submissions_by_payer =
            submissions::count_by_payer_since(&query.payer_id, query.submissions_since, &mut tx).await?;
        let payer_account_created_at =
            user_accounts::fetch_account(&query.payer_id, &mut tx).await?.map(|a| a.created_at);
        tx.commit().await?;
        Ok(ScoringHistory {
            approved_with_same_reference,
            prior_image_hashes,
            recent_submissions_by_payer,
            payer_account_created_at,
        })
    }

    async fn record_scored_evidence(
        &self,
        submission_id: &SubmissionId,
        evidence: ScoredEvidence,
    ) -> Result<PaymentSubmission, FeeEngineError> {
        let pool = &self.pool;
        let evidence = &evidence;
        retry_on_conflict("record evidence", move || record_scored_evidence_tx(pool, submission_id, evidence)).await
    }

    async fn escalate_to_manual_review(
        &self,
        submission_id: &SubmissionId,
        now: DateTime<Utc>,
    ) -> Result<PaymentSubmission, FeeEngineError> {
        let pool = &self.pool;
        retry_on_conflict("escalate submission", move || escalate_tx(pool, submission_id, now)).await
    }

    async fn fetch_review_queue(&self) -> Result<Vec<PaymentSubmission>, FeeEngineError> {
        let mut conn = self.pool.acquire().await?;
        submissions::review_queue(&mut conn).await
    }

    async fn resolve_submission(&self, resolution: Resolution) -> Result<ResolutionOutcome, FeeEngineError> {
        let pool = &self.pool;
        let resolution = &resolution;
        retry_on_conflict("resolve submission", move || resolve_submission_tx(pool, resolution)).await
    }

    async fn fetch_ledger_entries_for_bid(&self, bid_id: &BidId) -> Result<Vec<LedgerEntry>, FeeEngineError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_for_bid(bid_id, &mut conn).await
    }

    async fn fetch_audit_log(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditLogEntry>, FeeEngineError> {
        let mut conn = self.pool.acquire().await?;
        audit::fetch_for_entity(entity_type, entity_id, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), FeeEngineError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date using the migrations embedded in the binary.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Migrations complete for {}", self.url);
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

//-------------------------------------------   Transactions   --------------------------------------------------------

async fn register_contract_tx(
    pool: &SqlitePool,
    contract: &NewContract,
) -> Result<InsertResult<Contract>, FeeEngineError> {
    let mut tx = pool.begin().await?;
    if let Some(existing) = contracts::fetch_for_bid(&contract.bid_id, &mut tx).await? {
        debug!("📑️ Contract for bid {} is already registered as {}", contract.bid_id, existing.contract_id);
        return Ok(InsertResult::AlreadyExists(existing));
    }
    let inserted = contracts::insert_contract(contract, &mut tx).await?;
    let mut account =
        user_accounts::fetch_or_create_account(&inserted.platform_fee_payer_id, contract.created_at, &mut tx).await?;
    if account.add_outstanding(&inserted.contract_id, inserted.platform_fee) {
        user_accounts::save_account(&account, contract.created_at, &mut tx).await?;
    }
    let entry = NewAuditEntry {
        entity_type: "contract",
        entity_id: inserted.contract_id.as_str(),
        action: "registered",
        actor_id: SYSTEM_ACTOR,
        detail: json!({
            "bid_id": inserted.bid_id,
            "payer_id": inserted.platform_fee_payer_id,
            "fee": inserted.platform_fee,
        }),
        created_at: contract.created_at,
    };
    audit::append(entry, &mut tx).await?;
    tx.commit().await?;
    debug!("📑️ Contract {} registered. {} owes {}", inserted.contract_id, account.user_id, inserted.platform_fee);
    Ok(InsertResult::Inserted(inserted))
}

async fn create_or_reuse_order_tx(pool: &SqlitePool, order: &NewOrder) -> Result<InsertResult<Order>, FeeEngineError> {
    let mut tx = pool.begin().await?;
    if let Some(existing) = orders::fetch_by_idempotency_key(&order.idempotency_key, &mut tx).await? {
        if existing.payer_id != order.caller_id {
            return Err(FeeEngineError::PermissionDenied(format!(
                "{} is not the fee payer for the order with this idempotency key",
                order.caller_id
            )));
        }
        if existing.bid_id != order.bid_id {
            return Err(FeeEngineError::InvalidArgument(format!(
                "Idempotency key was already used for an order on bid {}",
                existing.bid_id
            )));
        }
        trace!("🧾️ Idempotency key matched order {}", existing.order_id);
        return Ok(InsertResult::AlreadyExists(existing));
    }
    let contract = contracts::fetch_for_bid(&order.bid_id, &mut tx)
        .await?
        .ok_or_else(|| FeeEngineError::ContractNotFound(format!("bid {}", order.bid_id)))?;
    if contract.platform_fee_payer_id != order.caller_id {
        return Err(FeeEngineError::PermissionDenied(format!(
            "{} is not the platform fee payer for bid {}",
            order.caller_id, order.bid_id
        )));
    }
    if contract.platform_fee_paid {
        return Err(FeeEngineError::FeeAlreadyPaid(order.bid_id.to_string()));
    }
    if contract.status == ContractStatus::Cancelled {
        return Err(FeeEngineError::ContractNotPayable(contract.contract_id.to_string(), contract.status));
    }
    if let Some(existing) = orders::fetch_pending_for_bid_and_payer(&order.bid_id, &order.caller_id, &mut tx).await? {
        trace!("🧾️ Reusing pending order {} for bid {}", existing.order_id, order.bid_id);
        return Ok(InsertResult::AlreadyExists(existing));
    }
    let inserted = orders::insert_order(order, &contract.platform_fee_payer_id, contract.platform_fee, &mut tx).await?;
    let entry = NewAuditEntry {
        entity_type: "order",
        entity_id: inserted.order_id.as_str(),
        action: "created",
        actor_id: order.caller_id.as_str(),
        detail: json!({ "bid_id": inserted.bid_id, "amount": inserted.amount }),
        created_at: order.created_at,
    };
    audit::append(entry, &mut tx).await?;
    tx.commit().await?;
    Ok(InsertResult::Inserted(inserted))
}

async fn expire_stale_orders_tx(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<Order>, FeeEngineError> {
    let mut tx = pool.begin().await?;
    let stale = orders::fetch_stale_pending(cutoff, &mut tx).await?;
    let mut expired = Vec::with_capacity(stale.len());
    for order in stale {
        let status = order.status.transition_to(OrderStatusType::Expired)?;
        let updated = orders::update_status(&order.order_id, status, None, now, &mut tx).await?;
        let entry = NewAuditEntry {
            entity_type: "order",
            entity_id: updated.order_id.as_str(),
            action: "expired",
            actor_id: SYSTEM_ACTOR,
            detail: json!({ "created_at": order.created_at }),
            created_at: now,
        };
        audit::append(entry, &mut tx).await?;
        expired.push(updated);
    }
    tx.commit().await?;
    Ok(expired)
}

async fn insert_submission_tx(
    pool: &SqlitePool,
    submission: &NewSubmission,
) -> Result<PaymentSubmission, FeeEngineError> {
    let mut tx = pool.begin().await?;
    let order = orders::fetch_order(&submission.order_id, &mut tx)
        .await?
        .ok_or_else(|| FeeEngineError::OrderNotFound(submission.order_id.clone()))?;
    if order.payer_id != submission.caller_id {
        return Err(FeeEngineError::PermissionDenied(format!(
            "{} cannot submit evidence for order {}",
            submission.caller_id, order.order_id
        )));
    }
    if order.status != OrderStatusType::Pending {
        return Err(FeeEngineError::OrderNotPending(order.order_id, order.status));
    }
    let inserted = submissions::insert_submission(submission, &order.bid_id, &mut tx).await?;
    tx.commit().await?;
    Ok(inserted)
}

async fn record_scored_evidence_tx(
    pool: &SqlitePool,
    submission_id: &SubmissionId,
    evidence: &ScoredEvidence,
) -> Result<PaymentSubmission, FeeEngineError> {
    let mut tx = pool.begin().await?;
    let current = submissions::fetch_submission(submission_id, &mut tx)
        .await?
        .ok_or_else(|| FeeEngineError::SubmissionNotFound(submission_id.clone()))?;
    if current.is_scored() {
        return Err(FeeEngineError::AlreadyScored(submission_id.clone()));
    }
    if current.status.is_resolved() {
        return Err(FeeEngineError::SubmissionAlreadyResolved(submission_id.clone(), current.status));
    }
    let status = match evidence.route {
        Route::ManualReview => current.status.transition_to(SubmissionStatus::ManualReview)?,
        Route::AutoApprove | Route::AutoReject => current.status,
    };
    let updated = submissions::record_scored_evidence(submission_id, evidence, status, &mut tx)
        .await?
        .ok_or_else(|| FeeEngineError::AlreadyScored(submission_id.clone()))?;
    let entry = NewAuditEntry {
        entity_type: "submission",
        entity_id: submission_id.as_str(),
        action: "scored",
        actor_id: SYSTEM_ACTOR,
        detail: json!({ "score": evidence.fraud_score, "flags": evidence.fraud_flags, "route": evidence.route }),
        created_at: evidence.scored_at,
    };
    audit::append(entry, &mut tx).await?;
    tx.commit().await?;
    Ok(updated)
}

async fn escalate_tx(
    pool: &SqlitePool,
    submission_id: &SubmissionId,
    now: DateTime<Utc>,
) -> Result<PaymentSubmission, FeeEngineError> {
    let mut tx = pool.begin().await?;
    let current = submissions::fetch_submission(submission_id, &mut tx)
        .await?
        .ok_or_else(|| FeeEngineError::SubmissionNotFound(submission_id.clone()))?;
    let status = current.status.transition_to(SubmissionStatus::ManualReview)?;
    let updated = submissions::update_status(submission_id, status, now, &mut tx).await?;
    let entry = NewAuditEntry {
        entity_type: "submission",
        entity_id: submission_id.as_str(),
        action: "escalated",
        actor_id: SYSTEM_ACTOR,
        detail: json!({ "route": current.route }),
        created_at: now,
    };
    audit::append(entry, &mut tx).await?;
    tx.commit().await?;
    Ok(updated)
}

/// Checks that `resolver` may apply `decision` to `submission` as it stands now.
fn authorize_resolution(
    submission: &PaymentSubmission,
    decision: Decision,
    resolver: &Resolver,
) -> Result<(), FeeEngineError> {
    match resolver {
        Resolver::Automatic(_) => {
            let route_matches = matches!(
                (submission.route, decision),
                (Some(Route::AutoApprove), Decision::Approve) | (Some(Route::AutoReject), Decision::Reject)
            );
            if submission.status != SubmissionStatus::Pending || !submission.is_scored() || !route_matches {
                return Err(FeeEngineError::NotAutoReviewable(submission.submission_id.clone()));
            }
        },
        Resolver::Admin(_) => {
            if submission.status.is_resolved() {
                return Err(FeeEngineError::SubmissionAlreadyResolved(
                    submission.submission_id.clone(),
                    submission.status,
                ));
            }
        },
    }
    Ok(())
}

async fn resolve_submission_tx(
    pool: &SqlitePool,
    resolution: &Resolution,
) -> Result<ResolutionOutcome, FeeEngineError> {
    let now = resolution.resolved_at;
    let actor_id = resolution.resolver.actor_id();
    let mut tx = pool.begin().await?;
    let submission = submissions::fetch_submission(&resolution.submission_id, &mut tx)
        .await?
        .ok_or_else(|| FeeEngineError::SubmissionNotFound(resolution.submission_id.clone()))?;
    if submission.status.is_resolved() {
        return Err(FeeEngineError::SubmissionAlreadyResolved(submission.submission_id, submission.status));
    }
    authorize_resolution(&submission, resolution.decision, &resolution.resolver)?;
    let next_status = match resolution.decision {
        Decision::Approve => SubmissionStatus::Approved,
        Decision::Reject => SubmissionStatus::Rejected,
    };
    submission.status.transition_to(next_status)?;
    let order = orders::fetch_order(&submission.order_id, &mut tx)
        .await?
        .ok_or_else(|| FeeEngineError::OrderNotFound(submission.order_id.clone()))?;
    if order.status != OrderStatusType::Pending {
        return Err(FeeEngineError::OrderNotPending(order.order_id, order.status));
    }

    let mut outcome = ResolutionOutcome {
        submission: submission.clone(),
        order: order.clone(),
        contract: None,
        ledger_entry: None,
        payer_account: None,
        reinstated: false,
        superseded: vec![],
    };
    match resolution.decision {
        Decision::Approve => {
            if ledger::fetch_completed_for_bid(&order.bid_id, &mut tx).await?.is_some() {
                return Err(FeeEngineError::LedgerEntryExists(order.bid_id.to_string()));
            }
            let contract = contracts::fetch_for_bid(&order.bid_id, &mut tx)
                .await?
                .ok_or_else(|| FeeEngineError::ContractNotFound(format!("bid {}", order.bid_id)))?;
            let activated = contract_activator::activate(&contract, &order, now)?;
            let contract = contracts::save_activation(&activated, &mut tx).await?;
            let entry = ledger::insert_completed(
                &order.bid_id,
                &order.order_id,
                &submission.submission_id,
                &contract.contract_id,
                order.amount,
                now,
                &mut tx,
            )
            .await?;
            let status = order.status.transition_to(OrderStatusType::Verified)?;
            outcome.order =
                orders::update_status(&order.order_id, status, Some(&submission.submission_id), now, &mut tx).await?;

            let mut account = user_accounts::fetch_or_create_account(&order.payer_id, now, &mut tx).await?;
            if !account.settle(&contract.contract_id, contract.platform_fee) {
                warn!(
                    "⚖️ Contract {} was not in the outstanding list of {}. Outstanding totals left unchanged",
                    contract.contract_id, account.user_id
                );
            }
            if account.is_suspended() && contracts::count_overdue_for_payer(&account.user_id, &mut tx).await? == 0 {
                account.account_status = AccountStatus::Active;
                outcome.reinstated = true;
            }
            outcome.payer_account = Some(user_accounts::save_account(&account, now, &mut tx).await?);
            outcome.contract = Some(contract);
            outcome.ledger_entry = Some(entry);
        },
        Decision::Reject => {
            let status = order.status.transition_to(OrderStatusType::Rejected)?;
            outcome.order = orders::update_status(&order.order_id, status, None, now, &mut tx).await?;
        },
    }

    outcome.superseded = close_out_siblings(&submission.submission_id, &outcome.order, now, &mut tx).await?;

    let fields = ResolutionFields {
        decision: resolution.decision,
        resolved_by: actor_id.as_str(),
        notes: resolution.notes.as_deref(),
        rejection_reason: resolution.reason.as_deref(),
        resolved_at: now,
    };
    outcome.submission = submissions::write_resolution(&submission.submission_id, fields, &mut tx).await?;
    let entry = NewAuditEntry {
        entity_type: "submission",
        entity_id: submission.submission_id.as_str(),
        action: if resolution.decision == Decision::Approve { "approved" } else { "rejected" },
        actor_id: actor_id.as_str(),
        detail: json!({
            "order_id": order.order_id,
            "notes": resolution.notes,
            "reason": resolution.reason,
            "reinstated": outcome.reinstated,
        }),
        created_at: now,
    };
    audit::append(entry, &mut tx).await?;
    tx.commit().await?;
    Ok(outcome)
}

/// Rejects every other open submission on `order`, which has just left the pending state. Without this they would
/// sit in the review queue with no way to resolve them.
async fn close_out_siblings(
    resolved: &SubmissionId,
    order: &Order,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentSubmission>, FeeEngineError> {
    let reason = format!("Order {} was already {} through another submission", order.order_id, order.status);
    let mut closed = vec![];
    for sibling in submissions::fetch_for_order(&order.order_id, conn).await? {
        if &sibling.submission_id == resolved || sibling.status.is_resolved() {
            continue;
        }
        sibling.status.transition_to(SubmissionStatus::Rejected)?;
        let fields = ResolutionFields {
            decision: Decision::Reject,
            resolved_by: SYSTEM_ACTOR,
            notes: None,
            rejection_reason: Some(reason.as_str()),
            resolved_at: now,
        };
        let updated = submissions::write_resolution(&sibling.submission_id, fields, conn).await?;
        let entry = NewAuditEntry {
            entity_type: "submission",
            entity_id: updated.submission_id.as_str(),
            action: "superseded",
            actor_id: SYSTEM_ACTOR,
            detail: json!({
                "order_id": order.order_id,
                "order_status": order.status,
                "previous_status": sibling.status,
            }),
            created_at: now,
        };
        audit::append(entry, conn).await?;
        debug!("⚖️ Submission {} closed. {reason}", updated.submission_id);
        closed.push(updated);
    }
    Ok(closed)
}

async fn apply_billing_stage_tx(
    pool: &SqlitePool,
    contract_id: &ContractId,
    policy: &BillingPolicy,
    now: DateTime<Utc>,
) -> Result<Option<BillingOutcome>, FeeEngineError> {
    let mut tx = pool.begin().await?;
    let Some(contract) = contracts::fetch_contract(contract_id, &mut tx).await? else {
        return Err(FeeEngineError::ContractNotFound(contract_id.to_string()));
    };
    let Some(stage) = policy.stage_for(&contract, now) else {
        trace!("🕰️ Nothing to do for contract {contract_id}");
        return Ok(None);
    };
    let outcome = match stage.reminder_tag() {
        Some(tag) => {
            let mut reminders = contract.platform_fee_reminders.clone();
            reminders.push(tag);
            let contract = contracts::record_reminders(contract_id, &reminders, now, &mut tx).await?;
            BillingOutcome { contract, stage, account: None }
        },
        None => {
            contract.platform_fee_status.transition_to(PlatformFeeStatus::Overdue)?;
            let contract = contracts::mark_overdue(contract_id, now, &mut tx).await?;
            let mut account =
                user_accounts::fetch_or_create_account(&contract.platform_fee_payer_id, now, &mut tx).await?;
            account.add_outstanding(&contract.contract_id, contract.platform_fee);
            account.account_status = AccountStatus::Suspended;
            let account = user_accounts::save_account(&account, now, &mut tx).await?;
            let entry = NewAuditEntry {
                entity_type: "user_account",
                entity_id: account.user_id.as_str(),
                action: "suspended",
                actor_id: SYSTEM_ACTOR,
                detail: json!({
                    "contract_id": contract.contract_id,
                    "outstanding_platform_fees": account.outstanding_platform_fees,
                    "outstanding_fee_contracts": account.outstanding_fee_contracts,
                }),
                created_at: now,
            };
            audit::append(entry, &mut tx).await?;
            BillingOutcome { contract, stage: BillingStage::Suspension, account: Some(account) }
        },
    };
    tx.commit().await?;
    Ok(Some(outcome))
}
