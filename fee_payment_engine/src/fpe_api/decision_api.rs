use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db::traits::{AutomaticReview, FeeLedgerDatabase, Resolution, ResolutionOutcome, Resolver},
    db_types::{Decision, PaymentSubmission, Principal, SubmissionId, SubmissionStatus},
    events::{ContractActivatedEvent, EventProducers, Notification},
    fpe_api::errors::FeeEngineError,
};

/// `DecisionApi` applies approve/reject decisions to payment submissions.
///
/// Admins decide through [`DecisionApi::resolve`]. The review router decides clear-cut cases through a separate,
/// crate-private path that needs an [`AutomaticReview`] grant.
#[derive(Clone)]
pub struct DecisionApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for DecisionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DecisionApi")
    }
}

impl<B> DecisionApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> DecisionApi<B>
where B: FeeLedgerDatabase
{
    /// Resolves a submission as an admin. A rejection must carry a reason, which is passed on to the payer.
    pub async fn resolve(
        &self,
        submission_id: &SubmissionId,
        decision: Decision,
        actor: &Principal,
        notes: Option<String>,
        reason: Option<String>,
    ) -> Result<ResolutionOutcome, FeeEngineError> {
        if !actor.is_admin() {
            warn!("⚖️ {} tried to resolve submission {submission_id} without the admin role", actor.user_id);
            return Err(FeeEngineError::PermissionDenied("Only admins can resolve submissions".to_string()));
        }
        let reason = non_empty(reason);
        if decision == Decision::Reject && reason.is_none() {
            return Err(FeeEngineError::MissingRejectionReason);
        }
        let resolution = Resolution {
            submission_id: submission_id.clone(),
            decision,
            resolver: Resolver::Admin(actor.user_id.clone()),
            notes: non_empty(notes),
            reason,
            resolved_at: Utc::now(),
        };
        self.apply(resolution).await
    }

    pub(crate) async fn resolve_automatically(
        &self,
        submission_id: &SubmissionId,
        decision: Decision,
        grant: AutomaticReview,
        reason: Option<String>,
    ) -> Result<ResolutionOutcome, FeeEngineError> {
        let resolution = Resolution {
            submission_id: submission_id.clone(),
            decision,
            resolver: Resolver::Automatic(grant),
            notes: None,
            reason,
            resolved_at: Utc::now(),
        };
        self.apply(resolution).await
    }

    /// Submissions waiting for an admin, oldest first.
    pub async fn review_queue(&self, actor: &Principal) -> Result<Vec<PaymentSubmission>, FeeEngineError> {
        if !actor.is_admin() {
            return Err(FeeEngineError::PermissionDenied("Only admins can see the review queue".to_string()));
        }
        self.db.fetch_review_queue().await
    }

    async fn apply(&self, resolution: Resolution) -> Result<ResolutionOutcome, FeeEngineError> {
        let submission_id = resolution.submission_id.clone();
        let decision = resolution.decision;
        let actor = resolution.resolver.actor_id();
        let outcome = self.db.resolve_submission(resolution).await.map_err(|e| {
            warn!("⚖️ Could not {decision} submission {submission_id}: {e}");
            e
        })?;
        info!("⚖️ Submission {submission_id} resolved as {} by {actor}", outcome.submission.status);
        self.publish(&outcome).await;
        Ok(outcome)
    }

    async fn publish(&self, outcome: &ResolutionOutcome) {
        match outcome.submission.status {
            SubmissionStatus::Approved => {
                let (Some(contract), Some(ledger_entry)) = (&outcome.contract, &outcome.ledger_entry) else {
                    let id = &outcome.submission.submission_id;
                    error!("⚖️ Approval of {id} has no contract or ledger entry attached");
                    return;
                };
                self.producers.publish_notification(Notification::payment_verified(contract, &outcome.order)).await;
                self.producers.publish_notification(Notification::contract_ready(contract)).await;
                if outcome.reinstated {
                    if let Some(account) = &outcome.payer_account {
                        self.producers.publish_notification(Notification::account_reinstated(account)).await;
                    }
                }
                let event = ContractActivatedEvent {
                    contract: contract.clone(),
                    order: outcome.order.clone(),
                    ledger_entry: ledger_entry.clone(),
                };
                self.producers.publish_contract_activated(event).await;
            },
            SubmissionStatus::Rejected => {
                let reason = outcome.submission.rejection_reason.as_deref().unwrap_or("Payment could not be verified");
                self.producers.publish_notification(Notification::payment_rejected(&outcome.submission, reason)).await;
            },
            status => warn!("⚖️ Unexpected status {status} after resolving {}", outcome.submission.submission_id),
        }
        for closed in &outcome.superseded {
            let reason = closed.rejection_reason.as_deref().unwrap_or("The order is no longer pending");
            self.producers.publish_notification(Notification::payment_rejected(closed, reason)).await;
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
