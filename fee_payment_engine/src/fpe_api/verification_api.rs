use std::{fmt::Debug, sync::Arc};

use chrono::{Duration, Utc};
use log::*;

use crate::{
    config::EngineConfig,
    db::traits::{AutomaticReview, FeeLedgerDatabase, HistoryQuery},
    db_types::{
        Decision,
        NewSubmission,
        OrderId,
        PaymentSubmission,
        Route,
        ScoredEvidence,
        SubmissionId,
        SubmissionStatus,
        UserId,
    },
    events::EventProducers,
    extractor::{EvidenceExtractor, ExtractionOutcome},
    fpe_api::{
        decision_api::DecisionApi,
        errors::{ErrorCode, FeeEngineError},
        objects::VerificationOutcome,
    },
    fraud::{FraudAssessment, FraudContext, FraudScorer},
    helpers::normalize_reference,
    review_router::RoutingPolicy,
};

/// `VerificationApi` takes payment evidence from payers, scores extraction results for fraud, and routes each
/// submission to an automatic decision or to the manual review queue.
pub struct VerificationApi<B> {
    db: B,
    scorer: Arc<FraudScorer>,
    router: RoutingPolicy,
    velocity_window: Duration,
    image_lookback: Duration,
    decisions: DecisionApi<B>,
}

impl<B> Debug for VerificationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerificationApi ({:?})", self.router)
    }
}

impl<B: Clone> VerificationApi<B> {
    pub fn new(db: B, config: &EngineConfig, producers: EventProducers) -> Self {
        Self {
            decisions: DecisionApi::new(db.clone(), producers),
            db,
            scorer: Arc::new(FraudScorer::new(&config.fraud)),
            router: config.routing,
            velocity_window: config.fraud.velocity_window,
            image_lookback: config.fraud.image_lookback,
        }
    }

    /// Replaces the default rule set.
    pub fn with_scorer(mut self, scorer: FraudScorer) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }
}

impl<B> VerificationApi<B>
where B: FeeLedgerDatabase
{
    /// Records a payer's evidence against one of their pending orders. Extraction happens later; the submission
    /// starts out `pending` with extraction `pending`.
    pub async fn submit_evidence(
        &self,
        order_id: &OrderId,
        caller_id: &UserId,
        evidence_ref: &str,
    ) -> Result<PaymentSubmission, FeeEngineError> {
        let evidence_ref = evidence_ref.trim();
        if evidence_ref.is_empty() {
            return Err(FeeEngineError::InvalidArgument("An evidence reference is required".to_string()));
        }
        let submission = NewSubmission {
            submission_id: SubmissionId::random(),
            order_id: order_id.clone(),
            caller_id: caller_id.clone(),
            evidence_ref: evidence_ref.to_string(),
            created_at: Utc::now(),
        };
        let submission = self.db.insert_submission(submission).await?;
        info!("🔍️ Evidence {} received for order {order_id}", submission.submission_id);
        Ok(submission)
    }

    /// Runs `extractor` over the submission's evidence and processes the result.
    pub async fn verify_with<E: EvidenceExtractor>(
        &self,
        extractor: &E,
        submission_id: &SubmissionId,
    ) -> Result<VerificationOutcome, FeeEngineError> {
        let submission = self.fetch_submission(submission_id).await?;
        let outcome = extractor.extract(&submission.evidence_ref).await;
        self.process_extraction(submission_id, outcome).await
    }

    /// Handles the extractor's result for a submission: scores it, records the score and route, and carries out the
    /// route if it is automatic.
    ///
    /// A submission is scored once. Delivering results for a scored submission fails, except when the submission is
    /// still waiting on its automatic decision (e.g. the previous attempt was interrupted), in which case that decision
    /// is driven again.
    pub async fn process_extraction(
        &self,
        submission_id: &SubmissionId,
        outcome: ExtractionOutcome,
    ) -> Result<VerificationOutcome, FeeEngineError> {
        outcome.validate()?;
        let submission = self.fetch_submission(submission_id).await?;
        if submission.is_scored() {
            return self.redrive(submission).await;
        }
        let order = self
            .db
            .fetch_order(&submission.order_id)
            .await?
            .ok_or_else(|| FeeEngineError::OrderNotFound(submission.order_id.clone()))?;
        let now = Utc::now();
        let reference_normalized =
            outcome.data().and_then(|d| d.reference_number.as_deref()).and_then(normalize_reference);
        let query = HistoryQuery {
            submission_id: submission_id.clone(),
            payer_id: submission.payer_id.clone(),
            reference_normalized: reference_normalized.clone(),
            submissions_since: now - self.velocity_window,
            images_since: now - self.image_lookback,
        };
        let history = self.db.fetch_scoring_history(query).await?;
        let ctx = FraudContext {
            order_amount: order.amount,
            ocr_status: outcome.ocr_status(),
            extracted: outcome.data(),
            image: outcome.image(),
            history: &history,
            now,
        };
        let assessment = self.scorer.assess(&ctx);
        let route = self.router.route(assessment.score, outcome.ocr_status());
        info!("🔍️ Submission {submission_id} scored {} and is routed to {route}", assessment.score);
        if !assessment.flags.is_empty() {
            debug!("🔍️ Flags for {submission_id}: {}", assessment.summary());
        }
        let evidence = ScoredEvidence {
            ocr_status: outcome.ocr_status(),
            ocr_failure_reason: outcome.failure_reason().map(String::from),
            extracted_data: outcome.data().cloned(),
            reference_normalized,
            image_metadata: outcome.image().cloned(),
            fraud_score: assessment.score,
            fraud_flags: assessment.flags.clone(),
            route,
            scored_at: now,
        };
        let scored = self.db.record_scored_evidence(submission_id, evidence).await?;
        self.follow_route(scored, assessment, route).await
    }

    async fn redrive(&self, submission: PaymentSubmission) -> Result<VerificationOutcome, FeeEngineError> {
        let automatic = matches!(submission.route, Some(Route::AutoApprove | Route::AutoReject));
        let route = match submission.route {
            Some(route) if automatic && submission.status == SubmissionStatus::Pending => route,
            _ => return Err(FeeEngineError::AlreadyScored(submission.submission_id)),
        };
        let id = &submission.submission_id;
        debug!("🔍️ Submission {id} was scored but never decided. Driving the {route} decision again");
        let assessment = FraudAssessment { score: submission.fraud_score, flags: submission.fraud_flags.clone() };
        self.follow_route(submission, assessment, route).await
    }

    async fn follow_route(
        &self,
        submission: PaymentSubmission,
        assessment: FraudAssessment,
        route: Route,
    ) -> Result<VerificationOutcome, FeeEngineError> {
        let decision = match route {
            Route::AutoApprove => Decision::Approve,
            Route::AutoReject => Decision::Reject,
            Route::ManualReview => {
                return Ok(VerificationOutcome { submission, assessment, route, resolution: None });
            },
        };
        let reason = (decision == Decision::Reject)
            .then(|| format!("Payment evidence failed automatic verification: {}", assessment.summary()));
        let id = submission.submission_id.clone();
        match self.decisions.resolve_automatically(&id, decision, AutomaticReview::grant(), reason).await {
            Ok(outcome) => Ok(VerificationOutcome {
                submission: outcome.submission.clone(),
                assessment,
                route,
                resolution: Some(outcome),
            }),
            Err(e) if e.code() == ErrorCode::FailedPrecondition => {
                let current = self.fetch_submission(&id).await?;
                if current.status.is_resolved() {
                    info!("🔍️ Submission {id} was closed as {} before its automatic decision", current.status);
                    return Ok(VerificationOutcome { submission: current, assessment, route, resolution: None });
                }
                warn!("🔍️ Submission {id} could not be decided automatically ({e}). Sending it to manual review");
                let submission = self.db.escalate_to_manual_review(&id, Utc::now()).await?;
                Ok(VerificationOutcome { submission, assessment, route, resolution: None })
            },
            Err(e) => Err(e),
        }
    }

    async fn fetch_submission(&self, submission_id: &SubmissionId) -> Result<PaymentSubmission, FeeEngineError> {
        self.db
            .fetch_submission(submission_id)
            .await?
            .ok_or_else(|| FeeEngineError::SubmissionNotFound(submission_id.clone()))
    }
}
