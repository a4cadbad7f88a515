use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{
        BidId,
        Decision,
        NewSubmission,
        OrderId,
        PaymentSubmission,
        ScoredEvidence,
        SubmissionId,
        SubmissionStatus,
        UserId,
    },
    fpe_api::errors::FeeEngineError,
};

pub async fn fetch_submission(
    submission_id: &SubmissionId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentSubmission>, FeeEngineError> {
    let submission = sqlx::query_as::<_, PaymentSubmission>("SELECT * FROM payment_submissions WHERE submission_id = $1")
        .bind(submission_id)
        .fetch_optional(conn)
        .await?;
    Ok(submission)
}

pub async fn fetch_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentSubmission>, FeeEngineError> {
    let submissions = sqlx::query_as::<_, PaymentSubmission>(
        "SELECT * FROM payment_submissions WHERE order_id = $1 ORDER BY created_at ASC",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(submissions)
}

pub async fn insert_submission(
    submission: &NewSubmission,
    bid_id: &BidId,
    conn: &mut SqliteConnection,
) -> Result<PaymentSubmission, FeeEngineError> {
    trace!("🔍️ Inserting submission {} for order {}", submission.submission_id, submission.order_id);
    let submission = sqlx::query_as::<_, PaymentSubmission>(
        r#"
            INSERT INTO payment_submissions (
                submission_id,
                order_id,
                bid_id,
                payer_id,
                evidence_ref,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(&submission.submission_id)
    .bind(&submission.order_id)
    .bind(bid_id)
    .bind(&submission.caller_id)
    .bind(&submission.evidence_ref)
    .bind(submission.created_at)
    .fetch_one(conn)
    .await?;
    Ok(submission)
}

/// Writes the scoring results. Returns `None` if the submission has already been scored (or does not exist), since
/// the update only matches rows whose extraction is still pending.
pub async fn record_scored_evidence(
    submission_id: &SubmissionId,
    evidence: &ScoredEvidence,
    status: SubmissionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentSubmission>, FeeEngineError> {
    let image_hash = evidence.image_metadata.as_ref().map(|m| m.image_hash.as_str());
    let submission = sqlx::query_as::<_, PaymentSubmission>(
        r#"
            UPDATE payment_submissions SET
                status = $1,
                ocr_status = $2,
                ocr_failure_reason = $3,
                extracted_data = $4,
                reference_normalized = $5,
                image_metadata = $6,
                image_hash = $7,
                fraud_score = $8,
                fraud_flags = $9,
                route = $10,
                updated_at = $11
            WHERE submission_id = $12 AND ocr_status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(evidence.ocr_status)
    .bind(evidence.ocr_failure_reason.as_deref())
    .bind(evidence.extracted_data.as_ref().map(Json))
    .bind(evidence.reference_normalized.as_deref())
    .bind(evidence.image_metadata.as_ref().map(Json))
    .bind(image_hash)
    .bind(evidence.fraud_score)
    .bind(Json(&evidence.fraud_flags))
    .bind(evidence.route)
    .bind(evidence.scored_at)
    .bind(submission_id)
    .fetch_optional(conn)
    .await?;
    Ok(submission)
}

/// Submissions (other than `exclude`) that were approved with the same normalized reference number.
pub async fn approved_with_reference(
    reference: &str,
    exclude: &SubmissionId,
    conn: &mut SqliteConnection,
) -> Result<Vec<SubmissionId>, FeeEngineError> {
    let ids = sqlx::query_scalar::<_, SubmissionId>(
        r#"
            SELECT submission_id FROM payment_submissions
            WHERE reference_normalized = $1 AND status = 'approved' AND submission_id != $2
            ORDER BY created_at ASC;
        "#,
    )
    .bind(reference)
    .bind(exclude)
    .fetch_all(conn)
    .await?;
    Ok(ids)
}

/// Image hashes of other submissions created since `since`.
pub async fn image_hashes_since(
    since: DateTime<Utc>,
    exclude: &SubmissionId,
    conn: &mut SqliteConnection,
) -> Result<Vec<(SubmissionId, String)>, FeeEngineError> {
    let hashes = sqlx::query_as::<_, (SubmissionId, String)>(
        r#"
            SELECT submission_id, image_hash FROM payment_submissions
            WHERE image_hash IS NOT NULL AND created_at >= $1 AND submission_id != $2;
        "#,
    )
    .bind(since)
    .bind(exclude)
    .fetch_all(conn)
    .await?;
    Ok(hashes)
}

/// The number of submissions the payer has made since `since`, including the one being scored.
pub async fn count_by_payer_since(
    payer_id: &UserId,
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u32, FeeEngineError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM payment_submissions WHERE payer_id = $1 AND created_at >= $2",
    )
    .bind(payer_id)
    .bind(since)
    .fetch_one(conn)
    .await?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

pub async fn review_queue(conn: &mut SqliteConnection) -> Result<Vec<PaymentSubmission>, FeeEngineError> {
    let queue = sqlx::query_as::<_, PaymentSubmission>(
        "SELECT * FROM payment_submissions WHERE status = 'manual_review' ORDER BY created_at ASC",
    )
    .fetch_all(conn)
    .await?;
    Ok(queue)
}

pub async fn update_status(
    submission_id: &SubmissionId,
    status: SubmissionStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentSubmission, FeeEngineError> {
    let submission = sqlx::query_as::<_, PaymentSubmission>(
        "UPDATE payment_submissions SET status = $1, updated_at = $2 WHERE submission_id = $3 RETURNING *",
    )
    .bind(status)
    .bind(now)
    .bind(submission_id)
    .fetch_optional(conn)
    .await?;
    submission.ok_or_else(|| FeeEngineError::SubmissionNotFound(submission_id.clone()))
}

pub struct ResolutionFields<'a> {
    pub decision: Decision,
    pub resolved_by: &'a str,
    pub notes: Option<&'a str>,
    pub rejection_reason: Option<&'a str>,
    pub resolved_at: DateTime<Utc>,
}

/// Stamps the decision onto the submission. The caller has already checked that the transition is legal.
pub async fn write_resolution(
    submission_id: &SubmissionId,
    fields: ResolutionFields<'_>,
    conn: &mut SqliteConnection,
) -> Result<PaymentSubmission, FeeEngineError> {
    let status = match fields.decision {
        Decision::Approve => SubmissionStatus::Approved,
        Decision::Reject => SubmissionStatus::Rejected,
    };
    let submission = sqlx::query_as::<_, PaymentSubmission>(
        r#"
            UPDATE payment_submissions SET
                status = $1,
                resolved_by = $2,
                resolved_at = $3,
                resolution_notes = $4,
                rejection_reason = $5,
                updated_at = $3
            WHERE submission_id = $6
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(fields.resolved_by)
    .bind(fields.resolved_at)
    .bind(fields.notes)
    .bind(fields.rejection_reason)
    .bind(submission_id)
    .fetch_optional(conn)
    .await?;
    submission.ok_or_else(|| FeeEngineError::SubmissionNotFound(submission_id.clone()))
}
