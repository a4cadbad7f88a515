use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{ContractStatus, InvalidTransition, OrderId, OrderStatusType, SubmissionId, SubmissionStatus},
    fee_calculator::FeeCalculationError,
};

/// The coarse error classes that callers (and the HTTP layer) act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidArgument,
    PermissionDenied,
    NotFound,
    FailedPrecondition,
    ResourceExhausted,
    Internal,
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::NotFound => "not_found",
            ErrorCode::FailedPrecondition => "failed_precondition",
            ErrorCode::ResourceExhausted => "resource_exhausted",
            ErrorCode::Internal => "internal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
pub enum FeeEngineError {
    #[error("Invalid argument. {0}")]
    InvalidArgument(String),
    #[error("Cannot calculate the platform fee. {0}")]
    FeeCalculation(#[from] FeeCalculationError),
    #[error("A rejection must carry a reason")]
    MissingRejectionReason,
    #[error("Invalid engine configuration. {0}")]
    InvalidConfiguration(String),
    #[error("Permission denied. {0}")]
    PermissionDenied(String),
    #[error("No contract exists for {0}")]
    ContractNotFound(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested submission {0} does not exist")]
    SubmissionNotFound(SubmissionId),
    #[error("{0}")]
    IllegalTransition(#[from] InvalidTransition),
    #[error("The platform fee for bid {0} has already been paid")]
    FeeAlreadyPaid(String),
    #[error("Contract {0} is {1}, so its platform fee cannot be settled")]
    ContractNotPayable(String, ContractStatus),
    #[error("Order {0} is {1}, not pending")]
    OrderNotPending(OrderId, OrderStatusType),
    #[error("Submission {0} has already been resolved as {1}")]
    SubmissionAlreadyResolved(SubmissionId, SubmissionStatus),
    #[error("Submission {0} already has extraction results")]
    AlreadyScored(SubmissionId),
    #[error("A completed ledger entry already exists for bid {0}")]
    LedgerEntryExists(String),
    #[error("Submission {0} is not eligible for an automatic decision")]
    NotAutoReviewable(SubmissionId),
    #[error("Too many requests. {0}")]
    ResourceExhausted(String),
    #[error("The write lost a race with a concurrent transaction. {0}")]
    WriteConflict(String),
    #[error("Gave up on {0} after repeated write conflicts")]
    RetriesExhausted(String),
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
}

impl FeeEngineError {
    pub fn code(&self) -> ErrorCode {
        use FeeEngineError::*;
        match self {
            InvalidArgument(_) | FeeCalculation(_) | MissingRejectionReason | InvalidConfiguration(_) => {
                ErrorCode::InvalidArgument
            },
            PermissionDenied(_) => ErrorCode::PermissionDenied,
            ContractNotFound(_) | OrderNotFound(_) | SubmissionNotFound(_) => ErrorCode::NotFound,
            IllegalTransition(_) |
            FeeAlreadyPaid(_) |
            ContractNotPayable(..) |
            OrderNotPending(..) |
            SubmissionAlreadyResolved(..) |
            AlreadyScored(_) |
            LedgerEntryExists(_) |
            NotAutoReviewable(_) => ErrorCode::FailedPrecondition,
            ResourceExhausted(_) => ErrorCode::ResourceExhausted,
            WriteConflict(_) | RetriesExhausted(_) | DatabaseError(_) => ErrorCode::Internal,
        }
    }

    /// True for errors caused by a concurrent writer. The transaction that raised it rolled back and can be retried.
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, FeeEngineError::WriteConflict(_))
    }
}

/// SQLite result codes for a locked or busy database, including the extended codes for snapshot conflicts in WAL mode.
const BUSY_CODES: [&str; 5] = ["5", "6", "261", "262", "517"];

impl From<sqlx::Error> for FeeEngineError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(err) if err.is_unique_violation() => FeeEngineError::WriteConflict(err.to_string()),
            sqlx::Error::Database(err) if err.code().map(|c| BUSY_CODES.iter().any(|busy| c == *busy)).unwrap_or(false) => {
                FeeEngineError::WriteConflict(err.to_string())
            },
            _ => FeeEngineError::DatabaseError(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for FeeEngineError {
    fn from(e: serde_json::Error) -> Self {
        FeeEngineError::DatabaseError(format!("Could not serialize column data: {e}"))
    }
}
