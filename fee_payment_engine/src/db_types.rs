//! Data types shared by the engine API and the storage backends.
//!
//! Every status type is an explicit enumeration stored as snake_case text. The lifecycle enums carry a
//! `transition_to` method that is the single place where legal state changes are defined; the storage layer calls it
//! inside its transactions before writing a new status.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use fpe_common::Centavos;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, types::Json, FromRow, Row, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal {entity} transition from '{from}' to '{to}'")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

impl InvalidTransition {
    fn new<S: Display>(entity: &'static str, from: S, to: S) -> Self {
        Self { entity, from: from.to_string(), to: to.to_string() }
    }
}

/// Implements `Display` and `FromStr` for a fieldless enum using the same text that is stored in the database.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    $(Self::$variant => $text),+
                };
                f.write_str(s)
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("{} is not a valid {}", s, stringify!($name)))),
                }
            }
        }
    };
}

/// Declares a string identifier newtype. New identifiers are random 64-bit hex strings with a type prefix.
macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn random() -> Self {
                Self(format!("{}_{:016x}", $prefix, rand::random::<u64>()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(OrderId, "ord");
string_id!(SubmissionId, "sub");
string_id!(ContractId, "ctr");
string_id!(BidId, "bid");
string_id!(UserId, "usr");

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order is open and waiting for payment evidence.
    Pending,
    /// A submission against this order has been approved.
    Verified,
    /// The evidence for this order was rejected.
    Rejected,
    /// The order was abandoned before any evidence was resolved.
    Expired,
}

text_enum!(OrderStatusType {
    Pending => "pending",
    Verified => "verified",
    Rejected => "rejected",
    Expired => "expired",
});

impl OrderStatusType {
    pub fn transition_to(self, next: Self) -> Result<Self, InvalidTransition> {
        use OrderStatusType::*;
        match (self, next) {
            (Pending, Verified) | (Pending, Rejected) | (Pending, Expired) => Ok(next),
            _ => Err(InvalidTransition::new("order", self, next)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    PlatformFee,
}

text_enum!(OrderType { PlatformFee => "platform_fee" });

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub bid_id: BidId,
    pub payer_id: UserId,
    pub order_type: OrderType,
    pub amount: Centavos,
    pub status: OrderStatusType,
    pub idempotency_key: String,
    pub verified_submission_id: Option<SubmissionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A request to open (or reuse) the platform fee order for a bid. The amount and payer are not part of the request;
/// they are taken from the contract registered for the bid.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub bid_id: BidId,
    pub caller_id: UserId,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   Submission enums    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    ManualReview,
    Approved,
    Rejected,
}

text_enum!(SubmissionStatus {
    Pending => "pending",
    ManualReview => "manual_review",
    Approved => "approved",
    Rejected => "rejected",
});

impl SubmissionStatus {
    pub fn transition_to(self, next: Self) -> Result<Self, InvalidTransition> {
        use SubmissionStatus::*;
        match (self, next) {
            (Pending, ManualReview) => Ok(next),
            (Pending | ManualReview, Approved | Rejected) => Ok(next),
            _ => Err(InvalidTransition::new("submission", self, next)),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OcrStatus {
    Pending,
    Completed,
    Failed,
}

text_enum!(OcrStatus { Pending => "pending", Completed => "completed", Failed => "failed" });

/// The path a scored submission takes through review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Route {
    AutoApprove,
    AutoReject,
    ManualReview,
}

text_enum!(Route { AutoApprove => "auto_approve", AutoReject => "auto_reject", ManualReview => "manual_review" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

text_enum!(Decision { Approve => "approve", Reject => "reject" });

//--------------------------------------   Extracted evidence  ---------------------------------------------------------
/// The structured fields read off a payment receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub reference_number: Option<String>,
    pub amount: Option<Centavos>,
    pub receiver_name: Option<String>,
    pub timestamp_text: Option<String>,
    /// Extraction confidence, 0-100
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// 64-bit perceptual hash, hex encoded
    pub image_hash: String,
    pub width: u32,
    pub height: u32,
    pub has_exif_metadata: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudRuleKind {
    AmountMismatch,
    DuplicateReference,
    DuplicateImage,
    SimilarImage,
    ReceiverMismatch,
    TimestampExpired,
    LowOcrConfidence,
    SuspiciousDimensions,
    MissingExif,
    NewAccountHighValue,
    VelocityExceeded,
}

text_enum!(FraudRuleKind {
    AmountMismatch => "AMOUNT_MISMATCH",
    DuplicateReference => "DUPLICATE_REFERENCE",
    DuplicateImage => "DUPLICATE_IMAGE",
    SimilarImage => "SIMILAR_IMAGE",
    ReceiverMismatch => "RECEIVER_MISMATCH",
    TimestampExpired => "TIMESTAMP_EXPIRED",
    LowOcrConfidence => "LOW_OCR_CONFIDENCE",
    SuspiciousDimensions => "SUSPICIOUS_DIMENSIONS",
    MissingExif => "MISSING_EXIF",
    NewAccountHighValue => "NEW_ACCOUNT_HIGH_VALUE",
    VelocityExceeded => "VELOCITY_EXCEEDED",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudFlag {
    pub rule: FraudRuleKind,
    pub score: u32,
    pub detail: String,
}

//--------------------------------------   PaymentSubmission   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSubmission {
    pub submission_id: SubmissionId,
    pub order_id: OrderId,
    pub bid_id: BidId,
    pub payer_id: UserId,
    pub evidence_ref: String,
    pub status: SubmissionStatus,
    pub ocr_status: OcrStatus,
    pub ocr_failure_reason: Option<String>,
    pub extracted_data: Option<ExtractedData>,
    pub image_metadata: Option<ImageMetadata>,
    pub fraud_score: u32,
    pub fraud_flags: Vec<FraudFlag>,
    pub route: Option<Route>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentSubmission {
    /// True once extraction results and a fraud assessment have been recorded.
    pub fn is_scored(&self) -> bool {
        self.ocr_status != OcrStatus::Pending
    }
}

impl FromRow<'_, SqliteRow> for PaymentSubmission {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let extracted: Option<Json<ExtractedData>> = row.try_get("extracted_data")?;
        let image: Option<Json<ImageMetadata>> = row.try_get("image_metadata")?;
        let flags: Json<Vec<FraudFlag>> = row.try_get("fraud_flags")?;
        Ok(Self {
            submission_id: row.try_get("submission_id")?,
            order_id: row.try_get("order_id")?,
            bid_id: row.try_get("bid_id")?,
            payer_id: row.try_get("payer_id")?,
            evidence_ref: row.try_get("evidence_ref")?,
            status: row.try_get("status")?,
            ocr_status: row.try_get("ocr_status")?,
            ocr_failure_reason: row.try_get("ocr_failure_reason")?,
            extracted_data: extracted.map(|j| j.0),
            image_metadata: image.map(|j| j.0),
            fraud_score: row.try_get("fraud_score")?,
            fraud_flags: flags.0,
            route: row.try_get("route")?,
            resolved_by: row.try_get("resolved_by")?,
            resolved_at: row.try_get("resolved_at")?,
            resolution_notes: row.try_get("resolution_notes")?,
            rejection_reason: row.try_get("rejection_reason")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub submission_id: SubmissionId,
    pub order_id: OrderId,
    pub caller_id: UserId,
    pub evidence_ref: String,
    pub created_at: DateTime<Utc>,
}

/// What the extractor produced and what the scorer and router made of it, written in one go.
#[derive(Debug, Clone)]
pub struct ScoredEvidence {
    pub ocr_status: OcrStatus,
    pub ocr_failure_reason: Option<String>,
    pub extracted_data: Option<ExtractedData>,
    pub reference_normalized: Option<String>,
    pub image_metadata: Option<ImageMetadata>,
    pub fraud_score: u32,
    pub fraud_flags: Vec<FraudFlag>,
    pub route: Route,
    pub scored_at: DateTime<Utc>,
}

//--------------------------------------       Contracts       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    /// A shipper posted cargo; truckers bid on it.
    Cargo,
    /// A trucker posted available truck capacity; shippers bid on it.
    Truck,
}

text_enum!(ListingType { Cargo => "cargo", Truck => "truck" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    PendingPayment,
    Draft,
    Active,
    Signed,
    Completed,
    Cancelled,
}

text_enum!(ContractStatus {
    PendingPayment => "pending_payment",
    Draft => "draft",
    Active => "active",
    Signed => "signed",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl ContractStatus {
    pub fn transition_to(self, next: Self) -> Result<Self, InvalidTransition> {
        use ContractStatus::*;
        match (self, next) {
            (PendingPayment, Draft) | (Draft, Active) | (Active, Signed) | (Signed, Completed) => Ok(next),
            (PendingPayment | Draft | Active | Signed, Cancelled) => Ok(next),
            _ => Err(InvalidTransition::new("contract", self, next)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlatformFeeStatus {
    Unpaid,
    Paid,
    Overdue,
}

text_enum!(PlatformFeeStatus { Unpaid => "unpaid", Paid => "paid", Overdue => "overdue" });

impl PlatformFeeStatus {
    pub fn transition_to(self, next: Self) -> Result<Self, InvalidTransition> {
        use PlatformFeeStatus::*;
        match (self, next) {
            (Unpaid, Paid) | (Unpaid, Overdue) | (Overdue, Paid) => Ok(next),
            _ => Err(InvalidTransition::new("platform fee", self, next)),
        }
    }
}

/// Reminder tags recorded on a contract once the matching billing notice has gone out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderTag {
    #[serde(rename = "day_1")]
    Day1,
    #[serde(rename = "day_2")]
    Day2,
}

text_enum!(ReminderTag { Day1 => "day_1", Day2 => "day_2" });

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub contract_id: ContractId,
    pub bid_id: BidId,
    pub listing_type: ListingType,
    pub listing_owner_id: UserId,
    pub bidder_id: UserId,
    pub agreed_price: Centavos,
    pub platform_fee_payer_id: UserId,
    pub platform_fee: Centavos,
    pub platform_fee_paid: bool,
    pub platform_fee_status: PlatformFeeStatus,
    pub platform_fee_order_id: Option<OrderId>,
    pub platform_fee_billing_started_at: Option<DateTime<Utc>>,
    pub platform_fee_due_date: Option<DateTime<Utc>>,
    pub platform_fee_reminders: Vec<ReminderTag>,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// The party on the other side of the fee: the one who is told the contract is ready once the fee is paid.
    pub fn counterparty_id(&self) -> &UserId {
        if self.platform_fee_payer_id == self.listing_owner_id {
            &self.bidder_id
        } else {
            &self.listing_owner_id
        }
    }

    pub fn has_reminder(&self, tag: ReminderTag) -> bool {
        self.platform_fee_reminders.contains(&tag)
    }
}

impl FromRow<'_, SqliteRow> for Contract {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let reminders: Json<Vec<ReminderTag>> = row.try_get("platform_fee_reminders")?;
        Ok(Self {
            contract_id: row.try_get("contract_id")?,
            bid_id: row.try_get("bid_id")?,
            listing_type: row.try_get("listing_type")?,
            listing_owner_id: row.try_get("listing_owner_id")?,
            bidder_id: row.try_get("bidder_id")?,
            agreed_price: row.try_get("agreed_price")?,
            platform_fee_payer_id: row.try_get("platform_fee_payer_id")?,
            platform_fee: row.try_get("platform_fee")?,
            platform_fee_paid: row.try_get("platform_fee_paid")?,
            platform_fee_status: row.try_get("platform_fee_status")?,
            platform_fee_order_id: row.try_get("platform_fee_order_id")?,
            platform_fee_billing_started_at: row.try_get("billing_started_at")?,
            platform_fee_due_date: row.try_get("platform_fee_due_date")?,
            platform_fee_reminders: reminders.0,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A contract as handed over by the bid-acceptance flow, with the fee already worked out.
#[derive(Debug, Clone)]
pub struct NewContract {
    pub contract_id: ContractId,
    pub bid_id: BidId,
    pub listing_type: ListingType,
    pub listing_owner_id: UserId,
    pub bidder_id: UserId,
    pub agreed_price: Centavos,
    pub platform_fee_payer_id: UserId,
    pub platform_fee: Centavos,
    pub billing_started_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     Ledger entries    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub bid_id: BidId,
    pub order_id: OrderId,
    pub submission_id: SubmissionId,
    pub contract_id: ContractId,
    pub amount: Centavos,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     User accounts     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
}

text_enum!(AccountStatus { Active => "active", Suspended => "suspended" });

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: UserId,
    pub outstanding_platform_fees: Centavos,
    pub outstanding_fee_contracts: Vec<ContractId>,
    pub account_status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAccount {
    /// Adds a contract's fee to the outstanding totals. Returns `false`, changing nothing, if the contract is already
    /// listed.
    pub fn add_outstanding(&mut self, contract_id: &ContractId, fee: Centavos) -> bool {
        if self.outstanding_fee_contracts.contains(contract_id) {
            return false;
        }
        self.outstanding_fee_contracts.push(contract_id.clone());
        self.outstanding_platform_fees += fee;
        true
    }

    /// Removes a contract's fee from the outstanding totals. Returns `false`, changing nothing, if the contract was not
    /// listed.
    pub fn settle(&mut self, contract_id: &ContractId, fee: Centavos) -> bool {
        let before = self.outstanding_fee_contracts.len();
        self.outstanding_fee_contracts.retain(|c| c != contract_id);
        if self.outstanding_fee_contracts.len() == before {
            return false;
        }
        self.outstanding_platform_fees -= fee;
        true
    }

    pub fn is_suspended(&self) -> bool {
        self.account_status == AccountStatus::Suspended
    }
}

impl FromRow<'_, SqliteRow> for UserAccount {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let contracts: Json<Vec<ContractId>> = row.try_get("outstanding_fee_contracts")?;
        Ok(Self {
            user_id: row.try_get("user_id")?,
            outstanding_platform_fees: row.try_get("outstanding_platform_fees")?,
            outstanding_fee_contracts: contracts.0,
            account_status: row.try_get("account_status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

//--------------------------------------     Audit log         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub actor_id: String,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for AuditLogEntry {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let detail: Json<serde_json::Value> = row.try_get("detail")?;
        Ok(Self {
            id: row.try_get("id")?,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            action: row.try_get("action")?,
            actor_id: row.try_get("actor_id")?,
            detail: detail.0,
            created_at: row.try_get("created_at")?,
        })
    }
}

//--------------------------------------     Roles             ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A marketplace member (shipper or trucker).
    User,
    /// Platform staff who work the manual review queue.
    Admin,
    /// The evidence extraction service delivering results.
    Extractor,
    /// Internal marketplace services, e.g. bid acceptance.
    Service,
}

text_enum!(Role { User => "user", Admin => "admin", Extractor => "extractor", Service => "service" });

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn new<U: Into<UserId>>(user_id: U, roles: &[Role]) -> Self {
        Self { user_id: user_id.into(), roles: roles.to_vec() }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}
