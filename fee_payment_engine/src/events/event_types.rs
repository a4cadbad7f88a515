use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    billing_schedule::BillingStage,
    db_types::{Contract, LedgerEntry, Order, PaymentSubmission, UserAccount, UserId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    PaymentVerified,
    ContractReady,
    PaymentStatus,
    PlatformFeeReminder,
    AccountSuspended,
    AccountReinstated,
}

/// A message for a marketplace user, handed to the notification sink. Delivery (push, email, in-app) is up to the
/// subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

impl Notification {
    pub fn payment_verified(contract: &Contract, order: &Order) -> Self {
        Self {
            recipient_id: order.payer_id.clone(),
            kind: NotificationType::PaymentVerified,
            title: "Payment verified".to_string(),
            message: format!(
                "Your platform fee payment of {} for contract {} has been verified.",
                order.amount, contract.contract_id
            ),
            data: json!({
                "order_id": order.order_id,
                "contract_id": contract.contract_id,
                "bid_id": contract.bid_id,
                "amount": order.amount,
            }),
        }
    }

    pub fn contract_ready(contract: &Contract) -> Self {
        Self {
            recipient_id: contract.counterparty_id().clone(),
            kind: NotificationType::ContractReady,
            title: "Contract ready".to_string(),
            message: format!(
                "The platform fee for contract {} has been paid. The contract is ready for review and signing.",
                contract.contract_id
            ),
            data: json!({
                "contract_id": contract.contract_id,
                "bid_id": contract.bid_id,
                "status": contract.status,
            }),
        }
    }

    pub fn payment_rejected(submission: &PaymentSubmission, reason: &str) -> Self {
        Self {
            recipient_id: submission.payer_id.clone(),
            kind: NotificationType::PaymentStatus,
            title: "Payment rejected".to_string(),
            message: format!(
                "Your platform fee payment for order {} could not be verified. Reason: {reason}",
                submission.order_id
            ),
            data: json!({
                "order_id": submission.order_id,
                "submission_id": submission.submission_id,
                "status": submission.status,
                "reason": reason,
            }),
        }
    }

    pub fn fee_reminder(contract: &Contract, stage: BillingStage) -> Self {
        let due = contract.platform_fee_due_date.map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string());
        let due_text = due.clone().unwrap_or_else(|| "soon".to_string());
        let (title, message) = match stage {
            BillingStage::FinalWarning => (
                "Final platform fee warning",
                format!(
                    "Your platform fee of {} for contract {} is due {due_text}. Your account will be suspended if it \
                     is not paid by then.",
                    contract.platform_fee, contract.contract_id
                ),
            ),
            _ => (
                "Platform fee reminder",
                format!(
                    "Your platform fee of {} for contract {} is due {due_text}.",
                    contract.platform_fee, contract.contract_id
                ),
            ),
        };
        Self {
            recipient_id: contract.platform_fee_payer_id.clone(),
            kind: NotificationType::PlatformFeeReminder,
            title: title.to_string(),
            message,
            data: json!({
                "contract_id": contract.contract_id,
                "amount": contract.platform_fee,
                "due_date": due,
                "reminder": stage.reminder_tag(),
            }),
        }
    }

    pub fn account_suspended(account: &UserAccount, contract: &Contract) -> Self {
        Self {
            recipient_id: account.user_id.clone(),
            kind: NotificationType::AccountSuspended,
            title: "Account suspended".to_string(),
            message: format!(
                "Your account has been suspended for unpaid platform fees. Total outstanding: {} across {} contract(s).",
                account.outstanding_platform_fees,
                account.outstanding_fee_contracts.len()
            ),
            data: json!({
                "contract_id": contract.contract_id,
                "total_outstanding": account.outstanding_platform_fees,
                "outstanding_contracts": account.outstanding_fee_contracts,
            }),
        }
    }

    pub fn account_reinstated(account: &UserAccount) -> Self {
        Self {
            recipient_id: account.user_id.clone(),
            kind: NotificationType::AccountReinstated,
            title: "Account reinstated".to_string(),
            message: "All overdue platform fees have been settled. Your account is active again.".to_string(),
            data: json!({
                "total_outstanding": account.outstanding_platform_fees,
                "outstanding_contracts": account.outstanding_fee_contracts,
            }),
        }
    }
}

/// Published once a contract's platform fee has been verified and the contract moved to draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractActivatedEvent {
    pub contract: Contract,
    pub order: Order,
    pub ledger_entry: LedgerEntry,
}
