//! Moves a contract out of `pending_payment` once its platform fee has been verified.
use chrono::{DateTime, Utc};

use crate::{
    db_types::{Contract, ContractStatus, Order, PlatformFeeStatus},
    fpe_api::errors::FeeEngineError,
};

/// Returns the contract as it must look after `order` has been verified. Fails if the contract belongs to a different
/// bid, has already been paid, or is no longer waiting for payment (e.g. it was cancelled).
pub fn activate(contract: &Contract, order: &Order, now: DateTime<Utc>) -> Result<Contract, FeeEngineError> {
    if contract.bid_id != order.bid_id {
        return Err(FeeEngineError::InvalidArgument(format!(
            "Order {} is for bid {}, but contract {} is for bid {}",
            order.order_id, order.bid_id, contract.contract_id, contract.bid_id
        )));
    }
    if contract.platform_fee_paid {
        return Err(FeeEngineError::FeeAlreadyPaid(contract.bid_id.to_string()));
    }
    if contract.status != ContractStatus::PendingPayment {
        return Err(FeeEngineError::ContractNotPayable(contract.contract_id.to_string(), contract.status));
    }
    let status = contract.status.transition_to(ContractStatus::Draft)?;
    let platform_fee_status = contract.platform_fee_status.transition_to(PlatformFeeStatus::Paid)?;
    Ok(Contract {
        status,
        platform_fee_status,
        platform_fee_paid: true,
        platform_fee_order_id: Some(order.order_id.clone()),
        updated_at: now,
        ..contract.clone()
    })
}
