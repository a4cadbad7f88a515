//! Works out who owes the platform fee for an accepted bid, and how much.
//!
//! The party whose side of the deal is the trucking service pays: on a cargo listing that is the bidder, on a truck
//! listing it is the listing owner. The fee is a fixed share of the agreed price, expressed in basis points and rounded
//! half-up to the nearest centavo.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{BidId, Centavos, ListingType, UserId};

pub const DEFAULT_FEE_RATE_BPS: u32 = 500;
const BPS_DENOMINATOR: i128 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    pub rate_bps: u32,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self { rate_bps: DEFAULT_FEE_RATE_BPS }
    }
}

/// The terms of an accepted bid, as handed over by the bidding flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidTerms {
    pub bid_id: BidId,
    pub listing_type: ListingType,
    pub listing_owner_id: UserId,
    pub bidder_id: UserId,
    pub agreed_price: Centavos,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub payer_id: UserId,
    pub amount: Centavos,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeCalculationError {
    #[error("The agreed price must be positive, but was {0}")]
    NonPositivePrice(Centavos),
    #[error("The {0} is missing")]
    MissingField(&'static str),
    #[error("The listing owner and the bidder cannot be the same user ({0})")]
    SameParty(UserId),
    #[error("A fee rate of {0} basis points is not allowed")]
    RateOutOfRange(u32),
}

pub fn calculate_fee(terms: &BidTerms, policy: &FeePolicy) -> Result<FeeQuote, FeeCalculationError> {
    if terms.bid_id.as_str().trim().is_empty() {
        return Err(FeeCalculationError::MissingField("bid id"));
    }
    if terms.listing_owner_id.as_str().trim().is_empty() {
        return Err(FeeCalculationError::MissingField("listing owner"));
    }
    if terms.bidder_id.as_str().trim().is_empty() {
        return Err(FeeCalculationError::MissingField("bidder"));
    }
    if terms.listing_owner_id == terms.bidder_id {
        return Err(FeeCalculationError::SameParty(terms.bidder_id.clone()));
    }
    if !terms.agreed_price.is_positive() {
        return Err(FeeCalculationError::NonPositivePrice(terms.agreed_price));
    }
    let amount = fee_for_price(terms.agreed_price, policy.rate_bps)?;
    let payer_id = match terms.listing_type {
        ListingType::Cargo => terms.bidder_id.clone(),
        ListingType::Truck => terms.listing_owner_id.clone(),
    };
    Ok(FeeQuote { payer_id, amount })
}

fn fee_for_price(price: Centavos, rate_bps: u32) -> Result<Centavos, FeeCalculationError> {
    if rate_bps as i128 > BPS_DENOMINATOR {
        return Err(FeeCalculationError::RateOutOfRange(rate_bps));
    }
    let scaled = i128::from(price.value()) * i128::from(rate_bps);
    let fee = (scaled + BPS_DENOMINATOR / 2) / BPS_DENOMINATOR;
    // fee <= price, so this always fits
    Ok(Centavos::from(fee as i64))
}
