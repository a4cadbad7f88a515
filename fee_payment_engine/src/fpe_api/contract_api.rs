use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    billing_schedule::BillingPolicy,
    db::traits::FeeLedgerDatabase,
    db_types::{BidId, Contract, ContractId, NewContract},
    fee_calculator::{calculate_fee, BidTerms, FeePolicy, FeeQuote},
    fpe_api::{errors::FeeEngineError, objects::ContractRegistration},
};

/// `ContractApi` receives accepted bids from the marketplace and puts their platform fee on the books.
pub struct ContractApi<B> {
    db: B,
    fees: FeePolicy,
    billing: BillingPolicy,
}

impl<B> Debug for ContractApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContractApi ({} bps)", self.fees.rate_bps)
    }
}

impl<B> ContractApi<B> {
    pub fn new(db: B, fees: FeePolicy, billing: BillingPolicy) -> Self {
        Self { db, fees, billing }
    }

    /// Works out the platform fee for a bid without storing anything.
    pub fn quote(&self, terms: &BidTerms) -> Result<FeeQuote, FeeEngineError> {
        Ok(calculate_fee(terms, &self.fees)?)
    }
}

impl<B> ContractApi<B>
where B: FeeLedgerDatabase
{
    /// Registers the contract for an accepted bid and starts its billing clock at `billing_started_at`.
    ///
    /// Registering the same bid twice returns the first registration with `reused` set.
    pub async fn register_contract(
        &self,
        terms: BidTerms,
        billing_started_at: DateTime<Utc>,
    ) -> Result<ContractRegistration, FeeEngineError> {
        let quote = self.quote(&terms)?;
        let contract = NewContract {
            contract_id: ContractId::random(),
            bid_id: terms.bid_id,
            listing_type: terms.listing_type,
            listing_owner_id: terms.listing_owner_id,
            bidder_id: terms.bidder_id,
            agreed_price: terms.agreed_price,
            platform_fee_payer_id: quote.payer_id,
            platform_fee: quote.amount,
            billing_started_at,
            due_date: self.billing.due_date(billing_started_at),
            created_at: Utc::now(),
        };
        let result = self.db.register_contract(contract).await?;
        let reused = result.is_reused();
        let contract = result.into_record();
        if reused {
            debug!("📑️ Bid {} was already registered as contract {}", contract.bid_id, contract.contract_id);
        } else {
            info!(
                "📑️ Contract {} registered for bid {}. {} pays a platform fee of {}",
                contract.contract_id, contract.bid_id, contract.platform_fee_payer_id, contract.platform_fee
            );
        }
        Ok(ContractRegistration {
            contract_id: contract.contract_id,
            platform_fee_payer_id: contract.platform_fee_payer_id,
            platform_fee: contract.platform_fee,
            platform_fee_due_date: contract.platform_fee_due_date,
            reused,
        })
    }

    pub async fn fetch_contract(&self, contract_id: &ContractId) -> Result<Contract, FeeEngineError> {
        self.db
            .fetch_contract(contract_id)
            .await?
            .ok_or_else(|| FeeEngineError::ContractNotFound(contract_id.to_string()))
    }

    pub async fn fetch_contract_for_bid(&self, bid_id: &BidId) -> Result<Contract, FeeEngineError> {
        self.db
            .fetch_contract_for_bid(bid_id)
            .await?
            .ok_or_else(|| FeeEngineError::ContractNotFound(format!("bid {bid_id}")))
    }
}
