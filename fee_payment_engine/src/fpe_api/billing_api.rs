use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    billing_schedule::{BillingPolicy, BillingStage},
    db::traits::{BillingOutcome, FeeLedgerDatabase},
    events::{EventProducers, Notification},
    fpe_api::{errors::FeeEngineError, objects::BillingRunReport},
};

/// `BillingApi` runs the billing clock over every unpaid contract.
pub struct BillingApi<B> {
    db: B,
    policy: BillingPolicy,
    producers: EventProducers,
}

impl<B> Debug for BillingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BillingApi")
    }
}

impl<B> BillingApi<B> {
    pub fn new(db: B, policy: BillingPolicy, producers: EventProducers) -> Self {
        Self { db, policy, producers }
    }

    pub fn policy(&self) -> &BillingPolicy {
        &self.policy
    }
}

impl<B> BillingApi<B>
where B: FeeLedgerDatabase
{
    /// Brings every billable contract up to date with the billing clock as of `now`.
    ///
    /// Each contract is handled in its own transaction. A contract that fails is logged and listed in the report;
    /// it does not stop the run. The only error returned is failing to load the contracts in the first place.
    pub async fn run_billing_cycle(&self, now: DateTime<Utc>) -> Result<BillingRunReport, FeeEngineError> {
        let contracts = self.db.fetch_billable_contracts().await?;
        let mut report = BillingRunReport { examined: contracts.len(), ..Default::default() };
        trace!("🕰️ Billing run at {now} over {} contracts", contracts.len());
        for contract in contracts {
            if self.policy.stage_for(&contract, now).is_none() {
                report.skipped += 1;
                continue;
            }
            match self.db.apply_billing_stage(&contract.contract_id, &self.policy, now).await {
                Ok(Some(outcome)) => {
                    match outcome.stage {
                        BillingStage::FirstReminder => report.day1_reminders += 1,
                        BillingStage::FinalWarning => report.day2_reminders += 1,
                        BillingStage::Suspension => report.suspended += 1,
                    }
                    self.notify(outcome).await;
                },
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    error!("🕰️ Billing failed for contract {}: {e}", contract.contract_id);
                    report.failures.push((contract.contract_id, e.to_string()));
                },
            }
        }
        info!("🕰️ Billing run complete: {report}");
        Ok(report)
    }

    async fn notify(&self, outcome: BillingOutcome) {
        let BillingOutcome { contract, stage, account } = outcome;
        match (stage, account) {
            (BillingStage::Suspension, Some(account)) => {
                info!(
                    "🕰️ {} suspended. Contract {} is overdue; {} outstanding",
                    account.user_id, contract.contract_id, account.outstanding_platform_fees
                );
                self.producers.publish_notification(Notification::account_suspended(&account, &contract)).await;
            },
            (BillingStage::Suspension, None) => {
                error!("🕰️ Contract {} was suspended without an account record", contract.contract_id);
            },
            (stage, _) => {
                debug!("🕰️ Sending {stage:?} for contract {}", contract.contract_id);
                self.producers.publish_notification(Notification::fee_reminder(&contract, stage)).await;
            },
        }
    }
}
