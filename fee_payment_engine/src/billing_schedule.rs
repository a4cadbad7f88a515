//! The platform fee billing clock.
//!
//! The stage a contract is in is derived from how long ago billing started, every time it is looked at, so a run that
//! was missed (or a contract that was never processed) lands on the right stage the next time round. Reminder tags
//! recorded on the contract only stop a stage from being repeated; they are never needed to reach a later stage.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Contract, ContractStatus, PlatformFeeStatus, ReminderTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPolicy {
    pub first_reminder_after: Duration,
    pub final_warning_after: Duration,
    pub suspend_after: Duration,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            first_reminder_after: Duration::days(1),
            final_warning_after: Duration::days(2),
            suspend_after: Duration::days(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStage {
    FirstReminder,
    FinalWarning,
    Suspension,
}

impl BillingStage {
    pub fn reminder_tag(&self) -> Option<ReminderTag> {
        match self {
            BillingStage::FirstReminder => Some(ReminderTag::Day1),
            BillingStage::FinalWarning => Some(ReminderTag::Day2),
            BillingStage::Suspension => None,
        }
    }
}

impl BillingPolicy {
    pub fn due_date(&self, billing_started_at: DateTime<Utc>) -> DateTime<Utc> {
        billing_started_at + self.suspend_after
    }

    /// Whether the billing clock applies to this contract at all.
    pub fn is_billable(contract: &Contract) -> bool {
        !contract.platform_fee_paid &&
            contract.platform_fee_billing_started_at.is_some() &&
            !matches!(contract.status, ContractStatus::Cancelled | ContractStatus::Draft)
    }

    /// The stage that should run for `contract` at `now`, if any. Only the highest stage that applies is considered,
    /// so a long-overdue contract goes straight to suspension without earlier reminders.
    pub fn stage_for(&self, contract: &Contract, now: DateTime<Utc>) -> Option<BillingStage> {
        if !Self::is_billable(contract) {
            return None;
        }
        let started = contract.platform_fee_billing_started_at?;
        let due = contract.platform_fee_due_date.unwrap_or_else(|| self.due_date(started));
        let elapsed = now - started;
        let stage = if now >= due {
            BillingStage::Suspension
        } else if elapsed >= self.final_warning_after {
            BillingStage::FinalWarning
        } else if elapsed >= self.first_reminder_after {
            BillingStage::FirstReminder
        } else {
            return None;
        };
        let done = match stage.reminder_tag() {
            Some(tag) => contract.has_reminder(tag),
            None => contract.platform_fee_status == PlatformFeeStatus::Overdue,
        };
        (!done).then_some(stage)
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;
    use crate::db_types::{Centavos, ListingType};

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
    }

    fn contract() -> Contract {
        Contract {
            contract_id: "ctr_1".into(),
            bid_id: "bid_1".into(),
            listing_type: ListingType::Truck,
            listing_owner_id: "trucker".into(),
            bidder_id: "shipper".into(),
            agreed_price: Centavos::from_pesos(10_000),
            platform_fee_payer_id: "trucker".into(),
            platform_fee: Centavos::from_pesos(500),
            platform_fee_paid: false,
            platform_fee_status: PlatformFeeStatus::Unpaid,
            platform_fee_order_id: None,
            platform_fee_billing_started_at: Some(started()),
            platform_fee_due_date: Some(started() + Duration::days(3)),
            platform_fee_reminders: vec![],
            status: ContractStatus::PendingPayment,
            created_at: started(),
            updated_at: started(),
        }
    }

    #[test]
    fn stages_follow_elapsed_time() {
        let policy = BillingPolicy::default();
        let c = contract();
        assert_eq!(policy.stage_for(&c, started() + Duration::hours(23)), None);
        assert_eq!(policy.stage_for(&c, started() + Duration::days(1)), Some(BillingStage::FirstReminder));
        assert_eq!(policy.stage_for(&c, started() + Duration::hours(50)), Some(BillingStage::FinalWarning));
        assert_eq!(policy.stage_for(&c, started() + Duration::days(3)), Some(BillingStage::Suspension));
    }

    #[test]
    fn long_overdue_contracts_skip_straight_to_suspension() {
        let policy = BillingPolicy::default();
        assert_eq!(policy.stage_for(&contract(), started() + Duration::days(10)), Some(BillingStage::Suspension));
    }

    #[test]
    fn stages_run_once() {
        let policy = BillingPolicy::default();
        let mut c = contract();
        c.platform_fee_reminders = vec![ReminderTag::Day1];
        assert_eq!(policy.stage_for(&c, started() + Duration::hours(30)), None);
        // day 2 reached without a day 1 reminder on record: no retroactive day 1
        let mut c = contract();
        c.platform_fee_reminders = vec![ReminderTag::Day2];
        assert_eq!(policy.stage_for(&c, started() + Duration::hours(60)), None);
        let mut c = contract();
        c.platform_fee_status = PlatformFeeStatus::Overdue;
        assert_eq!(policy.stage_for(&c, started() + Duration::days(5)), None);
    }

    #[test]
    fn paid_cancelled_and_unstarted_contracts_are_ignored() {
        let policy = BillingPolicy::default();
        let late = started() + Duration::days(5);
        let mut c = contract();
        c.platform_fee_paid = true;
        assert_eq!(policy.stage_for(&c, late), None);
        let mut c = contract();
        c.status = ContractStatus::Cancelled;
        assert_eq!(policy.stage_for(&c, late), None);
        let mut c = contract();
        c.platform_fee_billing_started_at = None;
        assert_eq!(policy.stage_for(&c, late), None);
    }

    #[test]
    fn missing_due_date_falls_back_to_policy() {
        let policy = BillingPolicy::default();
        let mut c = contract();
        c.platform_fee_due_date = None;
        assert_eq!(policy.stage_for(&c, started() + Duration::hours(71)), Some(BillingStage::FinalWarning));
        assert_eq!(policy.stage_for(&c, started() + Duration::hours(72)), Some(BillingStage::Suspension));
    }
}
