use chrono::Duration;

use crate::{
    billing_schedule::BillingPolicy,
    fee_calculator::FeePolicy,
    fpe_api::errors::FeeEngineError,
    fraud::FraudConfig,
    review_router::RoutingPolicy,
};

/// All the knobs of the engine in one place. The defaults are the production values.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub fees: FeePolicy,
    pub fraud: FraudConfig,
    pub routing: RoutingPolicy,
    pub billing: BillingPolicy,
    /// Pending orders with no evidence under review are expired after this long.
    pub order_expiry: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fees: FeePolicy::default(),
            fraud: FraudConfig::default(),
            routing: RoutingPolicy::default(),
            billing: BillingPolicy::default(),
            order_expiry: Duration::hours(48),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), FeeEngineError> {
        self.routing.validate()?;
        if self.fees.rate_bps == 0 || self.fees.rate_bps > 10_000 {
            return Err(FeeEngineError::InvalidConfiguration(format!(
                "The fee rate must be between 1 and 10000 basis points, not {}",
                self.fees.rate_bps
            )));
        }
        let b = &self.billing;
        if !(b.first_reminder_after < b.final_warning_after && b.final_warning_after < b.suspend_after) {
            return Err(FeeEngineError::InvalidConfiguration(
                "Billing stages must be strictly increasing: first reminder, final warning, suspension".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fraud.min_receiver_similarity) {
            return Err(FeeEngineError::InvalidConfiguration(
                "The receiver similarity threshold must be between 0 and 1".to_string(),
            ));
        }
        if self.order_expiry <= Duration::zero() {
            return Err(FeeEngineError::InvalidConfiguration("The order expiry must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut config = EngineConfig::default();
        config.fees.rate_bps = 0;
        assert!(config.validate().is_err());
        let mut config = EngineConfig::default();
        config.billing.final_warning_after = Duration::days(4);
        assert!(config.validate().is_err());
        let mut config = EngineConfig::default();
        config.routing.auto_approve_max_score = 90;
        assert!(config.validate().is_err());
        let mut config = EngineConfig::default();
        config.fraud.min_receiver_similarity = 1.5;
        assert!(config.validate().is_err());
    }
}
