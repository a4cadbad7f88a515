//! Fraud scoring for payment evidence.
//!
//! A [`FraudScorer`] is a registry of [`FraudRule`]s. Each rule is a pure function of a [`FraudContext`] that either
//! raises a single [`FraudFlag`] or stays silent. The assessment score is the sum of the raised flags' points, so
//! adding a rule (or a flag) can never lower a score.
//!
//! When extraction failed, only the rules that look at image metadata and payer history have anything to work with;
//! the rules that need receipt text stay silent and the failure itself is flagged as low confidence.
mod rules;

use chrono::{DateTime, Duration, Utc};
use log::*;
pub use rules::{
    AmountMismatchRule,
    DuplicateReferenceRule,
    ImageReuseRule,
    LowConfidenceRule,
    MissingExifRule,
    NewAccountHighValueRule,
    ReceiverMismatchRule,
    SuspiciousDimensionsRule,
    TimestampExpiredRule,
    VelocityRule,
};
use serde::{Deserialize, Serialize};

use crate::db_types::{Centavos, ExtractedData, FraudFlag, FraudRuleKind, ImageMetadata, OcrStatus, SubmissionId};

/// Tunable weights and thresholds for the default rule set.
#[derive(Debug, Clone, PartialEq)]
pub struct FraudConfig {
    pub amount_mismatch_points: u32,
    pub duplicate_reference_points: u32,
    pub duplicate_image_points: u32,
    pub similar_image_points: u32,
    /// Maximum Hamming distance between two 64-bit perceptual hashes for the images to count as similar.
    pub similar_image_max_distance: u32,
    pub receiver_mismatch_points: u32,
    pub platform_receiver_name: String,
    pub min_receiver_similarity: f64,
    pub timestamp_expired_points: u32,
    pub receipt_validity: Duration,
    pub low_confidence_points: u32,
    pub min_ocr_confidence: u8,
    pub suspicious_dimensions_points: u32,
    pub min_image_dimension: u32,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub missing_exif_points: u32,
    pub new_account_points: u32,
    pub new_account_age: Duration,
    pub high_value_threshold: Centavos,
    pub velocity_points: u32,
    pub velocity_window: Duration,
    pub max_submissions_per_window: u32,
    /// How far back to look for reused images.
    pub image_lookback: Duration,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            amount_mismatch_points: 40,
            duplicate_reference_points: 50,
            duplicate_image_points: 35,
            similar_image_points: 20,
            similar_image_max_distance: 10,
            receiver_mismatch_points: 15,
            platform_receiver_name: "TRUCKLINK PLATFORM SERVICES".to_string(),
            min_receiver_similarity: 0.8,
            timestamp_expired_points: 10,
            receipt_validity: Duration::hours(24),
            low_confidence_points: 10,
            min_ocr_confidence: 70,
            suspicious_dimensions_points: 5,
            min_image_dimension: 300,
            min_aspect_ratio: 0.3,
            max_aspect_ratio: 3.5,
            missing_exif_points: 5,
            new_account_points: 15,
            new_account_age: Duration::days(7),
            high_value_threshold: Centavos::from_pesos(5_000),
            velocity_points: 30,
            velocity_window: Duration::hours(1),
            max_submissions_per_window: 5,
            image_lookback: Duration::days(90),
        }
    }
}

/// What is known about the payer and about earlier evidence at the time of scoring.
#[derive(Debug, Clone, Default)]
pub struct ScoringHistory {
    /// Approved submissions (other than this one) that carry the same normalized reference number.
    pub approved_with_same_reference: Vec<SubmissionId>,
    /// Image hashes of earlier submissions within the lookback window, excluding this one.
    pub prior_image_hashes: Vec<(SubmissionId, String)>,
    /// Number of submissions the payer made within the velocity window, including this one.
    pub recent_submissions_by_payer: u32,
    pub payer_account_created_at: Option<DateTime<Utc>>,
}

/// Everything a rule may look at.
#[derive(Debug, Clone)]
pub struct FraudContext<'a> {
    pub order_amount: Centavos,
    pub ocr_status: OcrStatus,
    pub extracted: Option<&'a ExtractedData>,
    pub image: Option<&'a ImageMetadata>,
    pub history: &'a ScoringHistory,
    pub now: DateTime<Utc>,
}

impl<'a> FraudContext<'a> {
    /// Extracted receipt fields, but only when extraction completed.
    pub fn completed_extraction(&self) -> Option<&'a ExtractedData> {
        match self.ocr_status {
            OcrStatus::Completed => self.extracted,
            _ => None,
        }
    }
}

pub trait FraudRule: Send + Sync {
    fn kind(&self) -> FraudRuleKind;
    fn evaluate(&self, ctx: &FraudContext<'_>) -> Option<FraudFlag>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub score: u32,
    pub flags: Vec<FraudFlag>,
}

impl FraudAssessment {
    pub fn has_flag(&self, rule: FraudRuleKind) -> bool {
        self.flags.iter().any(|f| f.rule == rule)
    }

    /// A short, human-readable summary of the raised flags, suitable for a rejection reason.
    pub fn summary(&self) -> String {
        if self.flags.is_empty() {
            return "no risk signals".to_string();
        }
        self.flags.iter().map(|f| format!("{} ({})", f.rule, f.detail)).collect::<Vec<_>>().join("; ")
    }
}

pub struct FraudScorer {
    rules: Vec<Box<dyn FraudRule>>,
}

impl FraudScorer {
    /// A scorer with no rules. Every assessment scores zero.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn new(config: &FraudConfig) -> Self {
        Self::empty()
            .with_rule(AmountMismatchRule::new(config))
            .with_rule(DuplicateReferenceRule::new(config))
            .with_rule(ImageReuseRule::new(config))
            .with_rule(ReceiverMismatchRule::new(config))
            .with_rule(TimestampExpiredRule::new(config))
            .with_rule(LowConfidenceRule::new(config))
            .with_rule(SuspiciousDimensionsRule::new(config))
            .with_rule(MissingExifRule::new(config))
            .with_rule(NewAccountHighValueRule::new(config))
            .with_rule(VelocityRule::new(config))
    }

    pub fn with_rule<R: FraudRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_kinds(&self) -> Vec<FraudRuleKind> {
        self.rules.iter().map(|r| r.kind()).collect()
    }

    pub fn assess(&self, ctx: &FraudContext<'_>) -> FraudAssessment {
        let flags = self.rules.iter().filter_map(|rule| rule.evaluate(ctx)).collect::<Vec<_>>();
        let score = flags.iter().fold(0u32, |acc, f| acc.saturating_add(f.score));
        trace!("🔍️ {} rules raised {} flags for a score of {score}", self.rules.len(), flags.len());
        FraudAssessment { score, flags }
    }
}

impl Default for FraudScorer {
    fn default() -> Self {
        Self::new(&FraudConfig::default())
    }
}
