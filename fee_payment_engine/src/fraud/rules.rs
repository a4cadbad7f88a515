use chrono::Duration;

use super::{FraudConfig, FraudContext, FraudRule};
use crate::{
    db_types::{Centavos, FraudFlag, FraudRuleKind, OcrStatus},
    helpers::{hamming_distance, parse_receipt_timestamp, receiver_similarity},
};

fn flag(rule: FraudRuleKind, score: u32, detail: String) -> Option<FraudFlag> {
    Some(FraudFlag { rule, score, detail })
}

//--------------------------------------   Receipt text rules  ---------------------------------------------------------

/// The amount on the receipt must equal the order amount. An unreadable amount counts as a mismatch.
pub struct AmountMismatchRule {
    points: u32,
}

impl AmountMismatchRule {
    pub fn new(config: &FraudConfig) -> Self {
        Self { points: config.amount_mismatch_points }
    }
}

impl FraudRule for AmountMismatchRule {
    fn kind(&self) -> FraudRuleKind {
        FraudRuleKind::AmountMismatch
    }

    fn evaluate(&self, ctx: &FraudContext<'_>) -> Option<FraudFlag> {
        let data = ctx.completed_extraction()?;
        match data.amount {
            Some(amount) if amount == ctx.order_amount => None,
            Some(amount) => {
                flag(self.kind(), self.points, format!("receipt shows {amount}, order is for {}", ctx.order_amount))
            },
            None => flag(self.kind(), self.points, "amount could not be read".to_string()),
        }
    }
}

/// A reference number may back at most one approved payment.
pub struct DuplicateReferenceRule {
    points: u32,
}

impl DuplicateReferenceRule {
    pub fn new(config: &FraudConfig) -> Self {
        Self { points: config.duplicate_reference_points }
    }
}

impl FraudRule for DuplicateReferenceRule {
    fn kind(&self) -> FraudRuleKind {
        FraudRuleKind::DuplicateReference
    }

    fn evaluate(&self, ctx: &FraudContext<'_>) -> Option<FraudFlag> {
        ctx.completed_extraction()?;
        let first = ctx.history.approved_with_same_reference.first()?;
        flag(self.kind(), self.points, format!("reference already used by approved submission {first}"))
    }
}

pub struct ReceiverMismatchRule {
    points: u32,
    expected: String,
    min_similarity: f64,
}

impl ReceiverMismatchRule {
    pub fn new(config: &FraudConfig) -> Self {
        Self {
            points: config.receiver_mismatch_points,
            expected: config.platform_receiver_name.clone(),
            min_similarity: config.min_receiver_similarity,
        }
    }
}

impl FraudRule for ReceiverMismatchRule {
    fn kind(&self) -> FraudRuleKind {
        FraudRuleKind::ReceiverMismatch
    }

    fn evaluate(&self, ctx: &FraudContext<'_>) -> Option<FraudFlag> {
        let data = ctx.completed_extraction()?;
        let receiver = data.receiver_name.as_deref().unwrap_or_default();
        let similarity = receiver_similarity(receiver, &self.expected);
        if similarity >= self.min_similarity {
            return None;
        }
        flag(self.kind(), self.points, format!("receiver '{receiver}' matches the platform account at {similarity:.2}"))
    }
}

/// Receipts older than the validity window are stale. Timestamps that cannot be parsed are not held against the payer.
pub struct TimestampExpiredRule {
    points: u32,
    validity: Duration,
}

impl TimestampExpiredRule {
    pub fn new(config: &FraudConfig) -> Self {
        Self { points: config.timestamp_expired_points, validity: config.receipt_validity }
    }
}

impl FraudRule for TimestampExpiredRule {
    fn kind(&self) -> FraudRuleKind {
        FraudRuleKind::TimestampExpired
    }

    fn evaluate(&self, ctx: &FraudContext<'_>) -> Option<FraudFlag> {
        let data = ctx.completed_extraction()?;
        let paid_at = parse_receipt_timestamp(data.timestamp_text.as_deref()?)?;
        let age = ctx.now - paid_at;
        if age <= self.validity {
            return None;
        }
        flag(self.kind(), self.points, format!("receipt is {} hours old", age.num_hours()))
    }
}

pub struct LowConfidenceRule {
    points: u32,
    min_confidence: u8,
}

impl LowConfidenceRule {
    pub fn new(config: &FraudConfig) -> Self {
        Self { points: config.low_confidence_points, min_confidence: config.min_ocr_confidence }
    }
}

impl FraudRule for LowConfidenceRule {
    fn kind(&self) -> FraudRuleKind {
        FraudRuleKind::LowOcrConfidence
    }

    fn evaluate(&self, ctx: &FraudContext<'_>) -> Option<FraudFlag> {
        match (ctx.ocr_status, ctx.extracted) {
            (OcrStatus::Completed, Some(data)) if data.confidence >= self.min_confidence => None,
            (OcrStatus::Completed, Some(data)) => {
                let detail = format!("extraction confidence {} is below {}", data.confidence, self.min_confidence);
                flag(self.kind(), self.points, detail)
            },
            _ => flag(self.kind(), self.points, "extraction failed".to_string()),
        }
    }
}

//--------------------------------------   Image rules         ---------------------------------------------------------

/// Flags an image that was seen before, either byte-for-byte in hash terms or within a small Hamming distance.
/// Only the stronger of the two signals is raised.
pub struct ImageReuseRule {
    duplicate_points: u32,
    similar_points: u32,
    max_distance: u32,
}

impl ImageReuseRule {
    pub fn new(config: &FraudConfig) -> Self {
        Self {
            duplicate_points: config.duplicate_image_points,
            similar_points: config.similar_image_points,
            max_distance: config.similar_image_max_distance,
        }
    }
}

impl FraudRule for ImageReuseRule {
    fn kind(&self) -> FraudRuleKind {
        FraudRuleKind::DuplicateImage
    }

    fn evaluate(&self, ctx: &FraudContext<'_>) -> Option<FraudFlag> {
        let hash = ctx.image?.image_hash.as_str();
        let prior = &ctx.history.prior_image_hashes;
        if let Some((id, _)) = prior.iter().find(|(_, h)| h.eq_ignore_ascii_case(hash)) {
            return flag(FraudRuleKind::DuplicateImage, self.duplicate_points, format!("same image as submission {id}"));
        }
        let (id, distance) = prior
            .iter()
            .filter_map(|(id, h)| hamming_distance(hash, h).map(|d| (id, d)))
            .filter(|(_, d)| *d <= self.max_distance)
            .min_by_key(|(_, d)| *d)?;
        let detail = format!("image within {distance} bits of submission {id}");
        flag(FraudRuleKind::SimilarImage, self.similar_points, detail)
    }
}

pub struct SuspiciousDimensionsRule {
    points: u32,
    min_dimension: u32,
    min_ratio: f64,
    max_ratio: f64,
}

impl SuspiciousDimensionsRule {
    pub fn new(config: &FraudConfig) -> Self {
        Self {
            points: config.suspicious_dimensions_points,
            min_dimension: config.min_image_dimension,
            min_ratio: config.min_aspect_ratio,
            max_ratio: config.max_aspect_ratio,
        }
    }
}

impl FraudRule for SuspiciousDimensionsRule {
    fn kind(&self) -> FraudRuleKind {
        FraudRuleKind::SuspiciousDimensions
    }

    fn evaluate(&self, ctx: &FraudContext<'_>) -> Option<FraudFlag> {
        let image = ctx.image?;
        let detail = format!("{}x{}", image.width, image.height);
        if image.width < self.min_dimension || image.height < self.min_dimension {
            return flag(self.kind(), self.points, format!("{detail} is too small"));
        }
        let ratio = f64::from(image.width) / f64::from(image.height);
        if ratio < self.min_ratio || ratio > self.max_ratio {
            return flag(self.kind(), self.points, format!("{detail} has an unusual aspect ratio"));
        }
        None
    }
}

pub struct MissingExifRule {
    points: u32,
}

impl MissingExifRule {
    pub fn new(config: &FraudConfig) -> Self {
        Self { points: config.missing_exif_points }
    }
}

impl FraudRule for MissingExifRule {
    fn kind(&self) -> FraudRuleKind {
        FraudRuleKind::MissingExif
    }

    fn evaluate(&self, ctx: &FraudContext<'_>) -> Option<FraudFlag> {
        if ctx.image?.has_exif_metadata {
            return None;
        }
        flag(self.kind(), self.points, "image carries no EXIF metadata".to_string())
    }
}

//--------------------------------------   Payer rules         ---------------------------------------------------------

pub struct NewAccountHighValueRule {
    points: u32,
    max_age: Duration,
    threshold: Centavos,
}

impl NewAccountHighValueRule {
    pub fn new(config: &FraudConfig) -> Self {
        Self {
            points: config.new_account_points,
            max_age: config.new_account_age,
            threshold: config.high_value_threshold,
        }
    }
}

impl FraudRule for NewAccountHighValueRule {
    fn kind(&self) -> FraudRuleKind {
        FraudRuleKind::NewAccountHighValue
    }

    fn evaluate(&self, ctx: &FraudContext<'_>) -> Option<FraudFlag> {
        let created_at = ctx.history.payer_account_created_at?;
        let age = ctx.now - created_at;
        if age >= self.max_age || ctx.order_amount <= self.threshold {
            return None;
        }
        flag(
            self.kind(),
            self.points,
            format!("{} payment from an account {} days old", ctx.order_amount, age.num_days()),
        )
    }
}

pub struct VelocityRule {
    points: u32,
    max_submissions: u32,
}

impl VelocityRule {
    pub fn new(config: &FraudConfig) -> Self {
        Self { points: config.velocity_points, max_submissions: config.max_submissions_per_window }
    }
}

impl FraudRule for VelocityRule {
    fn kind(&self) -> FraudRuleKind {
        FraudRuleKind::VelocityExceeded
    }

    fn evaluate(&self, ctx: &FraudContext<'_>) -> Option<FraudFlag> {
        let count = ctx.history.recent_submissions_by_payer;
        if count <= self.max_submissions {
            return None;
        }
        flag(self.kind(), self.points, format!("{count} submissions in the velocity window"))
    }
}

#[cfg(test)]
mod test {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::{
        db_types::{ExtractedData, ImageMetadata},
        fraud::ScoringHistory,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 4, 0, 0).unwrap()
    }

    fn receipt() -> ExtractedData {
        ExtractedData {
            reference_number: Some("ABC123".into()),
            amount: Some(Centavos::from_pesos(500)),
            receiver_name: Some("TRUCKLINK PLATFORM SERVICES".into()),
            timestamp_text: Some("Oct 17, 2026 11:30 AM".into()),
            confidence: 90,
        }
    }

    fn image(hash: &str, width: u32, height: u32) -> ImageMetadata {
        ImageMetadata { image_hash: hash.into(), width, height, has_exif_metadata: true }
    }

    fn ctx<'a>(data: &'a ExtractedData, img: &'a ImageMetadata, history: &'a ScoringHistory) -> FraudContext<'a> {
        FraudContext {
            order_amount: Centavos::from_pesos(500),
            ocr_status: OcrStatus::Completed,
            extracted: Some(data),
            image: Some(img),
            history,
            now: now(),
        }
    }

    #[test]
    fn amount_rule() {
        let rule = AmountMismatchRule::new(&FraudConfig::default());
        let history = ScoringHistory::default();
        let img = image("00", 1000, 2000);
        let mut data = receipt();
        assert!(rule.evaluate(&ctx(&data, &img, &history)).is_none());
        data.amount = None;
        let flag = rule.evaluate(&ctx(&data, &img, &history)).unwrap();
        assert_eq!(flag.score, 40);
        assert_eq!(flag.detail, "amount could not be read");
        data.amount = Some(Centavos::from(50_001));
        assert!(rule.evaluate(&ctx(&data, &img, &history)).is_some());
    }

    #[test]
    fn duplicate_reference_rule() {
        let rule = DuplicateReferenceRule::new(&FraudConfig::default());
        let (data, img) = (receipt(), image("00", 1000, 2000));
        let mut history = ScoringHistory::default();
        assert!(rule.evaluate(&ctx(&data, &img, &history)).is_none());
        history.approved_with_same_reference.push("sub_1".into());
        let flag = rule.evaluate(&ctx(&data, &img, &history)).unwrap();
        assert_eq!((flag.rule, flag.score), (FraudRuleKind::DuplicateReference, 50));
    }

    #[test]
    fn image_reuse_prefers_the_stronger_signal() {
        let rule = ImageReuseRule::new(&FraudConfig::default());
        let data = receipt();
        let img = image("ffff0000ffff0000", 1000, 2000);
        let mut history = ScoringHistory {
            prior_image_hashes: vec![("sub_far".into(), "0000ffff0000ffff".into())],
            ..Default::default()
        };
        assert!(rule.evaluate(&ctx(&data, &img, &history)).is_none());
        history.prior_image_hashes.push(("sub_near".into(), "ffff0000ffff00ff".into()));
        let flag = rule.evaluate(&ctx(&data, &img, &history)).unwrap();
        assert_eq!((flag.rule, flag.score), (FraudRuleKind::SimilarImage, 20));
        assert!(flag.detail.contains("sub_near"));
        history.prior_image_hashes.push(("sub_same".into(), "FFFF0000FFFF0000".into()));
        let flag = rule.evaluate(&ctx(&data, &img, &history)).unwrap();
        assert_eq!((flag.rule, flag.score), (FraudRuleKind::DuplicateImage, 35));
    }

    #[test]
    fn similar_image_boundary() {
        let rule = ImageReuseRule::new(&FraudConfig::default());
        let data = receipt();
        let img = image("0000000000000000", 1000, 2000);
        // 10 bits set
        let history =
            ScoringHistory { prior_image_hashes: vec![("s".into(), "00000000000003ff".into())], ..Default::default() };
        assert!(rule.evaluate(&ctx(&data, &img, &history)).is_some());
        // 11 bits set
        let history =
            ScoringHistory { prior_image_hashes: vec![("s".into(), "00000000000007ff".into())], ..Default::default() };
        assert!(rule.evaluate(&ctx(&data, &img, &history)).is_none());
    }

    #[test]
    fn stale_receipts() {
        let rule = TimestampExpiredRule::new(&FraudConfig::default());
        let (mut data, img, history) = (receipt(), image("00", 1000, 2000), ScoringHistory::default());
        assert!(rule.evaluate(&ctx(&data, &img, &history)).is_none());
        data.timestamp_text = Some("Oct 15, 2026 11:30 AM".into());
        let flag = rule.evaluate(&ctx(&data, &img, &history)).unwrap();
        assert_eq!(flag.detail, "receipt is 48 hours old");
        data.timestamp_text = Some("sometime last week".into());
        assert!(rule.evaluate(&ctx(&data, &img, &history)).is_none());
        data.timestamp_text = None;
        assert!(rule.evaluate(&ctx(&data, &img, &history)).is_none());
    }

    #[test]
    fn dimensions() {
        let rule = SuspiciousDimensionsRule::new(&FraudConfig::default());
        let (data, history) = (receipt(), ScoringHistory::default());
        let ok = image("00", 1080, 2340);
        assert!(rule.evaluate(&ctx(&data, &ok, &history)).is_none());
        let small = image("00", 299, 2340);
        assert!(rule.evaluate(&ctx(&data, &small, &history)).is_some());
        let banner = image("00", 3000, 400);
        assert!(rule.evaluate(&ctx(&data, &banner, &history)).is_some());
        let zero = image("00", 0, 0);
        assert!(rule.evaluate(&ctx(&data, &zero, &history)).is_some());
    }

    #[test]
    fn new_accounts_and_velocity() {
        let config = FraudConfig::default();
        let rule = NewAccountHighValueRule::new(&config);
        let (data, img) = (receipt(), image("00", 1000, 2000));
        let mut history =
            ScoringHistory { payer_account_created_at: Some(now() - Duration::days(2)), ..Default::default() };
        let mut c = ctx(&data, &img, &history);
        assert!(rule.evaluate(&c).is_none(), "₱500 is not high value");
        c.order_amount = Centavos::from_pesos(5_001);
        assert!(rule.evaluate(&c).is_some());
        history.payer_account_created_at = Some(now() - Duration::days(8));
        let mut c = ctx(&data, &img, &history);
        c.order_amount = Centavos::from_pesos(5_001);
        assert!(rule.evaluate(&c).is_none());

        let rule = VelocityRule::new(&config);
        history.recent_submissions_by_payer = 5;
        assert!(rule.evaluate(&ctx(&data, &img, &history)).is_none());
        history.recent_submissions_by_payer = 6;
        assert_eq!(rule.evaluate(&ctx(&data, &img, &history)).unwrap().score, 30);
    }
}
