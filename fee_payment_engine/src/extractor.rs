//! The contract with the evidence extraction service.
//!
//! Extraction itself (OCR, perceptual hashing) happens outside the engine. The engine only needs an implementation of
//! [`EvidenceExtractor`], or a caller that delivers [`ExtractionOutcome`]s to
//! [`crate::VerificationApi::process_extraction`].
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{ExtractedData, ImageMetadata, OcrStatus},
    fpe_api::errors::FeeEngineError,
};

/// Extraction confidence is a percentage.
pub const MAX_CONFIDENCE: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Completed {
        data: ExtractedData,
        image: ImageMetadata,
    },
    /// Reading the receipt failed. Image metadata may still be available.
    Failed {
        image: Option<ImageMetadata>,
        reason: String,
    },
}

impl ExtractionOutcome {
    pub fn ocr_status(&self) -> OcrStatus {
        match self {
            ExtractionOutcome::Completed { .. } => OcrStatus::Completed,
            ExtractionOutcome::Failed { .. } => OcrStatus::Failed,
        }
    }

    pub fn data(&self) -> Option<&ExtractedData> {
        match self {
            ExtractionOutcome::Completed { data, .. } => Some(data),
            ExtractionOutcome::Failed { .. } => None,
        }
    }

    pub fn image(&self) -> Option<&ImageMetadata> {
        match self {
            ExtractionOutcome::Completed { image, .. } => Some(image),
            ExtractionOutcome::Failed { image, .. } => image.as_ref(),
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            ExtractionOutcome::Completed { .. } => None,
            ExtractionOutcome::Failed { reason, .. } => Some(reason),
        }
    }
    /// Rejects outcomes the scorer cannot interpret.
    pub fn validate(&self) -> Result<(), FeeEngineError> {
        match self.data() {
            Some(data) if data.confidence > MAX_CONFIDENCE => Err(FeeEngineError::InvalidArgument(format!(
                "Extraction confidence must be between 0 and {MAX_CONFIDENCE}, got {}",
                data.confidence
            ))),
            _ => Ok(()),
        }
    }
}

/// Turns an uploaded evidence image into structured fields. Implementations must not return an error for an
/// unreadable receipt; that is an [`ExtractionOutcome::Failed`].
#[allow(async_fn_in_trait)]
pub trait EvidenceExtractor {
    async fn extract(&self, evidence_ref: &str) -> ExtractionOutcome;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn outcome_wire_format() {
        let json = r#"{"status":"failed","image":null,"reason":"blurry"}"#;
        let outcome: ExtractionOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome.ocr_status(), OcrStatus::Failed);
        assert_eq!(outcome.failure_reason(), Some("blurry"));
        assert!(outcome.data().is_none());

        let json = r#"{
            "status": "completed",
            "data": {"reference_number": "123", "amount": 50000, "receiver_name": null, "timestamp_text": null,
                     "confidence": 88},
            "image": {"image_hash": "ab", "width": 800, "height": 1600, "has_exif_metadata": false}
        }"#;
        let outcome: ExtractionOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome.ocr_status(), OcrStatus::Completed);
        assert_eq!(outcome.data().and_then(|d| d.amount).map(|a| a.value()), Some(50_000));
        assert_eq!(outcome.image().map(|i| i.width), Some(800));
        assert!(outcome.validate().is_ok());
    }

    #[test]
    fn confidence_above_100_is_invalid() {
        let data = ExtractedData {
            reference_number: Some("123".into()),
            amount: None,
            receiver_name: None,
            timestamp_text: None,
            confidence: 101,
        };
        let image = ImageMetadata { image_hash: "ab".into(), width: 800, height: 1600, has_exif_metadata: true };
        let mut outcome = ExtractionOutcome::Completed { data, image };
        assert!(matches!(outcome.validate(), Err(FeeEngineError::InvalidArgument(_))));
        if let ExtractionOutcome::Completed { data, .. } = &mut outcome {
            data.confidence = MAX_CONFIDENCE;
        }
        assert!(outcome.validate().is_ok());

        let failed = ExtractionOutcome::Failed { image: None, reason: "blurry".into() };
        assert!(failed.validate().is_ok());
    }
}
