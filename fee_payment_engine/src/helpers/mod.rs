mod image_hash;
mod receipt_text;
mod receipt_time;

pub use image_hash::hamming_distance;
pub use receipt_text::{normalize_reference, receiver_similarity};
pub use receipt_time::{parse_receipt_timestamp, RECEIPT_UTC_OFFSET_SECS};
