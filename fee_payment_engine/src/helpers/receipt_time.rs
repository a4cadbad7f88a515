use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Receipts without an explicit zone are stamped in Philippine time.
pub const RECEIPT_UTC_OFFSET_SECS: i32 = 8 * 3600;

const FORMATS: [&str; 10] = [
    "%b %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M:%S %p",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m-%d-%Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d %b %Y %H:%M",
    "%m/%d/%Y %H:%M",
];

/// Parses the timestamp printed on a payment receipt. Returns `None` for text that matches none of the known layouts.
pub fn parse_receipt_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let cleaned = text.split_whitespace().filter(|w| !w.eq_ignore_ascii_case("at")).collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&cleaned) {
        return Some(dt.with_timezone(&Utc));
    }
    let offset = FixedOffset::east_opt(RECEIPT_UTC_OFFSET_SECS)?;
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&cleaned, fmt).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn wallet_receipt_layouts() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 17, 7, 45, 0).unwrap();
        assert_eq!(parse_receipt_timestamp("Oct 17, 2026 3:45 PM"), Some(expected));
        assert_eq!(parse_receipt_timestamp("Oct 17, 2026 at 03:45 PM"), Some(expected));
        assert_eq!(parse_receipt_timestamp("October 17, 2026 3:45:00 PM"), Some(expected));
        assert_eq!(parse_receipt_timestamp("10/17/2026 03:45 PM"), Some(expected));
        assert_eq!(parse_receipt_timestamp("2026-10-17 15:45"), Some(expected));
        assert_eq!(parse_receipt_timestamp("2026-10-17T07:45:00Z"), Some(expected));
    }

    #[test]
    fn garbage_does_not_parse() {
        assert_eq!(parse_receipt_timestamp(""), None);
        assert_eq!(parse_receipt_timestamp("yesterday afternoon"), None);
        assert_eq!(parse_receipt_timestamp("Feb 30, 2026 3:45 PM"), None);
    }
}
