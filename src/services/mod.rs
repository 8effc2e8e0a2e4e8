//! External service integrations

pub mod archive;
pub mod error;
pub mod media;
pub mod retry;

pub use archive::{ArchiveChannel, ArchiveClient, ArchiveVideo};
pub use error::{ClientError, Result};
pub use media::{ItemUpdate, MediaClient, MediaItem, PROVIDER_SLOT};
pub use retry::{RetryConfig, retry_async};

use chrono::NaiveDate;

/// Parse the date formats both remote APIs emit: plain dates, RFC 3339
/// timestamps, and timestamp-like strings with a leading date.
pub(crate) fn parse_wire_date(value: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(stamp) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(stamp.date_naive());
    }
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 1, 15).unwrap();
        assert_eq!(parse_wire_date("2023-01-15"), Some(expected));
        assert_eq!(parse_wire_date("2023-01-15T10:30:00Z"), Some(expected));
        assert_eq!(
            parse_wire_date("2023-01-15T00:00:00.0000000Z"),
            Some(expected)
        );
        assert_eq!(parse_wire_date("not a date"), None);
        assert_eq!(parse_wire_date(""), None);
    }
}
