//! Conversion between the domain's offset-aware timestamps and BSON dates.
//!
//! BSON dates carry only an absolute instant at millisecond precision. Reads
//! rebuild an offset-aware value at the host's local offset *at read time*,
//! so the offset a caller wrote with is not recovered.

use chrono::{DateTime, FixedOffset, Local, Utc};

/// Offset applied when reading dates back from the store.
pub fn local_offset() -> FixedOffset {
    *Local::now().offset()
}

/// Write direction: keep the instant, drop the offset.
pub fn to_store(ts: &DateTime<FixedOffset>) -> bson::DateTime {
    bson::DateTime::from_chrono(ts.with_timezone(&Utc))
}

/// Read direction: re-attach the current local offset.
pub fn from_store(value: bson::DateTime) -> DateTime<FixedOffset> {
    value.to_chrono().with_timezone(&local_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_round_trip_preserves_instant() {
        let original = DateTime::parse_from_rfc3339("2024-01-01T10:00:00.123+05:30").unwrap();
        let restored = from_store(to_store(&original));
        assert_eq!(restored.timestamp_millis(), original.timestamp_millis());
        // DateTime equality compares instants, not offsets
        assert_eq!(restored, original);
    }

    #[test]
    fn test_round_trip_uses_reader_local_offset() {
        let original = DateTime::parse_from_rfc3339("2024-06-15T08:30:00+09:45").unwrap();
        let restored = from_store(to_store(&original));
        assert_eq!(*restored.offset(), local_offset());
    }

    #[test]
    fn test_write_keeps_only_millisecond_precision() {
        let with_nanos = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
            .unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let stored = to_store(&with_nanos);
        assert_eq!(stored.timestamp_millis() % 1000, 123);

        let restored = from_store(stored);
        assert_eq!(restored.timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn test_write_is_offset_independent() {
        let utc = DateTime::parse_from_rfc3339("2024-01-01T10:00:00+00:00").unwrap();
        let shifted = DateTime::parse_from_rfc3339("2024-01-01T12:00:00+02:00").unwrap();
        assert_eq!(to_store(&utc), to_store(&shifted));
    }
}
