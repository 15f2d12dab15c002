use chrono::{DateTime, FixedOffset};

use crate::error::TraceError;

/// Inclusive `[from, to]` window over trace timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<FixedOffset>,
    pub to: DateTime<FixedOffset>,
}

impl DateRange {
    /// Rejects `from > to`. Comparison is by instant, so mixed offsets are fine.
    pub fn new(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> Result<Self, TraceError> {
        if from > to {
            return Err(TraceError::InvalidRange {
                from: from.to_rfc3339(),
                to: to.to_rfc3339(),
            });
        }
        Ok(Self { from, to })
    }

    /// Parse both bounds from their textual query-parameter form.
    pub fn parse(from: &str, to: &str) -> Result<Self, TraceError> {
        let from = parse_timestamp("from", from)?;
        let to = parse_timestamp("to", to)?;
        Self::new(from, to)
    }

    pub fn contains(&self, ts: &DateTime<FixedOffset>) -> bool {
        self.from <= *ts && *ts <= self.to
    }
}

/// Parse an ISO-8601 timestamp with an explicit offset.
///
/// Besides strict RFC 3339 this accepts minute precision
/// (`2024-01-01T10:00+01:00`) and a space in place of the offset's `+`, which
/// is what an unencoded `+` turns into inside a query string.
pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<FixedOffset>, TraceError> {
    let trimmed = value.trim();
    if let Some(ts) = parse_iso_offset(trimmed) {
        return Ok(ts);
    }

    if let Some(idx) = trimmed.rfind(' ') {
        let mut repaired = trimmed.to_string();
        repaired.replace_range(idx..=idx, "+");
        if let Some(ts) = parse_iso_offset(&repaired) {
            return Ok(ts);
        }
    }

    Err(TraceError::InvalidTimestamp {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn parse_iso_offset(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z"))
        .ok()
}
