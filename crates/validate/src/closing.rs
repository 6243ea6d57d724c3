//! Closing-date parsing and UTC normalization.
//!
//! Tender feeds publish closing dates in several ISO-8601 shapes. Some carry an
//! explicit offset (`2025-10-27T11:00:00+02:00`, `...Z`), many do not
//! (`2025-10-27T11:00:00`, `2025-10-27`). Unqualified values are civil times in a
//! fixed zone supplied by the caller.
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Offset-bearing formats tried after RFC 3339.
const QUALIFIED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A parsed closing timestamp, tagged by whether it named its own offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosingTimestamp {
    /// The text carried `Z` or an explicit `±HH:MM` offset.
    Qualified(DateTime<FixedOffset>),
    /// The text carried no zone information.
    Unqualified(NaiveDateTime),
}

impl ClosingTimestamp {
    /// Parses `text`, returning `None` when no supported shape matches.
    ///
    /// ```rust
    /// use validate::ClosingTimestamp;
    ///
    /// assert!(matches!(
    ///     ClosingTimestamp::parse("2025-10-27T11:00:00+02:00"),
    ///     Some(ClosingTimestamp::Qualified(_))
    /// ));
    /// assert!(matches!(
    ///     ClosingTimestamp::parse("2025-10-27"),
    ///     Some(ClosingTimestamp::Unqualified(_))
    /// ));
    /// assert!(ClosingTimestamp::parse("not-a-date").is_none());
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(Self::Qualified(dt));
        }
        for fmt in QUALIFIED_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
                return Some(Self::Qualified(dt));
            }
        }
        if let Some(naive) = text
            .strip_suffix(['Z', 'z'])
            .and_then(|rest| parse_naive(rest.trim_end()))
        {
            return Some(Self::Qualified(Utc.from_utc_datetime(&naive).fixed_offset()));
        }
        if let Some(naive) = parse_naive(text) {
            return Some(Self::Unqualified(naive));
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(|date| Self::Unqualified(date.and_time(NaiveTime::MIN)))
    }

    /// Whether the source text named its own offset.
    pub fn is_qualified(&self) -> bool {
        matches!(self, Self::Qualified(_))
    }

    /// Converts to UTC, reading unqualified values as civil time at `fallback`.
    ///
    /// A fixed offset has no gaps or folds, so the conversion only fails for
    /// values at the very edge of the representable range.
    pub fn to_utc(&self, fallback: FixedOffset) -> Option<DateTime<Utc>> {
        match self {
            Self::Qualified(dt) => Some(dt.with_timezone(&Utc)),
            Self::Unqualified(naive) => fallback
                .from_local_datetime(naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn utc_plus_two() -> FixedOffset {
        let Some(offset) = FixedOffset::east_opt(7200) else {
            panic!("invalid offset");
        };
        offset
    }

    #[test]
    fn parses_supported_shapes() {
        let qualified = [
            "2025-10-27T11:00:00Z",
            "2025-10-27T11:00:00+02:00",
            "2025-10-27T11:00:00.123-05:00",
            "2025-10-27 11:00:00+0200",
            "2025-10-27T11:00+02:00",
            "2025-10-27T11:00+0200",
            "2025-10-27T11:00Z",
            "2025-10-27 11:00+02:00",
        ];
        for text in qualified {
            let parsed = ClosingTimestamp::parse(text);
            assert!(
                matches!(parsed, Some(ClosingTimestamp::Qualified(_))),
                "{text} should parse as qualified"
            );
        }

        let unqualified = [
            "2025-10-27",
            "2025-10-27T11:00:00",
            "2025-10-27T11:00:00.5",
            "2025-10-27 11:00:00",
            "2025-10-27T11:00",
        ];
        for text in unqualified {
            let parsed = ClosingTimestamp::parse(text);
            assert!(
                matches!(parsed, Some(ClosingTimestamp::Unqualified(_))),
                "{text} should parse as unqualified"
            );
        }
    }

    #[test]
    fn rejects_garbage() {
        for text in ["", "   ", "not-a-date", "27/10/2025", "2025-13-40"] {
            assert!(ClosingTimestamp::parse(text).is_none(), "{text:?}");
        }
    }

    #[test]
    fn unqualified_time_uses_fallback_offset() {
        let Some(parsed) = ClosingTimestamp::parse("2025-10-27T01:00:00") else {
            panic!("should parse");
        };
        let Some(utc) = parsed.to_utc(utc_plus_two()) else {
            panic!("should convert");
        };
        // 01:00 at UTC+2 is 23:00 on the previous UTC day.
        assert_eq!(utc.date_naive().to_string(), "2025-10-26");
        assert_eq!(utc.hour(), 23);
    }

    #[test]
    fn qualified_time_ignores_fallback_offset() {
        let Some(parsed) = ClosingTimestamp::parse("2025-10-27T01:00:00Z") else {
            panic!("should parse");
        };
        assert!(parsed.is_qualified());
        let Some(utc) = parsed.to_utc(utc_plus_two()) else {
            panic!("should convert");
        };
        assert_eq!(utc.date_naive().to_string(), "2025-10-27");
        assert_eq!(utc.hour(), 1);
    }
}
