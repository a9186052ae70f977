use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

static ISO_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
static MEDIUM_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:short] [day padding:none], [year]");

/// A `hh:mm:ss` offset inside a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Timestamp {
    /// Parse a `hh:mm:ss` string. Hours may exceed two digits for long streams,
    /// but offsets whose total does not fit in a `u64` are rejected.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split(':');
        let hours = parts.next()?.parse().ok()?;
        let minutes = parts.next()?.parse().ok()?;
        let seconds = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        let stamp = Self {
            hours,
            minutes,
            seconds,
        };
        stamp.total_seconds().map(|_| stamp)
    }

    /// Offset in seconds, or `None` when it overflows.
    #[must_use]
    pub fn total_seconds(self) -> Option<u64> {
        self.hours
            .checked_mul(3600)?
            .checked_add(self.minutes.checked_mul(60)?)?
            .checked_add(self.seconds)
    }
}

/// Parse a strict `YYYY-MM-DD` date. Empty or malformed input yields `None`.
#[must_use]
pub fn parse_date(raw: &str) -> Option<Date> {
    let bytes = raw.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(idx, byte)| idx == 4 || idx == 7 || byte.is_ascii_digit());
    if !shaped {
        return None;
    }
    Date::parse(raw, ISO_DATE_FORMAT).ok()
}

/// Render a `YYYY-MM-DD` string as a medium date such as `Jan 5, 2024`.
///
/// Returns `None` for empty or malformed input so callers can render nothing.
#[must_use]
pub fn display_date(raw: &str) -> Option<String> {
    parse_date(raw).and_then(|date| date.format(MEDIUM_DATE_FORMAT).ok())
}

/// Convert `hh:mm:ss` to total seconds, treating malformed input as zero.
#[must_use]
pub fn time_to_seconds(raw: &str) -> u64 {
    Timestamp::parse(raw)
        .and_then(Timestamp::total_seconds)
        .unwrap_or(0)
}

/// Convert seconds to a zero-padded `hh:mm:ss` string.
#[must_use]
pub fn seconds_to_time(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

fn parse_instant(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).ok()
}

/// Whether an ISO-8601 expiry lies before `now`. Unparseable values never expire.
#[must_use]
pub fn is_expired(expires_at: &str, now: OffsetDateTime) -> bool {
    parse_instant(expires_at).is_some_and(|expiry| expiry < now)
}

/// Format an expiry timestamp with relative-day phrasing, e.g.
/// `Mar 5, 2025 (in 12 days)` or `Feb 1, 2025 (3 days ago)`.
#[must_use]
pub fn format_expiration(expires_at: &str, now: OffsetDateTime) -> String {
    let Some(expiry) = parse_instant(expires_at) else {
        return expires_at.to_string();
    };
    let expiry = expiry.to_offset(now.offset());
    let days = (expiry.date() - now.date()).whole_days();
    let relative = match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        -1 => "yesterday".to_string(),
        d if d > 1 => format!("in {d} days"),
        d => format!("{} days ago", d.unsigned_abs()),
    };
    match expiry.date().format(MEDIUM_DATE_FORMAT) {
        Ok(date) => format!("{date} ({relative})"),
        Err(_) => relative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parse_date_requires_strict_shape() {
        assert!(parse_date("2024-01-05").is_some());
        assert!(parse_date("").is_none());
        assert!(parse_date("2024-1-05").is_none());
        assert!(parse_date("2024-13-01").is_none());
        assert!(parse_date("2024/01/05").is_none());
    }

    #[test]
    fn display_date_uses_medium_style() {
        assert_eq!(display_date("2024-01-05").as_deref(), Some("Jan 5, 2024"));
        assert_eq!(display_date("nope"), None);
    }

    #[test]
    fn time_conversions_agree() {
        assert_eq!(time_to_seconds("01:02:03"), 3723);
        assert_eq!(time_to_seconds("00:01:30"), 90);
        assert_eq!(time_to_seconds(""), 0);
        assert_eq!(time_to_seconds("garbage"), 0);
        assert_eq!(seconds_to_time(3723), "01:02:03");
        assert_eq!(seconds_to_time(0), "00:00:00");
        assert_eq!(seconds_to_time(time_to_seconds("12:00:59")), "12:00:59");
    }

    #[test]
    fn timestamp_rejects_extra_components() {
        assert!(Timestamp::parse("01:02:03:04").is_none());
        assert!(Timestamp::parse("01:02").is_none());
        assert_eq!(
            Timestamp::parse("100:00:01").and_then(Timestamp::total_seconds),
            Some(360_001)
        );
    }

    #[test]
    fn oversized_offsets_are_rejected() {
        let hours = u64::MAX / 3600 + 1;
        let raw = format!("{hours}:00:00");
        assert!(Timestamp::parse(&raw).is_none());
        assert_eq!(time_to_seconds(&raw), 0);
        assert!(Timestamp::parse(&format!("00:{}:00", u64::MAX)).is_none());
        let edge = Timestamp {
            hours: u64::MAX / 3600,
            minutes: 59,
            seconds: 59,
        };
        assert_eq!(edge.total_seconds(), None);
    }

    #[test]
    fn expiry_is_evaluated_against_now() {
        let now = datetime!(2025-03-01 12:00 UTC);
        assert!(is_expired("2025-02-28T00:00:00Z", now));
        assert!(!is_expired("2025-03-02T00:00:00Z", now));
        assert!(!is_expired("not a date", now));
    }

    #[test]
    fn expiration_uses_relative_days() {
        let now = datetime!(2025-03-01 12:00 UTC);
        assert_eq!(
            format_expiration("2025-03-13T08:00:00Z", now),
            "Mar 13, 2025 (in 12 days)"
        );
        assert_eq!(
            format_expiration("2025-03-02T08:00:00Z", now),
            "Mar 2, 2025 (tomorrow)"
        );
        assert_eq!(
            format_expiration("2025-03-01T23:00:00Z", now),
            "Mar 1, 2025 (today)"
        );
        assert_eq!(
            format_expiration("2025-02-26T08:00:00Z", now),
            "Feb 26, 2025 (3 days ago)"
        );
        assert_eq!(format_expiration("soon", now), "soon");
    }
}
