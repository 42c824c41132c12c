//! Wall-clock helpers shared by the store and the HTTP layer.

use time::{macros::format_description, OffsetDateTime};

/// Current UTC time as ISO-8601 with millisecond precision, e.g.
/// `2024-05-01T09:30:12.345Z`.
pub fn now_iso8601() -> String {
    format_iso8601(OffsetDateTime::now_utc())
}

/// Formats `at` (converted to UTC) the same way as [`now_iso8601`].
pub fn format_iso8601(at: OffsetDateTime) -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    at.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn formats_with_millisecond_precision() {
        let at = datetime!(2024-05-01 09:30:12.345678 UTC);
        assert_eq!(format_iso8601(at), "2024-05-01T09:30:12.345Z");
    }

    #[test]
    fn converts_offsets_to_utc() {
        let at = datetime!(2024-05-01 11:30:12 +02:00);
        assert_eq!(format_iso8601(at), "2024-05-01T09:30:12.000Z");
    }
}
