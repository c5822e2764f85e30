use anyhow::{Context, Result, bail};
use time::format_description;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

const DAY_PREFIX_LEN: usize = 10;

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`, the form envelopes are stamped with.
#[must_use]
pub fn format_utc_timestamp(moment: OffsetDateTime) -> String {
    let utc = moment.to_offset(UtcOffset::UTC);
    format!(
        "{}T{:02}:{:02}:{:02}.{:03}Z",
        format_date(utc.date()),
        utc.hour(),
        utc.minute(),
        utc.second(),
        utc.millisecond()
    )
}

#[must_use]
pub fn now_utc_timestamp() -> String {
    format_utc_timestamp(OffsetDateTime::now_utc())
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> Result<Date> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        bail!("date input is empty");
    }

    let format = format_description::parse("[year]-[month]-[day]")
        .context("failed to build calendar date format")?;
    Date::parse(candidate, &format)
        .with_context(|| format!("unsupported date format (expected YYYY-MM-DD): {candidate}"))
}

#[must_use]
pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Calendar day of a stored `create_time` (`YYYY-MM-DD HH:MM:SS`).
#[must_use]
pub fn day_of_timestamp(create_time: &str) -> Option<Date> {
    let prefix = create_time.trim().get(..DAY_PREFIX_LEN)?;
    parse_date(prefix).ok()
}

#[must_use]
pub fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Lower and upper text bounds of the half-open window `[start, end + 1 day)`.
pub fn window_bounds(start: Date, end: Date) -> Result<(String, String)> {
    let exclusive_end = end
        .checked_add(Duration::days(1))
        .ok_or_else(|| anyhow::anyhow!("window end overflows the calendar: {end}"))?;
    Ok((format_date(start), format_date(exclusive_end)))
}

#[cfg(test)]
mod tests {
    use time::{Duration, Time, UtcOffset};

    use super::{day_of_timestamp, format_date, format_utc_timestamp, parse_date, window_bounds};

    #[test]
    fn parses_and_formats_calendar_dates() {
        let date = parse_date("2024-02-29").expect("leap day should parse");
        assert_eq!(format_date(date), "2024-02-29");
    }

    #[test]
    fn rejects_non_calendar_input() {
        let err = parse_date("2024/01/05").expect_err("slashes are not accepted");
        assert!(
            err.to_string().contains("expected YYYY-MM-DD"),
            "unexpected error: {err}"
        );
        assert!(parse_date("  ").is_err());
        assert!(parse_date("2023-02-29").is_err());
    }

    #[test]
    fn extracts_day_from_stored_timestamp() {
        let day = day_of_timestamp("2024-01-05 23:59:59").expect("day should parse");
        assert_eq!(format_date(day), "2024-01-05");
        assert!(day_of_timestamp("2024-01").is_none());
    }

    #[test]
    fn window_bounds_cross_month_end() {
        let start = parse_date("2024-01-31").expect("date should parse");
        let (lower, upper) = window_bounds(start, start).expect("bounds should resolve");
        assert_eq!(lower, "2024-01-31");
        assert_eq!(upper, "2024-02-01");
    }

    #[test]
    fn envelope_timestamps_are_normalised_to_utc() {
        let date = parse_date("2024-03-05").expect("date should parse");
        let time = Time::from_hms_milli(1, 2, 3, 45).expect("time should be valid");
        let offset = UtcOffset::from_hms(8, 0, 0).expect("offset should be valid");
        let moment = date.with_time(time).assume_offset(offset);
        assert_eq!(format_utc_timestamp(moment), "2024-03-04T17:02:03.045Z");
        assert_eq!(
            format_utc_timestamp(moment + Duration::hours(7)),
            "2024-03-05T00:02:03.045Z"
        );
    }
}
