use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

/// A structurally invalid request: bad ids, dates, or missing fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub fn parse_user_id(raw: &str) -> Result<i64, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("A user ID is required."));
    }

    trimmed
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ValidationError::new(format!("Invalid user ID: {trimmed}")))
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (reduced to its local date).
///
/// The day must have a successor, since range queries end at the next midnight.
pub fn parse_day(raw: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = raw.trim();

    let day = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date_time(trimmed).ok().map(|value| value.date()))
        .ok_or_else(|| {
            ValidationError::new(format!(
                "Invalid date format: {trimmed}. Use YYYY-MM-DD (example: 2024-11-01)"
            ))
        })?;

    match day.succ_opt() {
        Some(_) => Ok(day),
        None => Err(ValidationError::new(format!("Date out of range: {trimmed}"))),
    }
}

/// Accepts `YYYY-MM-DD` (midnight), `YYYY-MM-DDTHH:MM:SS[.fff]`, or RFC 3339
/// (converted to local wall-clock time).
pub fn parse_date_time(raw: &str) -> Result<NaiveDateTime, ValidationError> {
    let trimmed = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ValidationError::new(format!("Invalid date: {trimmed}")));
    }

    if let Ok(value) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(value.with_timezone(&Local).naive_local());
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|_| {
            ValidationError::new(format!(
                "Invalid date format: {trimmed}. Use YYYY-MM-DD or an ISO 8601 timestamp"
            ))
        })
}

pub fn require_text<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, ValidationError> {
    value
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ValidationError::new(message))
}

#[cfg(test)]
mod tests {
    use super::{parse_date_time, parse_day, parse_user_id, require_text};
    use chrono::NaiveDate;

    #[test]
    fn user_ids_must_be_positive_integers() {
        assert_eq!(parse_user_id(" 42 "), Ok(42));
        assert!(parse_user_id("").is_err());
        assert!(parse_user_id("abc").is_err());
        assert!(parse_user_id("0").is_err());
    }

    #[test]
    fn day_accepts_plain_dates_and_rejects_garbage() {
        assert_eq!(
            parse_day("2024-11-01"),
            Ok(NaiveDate::from_ymd_opt(2024, 11, 1).unwrap())
        );
        assert!(parse_day("2024-13-01").is_err());
        assert!(parse_day("yesterday").is_err());
    }

    #[test]
    fn last_representable_day_is_out_of_range() {
        let error = parse_day(&NaiveDate::MAX.to_string()).unwrap_err();
        assert!(error.0.starts_with("Date out of range"));

        let day_before = NaiveDate::MAX.pred_opt().unwrap();
        assert_eq!(parse_day(&day_before.to_string()), Ok(day_before));
    }

    #[test]
    fn date_time_defaults_plain_dates_to_midnight() {
        let parsed = parse_date_time("2024-11-01").unwrap();
        assert_eq!(parsed.to_string(), "2024-11-01 00:00:00");

        let with_time = parse_date_time("2024-11-01T21:15:00").unwrap();
        assert_eq!(with_time.to_string(), "2024-11-01 21:15:00");
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(require_text(Some("   "), "content required").is_err());
        assert!(require_text(None, "content required").is_err());
        assert_eq!(require_text(Some("hi"), "content required"), Ok("hi"));
    }
}
