//! Transaction loading using Polars

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::info;

use crate::error::Error;

pub const USER_ID: &str = "UserId";
pub const SERVICE_ID: &str = "ServiceId";
pub const CATEGORY_ID: &str = "CategoryId";
pub const CREATE_DATE: &str = "CreateDate";

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// One purchase record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub user_id: String,
    pub service_id: String,
    pub category_id: String,
    pub created_at: NaiveDateTime,
}

impl Event {
    pub fn new(
        user_id: impl Into<String>,
        service_id: impl Into<String>,
        category_id: impl Into<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            service_id: service_id.into(),
            category_id: category_id.into(),
            created_at,
        }
    }

    /// Calendar month of the purchase, e.g. `2017-08`
    pub fn year_month(&self) -> String {
        self.created_at.format("%Y-%m").to_string()
    }
}

/// Parse a purchase timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, the `T`-separated form, RFC 3339, or a bare
/// date (taken as midnight). Offsets are dropped, keeping the recorded wall
/// clock time.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_local());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Load purchase events from a CSV file
///
/// # Arguments
/// * `file_path` - CSV with `UserId`, `ServiceId`, `CategoryId`, `CreateDate` columns
///
/// # Returns
/// * Every row as an [`Event`]; the first malformed row aborts the load
pub fn load_events(file_path: impl AsRef<Path>) -> crate::Result<Vec<Event>> {
    let file_path = file_path.as_ref();

    let df = LazyCsvReader::new(file_path)
        .with_has_header(true)
        .finish()?
        .select([
            col(USER_ID).cast(DataType::String),
            col(SERVICE_ID).cast(DataType::String),
            col(CATEGORY_ID).cast(DataType::String),
            col(CREATE_DATE).cast(DataType::String),
        ])
        .collect()?;

    let events = events_from_frame(&df)?;
    info!(path = %file_path.display(), events = events.len(), "loaded purchase events");
    Ok(events)
}

/// Convert a frame with the four string columns into typed events
pub fn events_from_frame(df: &DataFrame) -> crate::Result<Vec<Event>> {
    let users = df.column(USER_ID)?.str()?;
    let services = df.column(SERVICE_ID)?.str()?;
    let categories = df.column(CATEGORY_ID)?.str()?;
    let dates = df.column(CREATE_DATE)?.str()?;

    let mut events = Vec::with_capacity(df.height());
    let rows = users.into_iter().zip(services).zip(categories).zip(dates);

    for (row, (((user, service), category), date)) in rows.enumerate() {
        let user_id = user.ok_or(Error::MissingField { column: USER_ID, row })?;
        let service_id = service.ok_or(Error::MissingField { column: SERVICE_ID, row })?;
        let category_id = category.ok_or(Error::MissingField { column: CATEGORY_ID, row })?;
        let raw_date = date.ok_or(Error::MissingField { column: CREATE_DATE, row })?;

        let created_at = parse_timestamp(raw_date)
            .ok_or_else(|| Error::InvalidTimestamp { row, value: raw_date.to_string() })?;

        events.push(Event::new(user_id, service_id, category_id, created_at));
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "UserId,ServiceId,CategoryId,CreateDate").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    #[test]
    fn test_load_events() {
        let test_file = create_test_csv(&[
            "25446,4,5,2017-08-06 16:11:00",
            "22948,48,5,2017-08-06 16:12:00",
            "10591,0,8,2017-08-06 16:12:00",
            "7256,9,4,2017-08-06 16:14:00",
        ]);

        let events = load_events(test_file.path()).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[3].user_id, "7256");
        assert_eq!(events[3].service_id, "9");
        assert_eq!(events[3].category_id, "4");
        assert_eq!(events[3].year_month(), "2017-08");
    }

    #[test]
    fn test_missing_column_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "UserId,ServiceId,CreateDate").unwrap();
        writeln!(file, "1,2,2017-08-06 16:11:00").unwrap();

        let result = load_events(file.path());
        assert!(matches!(result, Err(Error::Csv(_))));
    }

    #[test]
    fn test_malformed_timestamp_fails() {
        let test_file = create_test_csv(&["1,2,3,2017-08-06 16:11:00", "1,2,3,last tuesday"]);

        let result = load_events(test_file.path());
        assert!(matches!(
            result,
            Err(Error::InvalidTimestamp { row: 1, ref value }) if value == "last tuesday"
        ));
    }

    #[test]
    fn test_missing_value_fails() {
        let test_file = create_test_csv(&["1,,3,2017-08-06 16:11:00"]);

        let result = load_events(test_file.path());
        assert!(matches!(
            result,
            Err(Error::MissingField { column: SERVICE_ID, row: 0 })
        ));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2018, 1, 3).unwrap().and_hms_opt(9, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2018-01-03 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2018-01-03T09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2018-01-03T09:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp(" 2018-01-03 09:30 "), Some(expected));

        let midnight = NaiveDate::from_ymd_opt(2018, 1, 3).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2018-01-03"), Some(midnight));

        assert_eq!(parse_timestamp("03/01/2018"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_year_month_truncates_day_and_time() {
        let at = parse_timestamp("2019-12-31 23:59:59").unwrap();
        let event = Event::new("1", "2", "3", at);
        assert_eq!(event.year_month(), "2019-12");
    }

    #[test]
    fn test_offset_keeps_recorded_month() {
        let at = parse_timestamp("2017-09-01T01:00:00+03:00").unwrap();
        assert_eq!(at, NaiveDate::from_ymd_opt(2017, 9, 1).unwrap().and_hms_opt(1, 0, 0).unwrap());
        assert_eq!(Event::new("1", "2", "3", at).year_month(), "2017-09");

        let at = parse_timestamp("2017-08-31T23:30:00-05:00").unwrap();
        assert_eq!(Event::new("1", "2", "3", at).year_month(), "2017-08");
    }

    #[test]
    fn test_unreadable_file_is_csv_error() {
        let result = load_events("/nonexistent/purchases.csv");
        assert!(matches!(result, Err(Error::Csv(_))));
    }
}
