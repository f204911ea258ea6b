use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// Parses RFC3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`. Naive values are read in `tz`; a
/// bare date expands to the start or end of that day.
pub fn parse_datetime_value(value: &str, tz: &Tz, is_start: bool) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| {
                    let time = if is_start {
                        NaiveTime::from_hms_opt(0, 0, 0)
                    } else {
                        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
                    }?;
                    Some(date.and_time(time))
                })
        })?;
    naive
        .and_local_timezone(*tz)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn normalize_filter(value: Option<&str>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parse_datetime_value_supports_rfc3339_sql_and_plain_date() {
        let tz = chrono_tz::UTC;
        let rfc = parse_datetime_value("2026-02-04T09:10:11+09:00", &tz, true).expect("rfc3339");
        assert_eq!(rfc.hour(), 0);

        let sql = parse_datetime_value("2026-02-04 09:10:11", &tz, true).expect("sql");
        assert_eq!(sql.minute(), 10);

        let start = parse_datetime_value("2026-02-04", &tz, true).expect("start");
        let end = parse_datetime_value("2026-02-04", &tz, false).expect("end");
        assert_eq!(start.hour(), 0);
        assert_eq!((end.hour(), end.minute()), (23, 59));
    }

    #[test]
    fn naive_values_are_read_in_the_configured_timezone() {
        let start =
            parse_datetime_value("2026-02-04", &chrono_tz::Asia::Manila, true).expect("start");
        assert_eq!(start.to_rfc3339(), "2026-02-03T16:00:00+00:00");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse_datetime_value("not-a-date", &chrono_tz::UTC, true).is_none());
        assert!(parse_datetime_value("2026-13-01", &chrono_tz::UTC, true).is_none());
    }

    #[test]
    fn normalize_filter_drops_blank_values() {
        assert_eq!(normalize_filter(Some("  module ")), Some("module".to_string()));
        assert_eq!(normalize_filter(Some("   ")), None);
        assert_eq!(normalize_filter(None), None);
    }
}
