use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Returns the current time in the configured timezone.
pub fn now_in_timezone(tz: &Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(tz)
}

/// `audit_logs_<YYYYMMDD_HHMMSS>.<ext>`, stamped in the configured timezone.
pub fn export_filename(tz: &Tz, extension: &str) -> String {
    format!(
        "audit_logs_{}.{}",
        now_in_timezone(tz).format("%Y%m%d_%H%M%S"),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_in_timezone_returns_datetime_in_tz() {
        let tz = chrono_tz::Asia::Manila;
        let result = now_in_timezone(&tz);
        assert_eq!(result.timezone(), tz);
    }

    #[test]
    fn export_filename_has_stamp_and_extension() {
        let name = export_filename(&chrono_tz::UTC, "csv");
        assert!(name.starts_with("audit_logs_"));
        assert!(name.ends_with(".csv"));
        assert_eq!(name.len(), "audit_logs_20240101_000000.csv".len());
    }
}
