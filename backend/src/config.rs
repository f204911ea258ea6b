use anyhow::anyhow;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, str::FromStr};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub time_zone: Tz,
    pub bind_addr: String,
    /// Directory holding editable pages.
    pub pages_root: PathBuf,
    /// Optional TOML/JSON/YAML module catalogue; the built-in catalogue is used when unset.
    pub module_registry_path: Option<PathBuf>,
    pub audit_log_per_page: i64,
    pub audit_log_export_max_rows: i64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/console".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "your-secret-key-change-this-in-production".to_string());

        let time_zone_name = env::var("APP_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let time_zone: Tz = time_zone_name
            .parse()
            .map_err(|_| anyhow!("Invalid APP_TIMEZONE value: {}", time_zone_name))?;

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let pages_root = env::var("PAGES_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./pages"));
        let module_registry_path = env::var("MODULE_REGISTRY_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let audit_log_per_page = positive_var("AUDIT_LOG_PER_PAGE", 20)?;
        let audit_log_export_max_rows = positive_var("AUDIT_LOG_EXPORT_MAX_ROWS", 10_000)?;

        Ok(Config {
            database_url,
            jwt_secret,
            time_zone,
            bind_addr,
            pages_root,
            module_registry_path,
            audit_log_per_page,
            audit_log_export_max_rows,
        })
    }
}

fn positive_var(name: &str, default: i64) -> anyhow::Result<i64> {
    match env::var(name) {
        Ok(raw) => parse_positive(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_positive(name: &str, raw: &str) -> anyhow::Result<i64> {
    let value = i64::from_str(raw.trim()).map_err(|_| anyhow!("Invalid {} value: {}", name, raw))?;
    if value < 1 {
        return Err(anyhow!("{} must be at least 1, got {}", name, value));
    }
    Ok(value)
}
