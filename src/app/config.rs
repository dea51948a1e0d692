use crate::app::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub api_key: String,
    pub partner_identifier: String,
    pub snapshot_path: String,
    pub station_sync_interval_s: u64,
    pub status_sync_interval_s: u64,
    pub cdr_sync_interval_s: u64,
    pub request_timeout_s: u64,
    pub disable_station_push: bool,
    pub disable_status_push: bool,
    pub disable_cdr_push: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            api_url: required(&lookup, "OIOI_API_URL")?,
            api_key: required(&lookup, "OIOI_API_KEY")?,
            partner_identifier: required(&lookup, "OIOI_PARTNER_ID")?,
            snapshot_path: required(&lookup, "OIOI_SNAPSHOT_PATH")?,
            station_sync_interval_s: parse_or_default(&lookup, "STATION_SYNC_INTERVAL_S", 3600_u64)?,
            status_sync_interval_s: parse_or_default(&lookup, "STATUS_SYNC_INTERVAL_S", 60_u64)?,
            cdr_sync_interval_s: parse_or_default(&lookup, "CDR_SYNC_INTERVAL_S", 300_u64)?,
            request_timeout_s: parse_or_default(&lookup, "REQUEST_TIMEOUT_S", 30_u64)?,
            disable_station_push: parse_flag(&lookup, "DISABLE_STATION_PUSH")?,
            disable_status_push: parse_flag(&lookup, "DISABLE_STATUS_PUSH")?,
            disable_cdr_push: parse_flag(&lookup, "DISABLE_CDR_PUSH")?,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(false),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            _ => Err(AppError::config(format!("{key} must be a boolean flag"))),
        },
    }
}
