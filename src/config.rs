use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    /// Directory of per-seller JSON event exports.
    pub events_dir: String,
    /// Directory of supplier invoice CSV exports, if any.
    pub invoice_dir: Option<String>,
    /// Base URL of the live exchange-rate API; None disables the live tier.
    pub fx_api_url: Option<String>,
    pub fx_timeout_ms: u64,
    pub lookback_days: i64,
    pub target_currency: String,
    pub calibration_ttl_secs: u64,
    pub sellers: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let events_dir = env_map
            .get("EVENTS_DIR")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("EVENTS_DIR".to_string()))?;

        let invoice_dir = env_map.get("INVOICE_DIR").cloned();
        let fx_api_url = env_map.get("FX_API_URL").cloned();

        let fx_timeout_ms = env_map
            .get("FX_TIMEOUT_MS")
            .map(|s| s.as_str())
            .unwrap_or("3000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "FX_TIMEOUT_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let lookback_days = env_map
            .get("LOOKBACK_DAYS")
            .map(|s| s.as_str())
            .unwrap_or("180")
            .parse::<i64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "LOOKBACK_DAYS".to_string(),
                    "must be a valid i64".to_string(),
                )
            })?;
        if lookback_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "LOOKBACK_DAYS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let target_currency = env_map
            .get("TARGET_CURRENCY")
            .cloned()
            .unwrap_or_else(|| "USD".to_string());

        let calibration_ttl_secs = env_map
            .get("CALIBRATION_TTL_SECS")
            .map(|s| s.as_str())
            .unwrap_or("300")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "CALIBRATION_TTL_SECS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let sellers = parse_sellers_from_map(&env_map)?;

        Ok(Config {
            database_path,
            events_dir,
            invoice_dir,
            fx_api_url,
            fx_timeout_ms,
            lookback_days,
            target_currency,
            calibration_ttl_secs,
            sellers,
        })
    }
}

fn parse_sellers_from_map(
    env_map: &HashMap<String, String>,
) -> Result<Vec<String>, ConfigError> {
    if let Some(sellers_str) = env_map.get("SELLERS") {
        Ok(sellers_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    } else if let Some(file_path) = env_map.get("SELLERS_FILE") {
        let content = std::fs::read_to_string(file_path).map_err(|_| {
            ConfigError::InvalidValue(
                "SELLERS_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        Ok(content
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    } else {
        Ok(Vec::new())
    }
}
