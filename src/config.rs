// Run configuration, read once at start-up from environment-style key/value pairs

use chrono::NaiveDate;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::date_range::RangePolicy;

pub const DEFAULT_BASE_URL: &str = "https://www.minamialps-yoyaku.jp";
pub const DEFAULT_HUT_NAME: &str = "北岳山荘";
pub const DEFAULT_MASTER_NO: u32 = 212;
pub const DEFAULT_SERVICE_TYPE1_ID: u32 = 1;
pub const DEFAULT_SERVICE_TYPE2_ID: u32 = 0;
pub const DEFAULT_TARGET_DATE: &str = "2025-09-27";

pub const SMTP_HOST: &str = "smtp.gmail.com";
pub const SMTP_PORT: u16 = 587;
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: `{value}` ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout: Duration,
}

// What to watch: the hut, its lodging type and the date of interest
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub hut_name: String,
    pub master_no: u32,
    // 1 = hut bed, 2 = tent site
    pub service_type1_id: u32,
    pub service_type2_id: u32,
    pub target_date: NaiveDate,
    pub range_policy: RangePolicy,
}

#[derive(Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_email: String,
    pub to_email: String,
    pub app_password: String,
    pub timeout: Duration,
}

// Keeps the app password out of logs
impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("from_email", &self.from_email)
            .field("to_email", &self.to_email)
            .field("app_password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    pub watch: WatchConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Mail credentials are checked here so a missing one fails before any request goes out
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| optional(key).ok_or(ConfigError::Missing(key));

        let watch = WatchConfig {
            hut_name: optional("HUT_NAME").unwrap_or_else(|| DEFAULT_HUT_NAME.to_string()),
            master_no: parse_or("MASTER_NO", optional("MASTER_NO"), DEFAULT_MASTER_NO)?,
            service_type1_id: parse_or(
                "SERVICE_TYPE1_ID",
                optional("SERVICE_TYPE1_ID"),
                DEFAULT_SERVICE_TYPE1_ID,
            )?,
            service_type2_id: parse_or(
                "SERVICE_TYPE2_ID",
                optional("SERVICE_TYPE2_ID"),
                DEFAULT_SERVICE_TYPE2_ID,
            )?,
            target_date: parse_target_date(optional("TARGET_DATE"))?,
            range_policy: parse_or("RANGE_POLICY", optional("RANGE_POLICY"), RangePolicy::Month)?,
        };

        let mail = MailConfig {
            smtp_host: SMTP_HOST.to_string(),
            smtp_port: SMTP_PORT,
            from_email: required("FROM_EMAIL")?,
            to_email: required("TO_EMAIL")?,
            app_password: required("APP_PASSWORD")?,
            timeout: NETWORK_TIMEOUT,
        };

        let upstream = UpstreamConfig {
            base_url: optional("BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: NETWORK_TIMEOUT,
        };

        Ok(Self {
            upstream,
            watch,
            mail,
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_target_date(raw: Option<String>) -> Result<NaiveDate, ConfigError> {
    let value = raw.unwrap_or_else(|| DEFAULT_TARGET_DATE.to_string());
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| ConfigError::Invalid {
        key: "TARGET_DATE",
        reason: e.to_string(),
        value,
    })
}
