//! Destination index naming.
//!
//! Time based policies truncate the flush timestamp to the start of its
//! UTC bucket before formatting, so every flush inside one bucket writes
//! to the same index.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// How often a new index is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RotationPolicy {
    Never,
    Hourly,
    #[default]
    Daily,
    /// Buckets start on Monday.
    Weekly,
    Monthly,
    Yearly,
    /// The name is used verbatim and the server owns the lifecycle.
    DataStream,
}

impl RotationPolicy {
    /// Whether the policy appends a date suffix to the base name.
    pub fn is_time_bucketed(self) -> bool {
        !matches!(self, RotationPolicy::Never | RotationPolicy::DataStream)
    }

    /// Truncate `as_of` to the start of its bucket. Policies without
    /// buckets return the timestamp unchanged.
    pub fn bucket_start(self, as_of: DateTime<Utc>) -> DateTime<Utc> {
        let date = as_of.date_naive();
        let day = match self {
            RotationPolicy::Never | RotationPolicy::DataStream => return as_of,
            RotationPolicy::Hourly => {
                let hour = NaiveTime::from_hms_opt(as_of.hour(), 0, 0).unwrap_or(NaiveTime::MIN);
                return Utc.from_utc_datetime(&date.and_time(hour));
            }
            RotationPolicy::Daily => date,
            RotationPolicy::Weekly => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            RotationPolicy::Monthly => date.with_day(1).unwrap_or(date),
            RotationPolicy::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        };
        Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
    }
}

impl FromStr for RotationPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEVER" => Ok(RotationPolicy::Never),
            "HOURLY" => Ok(RotationPolicy::Hourly),
            "DAILY" => Ok(RotationPolicy::Daily),
            "WEEKLY" => Ok(RotationPolicy::Weekly),
            "MONTHLY" => Ok(RotationPolicy::Monthly),
            "YEARLY" => Ok(RotationPolicy::Yearly),
            "DATA_STREAM" | "DATASTREAM" => Ok(RotationPolicy::DataStream),
            _ => Err(ConfigError::UnknownRotation(s.to_string())),
        }
    }
}

impl fmt::Display for RotationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotationPolicy::Never => "NEVER",
            RotationPolicy::Hourly => "HOURLY",
            RotationPolicy::Daily => "DAILY",
            RotationPolicy::Weekly => "WEEKLY",
            RotationPolicy::Monthly => "MONTHLY",
            RotationPolicy::Yearly => "YEARLY",
            RotationPolicy::DataStream => "DATA_STREAM",
        };
        f.write_str(name)
    }
}

/// A `strftime` pattern that has been checked to render without errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat(String);

impl DateFormat {
    pub fn new(pattern: impl Into<String>) -> Result<Self, ConfigError> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidDateFormat(pattern));
        }
        Ok(DateFormat(pattern))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn render(&self, at: DateTime<Utc>) -> String {
        at.format(&self.0).to_string()
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        DateFormat("%Y.%m.%d".to_string())
    }
}

/// Compute the index a flush happening at `as_of` writes to.
pub fn resolve_index_name(
    base: &str,
    policy: RotationPolicy,
    as_of: DateTime<Utc>,
    date_format: &DateFormat,
    separator: &str,
) -> String {
    if !policy.is_time_bucketed() {
        return base.to_string();
    }
    let suffix = date_format.render(policy.bucket_start(as_of));
    format!("{}{}{}", base, separator, suffix)
}
