//! Hourly partition layout of the raw record lake.
//!
//! Raw records live under `{provider}/{MESSAGE_TYPE}/{YYYY}/{MM}/{DD}/{HH}/`,
//! one folder per hour.

use crate::providers::{MessageType, Provider};
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

static DATE_HOUR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})(?:[T ](\d{2}))?").unwrap());

/// Folder holding one hour of one stream
pub fn folder_prefix(provider: Provider, message_type: MessageType, hour: NaiveDateTime) -> String {
    format!(
        "{}/{}/{}",
        provider,
        message_type.folder_name(),
        hour.format("%Y/%m/%d/%H")
    )
}

/// Every hourly folder from `start` up to but excluding `end`.
///
/// Both bounds are truncated to the hour. Empty when `end` is not after `start`.
pub fn hourly_prefixes(
    provider: Provider,
    message_type: MessageType,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<String> {
    let mut prefixes = Vec::new();
    let (Some(mut hour), Some(end)) = (truncate_to_hour(start), truncate_to_hour(end)) else {
        return prefixes;
    };
    while hour < end {
        prefixes.push(folder_prefix(provider, message_type, hour));
        hour += Duration::hours(1);
    }
    prefixes
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DDTHH` or a longer ISO timestamp down to the hour
pub fn parse_date_hour(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    let caps = DATE_HOUR_REGEX
        .captures(text)
        .ok_or_else(|| anyhow!("Expected a date like 2020-03-01 or 2020-03-01T05, got {:?}", text))?;

    let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d")
        .with_context(|| format!("Invalid date {:?}", text))?;
    let hour = match caps.get(2) {
        Some(hour) => hour.as_str().parse::<u32>()?,
        None => 0,
    };

    date.and_hms_opt(hour, 0, 0)
        .ok_or_else(|| anyhow!("Invalid hour in {:?}", text))
}

fn truncate_to_hour(time: NaiveDateTime) -> Option<NaiveDateTime> {
    time.date().and_hms_opt(time.hour(), 0, 0)
}
