//! # Text Input Validation Utilities
//!
//! Regex patterns and parsers applied at the boundary, before anything
//! reaches the core logic.

use std::env;
use std::sync::LazyLock;

use regex::Regex;
use time::Time;
use tracing::error;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Email validation regex pattern
///
/// Only institutional addresses may register. The allowed domain suffixes are
/// read from the `ALLOWED_DOMAINS` environment variable, separated by colons.
/// Any subdomain of an allowed suffix is accepted.
///
/// # Environment Variables
///
/// - `ALLOWED_DOMAINS` - Colon-separated list of allowed domain suffixes
///   (e.g., "edu:ac.uk"), defaults to "edu"
///
/// # Examples
///
/// For `ALLOWED_DOMAINS="edu"`:
/// - `jane@cs.state.edu` ✓ Valid
/// - `jane@gmail.com` ✗ Invalid
/// - `invalid-email` ✗ Invalid format
pub static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let allowed_domains_str = env::var("ALLOWED_DOMAINS").unwrap_or_else(|_| "edu".to_string());

    let escaped_domains: Vec<String> = allowed_domains_str
        .split(':')
        .filter(|domain| !domain.is_empty())
        .map(regex::escape) // encode special chars like period
        .collect();
    let domains_pattern = escaped_domains.join("|");
    let pattern = format!(r"^[a-zA-Z0-9._%+-]+@([a-zA-Z0-9-]+\.)+({domains_pattern})$");

    Regex::new(&pattern).unwrap_or_else(|e| {
        error!("Failed to compile email regex: {}", e);
        std::process::exit(1);
    })
});

/// 24-hour "HH:MM" start time.
pub static START_TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap_or_else(|e| {
        error!("Failed to compile start time regex: {}", e);
        std::process::exit(1);
    })
});

/// Parses a 24-hour "HH:MM" start time.
///
/// # Examples
///
/// - `parse_start_time("09:30")` ✓ Valid
/// - `parse_start_time("9:30")` ✗ Invalid, hours need two digits
/// - `parse_start_time("24:00")` ✗ Invalid
pub fn parse_start_time(raw: &str) -> AppResult<Time> {
    if !START_TIME_REGEX.is_match(raw) {
        return Err(AppError::validation(format!(
            "start time must be HH:MM (24-hour), got {raw:?}"
        )));
    }
    let (hours, minutes) = raw
        .split_once(':')
        .and_then(|(h, m)| Some((h.parse::<u8>().ok()?, m.parse::<u8>().ok()?)))
        .ok_or_else(|| AppError::validation(format!("invalid start time {raw:?}")))?;

    Time::from_hms(hours, minutes, 0)
        .map_err(|_| AppError::validation(format!("invalid start time {raw:?}")))
}

/// Parses a textual identifier handed over by the routing layer.
///
/// Malformed identifiers are validation failures, never lookups.
#[inline]
pub fn parse_id(raw: &str) -> AppResult<Uuid> {
    Ok(Uuid::try_parse(raw.trim())?)
}
