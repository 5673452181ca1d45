//! Duration literals in config files and flags (`500ms`, `2s`, `5m`, `1h 30m`, or bare seconds).

use std::time::Duration;

use serde::de::Deserializer;
use serde::Deserialize;

use crate::error::ConfigError;

/// Parse a humantime literal. A bare integer is taken as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let trimmed = input.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(trimmed).map_err(|_| ConfigError::InvalidDuration(input.to_string()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Literal(#[serde(with = "humantime_serde")] Duration),
}

/// `deserialize_with` adapter for [`Duration`] fields.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(secs) => Duration::from_secs(secs),
        RawDuration::Literal(duration) => duration,
    })
}
