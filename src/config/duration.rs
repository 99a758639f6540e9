//! Serde helpers for human durations: "500ms", "30s", "1m30s", "1h".

use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// A missing or null value reads as zero; callers substitute their defaults.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map_or(Ok(Duration::ZERO), |s| parse_duration(&s))
        .map_err(serde::de::Error::custom)
}

fn unit_seconds(unit: &str) -> Option<f64> {
    Some(match unit {
        "ns" => 1e-9,
        "us" | "µs" => 1e-6,
        "ms" => 1e-3,
        "s" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        _ => return None,
    })
}

/// Parses a sequence of `<number><unit>` segments and sums them.
/// A bare number is seconds.
pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
    let mut rest = s.trim();
    if rest.is_empty() {
        return Ok(Duration::ZERO);
    }
    if let Ok(secs) = rest.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|e| format!("{}: {}", s, e));
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(num_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let number: f64 = number
            .parse()
            .map_err(|_| format!("invalid duration number in {:?}", s))?;
        let scale = unit_seconds(unit.trim())
            .ok_or_else(|| format!("unknown duration unit: {:?}", unit))?;
        total += Duration::try_from_secs_f64(number * scale).map_err(|e| format!("{}: {}", s, e))?;
        rest = tail;
    }

    Ok(total)
}

/// Lists such as `retry_delays: ["1s", "2s", "3s"]`.
pub mod list {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Vec<String>>::deserialize(deserializer)?
            .unwrap_or_default()
            .iter()
            .map(|s| super::parse_duration(s))
            .collect::<Result<_, _>>()
            .map_err(serde::de::Error::custom)
    }
}
