// src/config/duration.rs

use std::time::Duration;

/// Parse a human duration: `"250ms"`, `"3s"`, `"1.5s"`, `"2m"`, `"1h"`.
///
/// A bare number is taken as seconds, so `"0.2"` and `"0.2s"` are the same.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between the number and the suffix.
    let idx = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map_or(s.len(), |(idx, _)| idx);

    let (num_part, unit_part) = s.split_at(idx);
    let unit = unit_part.trim().to_lowercase();
    let scale: u64 = match unit.as_str() {
        "ms" => 1,
        "" | "s" => 1000,
        "m" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        _ => {
            return Err(format!(
                "unsupported duration unit '{unit}'; expected ms, s, m, or h"
            ));
        }
    };

    // Whole numbers stay exact; fractions go through f64.
    if let Ok(value) = num_part.parse::<u64>() {
        return value
            .checked_mul(scale)
            .map(Duration::from_millis)
            .ok_or_else(|| format!("duration '{s}' is too large"));
    }
    let value: f64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;
    Duration::try_from_secs_f64(value * (scale as f64 / 1000.0))
        .map_err(|e| format!("invalid duration '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration(" 1.5s "), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("0.2"), Ok(Duration::from_millis(200)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("3 days").is_err());
        assert!(parse_duration("1.2.3s").is_err());
    }
}
