use std::time::Duration;

use crate::{ApiforgeError, Result};

/// 解析时间字符串
///
/// 支持的格式:
/// - 纯数字，单位为秒: "30", "0.5"
/// - 单一单位: "500ms", "5s", "2m", "1h", "1d"
/// - 组合单位: "1m30s", "1h5m"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let input = s.trim();
    if input.is_empty() {
        return Err(invalid(s, "empty duration"));
    }

    if let Ok(secs) = input.parse::<f64>() {
        return seconds(secs, s);
    }

    let mut total = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| invalid(s, "missing unit"))?;
        if num_end == 0 {
            return Err(invalid(s, "expected a number"));
        }
        let (num_part, tail) = rest.split_at(num_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);

        let value: f64 = num_part
            .parse()
            .map_err(|_| invalid(s, "invalid number"))?;
        let multiplier = match unit.to_lowercase().as_str() {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "d" => 86400.0,
            other => return Err(invalid(s, &format!("unknown unit '{}'", other))),
        };
        total += value * multiplier;
        rest = next;
    }

    seconds(total, s)
}

/// 以 Python float 字面量的形式输出秒数，例如 `30.0`、`0.5`
pub fn format_seconds(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{:.1}", secs)
    } else {
        format!("{}", secs)
    }
}

fn seconds(value: f64, raw: &str) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(raw, "duration must be a non-negative number"));
    }
    Duration::try_from_secs_f64(value).map_err(|_| invalid(raw, "duration out of range"))
}

fn invalid(raw: &str, reason: &str) -> ApiforgeError {
    ApiforgeError::config(format!("Invalid duration '{}': {}", raw, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
    }

    #[test]
    fn test_parse_bare_numbers() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration(" 0.5 ").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h5m").unwrap(), Duration::from_secs(3900));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("-3").is_err());
        assert!(parse_duration("s5").is_err());

        let err = parse_duration("99999999999999999999s").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("out of range"));
        assert!(parse_duration("1e20").is_err());
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(Duration::from_secs(30)), "30.0");
        assert_eq!(format_seconds(Duration::from_millis(500)), "0.5");
        assert_eq!(format_seconds(Duration::from_millis(1250)), "1.25");
    }
}
