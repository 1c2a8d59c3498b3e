use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

/// Parse a numeric cell the way spreadsheet exports write them ("85", "85,5", " 90 ").
///
/// Blank input is absent (`None`); anything else that does not parse becomes `0`.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value = trimmed.replace(',', ".").parse::<f64>().unwrap_or(0.0);
    Some(finite_or_zero(value))
}

/// Parse an id reference. Ids that do not parse are treated as missing links.
pub fn parse_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().filter(|v| v.fract() == 0.0).map(|v| v as i64))
}

pub fn parse_year(raw: &str) -> Option<i32> {
    parse_id(raw).and_then(|v| i32::try_from(v).ok())
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| {
            trimmed
                .get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawValue>::deserialize(deserializer)?;
    Ok(match raw {
        None => None,
        Some(RawValue::Number(value)) => Some(finite_or_zero(value)),
        Some(RawValue::Text(text)) => parse_numeric(&text),
        Some(RawValue::Flag(_)) => Some(0.0),
    })
}

pub fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawValue>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawValue::Number(value)) if value.is_finite() && value.fract() == 0.0 => {
            Some(value as i64)
        }
        Some(RawValue::Text(text)) => parse_id(&text),
        _ => None,
    })
}

pub fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_id(deserializer)?.and_then(|v| i32::try_from(v).ok()))
}

pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_handles_decimal_comma() {
        assert_eq!(parse_numeric("85,5"), Some(85.5));
        assert_eq!(parse_numeric(" 90 "), Some(90.0));
    }

    #[test]
    fn test_parse_numeric_degrades_to_zero() {
        assert_eq!(parse_numeric("n/a"), Some(0.0));
        assert_eq!(parse_numeric("NaN"), Some(0.0));
        assert_eq!(parse_numeric("   "), None);
    }

    #[test]
    fn test_parse_id_accepts_integral_floats() {
        assert_eq!(parse_id("12"), Some(12));
        assert_eq!(parse_id("12.0"), Some(12));
        assert_eq!(parse_id("12.5"), None);
        assert_eq!(parse_id("abc"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 31);
        assert_eq!(parse_date("2024-03-31"), expected);
        assert_eq!(parse_date("2024-03-31T10:00:00Z"), expected);
        assert_eq!(parse_date("2024-03-31 10:00:00"), expected);
        assert_eq!(parse_date("kemarin"), None);
    }
}
