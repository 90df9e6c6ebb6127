use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Parse a transcript timestamp into epoch milliseconds.
///
/// Numeric inputs are assumed to already be milliseconds; strings are
/// parsed as RFC 3339. Anything else is treated as absent.
pub fn parse_timestamp_ms(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}

/// Render epoch milliseconds as an RFC 3339 string with millisecond
/// precision, the shape Super-Kanban expects for `occurredAt`.
pub fn to_iso_millis(ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_is_milliseconds() {
        assert_eq!(parse_timestamp_ms(Some(&json!(1700000000123i64))), Some(1_700_000_000_123));
    }

    #[test]
    fn iso_string_parses() {
        let ms = parse_timestamp_ms(Some(&json!("2026-01-15T03:00:00.250Z"))).unwrap();
        assert_eq!(to_iso_millis(ms).unwrap(), "2026-01-15T03:00:00.250Z");
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_timestamp_ms(Some(&json!("not a date"))), None);
        assert_eq!(parse_timestamp_ms(Some(&json!({"nested": true}))), None);
        assert_eq!(parse_timestamp_ms(None), None);
    }
}
