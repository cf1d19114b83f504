//! String-to-value coercion for flat key/value sources (properties, environment).
//!
//! Precedence is fixed: boolean literal, numeric literal, JSON object, JSON
//! array (bracketed or comma-separated), then the string itself.

use serde_json::{Map, Number, Value};

/// Converts a raw string into the most specific JSON value it represents.
pub fn convert(raw: &str) -> Value {
    if let Some(b) = as_bool(raw) {
        return Value::Bool(b);
    }
    if let Some(n) = as_number(raw) {
        return Value::Number(n);
    }
    if let Some(obj) = as_object(raw) {
        return Value::Object(obj);
    }
    if let Some(arr) = as_array(raw) {
        return Value::Array(arr);
    }
    Value::String(raw.to_string())
}

/// Converts unless `raw_data` is set, in which case the string is kept verbatim.
pub fn convert_with(raw: &str, raw_data: bool) -> Value {
    if raw_data {
        Value::String(raw.to_string())
    } else {
        convert(raw)
    }
}

fn as_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn as_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Number::from(u));
    }
    // Integers wider than 64 bits would lose digits as floats.
    if is_integer_literal(s) {
        return None;
    }
    // `f64::from_str` accepts "inf" and "NaN"; only finite literals count.
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn as_object(s: &str) -> Option<Map<String, Value>> {
    if s.starts_with('{') && s.ends_with('}') {
        serde_json::from_str(s).ok()
    } else {
        None
    }
}

fn as_array(s: &str) -> Option<Vec<Value>> {
    let opens = s.starts_with('[');
    let closes = s.ends_with(']');
    if opens && closes {
        serde_json::from_str(s).ok()
    } else if !opens && !closes && s.contains(',') {
        serde_json::from_str(&format!("[{}]", s)).ok()
    } else {
        None
    }
}
