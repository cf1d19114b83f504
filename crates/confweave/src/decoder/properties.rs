//! Java-style `.properties` decoding, flat or hierarchical.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Number, Value};

use super::Decoder;
use crate::coerce;
use crate::document::{merge_into, Document};
use crate::error::DecodeError;

static RE_FLOAT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\d+$").unwrap());
static RE_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

/// Decodes properties files.
///
/// Options:
/// - `raw-data`: keep every value as a string (flat mode only).
/// - `hierarchical`: split keys on `.` into nested documents.
pub struct PropertiesDecoder;

impl Decoder for PropertiesDecoder {
    fn name(&self) -> &str {
        "properties"
    }

    fn decode(&self, options: &Document, input: &[u8]) -> Result<Document, DecodeError> {
        let text = String::from_utf8(input.to_vec())?;
        let entries = parse_entries(&text)?;

        if options.get_bool("hierarchical").unwrap_or(false) {
            Ok(to_hierarchical(entries))
        } else {
            let raw_data = options.get_bool("raw-data").unwrap_or(false);
            Ok(entries
                .into_iter()
                .map(|(key, value)| {
                    let converted = coerce::convert_with(&value, raw_data);
                    (key, converted)
                })
                .collect())
        }
    }
}

/// Parses the text into `(key, value)` pairs in file order.
pub fn parse_entries(text: &str) -> Result<Vec<(String, String)>, DecodeError> {
    let mut entries = Vec::new();
    for (line_no, line) in logical_lines(text) {
        entries.push(split_entry(&line, line_no)?);
    }
    Ok(entries)
}

/// Joins continuation lines, dropping blanks and comments.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (idx, physical) in text.lines().enumerate() {
        let trimmed = physical.trim_start();
        let continuing = current.is_some();

        if !continuing && (trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!')) {
            continue;
        }

        let (content, continues) = strip_continuation(trimmed);
        match current.as_mut() {
            Some((_, buf)) => buf.push_str(content),
            None => current = Some((idx + 1, content.to_string())),
        }

        if !continues {
            if let Some(done) = current.take() {
                lines.push(done);
            }
        }
    }

    if let Some(done) = current {
        lines.push(done);
    }
    lines
}

/// A line continues when it ends with an odd number of backslashes.
fn strip_continuation(line: &str) -> (&str, bool) {
    let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
    if trailing % 2 == 1 {
        (&line[..line.len() - 1], true)
    } else {
        (line, false)
    }
}

fn split_entry(line: &str, line_no: usize) -> Result<(String, String), DecodeError> {
    let chars: Vec<char> = line.chars().collect();
    let mut key_end = chars.len();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if c.is_whitespace() => {
                key_end = i;
                break;
            }
            _ => i += 1,
        }
    }
    let key_end = key_end.min(chars.len());

    let mut value_start = key_end;
    while value_start < chars.len() && chars[value_start].is_whitespace() {
        value_start += 1;
    }
    if value_start < chars.len() && (chars[value_start] == '=' || chars[value_start] == ':') {
        value_start += 1;
        while value_start < chars.len() && chars[value_start].is_whitespace() {
            value_start += 1;
        }
    }

    let raw_key: String = chars[..key_end].iter().collect();
    let raw_value: String = chars[value_start..].iter().collect();
    Ok((
        unescape(&raw_key, line_no)?,
        unescape(&raw_value, line_no)?,
    ))
}

fn unescape(raw: &str, line_no: usize) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| DecodeError::Properties {
                        line: line_no,
                        message: format!("malformed \\u escape '\\u{}'", hex),
                    })?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

fn to_hierarchical(entries: Vec<(String, String)>) -> Document {
    let mut root = Document::new();
    for (key, value) in entries {
        let mut value = parse_hierarchical_value(value.trim());
        for segment in key.split('.').rev() {
            let mut nested = serde_json::Map::new();
            nested.insert(segment.to_string(), value);
            value = Value::Object(nested);
        }
        if let Some(doc) = Document::from_value(value) {
            merge_into(&mut root, &doc, true);
        }
    }
    root
}

/// Value typing used in hierarchical mode: lists, booleans, then numbers.
fn parse_hierarchical_value(raw: &str) -> Value {
    if raw.contains(',') {
        return Value::Array(
            raw.split(',')
                .map(|part| parse_hierarchical_value(part.trim()))
                .collect(),
        );
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if RE_FLOAT.is_match(raw) {
        if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    if RE_INTEGER.is_match(raw) {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Number(Number::from(i));
        }
        if let Ok(u) = raw.parse::<u64>() {
            return Value::Number(Number::from(u));
        }
    }
    Value::String(raw.to_string())
}
