//! YAML header block splitting, parsing and emission.

use serde_json::Value;
use std::collections::BTreeMap;

pub const DELIMITER: &str = "---";

/// Header fields plus the body that follows the closing delimiter.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<'a> {
    pub header: BTreeMap<String, Value>,
    pub body: &'a str,
}

/// Splits `input` into header fields and body.
///
/// Text without an opening `---` line has an empty header and is all body.
/// An opened but unterminated header, invalid YAML, or a header that is not
/// a mapping is an error.
pub fn split(input: &str) -> Result<Document<'_>, String> {
    let input = input.trim_start_matches('\u{feff}');
    let Some((first, rest)) = split_line(input) else {
        return Ok(Document {
            header: BTreeMap::new(),
            body: input,
        });
    };
    if first.trim_end() != DELIMITER {
        return Ok(Document {
            header: BTreeMap::new(),
            body: input,
        });
    }

    let mut yaml_end = 0;
    let mut cursor = rest;
    loop {
        let Some((line, remainder)) = split_line(cursor) else {
            return Err("header block is not terminated by `---`".to_string());
        };
        let trimmed = line.trim_end();
        if trimmed == DELIMITER || trimmed == "..." {
            let header = parse_header(&rest[..yaml_end])?;
            return Ok(Document {
                header,
                body: remainder,
            });
        }
        yaml_end += cursor.len() - remainder.len();
        cursor = remainder;
    }
}

/// Serializes ordered header entries as a delimited YAML block.
pub fn emit(entries: &[(String, Value)]) -> Result<String, String> {
    let mut mapping = serde_yaml::Mapping::new();
    for (key, value) in entries {
        let yaml_value =
            serde_yaml::to_value(value).map_err(|err| format!("header `{key}`: {err}"))?;
        mapping.insert(serde_yaml::Value::String(key.clone()), yaml_value);
    }
    let yaml = serde_yaml::to_string(&mapping).map_err(|err| err.to_string())?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n"))
}

/// Renders scalar header values as text. Lists and maps yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_header(yaml: &str) -> Result<BTreeMap<String, Value>, String> {
    if yaml.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|err| format!("invalid header: {err}"))?;
    let json_value: Value =
        serde_json::to_value(yaml_value).map_err(|err| format!("invalid header: {err}"))?;

    match json_value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Null => Ok(BTreeMap::new()),
        _ => Err("header is not a key/value mapping".to_string()),
    }
}

/// Returns the first line (without terminator) and the rest after it.
fn split_line(input: &str) -> Option<(&str, &str)> {
    if input.is_empty() {
        return None;
    }
    match input.find('\n') {
        Some(index) => Some((input[..index].trim_end_matches('\r'), &input[index + 1..])),
        None => Some((input, "")),
    }
}
