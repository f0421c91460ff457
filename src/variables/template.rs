use crate::dashboard::model::VariableValue;
use crate::variables::sync::VariableValues;
use crate::variables::time_range::parse_time;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(\w+)|\[\[(\w+?)(?::(\w+))?\]\]|\$\{(\w+)(?::(\w+))?\}").expect("valid regex")
});

/// Render a variable value according to a `${name:format}` specifier.
fn render(value: &VariableValue, format: Option<&str>) -> String {
    let values = value.values();
    match format {
        Some("csv") => values.join(","),
        Some("pipe") => values.join("|"),
        Some("json") => serde_json::to_string(&values).unwrap_or_default(),
        Some("percentencode") => values
            .iter()
            .map(|v| urlencoding::encode(v).into_owned())
            .collect::<Vec<_>>()
            .join(","),
        Some("regex") => {
            let escaped: Vec<String> = values.iter().map(|v| regex::escape(v)).collect();
            if escaped.len() == 1 {
                escaped[0].clone()
            } else {
                format!("({})", escaped.join("|"))
            }
        }
        _ => match value {
            VariableValue::Single(v) => v.clone(),
            VariableValue::Multi(vs) if vs.len() == 1 => vs[0].clone(),
            VariableValue::Multi(vs) => format!("{{{}}}", vs.join(",")),
        },
    }
}

fn builtin(name: &str, values: &VariableValues, now: DateTime<Utc>) -> Option<String> {
    let raw = match name {
        "__from" => values.from.as_deref()?,
        "__to" => values.to.as_deref()?,
        _ => return None,
    };
    Some(
        parse_time(raw, now)
            .map(|t| t.timestamp_millis().to_string())
            .unwrap_or_else(|_| raw.to_string()),
    )
}

/// Replace `$name`, `${name}`, `${name:format}` and `[[name]]` references.
///
/// Unknown names are left as written. `$__from`/`$__to` expand to epoch
/// milliseconds of the current time range.
pub fn substitute(text: &str, values: &VariableValues) -> String {
    substitute_at(text, values, Utc::now())
}

pub fn substitute_at(text: &str, values: &VariableValues, now: DateTime<Utc>) -> String {
    if !text.contains('$') && !text.contains("[[") {
        return text.to_string();
    }
    VARIABLE_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let format = caps.get(3).or_else(|| caps.get(5)).map(|m| m.as_str());
            if let Some(v) = builtin(name, values, now) {
                return v;
            }
            match values.variables.get(name) {
                Some(value) => render(value, format),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Apply [`substitute`] to every string inside a JSON value.
pub fn substitute_json(value: &Value, values: &VariableValues) -> Value {
    let now = Utc::now();
    substitute_json_at(value, values, now)
}

fn substitute_json_at(value: &Value, values: &VariableValues, now: DateTime<Utc>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_at(s, values, now)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| substitute_json_at(v, values, now))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_json_at(v, values, now)))
                .collect(),
        ),
        other => other.clone(),
    }
}
