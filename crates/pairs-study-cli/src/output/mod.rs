pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// `{"first": "A", "second": "B"}` renders as `A/B`.
fn as_pair(map: &Map<String, Value>) -> Option<String> {
    if map.len() != 2 {
        return None;
    }
    match (map.get("first"), map.get("second")) {
        (Some(Value::String(a)), Some(Value::String(b))) => Some(format!("{a}/{b}")),
        _ => None,
    }
}

/// Flatten nested objects into dotted keys: `{"a": {"b": 1}}` → `a.b = 1`.
/// Pairs collapse to `A/B`; arrays are kept as leaves.
fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) if as_pair(map).is_none() => {
            for (key, val) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&name, val, out);
            }
        }
        Value::Object(map) => {
            out.push((prefix.to_string(), Value::String(as_pair(map).unwrap_or_default())));
        }
        _ => out.push((prefix.to_string(), value.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_collapses_pairs() {
        let value = json!({
            "pair": {"first": "ADBE", "second": "MSFT"},
            "summary": {"total_return": 0.5, "days_flat": 3},
            "pairs": [{"first": "A", "second": "B"}]
        });
        let mut out = Vec::new();
        flatten("", &value, &mut out);
        let keys: Vec<&str> = out.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"summary.total_return"));
        assert!(keys.contains(&"pairs"));
        let pair = out.iter().find(|(k, _)| k == "pair").unwrap();
        assert_eq!(pair.1, json!("ADBE/MSFT"));
    }
}
