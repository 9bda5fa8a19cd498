use serde_json::Value;

use super::as_pair;

/// Key answer fields in order of priority. Looked up in the result and in
/// its nested objects.
const PRIORITY_KEYS: [&str; 5] = [
    "cumulative_return",
    "total_return",
    "hedge_ratio",
    "pairs",
    "p_value",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Series: the last row carries the final cumulative return
    let result_obj = match result_obj {
        Value::Array(rows) => match rows.last() {
            Some(last) => last,
            None => {
                println!("(empty)");
                return;
            }
        },
        other => other,
    };

    for key in &PRIORITY_KEYS {
        if let Some(val) = find_key(result_obj, key, 2) {
            println!("{}", format_minimal(val));
            return;
        }
    }

    if let Value::Object(map) = result_obj {
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

/// Non-null value under `key`, searching nested objects up to `depth` levels.
fn find_key<'a>(value: &'a Value, key: &str, depth: usize) -> Option<&'a Value> {
    let map = value.as_object()?;
    if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
        return Some(val);
    }
    if depth == 0 {
        return None;
    }
    map.values()
        .filter(|v| v.is_object())
        .find_map(|v| find_key(v, key, depth - 1))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Object(map) => {
            as_pair(map).unwrap_or_else(|| serde_json::to_string(value).unwrap_or_default())
        }
        Value::Array(items) => items
            .iter()
            .map(format_minimal)
            .collect::<Vec<_>>()
            .join(" "),
    }
}
