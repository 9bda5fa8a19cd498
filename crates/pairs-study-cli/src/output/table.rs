use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{as_pair, flatten};

/// Arrays longer than this are summarised by their length.
const MAX_INLINE_ITEMS: usize = 12;

/// Result fields drawn as their own grid (or superseded by one).
const GRID_KEYS: [&str; 3] = ["heatmap", "scores", "p_values"];

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_flat_object(map);
            }
        }
        Value::Array(arr) => {
            print_array_table(arr);
        }
        _ => {
            println!("{}", value);
        }
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => {
            let fields: Map<String, Value> = res_map
                .iter()
                .filter(|(k, _)| !GRID_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            print_flat_object(&fields);
            if let Some(heatmap) = res_map.get("heatmap") {
                print_heatmap(heatmap);
            }
        }
        Value::Array(rows) => print_array_table(rows),
        _ => println!("{}", result),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_flat_object(map: &Map<String, Value>) {
    let mut fields = Vec::new();
    flatten("", &Value::Object(map.clone()), &mut fields);

    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in &fields {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

/// Symbol × symbol grid of significant p-values; masked cells print as `.`.
fn print_heatmap(heatmap: &Value) {
    let symbols: Vec<String> = heatmap
        .get("symbols")
        .and_then(Value::as_array)
        .map(|a| a.iter().map(format_value).collect())
        .unwrap_or_default();
    let cells = heatmap.get("cells").and_then(Value::as_array);
    let (Some(cells), false) = (cells, symbols.is_empty()) else {
        return;
    };

    let mut builder = Builder::default();
    let mut header = vec![String::new()];
    header.extend(symbols.iter().cloned());
    builder.push_record(header);

    for (sym, row) in symbols.iter().zip(cells) {
        let mut record = vec![sym.clone()];
        if let Value::Array(row) = row {
            record.extend(row.iter().map(|cell| match cell.as_f64() {
                Some(p) => format!("{p:.4}"),
                None => ".".to_string(),
            }));
        }
        builder.push_record(record);
    }

    let threshold = heatmap
        .get("threshold")
        .map(format_value)
        .unwrap_or_default();
    println!("\nP-values below {threshold} (row regressed on column):");
    println!("{}", Table::from(builder));
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    // Collect all keys from first object for headers
    if let Some(first @ Value::Object(_)) = arr.first() {
        let mut first_fields = Vec::new();
        flatten("", first, &mut first_fields);
        let headers: Vec<String> = first_fields.into_iter().map(|(k, _)| k).collect();

        let mut builder = Builder::default();
        builder.push_record(&headers);
        for item in arr {
            let mut fields = Vec::new();
            flatten("", item, &mut fields);
            let row: Vec<String> = headers
                .iter()
                .map(|h| {
                    fields
                        .iter()
                        .find(|(k, _)| k == h)
                        .map(|(_, v)| format_value(v))
                        .unwrap_or_default()
                })
                .collect();
            builder.push_record(row);
        }
        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) if arr.len() > MAX_INLINE_ITEMS => format!("({} values)", arr.len()),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(map) => {
            as_pair(map).unwrap_or_else(|| serde_json::to_string(value).unwrap_or_default())
        }
    }
}
