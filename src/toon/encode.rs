use serde_json::{Map, Value};

use super::{is_bare_key, needs_quotes};

const INDENT: &str = "  ";

/// Render a JSON value as TOON.
pub fn encode(value: &Value) -> String {
    let mut out = Vec::new();
    match value {
        Value::Object(map) => encode_fields(map, 0, &mut out),
        Value::Array(items) => encode_array(String::new(), items, 1, &mut out),
        primitive => out.push(encode_primitive(primitive)),
    }
    out.join("\n")
}

fn indent(depth: usize) -> String {
    INDENT.repeat(depth)
}

fn encode_fields(map: &Map<String, Value>, depth: usize, out: &mut Vec<String>) {
    for (key, value) in map {
        let head = format!("{}{}", indent(depth), encode_key(key));
        match value {
            Value::Object(child) => {
                out.push(format!("{head}:"));
                encode_fields(child, depth + 1, out);
            }
            Value::Array(items) => encode_array(head, items, depth + 1, out),
            primitive => out.push(format!("{head}: {}", encode_primitive(primitive))),
        }
    }
}

/// `head` is everything before the `[N]` marker; children go at `child_depth`.
fn encode_array(head: String, items: &[Value], child_depth: usize, out: &mut Vec<String>) {
    let len = items.len();
    if items.is_empty() {
        out.push(format!("{head}[0]:"));
        return;
    }

    if items.iter().all(is_primitive) {
        out.push(format!("{head}[{len}]: {}", join_primitives(items.iter())));
        return;
    }

    if let Some(fields) = tabular_fields(items) {
        let header = fields
            .iter()
            .map(|f| encode_key(f))
            .collect::<Vec<_>>()
            .join(",");
        out.push(format!("{head}[{len}]{{{header}}}:"));
        let row_indent = indent(child_depth);
        for item in items {
            let row = join_primitives(fields.iter().map(|f| &item[f.as_str()]));
            out.push(format!("{row_indent}{row}"));
        }
        return;
    }

    out.push(format!("{head}[{len}]:"));
    for item in items {
        encode_list_item(item, child_depth, out);
    }
}

fn encode_list_item(item: &Value, depth: usize, out: &mut Vec<String>) {
    let marker = format!("{}-", indent(depth));
    match item {
        Value::Object(map) => {
            out.push(marker);
            encode_fields(map, depth + 1, out);
        }
        Value::Array(items) => encode_array(format!("{marker} "), items, depth + 1, out),
        primitive => out.push(format!("{marker} {}", encode_primitive(primitive))),
    }
}

/// Field names shared, in order, by every element when all values are primitive.
fn tabular_fields(items: &[Value]) -> Option<Vec<String>> {
    let first = items.first()?.as_object()?;
    if first.is_empty() {
        return None;
    }
    let fields: Vec<String> = first.keys().cloned().collect();
    let uniform = items.iter().all(|item| {
        item.as_object().is_some_and(|obj| {
            obj.len() == fields.len()
                && obj.keys().zip(&fields).all(|(a, b)| a == b)
                && obj.values().all(is_primitive)
        })
    });
    uniform.then_some(fields)
}

fn is_primitive(value: &Value) -> bool {
    !(value.is_object() || value.is_array())
}

fn join_primitives<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    values.map(encode_primitive).collect::<Vec<_>>().join(",")
}

fn encode_primitive(value: &Value) -> String {
    match value {
        Value::String(text) if needs_quotes(text) => quote(text),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn encode_key(key: &str) -> String {
    if is_bare_key(key) {
        key.to_string()
    } else {
        quote(key)
    }
}

fn quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}
