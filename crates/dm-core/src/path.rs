use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::MapperError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    /// Any element of an array, rendered `[]`.
    Items,
    Index(usize),
}

pub fn parse_path(text: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = text.trim().chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '.' => flush_key(&mut current, &mut segments),
            '[' => {
                flush_key(&mut current, &mut segments);
                let mut inner = String::new();
                for next in chars.by_ref() {
                    if next == ']' {
                        break;
                    }
                    inner.push(next);
                }
                let inner = inner.trim();
                if inner.is_empty() {
                    segments.push(PathSegment::Items);
                } else if let Ok(index) = inner.parse::<usize>() {
                    segments.push(PathSegment::Index(index));
                } else {
                    segments.push(PathSegment::Key(
                        inner.trim_matches(|c| c == '"' || c == '\'').to_string(),
                    ));
                }
            }
            _ => current.push(ch),
        }
    }
    flush_key(&mut current, &mut segments);
    segments
}

fn flush_key(current: &mut String, segments: &mut Vec<PathSegment>) {
    let key = current.trim();
    if !key.is_empty() {
        segments.push(PathSegment::Key(key.to_string()));
    }
    current.clear();
}

pub fn render_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Items => out.push_str("[]"),
            PathSegment::Index(index) => out.push_str(&format!("[{}]", index)),
        }
    }
    out
}

pub fn get_path<'a>(value: &'a JsonValue, segments: &[PathSegment]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Key(key), JsonValue::Object(entries)) => entries.get(key)?,
            (PathSegment::Key(key), JsonValue::Array(items)) => {
                items.get(key.parse::<usize>().ok()?)?
            }
            (PathSegment::Index(index), JsonValue::Array(items)) => items.get(*index)?,
            (PathSegment::Items, JsonValue::Array(items)) => items.first()?,
            _ => return None,
        };
    }
    Some(current)
}

/// Writes `new_value` at `segments`, creating intermediate objects and arrays.
/// A trailing `[]` appends to the array.
pub fn set_path(
    target: &mut JsonValue,
    segments: &[PathSegment],
    new_value: JsonValue,
) -> Result<(), MapperError> {
    let Some((head, rest)) = segments.split_first() else {
        *target = new_value;
        return Ok(());
    };

    let container_for_next = || match rest.first() {
        Some(PathSegment::Index(_)) | Some(PathSegment::Items) => JsonValue::Array(Vec::new()),
        _ => JsonValue::Object(JsonMap::new()),
    };

    match head {
        PathSegment::Key(key) => {
            if target.is_null() {
                *target = JsonValue::Object(JsonMap::new());
            }
            match target {
                JsonValue::Object(entries) => {
                    let slot = entries.entry(key.clone()).or_insert_with(container_for_next);
                    if rest.is_empty() {
                        *slot = new_value;
                        return Ok(());
                    }
                    set_path(slot, rest, new_value)
                }
                JsonValue::Array(items) => {
                    let index = key.parse::<usize>().map_err(|_| {
                        MapperError::new(
                            "PATH_NOT_AN_OBJECT",
                            format!("Cannot write key \"{}\" into an array.", key),
                        )
                    })?;
                    set_array_slot(items, index, rest, new_value, container_for_next)
                }
                _ => Err(MapperError::new(
                    "PATH_NOT_AN_OBJECT",
                    format!("Cannot write key \"{}\" into a scalar value.", key),
                )),
            }
        }
        PathSegment::Index(index) => {
            if target.is_null() {
                *target = JsonValue::Array(Vec::new());
            }
            match target {
                JsonValue::Array(items) => {
                    set_array_slot(items, *index, rest, new_value, container_for_next)
                }
                _ => Err(MapperError::new(
                    "PATH_NOT_AN_ARRAY",
                    format!("Cannot write index {} into a non-array value.", index),
                )),
            }
        }
        PathSegment::Items => {
            if target.is_null() {
                *target = JsonValue::Array(Vec::new());
            }
            match target {
                JsonValue::Array(items) => {
                    let index = if rest.is_empty() { items.len() } else { 0 };
                    set_array_slot(items, index, rest, new_value, container_for_next)
                }
                _ => Err(MapperError::new(
                    "PATH_NOT_AN_ARRAY",
                    "Cannot append into a non-array value.",
                )),
            }
        }
    }
}

/// How far past the end of an array a write may pad with nulls.
pub const MAX_INDEX_GAP: usize = 10_000;

fn set_array_slot(
    items: &mut Vec<JsonValue>,
    index: usize,
    rest: &[PathSegment],
    new_value: JsonValue,
    container_for_next: impl Fn() -> JsonValue,
) -> Result<(), MapperError> {
    if index > items.len().saturating_add(MAX_INDEX_GAP) {
        return Err(MapperError::new(
            "PATH_INDEX_TOO_LARGE",
            format!(
                "Index {} is more than {} past the end of an array of {} items.",
                index,
                MAX_INDEX_GAP,
                items.len()
            ),
        ));
    }
    while items.len() <= index {
        items.push(if rest.is_empty() {
            JsonValue::Null
        } else {
            container_for_next()
        });
    }
    if rest.is_empty() {
        items[index] = new_value;
        return Ok(());
    }
    set_path(&mut items[index], rest, new_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(name: &str) -> PathSegment {
        PathSegment::Key(name.to_string())
    }

    #[test]
    fn parse_path_handles_dots_items_and_indices() {
        assert_eq!(
            parse_path("products[].id"),
            vec![key("products"), PathSegment::Items, key("id")]
        );
        assert_eq!(
            parse_path("a.b[2].c"),
            vec![key("a"), key("b"), PathSegment::Index(2), key("c")]
        );
        assert_eq!(parse_path("order[\"@id\"]"), vec![key("order"), key("@id")]);
        assert!(parse_path("  ").is_empty());
    }

    #[test]
    fn render_path_attaches_brackets_without_dots() {
        let segments = vec![key("products"), PathSegment::Items, key("id")];
        assert_eq!(render_path(&segments), "products[].id");
        assert_eq!(render_path(&[PathSegment::Items]), "[]");
        assert_eq!(render_path(&[key("a"), PathSegment::Index(3)]), "a[3]");
    }

    #[test]
    fn get_path_reads_objects_and_arrays() {
        let data = json!({"products": [{"id": 1}, {"id": 2}], "meta": {"count": 2}});
        assert_eq!(get_path(&data, &parse_path("meta.count")), Some(&json!(2)));
        assert_eq!(get_path(&data, &parse_path("products[1].id")), Some(&json!(2)));
        assert_eq!(get_path(&data, &parse_path("products.0.id")), Some(&json!(1)));
        assert_eq!(get_path(&data, &parse_path("products[].id")), Some(&json!(1)));
        assert_eq!(get_path(&data, &parse_path("meta.missing")), None);
        assert_eq!(get_path(&data, &parse_path("meta.count.deeper")), None);
    }

    #[test]
    fn set_path_creates_intermediate_containers() {
        let mut data = json!({});
        set_path(&mut data, &parse_path("order.lines[1].sku"), json!("A-1"))
            .expect("set should pass");
        assert_eq!(data, json!({"order": {"lines": [{}, {"sku": "A-1"}]}}));

        set_path(&mut data, &parse_path("order.tags[]"), json!("x")).expect("append");
        set_path(&mut data, &parse_path("order.tags[]"), json!("y")).expect("append");
        assert_eq!(data["order"]["tags"], json!(["x", "y"]));
    }

    #[test]
    fn set_path_bounds_index_padding() {
        let mut data = json!({"rows": [1]});
        let error = set_path(&mut data, &parse_path("rows[20000000]"), json!(2))
            .expect_err("index far past the end");
        assert_eq!(error.code, "PATH_INDEX_TOO_LARGE");
        assert_eq!(data, json!({"rows": [1]}));

        set_path(&mut data, &parse_path(&format!("rows[{}]", MAX_INDEX_GAP + 1)), json!(2))
            .expect("padding within the gap");
        assert_eq!(data["rows"].as_array().map(Vec::len), Some(MAX_INDEX_GAP + 2));
    }

    #[test]
    fn set_path_rejects_writes_into_scalars() {
        let mut data = json!({"name": "x"});
        let error = set_path(&mut data, &parse_path("name.first"), json!("y"))
            .expect_err("scalar cannot hold keys");
        assert_eq!(error.code, "PATH_NOT_AN_OBJECT");
    }
}
