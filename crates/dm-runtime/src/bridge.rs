use rhai::{Array, Dynamic, ImmutableString, Map, FLOAT, INT};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::shims::{BigDecimal, DateValue, Locale, XmlNode, XmlNodeList};

/// Largest magnitude at which a whole float is still printed as an integer.
const WHOLE_FLOAT_LIMIT: f64 = 9.0e15;

pub fn json_to_dynamic(value: &JsonValue) -> Dynamic {
    match value {
        JsonValue::Null => Dynamic::UNIT,
        JsonValue::Bool(value) => Dynamic::from_bool(*value),
        JsonValue::Number(number) => match number.as_i64() {
            Some(value) => Dynamic::from_int(value as INT),
            None => Dynamic::from_float(number.as_f64().unwrap_or_default() as FLOAT),
        },
        JsonValue::String(value) => Dynamic::from(value.clone()),
        JsonValue::Array(items) => {
            Dynamic::from_array(items.iter().map(json_to_dynamic).collect::<Array>())
        }
        JsonValue::Object(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.as_str().into(), json_to_dynamic(value));
            }
            Dynamic::from_map(map)
        }
    }
}

pub fn dynamic_to_json(value: &Dynamic) -> JsonValue {
    if value.is_unit() {
        return JsonValue::Null;
    }
    if value.is::<bool>() {
        return JsonValue::Bool(value.clone().cast::<bool>());
    }
    if value.is::<INT>() {
        return JsonValue::Number(JsonNumber::from(value.clone().cast::<INT>()));
    }
    if value.is::<FLOAT>() {
        return float_to_json(value.clone().cast::<FLOAT>());
    }
    if value.is::<ImmutableString>() {
        return JsonValue::String(value.clone().cast::<ImmutableString>().to_string());
    }
    if value.is::<char>() {
        return JsonValue::String(value.clone().cast::<char>().to_string());
    }
    if let Some(array) = value.read_lock::<Array>() {
        return JsonValue::Array(array.iter().map(dynamic_to_json).collect());
    }
    if let Some(map) = value.read_lock::<Map>() {
        let mut entries = JsonMap::new();
        for (key, value) in map.iter() {
            entries.insert(key.to_string(), dynamic_to_json(value));
        }
        return JsonValue::Object(entries);
    }
    JsonValue::String(custom_text(value).unwrap_or_else(|| value.to_string()))
}

/// Whole floats become integers so `105.0` serializes as `105`.
pub fn float_to_json(value: f64) -> JsonValue {
    if !value.is_finite() {
        return JsonValue::Null;
    }
    if value.fract() == 0.0 && value.abs() < WHOLE_FLOAT_LIMIT {
        return JsonValue::Number(JsonNumber::from(value as i64));
    }
    JsonNumber::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// Path of the output root in a key-order descriptor.
pub const ORDER_ROOT: &str = "$";

/// Reorders mappings after a key-order descriptor: listed keys come first in
/// listed order, unlisted keys follow in their current order. Array items are
/// addressed as `path[]`.
pub fn apply_key_order(value: JsonValue, order: &Map, path: &str) -> JsonValue {
    match value {
        JsonValue::Array(items) => {
            let items_path = format!("{}[]", path);
            JsonValue::Array(
                items
                    .into_iter()
                    .map(|item| apply_key_order(item, order, &items_path))
                    .collect(),
            )
        }
        JsonValue::Object(entries) => {
            let mut pending = entries
                .into_iter()
                .map(|(key, value)| (key, Some(value)))
                .collect::<Vec<_>>();
            let mut ordered = JsonMap::with_capacity(pending.len());
            let listed = order
                .get(path)
                .and_then(|keys| keys.read_lock::<Array>().map(|keys| keys.clone()))
                .unwrap_or_default();
            for key in listed.iter().map(dynamic_to_text) {
                let slot = pending
                    .iter_mut()
                    .find(|(existing, _)| *existing == key)
                    .and_then(|(_, slot)| slot.take());
                if let Some(child) = slot {
                    let child_path = format!("{}.{}", path, key);
                    ordered.insert(key, apply_key_order(child, order, &child_path));
                }
            }
            for (key, slot) in pending {
                if let Some(child) = slot {
                    let child_path = format!("{}.{}", path, key);
                    ordered.insert(key, apply_key_order(child, order, &child_path));
                }
            }
            JsonValue::Object(ordered)
        }
        scalar => scalar,
    }
}

pub fn to_json_text(value: &Dynamic) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&dynamic_to_json(value))
}

/// Text form of a script value: unit is empty, strings verbatim, containers
/// as JSON.
pub fn dynamic_to_text(value: &Dynamic) -> String {
    if value.is_unit() {
        return String::new();
    }
    if value.is::<ImmutableString>() {
        return value.clone().cast::<ImmutableString>().to_string();
    }
    if value.is::<FLOAT>() {
        return match float_to_json(value.clone().cast::<FLOAT>()) {
            JsonValue::Null => value.to_string(),
            number => number.to_string(),
        };
    }
    if value.is::<Array>() || value.is::<Map>() {
        return to_json_text(value).unwrap_or_else(|_| value.to_string());
    }
    custom_text(value).unwrap_or_else(|| value.to_string())
}

fn custom_text(value: &Dynamic) -> Option<String> {
    if let Some(date) = value.read_lock::<DateValue>() {
        return Some(date.to_iso());
    }
    if let Some(decimal) = value.read_lock::<BigDecimal>() {
        return Some(decimal.to_string());
    }
    if let Some(locale) = value.read_lock::<Locale>() {
        return Some(locale.to_string());
    }
    if let Some(node) = value.read_lock::<XmlNode>() {
        return Some(node.text());
    }
    if let Some(list) = value.read_lock::<XmlNodeList>() {
        return Some(list.text());
    }
    None
}

/// JavaScript-style truthiness.
pub fn is_truthy(value: &Dynamic) -> bool {
    if value.is_unit() {
        return false;
    }
    if value.is::<bool>() {
        return value.clone().cast::<bool>();
    }
    if value.is::<INT>() {
        return value.clone().cast::<INT>() != 0;
    }
    if value.is::<FLOAT>() {
        let number = value.clone().cast::<FLOAT>();
        return number != 0.0 && !number.is_nan();
    }
    if value.is::<ImmutableString>() {
        return !value.clone().cast::<ImmutableString>().is_empty();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_values_round_trip_through_dynamic() {
        let value = json!({"a": [1, 2.5, "x", null, true], "b": {"c": -3}});
        assert_eq!(dynamic_to_json(&json_to_dynamic(&value)), value);
    }

    #[test]
    fn whole_floats_serialize_as_integers() {
        assert_eq!(float_to_json(105.0), json!(105));
        assert_eq!(float_to_json(2.5), json!(2.5));
        assert_eq!(float_to_json(f64::NAN), JsonValue::Null);
        assert_eq!(dynamic_to_text(&Dynamic::from_float(3.0)), "3");
    }

    #[test]
    fn text_coercion_covers_unit_strings_and_containers() {
        assert_eq!(dynamic_to_text(&Dynamic::UNIT), "");
        assert_eq!(dynamic_to_text(&Dynamic::from("plain")), "plain");
        assert_eq!(dynamic_to_text(&Dynamic::from_int(7)), "7");
        assert_eq!(dynamic_to_text(&Dynamic::from_bool(true)), "true");
        let map = json_to_dynamic(&json!({"k": 1}));
        assert_eq!(dynamic_to_text(&map), "{\n  \"k\": 1\n}");
    }

    #[test]
    fn truthiness_follows_script_conventions() {
        assert!(!is_truthy(&Dynamic::UNIT));
        assert!(!is_truthy(&Dynamic::from_int(0)));
        assert!(!is_truthy(&Dynamic::from("")));
        assert!(is_truthy(&Dynamic::from("0")));
        assert!(is_truthy(&json_to_dynamic(&json!([]))));
    }
}
