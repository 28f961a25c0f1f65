use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Map};
use serde_json::Value as JsonValue;

use super::runtime_error;
use crate::bridge::{apply_key_order, dynamic_to_json, json_to_dynamic, to_json_text, ORDER_ROOT};

pub(super) fn register(engine: &mut Engine) {
    engine.register_fn("parseJSON", parse_json);
    engine.register_fn("toJSON", to_json);
    engine.register_fn("toJSON", to_json_ordered);
    engine.register_fn("parseXML", parse_xml);
    engine.register_fn("toXML", to_xml);
    engine.register_fn("toXML", to_xml_ordered);
    engine.register_fn("asArray", as_array);
    engine.register_fn("isEmpty", is_empty);
}

fn parse_json(text: ImmutableString) -> Result<Dynamic, Box<EvalAltResult>> {
    let value = serde_json::from_str::<JsonValue>(&text)
        .map_err(|error| runtime_error(format!("parseJSON: {}", error)))?;
    Ok(json_to_dynamic(&value))
}

fn to_json(value: Dynamic) -> Result<ImmutableString, Box<EvalAltResult>> {
    to_json_text(&value)
        .map(Into::into)
        .map_err(|error| runtime_error(format!("toJSON: {}", error)))
}

fn to_json_ordered(value: Dynamic, order: Map) -> Result<ImmutableString, Box<EvalAltResult>> {
    let ordered = apply_key_order(dynamic_to_json(&value), &order, ORDER_ROOT);
    serde_json::to_string_pretty(&ordered)
        .map(Into::into)
        .map_err(|error| runtime_error(format!("toJSON: {}", error)))
}

fn parse_xml(text: ImmutableString) -> Result<Dynamic, Box<EvalAltResult>> {
    let value = dm_parser::parse_xml_value(&text)
        .map_err(|error| runtime_error(format!("parseXML: {}", error.message)))?;
    Ok(json_to_dynamic(&value))
}

fn to_xml(value: Dynamic) -> Result<ImmutableString, Box<EvalAltResult>> {
    dm_parser::write_xml_value(&dynamic_to_json(&value))
        .map(Into::into)
        .map_err(|error| runtime_error(format!("toXML: {}", error.message)))
}

fn to_xml_ordered(value: Dynamic, order: Map) -> Result<ImmutableString, Box<EvalAltResult>> {
    let ordered = apply_key_order(dynamic_to_json(&value), &order, ORDER_ROOT);
    dm_parser::write_xml_value(&ordered)
        .map(Into::into)
        .map_err(|error| runtime_error(format!("toXML: {}", error.message)))
}

fn as_array(value: Dynamic) -> Array {
    if value.is_unit() {
        return Array::new();
    }
    if value.is::<Array>() {
        return value.cast::<Array>();
    }
    vec![value]
}

fn is_empty(value: Dynamic) -> bool {
    if value.is_unit() {
        return true;
    }
    if let Some(text) = value.read_lock::<ImmutableString>() {
        return text.is_empty();
    }
    if let Some(array) = value.read_lock::<Array>() {
        return array.is_empty();
    }
    if let Some(map) = value.read_lock::<Map>() {
        return map.is_empty();
    }
    false
}
