mod tree;
mod xml;

pub use tree::{tree_from_value, value_from_tree, DEFAULT_ROOT_NAME};
pub use xml::{parse_xml_value, write_xml_value, ATTRIBUTE_PREFIX, TEXT_KEY};

use dm_core::{InputType, MapperError, TreeNode};
use serde_json::Value as JsonValue;

pub fn parse_data(text: &str, input_type: InputType) -> Result<JsonValue, MapperError> {
    match input_type {
        InputType::Json => serde_json::from_str(text).map_err(|error| {
            MapperError::new("JSON_PARSE_ERROR", format!("Invalid JSON input: {}", error))
        }),
        InputType::Xml => parse_xml_value(text),
    }
}

pub fn serialize_data(value: &JsonValue, input_type: InputType) -> Result<String, MapperError> {
    match input_type {
        InputType::Json => serde_json::to_string_pretty(value)
            .map_err(|error| MapperError::new("JSON_SERIALIZE_ERROR", error.to_string())),
        InputType::Xml => write_xml_value(value),
    }
}

/// Parses a document into the tree shown in the mapping editor.
pub fn parse_document(text: &str, input_type: InputType) -> Result<TreeNode, MapperError> {
    let value = parse_data(text, input_type)?;
    let tree = tree_from_value(&value, DEFAULT_ROOT_NAME);
    tracing::debug!(input_type = %input_type, "parsed document into tree");
    Ok(tree)
}
