use dm_core::MapperError;
use roxmltree::{Document, Node, NodeType};
use serde_json::{Map as JsonMap, Value as JsonValue};

pub const ATTRIBUTE_PREFIX: &str = "@";
pub const TEXT_KEY: &str = "#text";

const FALLBACK_ROOT: &str = "root";

/// Parses XML into the data shape scripts see: `{ rootName: element }`.
pub fn parse_xml_value(source: &str) -> Result<JsonValue, MapperError> {
    let document = Document::parse(source)
        .map_err(|error| MapperError::new("XML_PARSE_ERROR", error.to_string()))?;

    let Some(root) = document.root().children().find(|node| node.is_element()) else {
        return Err(MapperError::new(
            "XML_PARSE_ERROR",
            "XML document must contain a root element.",
        ));
    };

    let mut top = JsonMap::new();
    top.insert(root.tag_name().name().to_string(), element_value(root));
    Ok(JsonValue::Object(top))
}

fn element_value(node: Node<'_, '_>) -> JsonValue {
    let mut entries = JsonMap::new();
    for attribute in node.attributes() {
        entries.insert(
            format!("{}{}", ATTRIBUTE_PREFIX, attribute.name()),
            JsonValue::String(attribute.value().to_string()),
        );
    }

    let mut text = String::new();
    let mut has_elements = false;
    for child in node.children() {
        match child.node_type() {
            NodeType::Element => {
                has_elements = true;
                let name = child.tag_name().name().to_string();
                let value = element_value(child);
                // Repeats fold into an array at the first occurrence's position.
                match entries.get_mut(&name) {
                    None => {
                        entries.insert(name, value);
                    }
                    Some(JsonValue::Array(items)) => items.push(value),
                    Some(previous) => {
                        let first = previous.take();
                        *previous = JsonValue::Array(vec![first, value]);
                    }
                }
            }
            NodeType::Text => text.push_str(child.text().unwrap_or_default()),
            _ => {}
        }
    }

    let text = text.trim();
    if entries.is_empty() && !has_elements {
        return JsonValue::String(text.to_string());
    }
    if !text.is_empty() {
        entries.insert(TEXT_KEY.to_string(), JsonValue::String(text.to_string()));
    }
    JsonValue::Object(entries)
}

pub fn write_xml_value(value: &JsonValue) -> Result<String, MapperError> {
    let JsonValue::Object(entries) = value else {
        return Err(MapperError::new(
            "XML_SERIALIZE_ERROR",
            format!("XML output must be a mapping, found {}.", json_kind(value)),
        ));
    };

    let mut out = String::new();
    match entries.iter().next() {
        Some((name, root)) if entries.len() == 1 && !root.is_array() => {
            write_element(name, root, 0, &mut out);
        }
        _ => write_element(FALLBACK_ROOT, value, 0, &mut out),
    }
    Ok(out.trim_end().to_string())
}

fn write_element(name: &str, value: &JsonValue, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match value {
        JsonValue::Array(items) => {
            for item in items {
                write_element(name, item, depth, out);
            }
        }
        JsonValue::Object(entries) => {
            out.push_str(&indent);
            out.push('<');
            out.push_str(name);
            for (key, attribute) in entries {
                if let Some(attribute_name) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                    out.push_str(&format!(
                        " {}=\"{}\"",
                        attribute_name,
                        escape_attribute(&scalar_text(attribute))
                    ));
                }
            }

            let text = entries.get(TEXT_KEY).map(scalar_text).unwrap_or_default();
            let children = entries
                .iter()
                .filter(|(key, _)| !key.starts_with(ATTRIBUTE_PREFIX) && key.as_str() != TEXT_KEY)
                .collect::<Vec<_>>();

            if children.is_empty() {
                if text.is_empty() {
                    out.push_str("/>\n");
                } else {
                    out.push('>');
                    out.push_str(&escape_text(&text));
                    out.push_str(&format!("</{}>\n", name));
                }
                return;
            }

            out.push_str(">\n");
            if !text.is_empty() {
                out.push_str(&format!("{}  {}\n", indent, escape_text(&text)));
            }
            for (key, child) in children {
                write_element(key, child, depth + 1, out);
            }
            out.push_str(&format!("{}</{}>\n", indent, name));
        }
        JsonValue::Null => out.push_str(&format!("{}<{}/>\n", indent, name)),
        scalar => out.push_str(&format!(
            "{}<{}>{}</{}>\n",
            indent,
            name,
            escape_text(&scalar_text(scalar)),
            name
        )),
    }
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_xml_value_maps_attributes_text_and_repeats() {
        let value = parse_xml_value(
            r#"<order id="7">
  <line sku="A">2</line>
  <line sku="B">3</line>
  <note>fragile</note>
  <empty/>
</order>"#,
        )
        .expect("xml should parse");

        assert_eq!(
            value,
            json!({
                "order": {
                    "@id": "7",
                    "line": [
                        {"@sku": "A", "#text": "2"},
                        {"@sku": "B", "#text": "3"}
                    ],
                    "note": "fragile",
                    "empty": ""
                }
            })
        );
    }

    #[test]
    fn parse_xml_value_reports_invalid_documents() {
        let error = parse_xml_value("<order>").expect_err("unclosed root");
        assert_eq!(error.code, "XML_PARSE_ERROR");
    }

    #[test]
    fn write_xml_value_escapes_and_repeats_arrays() {
        let xml = write_xml_value(&json!({
            "order": {
                "@id": "a&b",
                "line": [{"@sku": "A", "#text": "2"}, {"@sku": "B"}],
                "note": "x < y",
                "missing": null
            }
        }))
        .expect("xml should serialize");

        assert_eq!(
            xml,
            "<order id=\"a&amp;b\">\n  <line sku=\"A\">2</line>\n  <line sku=\"B\"/>\n  <note>x &lt; y</note>\n  <missing/>\n</order>"
        );
    }

    #[test]
    fn repeated_elements_keep_document_order() {
        let source = "<order>\n  <sku>A</sku>\n  <note>x</note>\n  <sku>B</sku>\n  <amount>2</amount>\n</order>";
        let value = parse_xml_value(source).expect("parse");
        let keys = value["order"]
            .as_object()
            .expect("order element")
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["sku", "note", "amount"]);
    }

    #[test]
    fn write_xml_value_wraps_multiple_top_level_keys() {
        let xml = write_xml_value(&json!({"a": 1, "b": true})).expect("xml should serialize");
        assert_eq!(xml, "<root>\n  <a>1</a>\n  <b>true</b>\n</root>");
    }

    #[test]
    fn write_xml_value_rejects_non_mappings() {
        let error = write_xml_value(&json!([1])).expect_err("array root");
        assert_eq!(error.code, "XML_SERIALIZE_ERROR");
    }

    #[test]
    fn xml_round_trips_through_data_shape() {
        let source = "<order id=\"7\">\n  <line>1</line>\n  <line>2</line>\n</order>";
        let value = parse_xml_value(source).expect("parse");
        assert_eq!(write_xml_value(&value).expect("write"), source);
    }
}
