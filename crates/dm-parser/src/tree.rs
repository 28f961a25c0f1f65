use std::collections::HashSet;

use dm_core::{NodeType, TreeNode};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::xml::ATTRIBUTE_PREFIX;

pub const DEFAULT_ROOT_NAME: &str = "root";

/// Builds an editor tree for a parsed document. Node ids follow the
/// document path so the same input always yields the same ids.
pub fn tree_from_value(value: &JsonValue, root_name: &str) -> TreeNode {
    let mut ids = IdAllocator::default();
    let mut root = build_node(value, root_name, root_name, NodeType::Element, &mut ids);
    root.assign_depths(0);
    root
}

#[derive(Default)]
struct IdAllocator {
    used: HashSet<String>,
}

impl IdAllocator {
    fn claim(&mut self, candidate: String) -> String {
        if self.used.insert(candidate.clone()) {
            return candidate;
        }
        let mut suffix = 2usize;
        loop {
            let next = format!("{}#{}", candidate, suffix);
            if self.used.insert(next.clone()) {
                return next;
            }
            suffix += 1;
        }
    }
}

fn build_node(
    value: &JsonValue,
    name: &str,
    path: &str,
    object_type: NodeType,
    ids: &mut IdAllocator,
) -> TreeNode {
    let id = ids.claim(path.to_string());
    match value {
        JsonValue::Object(entries) => {
            let children = entries
                .iter()
                .map(|(key, child)| {
                    let child_type = if key.starts_with(ATTRIBUTE_PREFIX) && !child.is_object() {
                        NodeType::Attribute
                    } else {
                        NodeType::Element
                    };
                    build_node(child, key, &format!("{}.{}", path, key), child_type, ids)
                })
                .collect();
            TreeNode::new(id, name, object_type).with_children(children)
        }
        JsonValue::Array(items) => {
            let children = items
                .iter()
                .enumerate()
                .map(|(position, item)| {
                    build_node(
                        item,
                        &format!("[{}]", position),
                        &format!("{}[{}]", path, position),
                        NodeType::ArrayChild,
                        ids,
                    )
                })
                .collect();
            TreeNode::new(id, name, NodeType::Array).with_children(children)
        }
        JsonValue::String(text) => TreeNode::new(id, name, object_type).with_value(text.clone(), true),
        scalar => TreeNode::new(id, name, object_type).with_value(scalar.to_string(), false),
    }
}

/// Inverse of [`tree_from_value`]. Code nodes carry no data and are skipped.
pub fn value_from_tree(node: &TreeNode) -> JsonValue {
    if node.node_type == NodeType::Array {
        return JsonValue::Array(
            node.children()
                .iter()
                .filter(|child| child.node_type != NodeType::Code)
                .map(value_from_tree)
                .collect(),
        );
    }

    let Some(children) = node.children.as_ref() else {
        return leaf_value(node);
    };

    let mut entries = JsonMap::new();
    for child in children.iter().filter(|child| child.node_type != NodeType::Code) {
        entries.insert(child.name.clone(), value_from_tree(child));
    }
    JsonValue::Object(entries)
}

fn leaf_value(node: &TreeNode) -> JsonValue {
    let Some(value) = node.value.as_deref() else {
        return JsonValue::Null;
    };
    if node.plain_text_value {
        return JsonValue::String(value.to_string());
    }
    serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tree_from_value_assigns_types_ids_and_depths() {
        let tree = tree_from_value(
            &json!({"order": {"@id": "7", "lines": [{"qty": 2}], "paid": true}}),
            DEFAULT_ROOT_NAME,
        );
        assert_eq!(tree.id, "root");
        let order = &tree.children()[0];
        assert_eq!(order.id, "root.order");
        assert_eq!(order.depth, 1);

        let attribute = order.find("root.order.@id").expect("attribute");
        assert_eq!(attribute.node_type, NodeType::Attribute);
        assert_eq!(attribute.value.as_deref(), Some("7"));
        assert!(attribute.plain_text_value);

        let item = order.find("root.order.lines[0]").expect("array item");
        assert_eq!(item.node_type, NodeType::ArrayChild);
        assert_eq!(item.name, "[0]");
        assert_eq!(item.depth, 3);

        let paid = order.find("root.order.paid").expect("scalar");
        assert_eq!(paid.value.as_deref(), Some("true"));
        assert!(!paid.plain_text_value);
    }

    #[test]
    fn tree_and_value_round_trip() {
        let value = json!({
            "name": "Widget",
            "price": 9.5,
            "tags": ["a", "b"],
            "matrix": [[1, 2], []],
            "meta": {},
            "missing": null
        });
        let tree = tree_from_value(&value, DEFAULT_ROOT_NAME);
        assert_eq!(value_from_tree(&tree), value);
    }

    #[test]
    fn colliding_paths_get_suffixed_ids() {
        let tree = tree_from_value(&json!({"a.b": 1, "a": {"b": 2}}), DEFAULT_ROOT_NAME);
        let mut ids = Vec::new();
        tree.walk(&mut |node| ids.push(node.id.clone()));
        assert!(ids.contains(&"root.a.b".to_string()));
        assert!(ids.contains(&"root.a.b#2".to_string()));
    }

    #[test]
    fn code_nodes_are_skipped_when_rebuilding_values() {
        let tree = TreeNode::new("root", "root", NodeType::Element).with_children(vec![
            TreeNode::new("c", "script", NodeType::Code).with_value("let x = 1;", false),
            TreeNode::new("n", "n", NodeType::Element).with_value("1", false),
        ]);
        assert_eq!(value_from_tree(&tree), json!({"n": 1}));
    }
}
