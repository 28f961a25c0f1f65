use dm_core::{quote_string, NodeType, TreeNode};

use crate::lower::{is_positional_item, target_key};

/// Path of the output root inside a key-order descriptor.
pub const ORDER_ROOT: &str = "$";

/// Collects the target tree's child-key order per output mapping.
///
/// Paths join keys with `.` below [`ORDER_ROOT`]; items of an array are
/// addressed as `path[]`. Only mappings with two or more keys are listed.
pub fn key_order(target: &TreeNode) -> Vec<(String, Vec<String>)> {
    let mut order = KeyOrder::default();
    order.mapping(target, ORDER_ROOT);
    order
        .entries
        .into_iter()
        .filter(|(_, keys)| keys.len() > 1)
        .collect()
}

/// Renders a descriptor as a script map literal, or `None` when every
/// mapping has at most one key.
pub fn render_key_order(target: &TreeNode) -> Option<String> {
    let order = key_order(target);
    if order.is_empty() {
        return None;
    }
    let entries = order
        .iter()
        .map(|(path, keys)| {
            let keys = keys.iter().map(|key| quote_string(key)).collect::<Vec<_>>();
            format!("{}: [{}]", quote_string(path), keys.join(", "))
        })
        .collect::<Vec<_>>();
    Some(format!("#{{{}}}", entries.join(", ")))
}

#[derive(Default)]
struct KeyOrder {
    entries: Vec<(String, Vec<String>)>,
}

impl KeyOrder {
    fn keys_at(&mut self, path: &str) -> &mut Vec<String> {
        let index = match self.entries.iter().position(|(existing, _)| existing == path) {
            Some(index) => index,
            None => {
                self.entries.push((path.to_string(), Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    fn mapping(&mut self, node: &TreeNode, path: &str) {
        for child in node.children() {
            self.entry(child, path);
        }
    }

    fn entry(&mut self, node: &TreeNode, parent: &str) {
        if node.node_type == NodeType::Code {
            return;
        }
        let key = target_key(node);
        let keys = self.keys_at(parent);
        if !keys.contains(&key) {
            keys.push(key.clone());
        }
        let path = format!("{}.{}", parent, key);
        match node.node_type {
            NodeType::Array => self.array(node, &path),
            _ => self.mapping(node, &path),
        }
    }

    fn array(&mut self, node: &TreeNode, path: &str) {
        let items = format!("{}[]", path);
        for child in node.children() {
            match child.node_type {
                NodeType::Code => {}
                NodeType::ArrayChild => self.mapping(child, &items),
                _ if is_positional_item(child) => self.array(child, &items),
                _ => self.entry(child, &items),
            }
        }
    }
}
