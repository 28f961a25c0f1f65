use std::collections::HashMap;

use crate::error::MapperError;
use crate::path::{render_path, PathSegment};
use crate::types::{NodeType, TreeNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedNode {
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
    pub depth: usize,
    pub parent: Option<usize>,
    pub segments: Vec<PathSegment>,
}

/// Flat arena view over an immutable tree, addressed by node id.
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    entries: Vec<IndexedNode>,
    by_id: HashMap<String, usize>,
}

impl TreeIndex {
    pub fn build(root: &TreeNode) -> Result<Self, MapperError> {
        let mut index = Self::default();
        let mut stack: Vec<(&TreeNode, Option<usize>, usize)> = vec![(root, None, 0)];

        while let Some((node, parent, depth)) = stack.pop() {
            let segments = match parent {
                None => Vec::new(),
                Some(parent_index) => {
                    let parent_entry = &index.entries[parent_index];
                    let mut segments = parent_entry.segments.clone();
                    segments.push(segment_for(node, parent_entry.node_type));
                    segments
                }
            };

            let position = index.entries.len();
            if !node.id.is_empty() && index.by_id.insert(node.id.clone(), position).is_some() {
                return Err(MapperError::with_node(
                    "TREE_DUPLICATE_NODE_ID",
                    format!("Node id \"{}\" appears more than once in the tree.", node.id),
                    node.id.clone(),
                ));
            }
            index.entries.push(IndexedNode {
                id: node.id.clone(),
                name: node.name.clone(),
                node_type: node.node_type,
                depth,
                parent,
                segments,
            });

            for child in node.children().iter().rev() {
                stack.push((child, Some(position), depth + 1));
            }
        }

        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&IndexedNode> {
        self.by_id.get(id).map(|position| &self.entries[*position])
    }

    pub fn parent(&self, id: &str) -> Option<&IndexedNode> {
        let node = self.get(id)?;
        node.parent.map(|position| &self.entries[position])
    }

    pub fn full_path(&self, id: &str) -> Option<String> {
        self.get(id).map(|node| render_path(&node.segments))
    }

    /// First node (pre-order) whose path equals `segments`.
    pub fn find_by_segments(&self, segments: &[PathSegment]) -> Option<&IndexedNode> {
        self.entries
            .iter()
            .find(|entry| entry.segments.as_slice() == segments)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedNode> {
        self.entries.iter()
    }
}

/// Children of an array are positional items whatever their own type.
fn segment_for(node: &TreeNode, parent_type: NodeType) -> PathSegment {
    if parent_type == NodeType::Array {
        return PathSegment::Items;
    }
    match node.node_type {
        NodeType::ArrayChild => PathSegment::Items,
        NodeType::Attribute if !node.name.starts_with('@') => {
            PathSegment::Key(format!("@{}", node.name))
        }
        _ => PathSegment::Key(node.name.clone()),
    }
}
