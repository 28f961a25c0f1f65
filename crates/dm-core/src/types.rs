use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MapperError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    #[default]
    Element,
    Array,
    ArrayChild,
    Attribute,
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InputType {
    #[default]
    #[serde(alias = "json")]
    Json,
    #[serde(alias = "xml")]
    Xml,
}

impl FromStr for InputType {
    type Err = MapperError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            other => Err(MapperError::new(
                "INPUT_TYPE_UNKNOWN",
                format!("Unknown input type \"{}\", expected JSON or XML.", other),
            )),
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("JSON"),
            Self::Xml => f.write_str("XML"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connective {
    #[default]
    And,
    Or,
}

impl Connective {
    pub fn operator(&self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceReference {
    pub id: String,
    pub source_node_id: String,
    pub variable_name: String,
    pub text_reference: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_over_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoopReference {
    pub id: String,
    pub source_node_id: String,
    pub variable_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoopCondition {
    pub id: String,
    pub source_node_path: String,
    pub condition: String,
    pub text_reference: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeCondition {
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeNode {
    pub id: String,
    #[serde(alias = "key")]
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub plain_text_value: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_references: Vec<SourceReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_reference: Option<LoopReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_iterator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_statement: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub loop_conditions: Vec<LoopCondition>,
    pub loop_conditions_connective: Connective,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_condition: Option<NodeCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_comment: Option<String>,
    pub non_empty: bool,
    pub quote: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_code: Option<String>,
}

impl TreeNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type,
            ..Self::default()
        }
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_value(mut self, value: impl Into<String>, plain_text: bool) -> Self {
        self.value = Some(value.into());
        self.plain_text_value = plain_text;
        self
    }

    pub fn with_reference(mut self, reference: SourceReference) -> Self {
        self.source_references.push(reference);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn children(&self) -> &[TreeNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn non_empty_value(&self) -> Option<&str> {
        self.value.as_deref().filter(|value| !value.trim().is_empty())
    }

    /// Depth-first pre-order traversal.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TreeNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    /// Recomputes `depth` for the whole subtree, starting at `depth`.
    pub fn assign_depths(&mut self, depth: usize) {
        self.depth = depth;
        if let Some(children) = self.children.as_mut() {
            for child in children {
                child.assign_depths(depth + 1);
            }
        }
    }

    pub fn has_mapping(&self) -> bool {
        let mut mapped = false;
        self.walk(&mut |node| {
            if !node.source_references.is_empty()
                || node.loop_reference.is_some()
                || node.node_type == NodeType::Code
                || (node.is_leaf() && node.non_empty_value().is_some())
            {
                mapped = true;
            }
        });
        mapped
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalVariable {
    pub id: String,
    pub name: String,
    pub value: String,
    pub plain_text_value: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupEntry {
    pub id: String,
    pub key: String,
    pub value: String,
    pub plain_text_value: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupTable {
    pub id: String,
    pub name: String,
    pub entries: Vec<LookupEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserFunction {
    pub id: String,
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapperContext {
    pub global_variables: Vec<GlobalVariable>,
    pub lookup_tables: Vec<LookupTable>,
    pub functions: Vec<UserFunction>,
    pub prolog_script: Option<String>,
    pub epilog_script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapperPreferences {
    pub debug_comment: bool,
    pub override_target_value: bool,
    pub auto_map: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapperState {
    pub source_tree_node: Option<TreeNode>,
    pub target_tree_node: Option<TreeNode>,
    pub references: Vec<SourceReference>,
    pub local_context: MapperContext,
    pub source_input_type: InputType,
    pub target_input_type: InputType,
    pub mapper_preferences: MapperPreferences,
}

impl MapperState {
    pub fn from_json_str(source: &str) -> Result<Self, MapperError> {
        serde_json::from_str(source).map_err(|error| {
            MapperError::new(
                "STATE_PARSE_ERROR",
                format!("Mapper state is not valid JSON: {}", error),
            )
        })
    }

    pub fn to_json_string_pretty(&self) -> Result<String, MapperError> {
        serde_json::to_string_pretty(self)
            .map_err(|error| MapperError::new("STATE_SERIALIZE_ERROR", error.to_string()))
    }

    /// Looks up a reference by id in the flat list first, then in the target tree.
    pub fn find_reference(&self, reference_id: &str) -> Option<&SourceReference> {
        if let Some(found) = self.references.iter().find(|r| r.id == reference_id) {
            return Some(found);
        }
        let mut found = None;
        if let Some(target) = &self.target_tree_node {
            target.walk(&mut |node| {
                if found.is_none() {
                    found = node.source_references.iter().find(|r| r.id == reference_id);
                }
            });
        }
        found
    }
}
