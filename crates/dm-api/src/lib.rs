use std::collections::HashSet;

use dm_core::{
    InputType, MapperError, MapperState, NodeType, SourceReference, TreeIndex, TreeNode,
};
use serde::{Deserialize, Serialize};

pub use dm_compiler::GeneratorOptions;
pub use dm_runtime::{
    apply_mappings, execute_script, ApplyError, ApplyResult, ExecutionResult, ExecutorOptions,
    FieldMapping,
};

/// A reference in the mapper state that does not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceIssue {
    pub reference_id: String,
    pub target_node_id: Option<String>,
    pub message: String,
}

pub fn generate_script(state: &MapperState) -> Result<String, MapperError> {
    dm_compiler::generate_script(state, &GeneratorOptions::from_state(state))
}

pub fn generate_script_with_options(
    state: &MapperState,
    options: &GeneratorOptions,
) -> Result<String, MapperError> {
    dm_compiler::generate_script(state, options)
}

/// Generates the script for `state` and runs it against `input_text`.
/// Generation failures are errors; execution failures live in the result.
pub fn run_mapper(
    state: &MapperState,
    input_text: &str,
    options: &ExecutorOptions,
) -> Result<ExecutionResult, MapperError> {
    let script = generate_script(state)?;
    Ok(execute_script(
        &script,
        input_text,
        &state.local_context,
        options,
    ))
}

pub fn build_tree(text: &str, input_type: InputType) -> Result<TreeNode, MapperError> {
    dm_parser::parse_document(text, input_type)
}

/// Parses both documents and applies `mappings` from `source_text` onto
/// `template_text`.
pub fn apply_to_documents(
    source_text: &str,
    template_text: &str,
    input_type: InputType,
    mappings: &[FieldMapping],
) -> Result<ApplyResult, MapperError> {
    let source = dm_parser::parse_data(source_text, input_type)?;
    let template = dm_parser::parse_data(template_text, input_type)?;
    Ok(apply_mappings(&source, &template, mappings))
}

struct Validator {
    source: Option<TreeIndex>,
    loop_ids: HashSet<String>,
    issues: Vec<ReferenceIssue>,
}

impl Validator {
    fn issue(&mut self, reference_id: &str, target_node_id: Option<&str>, message: String) {
        self.issues.push(ReferenceIssue {
            reference_id: reference_id.to_string(),
            target_node_id: target_node_id.map(str::to_string),
            message,
        });
    }

    fn check_source(
        &mut self,
        reference_id: &str,
        target_node_id: Option<&str>,
        variable_name: &str,
        source_node_id: &str,
    ) -> Option<NodeType> {
        let resolved = self
            .source
            .as_ref()
            .map(|index| index.get(source_node_id).map(|node| node.node_type));
        match resolved {
            Some(Some(node_type)) => Some(node_type),
            Some(None) => {
                self.issue(
                    reference_id,
                    target_node_id,
                    format!(
                        "Source node \"{}\" referenced by \"{}\" was not found.",
                        source_node_id, variable_name
                    ),
                );
                None
            }
            None => {
                self.issue(
                    reference_id,
                    target_node_id,
                    format!("\"{}\" cannot resolve: no source tree is loaded.", variable_name),
                );
                None
            }
        }
    }

    fn check_reference(&mut self, reference: &SourceReference, target: Option<&str>) {
        self.check_source(
            &reference.id,
            target,
            &reference.variable_name,
            &reference.source_node_id,
        );
        if let Some(loop_id) = &reference.loop_over_id {
            if !self.loop_ids.contains(loop_id) {
                self.issue(
                    &reference.id,
                    target,
                    format!(
                        "\"{}\" is bound to loop \"{}\", which does not exist.",
                        reference.variable_name, loop_id
                    ),
                );
            }
        }
    }

    fn check_node(&mut self, node: &TreeNode) {
        for reference in &node.source_references {
            self.check_reference(reference, Some(&node.id));
        }
        if let Some(loop_reference) = &node.loop_reference {
            let node_type = self.check_source(
                &loop_reference.id,
                Some(&node.id),
                &loop_reference.variable_name,
                &loop_reference.source_node_id,
            );
            if let Some(node_type) = node_type {
                if !matches!(node_type, NodeType::Array | NodeType::ArrayChild) {
                    self.issue(
                        &loop_reference.id,
                        Some(&node.id),
                        format!(
                            "Loop \"{}\" must point at an array, but \"{}\" is {:?}.",
                            loop_reference.variable_name, loop_reference.source_node_id, node_type
                        ),
                    );
                }
            }
        }
        for child in node.children() {
            self.check_node(child);
        }
    }
}

fn index_tree(tree: &TreeNode, issues: &mut Vec<ReferenceIssue>) -> Option<TreeIndex> {
    match TreeIndex::build(tree) {
        Ok(index) => Some(index),
        Err(error) => {
            issues.push(ReferenceIssue {
                reference_id: String::new(),
                target_node_id: error.node_id.clone(),
                message: error.to_string(),
            });
            None
        }
    }
}

/// Checks that every reference in `state` resolves against the source tree.
pub fn validate_mapper_state(state: &MapperState) -> Vec<ReferenceIssue> {
    let mut issues = Vec::new();
    let source = state
        .source_tree_node
        .as_ref()
        .and_then(|tree| index_tree(tree, &mut issues));

    let mut loop_ids = HashSet::new();
    if let Some(target) = &state.target_tree_node {
        index_tree(target, &mut issues);
        target.walk(&mut |node| {
            if let Some(loop_reference) = &node.loop_reference {
                loop_ids.insert(loop_reference.id.clone());
            }
        });
    }

    let mut validator = Validator {
        source,
        loop_ids,
        issues,
    };
    for reference in &state.references {
        validator.check_reference(reference, None);
    }
    if let Some(target) = &state.target_tree_node {
        validator.check_node(target);
    }
    tracing::debug!(issues = validator.issues.len(), "validated mapper state");
    validator.issues
}
