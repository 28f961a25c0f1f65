mod ast;
mod emit;
mod key_order;
mod lower;
mod normalize;
mod scope;

pub use ast::{Place, Stmt};
pub use emit::emit_program;
pub use key_order::{key_order, render_key_order, ORDER_ROOT};
pub use lower::{lower_program, MAX_TREE_DEPTH};
pub use normalize::normalize_fragment;

use dm_core::{InputType, MapperError, MapperState};

/// Explicit generation settings; nothing is read from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeneratorOptions {
    pub source_format: InputType,
    pub target_format: InputType,
    pub debug_comment: bool,
}

impl GeneratorOptions {
    pub fn from_state(state: &MapperState) -> Self {
        Self {
            source_format: state.source_input_type,
            target_format: state.target_input_type,
            debug_comment: state.mapper_preferences.debug_comment,
        }
    }
}

/// Generates the script for `state`. Identical input yields identical text.
pub fn generate_script(
    state: &MapperState,
    options: &GeneratorOptions,
) -> Result<String, MapperError> {
    let program = lower_program(state, options)?;
    let script = emit_program(&program);
    tracing::debug!(
        source_format = %options.source_format,
        target_format = %options.target_format,
        statements = program.len(),
        bytes = script.len(),
        "generated mapping script"
    );
    Ok(script)
}
