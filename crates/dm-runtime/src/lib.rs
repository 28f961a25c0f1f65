mod apply;
mod bridge;
mod console;
mod executor;
pub mod shims;

pub use apply::{
    apply_mappings, ApplyError, ApplyResult, FieldMapping, Transform, TRANSFORM_CATALOGUE,
};
pub use bridge::{dynamic_to_json, dynamic_to_text, json_to_dynamic};
pub use console::{Console, LogBuffer, LogLevel};
pub use executor::{execute_script, ExecutionResult, ExecutorOptions};
pub use shims::{register_shims, render_shim_header, ShimDoc, ShimHost, SHIM_CATALOGUE};
