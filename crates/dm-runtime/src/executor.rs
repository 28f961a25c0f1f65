use std::time::{Duration, Instant};

use dm_core::MapperContext;
use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use serde::{Deserialize, Serialize};

use crate::bridge::dynamic_to_text;
use crate::console::{Console, LogBuffer};
use crate::shims::{register_shims, ShimHost};

const TIMEOUT_TOKEN: &str = "__dm_timeout";
/// Operations between two clock reads while a timeout is armed.
const TIMEOUT_CHECK_INTERVAL: u64 = 256;

/// Resource limits for one execution; the default imposes none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutorOptions {
    pub timeout: Option<Duration>,
    pub max_operations: Option<u64>,
    pub max_call_depth: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub output: String,
    pub error: Option<String>,
    pub logs: Vec<String>,
    pub duration_ms: u64,
    pub script_body: String,
}

impl ExecutionResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

fn build_engine(logs: &LogBuffer, options: &ExecutorOptions, started: Instant) -> Engine {
    let mut engine = Engine::new();
    engine.set_strict_variables(true);
    register_shims(&mut engine, &ShimHost::new(logs.clone()));

    if let Some(limit) = options.max_operations {
        engine.set_max_operations(limit);
    }
    if let Some(depth) = options.max_call_depth {
        engine.set_max_call_levels(depth);
    }
    if let Some(timeout) = options.timeout {
        let deadline = started + timeout;
        engine.on_progress(move |operations| {
            if operations % TIMEOUT_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                Some(Dynamic::from(TIMEOUT_TOKEN))
            } else {
                None
            }
        });
    }
    engine
}

fn describe_error(error: EvalAltResult, options: &ExecutorOptions) -> String {
    match error {
        EvalAltResult::ErrorRuntime(value, _) => dynamic_to_text(&value),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => describe_error(*inner, options),
        EvalAltResult::ErrorTerminated(token, _) if token.to_string() == TIMEOUT_TOKEN => {
            let millis = options.timeout.unwrap_or_default().as_millis();
            tracing::warn!(timeout_ms = %millis, "mapping script timed out");
            format!("Script execution timed out after {} ms", millis)
        }
        other => other.to_string(),
    }
}

/// Runs a generated (or hand-written) script against `input_text`.
///
/// Every call builds its own engine and log buffer. Failures never escape:
/// they are reported through [`ExecutionResult::error`].
pub fn execute_script(
    script_body: &str,
    input_text: &str,
    context: &MapperContext,
    options: &ExecutorOptions,
) -> ExecutionResult {
    let started = Instant::now();
    let logs = LogBuffer::default();
    let engine = build_engine(&logs, options, started);
    let mut scope = Scope::new();
    scope.push_constant("input", input_text.to_string());
    scope.push("console", Console::new(logs.clone()));

    tracing::debug!(
        global_variables = context.global_variables.len(),
        lookup_tables = context.lookup_tables.len(),
        functions = context.functions.len(),
        input_bytes = input_text.len(),
        "executing mapping script"
    );

    let outcome = engine
        .compile_with_scope(&scope, script_body)
        .map_err(|error| error.to_string())
        .and_then(|ast| {
            engine
                .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
                .map_err(|error| describe_error(*error, options))
        });

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let (output, error) = match outcome {
        Ok(value) => (dynamic_to_text(&value), None),
        Err(message) => {
            tracing::debug!(error = %message, "mapping script failed");
            (String::new(), Some(message))
        }
    };
    tracing::debug!(duration_ms, log_lines = logs.len(), "mapping script finished");

    ExecutionResult {
        output,
        error,
        logs: logs.lines(),
        duration_ms,
        script_body: script_body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(script: &str, input: &str) -> ExecutionResult {
        execute_script(
            script,
            input,
            &MapperContext::default(),
            &ExecutorOptions::default(),
        )
    }

    #[test]
    fn returns_json_output_for_generated_shape() {
        let script = r#"
            let sourceData = parseJSON(input);
            let output = #{};
            output.total = sourceData.price * 2;
            return toJSON(output);
        "#;
        let result = run(script, r#"{"price": 21}"#);
        assert!(result.is_ok(), "{:?}", result.error);
        let output: serde_json::Value =
            serde_json::from_str(&result.output).expect("output should be JSON");
        assert_eq!(output, json!({"total": 42}));
        assert_eq!(result.script_body, script);
    }

    #[test]
    fn thrown_values_become_the_error_message() {
        let result = run(r#"throw "intentional error";"#, "");
        assert_eq!(result.output, "");
        assert_eq!(result.error.as_deref(), Some("intentional error"));
        assert!(result.logs.is_empty());
    }

    #[test]
    fn errors_thrown_inside_functions_are_unwrapped() {
        let result = run(r#"fn fail(x) { throw "bad " + x; } fail(1);"#, "");
        assert_eq!(result.error.as_deref(), Some("bad 1"));
    }

    #[test]
    fn compile_errors_and_unknown_variables_are_reported() {
        let syntax = run("let = 1;", "");
        assert!(syntax.error.is_some());
        let unknown = run("missing + 1", "");
        assert!(
            unknown.error.as_deref().unwrap_or_default().contains("missing"),
            "{:?}",
            unknown.error
        );
    }

    #[test]
    fn unit_and_scalar_results_are_coerced_to_text() {
        assert_eq!(run("let x = 1;", "").output, "");
        assert_eq!(run("40 + 2", "").output, "42");
        assert_eq!(run("input", "raw").output, "raw");
    }

    #[test]
    fn logs_are_captured_in_call_order() {
        let result = run(
            r#"console.info("start"); print("middle"); debug("dbg"); console.error("end"); 1"#,
            "",
        );
        assert_eq!(result.logs.len(), 4);
        assert_eq!(result.logs[0], "[INFO] start");
        assert_eq!(result.logs[1], "[LOG] middle");
        assert!(result.logs[2].starts_with("[DEBUG] "));
        assert_eq!(result.logs[3], "[ERROR] end");
    }

    #[test]
    fn timeout_stops_runaway_scripts() {
        let options = ExecutorOptions {
            timeout: Some(Duration::from_millis(50)),
            ..ExecutorOptions::default()
        };
        let result = execute_script(
            "let n = 0; loop { n += 1; }",
            "",
            &MapperContext::default(),
            &options,
        );
        assert_eq!(
            result.error.as_deref(),
            Some("Script execution timed out after 50 ms")
        );
    }

    #[test]
    fn operation_limit_is_enforced() {
        let options = ExecutorOptions {
            max_operations: Some(1_000),
            ..ExecutorOptions::default()
        };
        let result = execute_script(
            "let n = 0; while true { n += 1; }",
            "",
            &MapperContext::default(),
            &options,
        );
        assert!(result.error.is_some());
    }

    #[test]
    fn result_serializes_in_camel_case() {
        let value = serde_json::to_value(run("1", "")).expect("serialize");
        assert!(value.get("durationMs").is_some());
        assert!(value.get("scriptBody").is_some());
    }
}
