use std::path::Path;

use dm_api::ExecutorOptions;
use serde_json::Value as JsonValue;

use crate::source::{find_input_file, read_case, read_file, read_mapper_state, CASE_FILE};
use crate::{DmToolError, ExpectedOutcome, MappingCase};

/// Upper bound on script operations when a case sets none.
const DEFAULT_MAX_OPERATIONS: u64 = 5_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub output: String,
    pub error: Option<String>,
    pub logs: Vec<String>,
    pub script_body: String,
}

pub fn run_case(case_dir: &Path, case: &MappingCase) -> Result<RunReport, DmToolError> {
    let state = read_mapper_state(case_dir)?;
    let input = read_file(&find_input_file(case_dir, case)?)?;
    let options = ExecutorOptions {
        max_operations: Some(case.max_operations.unwrap_or(DEFAULT_MAX_OPERATIONS)),
        ..ExecutorOptions::default()
    };
    let result = dm_api::run_mapper(&state, &input, &options)?;
    Ok(RunReport {
        output: result.output,
        error: result.error,
        logs: result.logs,
        script_body: result.script_body,
    })
}

fn check_outcome(expected: &ExpectedOutcome, report: &RunReport) -> Result<(), DmToolError> {
    match (expected, &report.error) {
        (ExpectedOutcome::Error { message }, Some(actual)) => {
            if actual.contains(message.as_str()) {
                Ok(())
            } else {
                Err(DmToolError::ErrorMismatch {
                    expected: message.clone(),
                    actual: actual.clone(),
                })
            }
        }
        (ExpectedOutcome::Error { message }, None) => Err(DmToolError::UnexpectedSuccess {
            expected: message.clone(),
        }),
        (_, Some(message)) => Err(DmToolError::ExecutionFailed {
            message: message.clone(),
        }),
        (ExpectedOutcome::Json { output }, None) => {
            let actual: JsonValue = serde_json::from_str(&report.output).map_err(|source| {
                DmToolError::OutputNotJson {
                    output: report.output.clone(),
                    source,
                }
            })?;
            if &actual == output {
                Ok(())
            } else {
                Err(DmToolError::OutputMismatch {
                    expected: output.to_string(),
                    actual: actual.to_string(),
                })
            }
        }
        (ExpectedOutcome::Text { output }, None) => {
            if report.output.trim_end() == output.trim_end() {
                Ok(())
            } else {
                Err(DmToolError::OutputMismatch {
                    expected: output.clone(),
                    actual: report.output.clone(),
                })
            }
        }
    }
}

pub fn assert_case(case_dir: &Path) -> Result<(), DmToolError> {
    let case = read_case(&case_dir.join(CASE_FILE))?;
    let report = run_case(case_dir, &case)?;
    check_outcome(&case.expected, &report)?;

    if !case.expected_logs.is_empty() && case.expected_logs != report.logs {
        return Err(DmToolError::LogMismatch {
            expected: case.expected_logs,
            actual: report.logs,
        });
    }

    Ok(())
}

#[cfg(test)]
mod runner_tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &str) {
        fs::write(path, content).expect("file should be written");
    }

    const MAPPER: &str = r#"{
  "sourceTreeNode": {"id": "root", "name": "root", "children": [{"id": "s-a", "name": "a"}]},
  "targetTreeNode": {"id": "root", "name": "root", "children": [
    {"id": "t-b", "name": "b", "sourceReferences": [
      {"id": "r-a", "sourceNodeId": "s-a", "variableName": "_a"}
    ]}
  ]},
  "localContext": {"prologScript": "console.log(\"mapping\");"}
}"#;

    fn case_dir(case: &str) -> TempDir {
        let root = TempDir::new().expect("temp dir");
        write_file(&root.path().join("mapper.json"), MAPPER);
        write_file(&root.path().join("input.json"), r#"{"a": "x"}"#);
        write_file(&root.path().join("case.json"), case);
        root
    }

    #[test]
    fn assert_case_passes_with_matching_json_and_logs() {
        let root = case_dir(
            r#"{"schemaVersion":"dm-tool-case.v1",
                "expected":{"kind":"json","output":{"b":"x"}},
                "expectedLogs":["[LOG] mapping"]}"#,
        );
        assert_case(root.path()).expect("case should pass");
    }

    #[test]
    fn assert_case_reports_output_and_log_mismatches() {
        let root = case_dir(
            r#"{"schemaVersion":"dm-tool-case.v1","expected":{"kind":"json","output":{"b":"y"}}}"#,
        );
        let error = assert_case(root.path()).expect_err("output should differ");
        assert!(matches!(error, DmToolError::OutputMismatch { .. }));

        let root = case_dir(
            r#"{"schemaVersion":"dm-tool-case.v1",
                "expected":{"kind":"json","output":{"b":"x"}},
                "expectedLogs":["[LOG] other"]}"#,
        );
        let error = assert_case(root.path()).expect_err("logs should differ");
        assert!(matches!(error, DmToolError::LogMismatch { .. }));
    }

    #[test]
    fn run_case_reports_text_output() {
        let root = case_dir(
            r#"{"schemaVersion":"dm-tool-case.v1","expected":{"kind":"text","output":"ignored"}}"#,
        );
        let case = read_case(&root.path().join("case.json")).expect("case");
        let report = run_case(root.path(), &case).expect("run should pass");
        assert!(report.error.is_none());
        assert!(report.output.contains("\"b\": \"x\""));
        assert!(report.script_body.contains("parseJSON(input)"));
    }

    #[test]
    fn check_outcome_covers_error_expectations() {
        let failed = RunReport {
            output: String::new(),
            error: Some("Value is not a number".to_string()),
            logs: Vec::new(),
            script_body: String::new(),
        };
        let succeeded = RunReport {
            output: "{}".to_string(),
            error: None,
            ..failed.clone()
        };

        let expect_error = |message: &str| ExpectedOutcome::Error {
            message: message.to_string(),
        };
        check_outcome(&expect_error("not a number"), &failed).expect("error should match");
        assert!(matches!(
            check_outcome(&expect_error("other"), &failed),
            Err(DmToolError::ErrorMismatch { .. })
        ));
        assert!(matches!(
            check_outcome(&expect_error("x"), &succeeded),
            Err(DmToolError::UnexpectedSuccess { .. })
        ));
        assert!(matches!(
            check_outcome(
                &ExpectedOutcome::Text {
                    output: "{}".to_string()
                },
                &failed
            ),
            Err(DmToolError::ExecutionFailed { .. })
        ));
        assert!(matches!(
            check_outcome(
                &ExpectedOutcome::Json {
                    output: JsonValue::Null
                },
                &RunReport {
                    output: "<a/>".to_string(),
                    ..succeeded.clone()
                }
            ),
            Err(DmToolError::OutputNotJson { .. })
        ));
    }
}
