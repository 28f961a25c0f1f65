use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const CASE_SCHEMA_V1: &str = "dm-tool-case.v1";

/// `case.json`: what running a mapping directory must produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingCase {
    pub schema_version: String,
    /// Defaults to `input.json`, then `input.xml`.
    #[serde(default)]
    pub input_file: Option<String>,
    #[serde(default)]
    pub max_operations: Option<u64>,
    pub expected: ExpectedOutcome,
    /// Checked only when non-empty.
    #[serde(default)]
    pub expected_logs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExpectedOutcome {
    /// Output parsed as JSON must deep-equal `output`.
    Json { output: JsonValue },
    /// Output text must match exactly, ignoring trailing whitespace.
    Text { output: String },
    /// Execution must fail with an error containing `message`.
    Error { message: String },
}

impl ExpectedOutcome {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Json { .. } => "json",
            Self::Text { .. } => "text",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod case_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn case_deserialize_applies_defaults() {
        let parsed: MappingCase = serde_json::from_str(
            r#"{
  "schemaVersion": "dm-tool-case.v1",
  "expected": {"kind": "json", "output": {"a": 1}}
}"#,
        )
        .expect("case should deserialize");

        assert_eq!(parsed.schema_version, CASE_SCHEMA_V1);
        assert_eq!(parsed.input_file, None);
        assert_eq!(parsed.max_operations, None);
        assert!(parsed.expected_logs.is_empty());
        assert_eq!(
            parsed.expected,
            ExpectedOutcome::Json {
                output: json!({"a": 1})
            }
        );
    }

    #[test]
    fn expected_outcome_supports_all_variants() {
        let parsed: Vec<ExpectedOutcome> = serde_json::from_str(
            r#"[
  {"kind":"json","output":[1,2]},
  {"kind":"text","output":"<a/>"},
  {"kind":"error","message":"boom"}
]"#,
        )
        .expect("outcomes should deserialize");
        let kinds = parsed.iter().map(ExpectedOutcome::kind_name).collect::<Vec<_>>();
        assert_eq!(kinds, vec!["json", "text", "error"]);
    }
}
