mod case;
mod runner;
mod source;

pub use case::{ExpectedOutcome, MappingCase, CASE_SCHEMA_V1};
pub use runner::{assert_case, run_case, RunReport};
pub use source::{discover_cases, find_input_file, read_case, read_mapper_state};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DmToolError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse case {path}: {source}")]
    ParseCase {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid case schema version \"{found}\", expected \"{expected}\".")]
    InvalidSchemaVersion { expected: String, found: String },
    #[error("No input.json or input.xml under {path}.")]
    InputMissing { path: PathBuf },
    #[error("No case.json files under {path}.")]
    NoCases { path: PathBuf },
    #[error("Mapper error: {0}")]
    Mapper(#[from] dm_core::MapperError),
    #[error("Execution failed: {message}")]
    ExecutionFailed { message: String },
    #[error("Expected execution to fail with \"{expected}\", but it succeeded.")]
    UnexpectedSuccess { expected: String },
    #[error("Output is not JSON: {source}. output={output}")]
    OutputNotJson {
        output: String,
        source: serde_json::Error,
    },
    #[error("Output mismatch. expected={expected} actual={actual}")]
    OutputMismatch { expected: String, actual: String },
    #[error("Error mismatch. expected to contain \"{expected}\", got \"{actual}\"")]
    ErrorMismatch { expected: String, actual: String },
    #[error("Log mismatch. expected={expected:?} actual={actual:?}")]
    LogMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}
