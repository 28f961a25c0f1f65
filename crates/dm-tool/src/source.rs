use std::fs;
use std::path::{Path, PathBuf};

use dm_core::MapperState;
use walkdir::WalkDir;

use crate::{DmToolError, MappingCase, CASE_SCHEMA_V1};

pub const CASE_FILE: &str = "case.json";
pub const MAPPER_FILE: &str = "mapper.json";
const INPUT_CANDIDATES: &[&str] = &["input.json", "input.xml"];

pub(crate) fn read_file(path: &Path) -> Result<String, DmToolError> {
    fs::read_to_string(path).map_err(|source| DmToolError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Directories under `root` holding a `case.json`, sorted.
pub fn discover_cases(root: &Path) -> Result<Vec<PathBuf>, DmToolError> {
    let mut directories = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == CASE_FILE)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect::<Vec<_>>();
    directories.sort();

    if directories.is_empty() {
        return Err(DmToolError::NoCases {
            path: root.to_path_buf(),
        });
    }
    Ok(directories)
}

pub fn read_mapper_state(case_dir: &Path) -> Result<MapperState, DmToolError> {
    let raw = read_file(&case_dir.join(MAPPER_FILE))?;
    Ok(MapperState::from_json_str(&raw)?)
}

pub fn find_input_file(case_dir: &Path, case: &MappingCase) -> Result<PathBuf, DmToolError> {
    if let Some(name) = &case.input_file {
        return Ok(case_dir.join(name));
    }
    INPUT_CANDIDATES
        .iter()
        .map(|name| case_dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| DmToolError::InputMissing {
            path: case_dir.to_path_buf(),
        })
}

pub fn read_case(case_path: &Path) -> Result<MappingCase, DmToolError> {
    let raw = read_file(case_path)?;
    let parsed: MappingCase =
        serde_json::from_str(&raw).map_err(|source| DmToolError::ParseCase {
            path: case_path.to_path_buf(),
            source,
        })?;

    if parsed.schema_version != CASE_SCHEMA_V1 {
        return Err(DmToolError::InvalidSchemaVersion {
            expected: CASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod source_tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &str) {
        let parent = path.parent().expect("path should have parent");
        fs::create_dir_all(parent).expect("parent dir should be created");
        fs::write(path, content).expect("file should be written");
    }

    const CASE: &str =
        r#"{"schemaVersion":"dm-tool-case.v1","expected":{"kind":"text","output":"x"}}"#;

    #[test]
    fn discover_cases_finds_nested_case_directories() {
        let root = TempDir::new().expect("temp dir");
        write_file(&root.path().join("b/case.json"), CASE);
        write_file(&root.path().join("a/deeper/case.json"), CASE);
        write_file(&root.path().join("c/mapper.json"), "{}");

        let found = discover_cases(root.path()).expect("cases should be found");
        assert_eq!(
            found,
            vec![root.path().join("a/deeper"), root.path().join("b")]
        );
    }

    #[test]
    fn discover_cases_rejects_empty_roots() {
        let root = TempDir::new().expect("temp dir");
        let error = discover_cases(root.path()).expect_err("empty root should fail");
        assert!(matches!(error, DmToolError::NoCases { .. }));
    }

    #[test]
    fn read_case_validates_schema_version() {
        let root = TempDir::new().expect("temp dir");
        let path = root.path().join("case.json");
        write_file(
            &path,
            r#"{"schemaVersion":"v0","expected":{"kind":"text","output":"x"}}"#,
        );
        let error = read_case(&path).expect_err("schema should fail");
        assert!(matches!(error, DmToolError::InvalidSchemaVersion { .. }));

        write_file(&path, "{");
        let error = read_case(&path).expect_err("parse should fail");
        assert!(matches!(error, DmToolError::ParseCase { .. }));

        let error = read_case(&root.path().join("missing.json")).expect_err("read should fail");
        assert!(matches!(error, DmToolError::ReadFile { .. }));
    }

    #[test]
    fn find_input_file_prefers_json_then_xml() {
        let root = TempDir::new().expect("temp dir");
        let case = read_case_from_str(CASE);
        let error = find_input_file(root.path(), &case).expect_err("no input yet");
        assert!(matches!(error, DmToolError::InputMissing { .. }));

        write_file(&root.path().join("input.xml"), "<a/>");
        assert_eq!(
            find_input_file(root.path(), &case).expect("xml input"),
            root.path().join("input.xml")
        );
        write_file(&root.path().join("input.json"), "{}");
        assert_eq!(
            find_input_file(root.path(), &case).expect("json input"),
            root.path().join("input.json")
        );
    }

    #[test]
    fn read_mapper_state_surfaces_mapper_errors() {
        let root = TempDir::new().expect("temp dir");
        write_file(&root.path().join(MAPPER_FILE), "not json");
        let error = read_mapper_state(root.path()).expect_err("invalid state");
        assert!(matches!(error, DmToolError::Mapper(_)));
    }

    fn read_case_from_str(raw: &str) -> MappingCase {
        serde_json::from_str(raw).expect("case should deserialize")
    }
}
