use std::fs;
use std::path::Path;

use dm_api::FieldMapping;
use dm_core::{InputType, MapperError, MapperState};

use crate::error_map::{map_cli_mappings_invalid, map_cli_read};

pub(crate) fn read_text(path: &str) -> Result<String, MapperError> {
    if !Path::new(path).is_file() {
        return Err(MapperError::new(
            "CLI_FILE_NOT_FOUND",
            format!("File does not exist: {}", path),
        ));
    }
    fs::read_to_string(path).map_err(|error| map_cli_read(path, error))
}

pub(crate) fn load_mapper_state(path: &str) -> Result<MapperState, MapperError> {
    MapperState::from_json_str(&read_text(path)?)
}

pub(crate) fn load_mappings(path: &str) -> Result<Vec<FieldMapping>, MapperError> {
    serde_json::from_str(&read_text(path)?).map_err(map_cli_mappings_invalid)
}

/// An explicit `--input-type` wins; otherwise `.xml` files are XML and
/// everything else is JSON.
pub(crate) fn resolve_input_type(
    path: &str,
    explicit: Option<&str>,
) -> Result<InputType, MapperError> {
    if let Some(explicit) = explicit {
        return explicit.parse();
    }
    let is_xml = Path::new(path)
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("xml"));
    Ok(if is_xml {
        InputType::Xml
    } else {
        InputType::Json
    })
}
