use dm_core::MapperError;
use std::fmt::Display;

fn map_error(code: &'static str, error: impl Display) -> MapperError {
    MapperError::new(code, error.to_string())
}

pub(crate) fn json_line(key: &str, value: &impl serde::Serialize) -> String {
    format!(
        "{}:{}",
        key,
        serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
    )
}

pub(crate) fn error_lines(error: &MapperError) -> Vec<String> {
    vec![
        "RESULT:ERROR".to_string(),
        format!("ERROR_CODE:{}", error.code),
        json_line("ERROR_MSG_JSON", &error.message),
    ]
}

pub(crate) fn emit_error(error: MapperError) -> i32 {
    tracing::debug!(code = %error.code, "command failed");
    for line in error_lines(&error) {
        println!("{}", line);
    }
    1
}

pub(crate) fn map_cli_read(path: &str, error: std::io::Error) -> MapperError {
    MapperError::new("CLI_READ", format!("Cannot read {}: {}", path, error))
}

pub(crate) fn map_cli_write(error: std::io::Error) -> MapperError {
    map_error("CLI_WRITE", error)
}

pub(crate) fn map_cli_config_invalid(error: toml::de::Error) -> MapperError {
    map_error("CLI_CONFIG_INVALID", error)
}

pub(crate) fn map_cli_mappings_invalid(error: serde_json::Error) -> MapperError {
    map_error("CLI_MAPPINGS_INVALID", error)
}
