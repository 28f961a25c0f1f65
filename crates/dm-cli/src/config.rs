use std::path::Path;
use std::time::Duration;

use dm_core::MapperError;
use serde::Deserialize;

use crate::cli_args::LimitArgs;
use crate::error_map::{map_cli_config_invalid, map_cli_read};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "datamapper.toml";
pub(crate) const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct CliConfig {
    pub(crate) executor: ExecutorConfig,
    pub(crate) logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct ExecutorConfig {
    pub(crate) timeout_ms: Option<u64>,
    pub(crate) max_operations: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct LoggingConfig {
    pub(crate) level: Option<String>,
}

impl CliConfig {
    pub(crate) fn parse(text: &str) -> Result<Self, MapperError> {
        toml::from_str(text).map_err(map_cli_config_invalid)
    }

    /// An explicit path must exist; the default file is optional.
    pub(crate) fn load(explicit: Option<&str>) -> Result<Self, MapperError> {
        let path = match explicit {
            Some(path) => path,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => DEFAULT_CONFIG_FILE,
            None => return Ok(Self::default()),
        };
        let text = std::fs::read_to_string(path).map_err(|error| map_cli_read(path, error))?;
        Self::parse(&text)
    }

    pub(crate) fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Command-line limits win over the file.
    pub(crate) fn executor_options(&self, overrides: &LimitArgs) -> dm_api::ExecutorOptions {
        let timeout_ms = overrides.timeout_ms.or(self.executor.timeout_ms);
        dm_api::ExecutorOptions {
            timeout: timeout_ms.map(Duration::from_millis),
            max_operations: overrides.max_operations.or(self.executor.max_operations),
            ..dm_api::ExecutorOptions::default()
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = CliConfig::parse("").expect("empty config");
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.log_level(), "warn");
    }

    #[test]
    fn sections_are_read() {
        let config = CliConfig::parse(
            "[executor]\ntimeout_ms = 250\nmax_operations = 1000\n\n[logging]\nlevel = \"debug\"\n",
        )
        .expect("config");
        assert_eq!(config.executor.timeout_ms, Some(250));
        assert_eq!(config.executor.max_operations, Some(1000));
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn flags_override_file_values() {
        let config = CliConfig::parse("[executor]\ntimeout_ms = 250\nmax_operations = 1000\n")
            .expect("config");
        let options = config.executor_options(&LimitArgs {
            timeout_ms: Some(10),
            max_operations: None,
        });
        assert_eq!(options.timeout, Some(Duration::from_millis(10)));
        assert_eq!(options.max_operations, Some(1000));
    }

    #[test]
    fn unknown_value_types_are_rejected() {
        let error = CliConfig::parse("[executor]\ntimeout_ms = \"soon\"\n").expect_err("bad type");
        assert_eq!(error.code, "CLI_CONFIG_INVALID");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let error = CliConfig::load(Some("/definitely/not/here.toml")).expect_err("missing");
        assert_eq!(error.code, "CLI_READ");
    }
}
