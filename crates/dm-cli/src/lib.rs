use std::ffi::OsString;

use clap::Parser;
use dm_core::MapperError;
use tracing_subscriber::EnvFilter;

mod cli_args;
mod commands;
mod config;
mod error_map;
mod models;
mod source_loader;

pub(crate) use cli_args::{Cli, Command};
pub(crate) use config::CliConfig;
pub(crate) use error_map::emit_error;
pub(crate) use models::Report;

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    let config = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => return emit_error(error),
    };
    init_logging(config.log_level());
    match run(cli.command, &config) {
        Ok(report) => report.emit(),
        Err(error) => emit_error(error),
    }
}

/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(command: Command, config: &CliConfig) -> Result<Report, MapperError> {
    match command {
        Command::Generate(args) => commands::run_generate(args),
        Command::Execute(args) => commands::run_execute(args, config),
        Command::Run(args) => commands::run_mapper(args, config),
        Command::Tree(args) => commands::run_tree(args),
        Command::Apply(args) => commands::run_apply(args),
        Command::Shims => Ok(commands::run_shims()),
    }
}
