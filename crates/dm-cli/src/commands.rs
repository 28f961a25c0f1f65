use std::fs;

use dm_api::ExecutionResult;
use dm_core::MapperError;
use dm_runtime::{render_shim_header, SHIM_CATALOGUE};

use crate::cli_args::{ApplyArgs, ExecuteArgs, GenerateArgs, RunArgs, TreeArgs};
use crate::config::CliConfig;
use crate::error_map::{json_line, map_cli_write};
use crate::models::Report;
use crate::source_loader::{
    load_mapper_state, load_mappings, read_text, resolve_input_type,
};

pub(crate) fn run_generate(args: GenerateArgs) -> Result<Report, MapperError> {
    let state = load_mapper_state(&args.mapper)?;
    let issues = dm_api::validate_mapper_state(&state);
    for issue in &issues {
        tracing::warn!(reference = %issue.reference_id, "{}", issue.message);
    }

    let mut script = dm_api::generate_script(&state)?;
    if args.with_header {
        script = format!("{}\n{}", render_shim_header(), script);
    }

    let mut report = Report::ok();
    for issue in &issues {
        report.push(json_line("ISSUE_JSON", issue));
    }
    match args.out {
        Some(out) => {
            fs::write(&out, &script).map_err(map_cli_write)?;
            report.push(format!("SCRIPT_OUT:{}", out));
        }
        None => report.push(json_line("SCRIPT_JSON", &script)),
    }
    Ok(report)
}

pub(crate) fn run_execute(args: ExecuteArgs, config: &CliConfig) -> Result<Report, MapperError> {
    let script = read_text(&args.script)?;
    let input = read_text(&args.input)?;
    let context = match &args.mapper {
        Some(path) => load_mapper_state(path)?.local_context,
        None => Default::default(),
    };
    let options = config.executor_options(&args.limits);
    let result = dm_api::execute_script(&script, &input, &context, &options);
    Ok(execution_report(&result))
}

pub(crate) fn run_mapper(args: RunArgs, config: &CliConfig) -> Result<Report, MapperError> {
    let state = load_mapper_state(&args.mapper)?;
    let input = read_text(&args.input)?;
    let options = config.executor_options(&args.limits);
    let result = dm_api::run_mapper(&state, &input, &options)?;
    Ok(execution_report(&result))
}

pub(crate) fn execution_report(result: &ExecutionResult) -> Report {
    let mut report = match &result.error {
        None => {
            let mut report = Report::ok();
            report.push(json_line("OUTPUT_JSON", &result.output));
            report
        }
        Some(message) => Report::failed("EXEC_FAILED", message),
    };
    for log in &result.logs {
        report.push(json_line("LOG_JSON", log));
    }
    report.push(format!("DURATION_MS:{}", result.duration_ms));
    report
}

pub(crate) fn run_tree(args: TreeArgs) -> Result<Report, MapperError> {
    let input_type = resolve_input_type(&args.input, args.input_type.as_deref())?;
    let tree = dm_api::build_tree(&read_text(&args.input)?, input_type)?;
    let mut report = Report::ok();
    report.push(json_line("TREE_JSON", &tree));
    Ok(report)
}

pub(crate) fn run_apply(args: ApplyArgs) -> Result<Report, MapperError> {
    let input_type = resolve_input_type(&args.source, args.input_type.as_deref())?;
    let mappings = load_mappings(&args.mappings)?;
    let applied = dm_api::apply_to_documents(
        &read_text(&args.source)?,
        &read_text(&args.template)?,
        input_type,
        &mappings,
    )?;

    let mut report = if applied.is_ok() {
        Report::ok()
    } else {
        Report::failed(
            "APPLY_FAILED",
            &format!("{} of {} mappings failed", applied.errors.len(), mappings.len()),
        )
    };
    let output = dm_parser::serialize_data(&applied.output, input_type)?;
    report.push(json_line("OUTPUT_JSON", &output));
    for error in &applied.errors {
        report.push(json_line("APPLY_ERROR_JSON", error));
    }
    Ok(report)
}

pub(crate) fn run_shims() -> Report {
    let mut report = Report::ok();
    for doc in SHIM_CATALOGUE {
        report.push(format!(
            "SHIM:{}|{}",
            doc.name,
            serde_json::to_string(doc.signature).unwrap_or_else(|_| "\"\"".to_string())
        ));
    }
    report
}
