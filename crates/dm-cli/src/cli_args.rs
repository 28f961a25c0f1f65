use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "datamapper")]
#[command(about = "Generate and run data mapping scripts")]
pub(crate) struct Cli {
    /// TOML settings file; `datamapper.toml` is used when present.
    #[arg(long = "config", global = true)]
    pub(crate) config: Option<String>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Compile a mapper state file into a script.
    Generate(GenerateArgs),
    /// Run a script file against an input document.
    Execute(ExecuteArgs),
    /// Generate and execute in one step.
    Run(RunArgs),
    /// Print the tree built from a sample document.
    Tree(TreeArgs),
    /// Apply path mappings directly to a template document.
    Apply(ApplyArgs),
    /// List the runtime bindings scripts may call.
    Shims,
}

#[derive(Debug, Clone, Default, Args)]
pub(crate) struct LimitArgs {
    #[arg(long = "timeout-ms")]
    pub(crate) timeout_ms: Option<u64>,
    #[arg(long = "max-operations")]
    pub(crate) max_operations: Option<u64>,
}

#[derive(Debug, Args)]
pub(crate) struct GenerateArgs {
    #[arg(long = "mapper")]
    pub(crate) mapper: String,
    #[arg(long = "out")]
    pub(crate) out: Option<String>,
    /// Prepend the comment block describing the runtime bindings.
    #[arg(long = "with-header")]
    pub(crate) with_header: bool,
}

#[derive(Debug, Args)]
pub(crate) struct ExecuteArgs {
    #[arg(long = "script")]
    pub(crate) script: String,
    #[arg(long = "input")]
    pub(crate) input: String,
    /// Mapper state whose local context (functions, globals, lookups) is bound.
    #[arg(long = "mapper")]
    pub(crate) mapper: Option<String>,
    #[command(flatten)]
    pub(crate) limits: LimitArgs,
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    #[arg(long = "mapper")]
    pub(crate) mapper: String,
    #[arg(long = "input")]
    pub(crate) input: String,
    #[command(flatten)]
    pub(crate) limits: LimitArgs,
}

#[derive(Debug, Args)]
pub(crate) struct TreeArgs {
    #[arg(long = "input")]
    pub(crate) input: String,
    /// JSON or XML; inferred from the file extension when omitted.
    #[arg(long = "input-type")]
    pub(crate) input_type: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct ApplyArgs {
    #[arg(long = "source")]
    pub(crate) source: String,
    #[arg(long = "template")]
    pub(crate) template: String,
    /// JSON array of `{id, sourcePath, targetPath, condition?, transform?}`.
    #[arg(long = "mappings")]
    pub(crate) mappings: String,
    #[arg(long = "input-type")]
    pub(crate) input_type: Option<String>,
}
