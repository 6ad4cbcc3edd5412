//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use hibou_core::pipeline::{ProgressReporter, RunSummary, run_pipeline};
use hibou_core::select_models;
use hibou_emmaa::EmmaaClient;
use hibou_shared::{
    AppConfig, ModelRequest, RunConfig, RunOverrides, init_config, load_config, load_config_from,
    parse_id_list,
};
use hibou_storage::{ObjectStorage, WriteReceipt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Hibou: EMMAA knowledge graphs, grounded and distributed.
#[derive(Parser)]
#[command(
    name = "hibou",
    version,
    about = "Extract EMMAA models, ground them to an ontology, and distribute them as JSONL objects.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.hibou/hibou.toml).
    #[arg(long, global = true, env = "HIBOU_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline and write every object to storage.
    Run(RunArgs),

    /// Show the platform catalog and which models a run would select.
    Models(SelectionArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Model selection flags.
#[derive(Args)]
pub(crate) struct SelectionArgs {
    /// Models to process: `all` or a space-separated list of EMMAA IDs.
    #[arg(long)]
    pub todo: Option<String>,

    /// Space-separated list of EMMAA model IDs to skip.
    #[arg(long)]
    pub exclude: Option<String>,
}

/// Flags of the `run` subcommand. Each one overrides its config file value.
#[derive(Args)]
pub(crate) struct RunArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Space-separated grounding namespaces, highest priority first.
    #[arg(long)]
    pub namespaces: Option<String>,

    /// Ontology export name.
    #[arg(long)]
    pub ontology: Option<String>,

    /// S3-compatible storage endpoint.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Destination bucket.
    #[arg(long)]
    pub bucket: Option<String>,

    /// Version segment of the distribution path.
    #[arg(long)]
    pub dist_version: Option<String>,

    /// Write to a local directory instead of the storage endpoint.
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Echo the configuration and report every step.
    #[arg(long)]
    pub print_opt: bool,

    /// Also archive the raw upstream data.
    #[arg(long)]
    pub archive_raw: bool,
}

impl RunArgs {
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            todo_models: self.selection.todo.clone(),
            exclude_models: self.selection.exclude.clone(),
            namespaces_priority: self.namespaces.clone(),
            ontology: self.ontology.clone(),
            endpoint: self.endpoint.clone(),
            bucket: self.bucket.clone(),
            dist_version: self.dist_version.clone(),
            print_opt: self.print_opt,
            archive_raw: self.archive_raw,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "hibou=info",
        1 => "hibou=debug",
        _ => "hibou=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run(args) => cmd_run(config_path, &args).await,
        Command::Models(args) => cmd_models(config_path, &args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let config = load(config_path)?;
    let run_config = RunConfig::build(&config, &args.overrides())?;

    let client = EmmaaClient::new(&run_config.emmaa)?;
    let storage = match &args.out_dir {
        Some(dir) => ObjectStorage::local(dir)?,
        None => ObjectStorage::s3(&run_config.storage)?,
    };

    info!(
        todo = %run_config.request,
        destination = %storage.location(),
        "running pipeline"
    );

    let reporter = CliProgress::new();
    let summary = match run_pipeline(&run_config, &client, &storage, &reporter).await {
        Ok(summary) => summary,
        Err(e) => {
            reporter.clear();
            return Err(e.into());
        }
    };

    println!();
    println!("  Pipeline complete!");
    println!("  Run:      {}", summary.run_id);
    println!("  Storage:  {}", summary.location);
    println!("  Root:     {}", summary.dist_root);
    println!("  Objects:  {} ({} bytes)", summary.objects_written, summary.bytes_written);
    println!("  Time:     {:.1}s", summary.elapsed.as_secs_f64());
    println!();
    println!(
        "  {:<24} {:>7} {:>7} {:>9} {:>6} {:>7} {:>7}",
        "MODEL", "NODES", "EDGES", "EVIDENCE", "PATHS", "GROUPS", "TESTED"
    );
    for model in &summary.models {
        println!(
            "  {:<24} {:>7} {:>7} {:>9} {:>6} {:>7} {:>7}",
            model.model, model.nodes, model.edges, model.evidences, model.paths, model.groups, model.tested
        );
    }
    println!();

    Ok(())
}

async fn cmd_models(config_path: Option<&Path>, args: &SelectionArgs) -> Result<()> {
    let config = load(config_path)?;
    let request = ModelRequest::parse(args.todo.as_deref().unwrap_or(&config.models.todo));
    let exclusions = parse_id_list(args.exclude.as_deref().unwrap_or(&config.models.exclude));

    let client = EmmaaClient::new(&config.emmaa)?;
    let mut catalog = client.fetch_catalog().await?;
    catalog.mark_excluded(&exclusions);

    let selected = select_models(&request, &exclusions, &catalog.model_ids())
        .map_err(|e| eyre!("{e} (available: {})", catalog.model_ids().join(" ")))?;

    println!();
    println!("  {:<10} {:<24} {:<36} {:>5}  STATUS", "ID", "MODEL", "NAME", "TESTS");
    for model in &catalog.models {
        let status = if selected.contains(&model.id_emmaa) {
            "selected"
        } else if model.excluded {
            "excluded"
        } else {
            "-"
        };
        println!(
            "  {:<10} {:<24} {:<36} {:>5}  {status}",
            model.id,
            model.id_emmaa,
            model.name.as_deref().unwrap_or("-"),
            model.tests.len(),
        );
    }
    println!();
    println!("  {} of {} models selected, {} test corpora", selected.len(), catalog.models.len(), catalog.tests.len());
    println!("  Snapshot: {}", catalog.snapshot_time);
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn model_started(&self, model: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Processing [{current}/{total}] {model}"));
    }

    fn object_written(&self, receipt: &WriteReceipt) {
        self.spinner.set_message(format!("Wrote {}", receipt.path));
    }

    fn done(&self, _summary: &RunSummary) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_become_overrides() {
        let cli = Cli::parse_from([
            "hibou",
            "run",
            "--todo",
            "aml covid19",
            "--exclude",
            "aml",
            "--dist-version",
            "v5.0",
            "--archive-raw",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);

        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        let overrides = args.overrides();
        assert_eq!(overrides.todo_models.as_deref(), Some("aml covid19"));
        assert_eq!(overrides.exclude_models.as_deref(), Some("aml"));
        assert_eq!(overrides.dist_version.as_deref(), Some("v5.0"));
        assert!(overrides.archive_raw);
        assert!(!overrides.print_opt);
        assert!(args.out_dir.is_none());
    }

    #[test]
    fn progress_clear_finishes_spinner() {
        let progress = CliProgress::new();
        progress.phase("Fetching catalog");
        progress.clear();
        assert!(progress.spinner.is_finished());
    }

    #[test]
    fn models_accepts_selection_flags() {
        let cli = Cli::parse_from(["hibou", "models", "--todo", "all", "--log-format", "json"]);
        assert!(matches!(cli.log_format, LogFormat::Json));
        let Command::Models(args) = cli.command else {
            panic!("expected models command");
        };
        assert_eq!(args.todo.as_deref(), Some("all"));
        assert!(args.exclude.is_none());
    }
}
