//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use metaenrich_capture::ChromiumLauncher;
use metaenrich_catalog::provider_from_settings;
use metaenrich_core::{
    CaptureOutcome, PipelineResult, PipelineServices, ProgressReporter, run_capture,
    run_catalog_fetch, run_pipeline, run_sampling, run_synthesis, submit_intake,
};
use metaenrich_sampling::DremioEngine;
use metaenrich_shared::{
    AppConfig, ArtifactStore, CaptureSettings, CatalogSettings, Identifier, IntakeRecord,
    LlmSettings, QueryEngineSettings, SecretSource, init_config, load_config, load_config_from,
};
use metaenrich_synthesis::ChatCompletionsClient;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// metaenrich: enrich data catalog entries with metadata, samples and docs.
#[derive(Parser)]
#[command(
    name = "metaenrich",
    version,
    about = "Enrich a data catalog entry: intake, catalog metadata, sample rows, documentation capture and AI synthesis.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.metaenrich/metaenrich.toml).
    #[arg(long, env = "METAENRICH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Artifact directory (overrides `defaults.output_dir`).
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

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
    /// Stage 1: record the target table and documentation links.
    Intake {
        /// Catalog identifier (entity GUID).
        identifier: String,

        /// Target table, as a dotted query engine path.
        #[arg(long)]
        table: String,

        /// Documentation links, one per line.
        #[arg(long, conflicts_with = "links_file")]
        links: Option<String>,

        /// File with documentation links, one per line.
        #[arg(long)]
        links_file: Option<PathBuf>,
    },

    /// Stage 2: fetch catalog metadata and lineage.
    Catalog {
        /// Catalog identifier.
        identifier: String,
    },

    /// Stage 3: sample rows from the target table.
    Sample {
        /// Catalog identifier.
        identifier: String,
    },

    /// Stage 4: render documentation links to PDF.
    Capture {
        /// Catalog identifier.
        identifier: String,
    },

    /// Stage 5: synthesize a description with the language model.
    Synthesize {
        /// Catalog identifier.
        identifier: String,
    },

    /// Run stages 2 to 5 for an identifier with an intake record.
    Run {
        /// Catalog identifier.
        identifier: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

impl Command {
    /// Name used in the top-level failure message.
    pub(crate) fn stage(&self) -> &'static str {
        match self {
            Self::Intake { .. } => "intake",
            Self::Catalog { .. } => "catalog fetch",
            Self::Sample { .. } => "sampling",
            Self::Capture { .. } => "capture",
            Self::Synthesize { .. } => "synthesis",
            Self::Run { .. } => "pipeline",
            Self::Config { .. } => "config",
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
        0 => "metaenrich=info",
        1 => "metaenrich=debug",
        _ => "metaenrich=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Resolved configuration shared by every stage command.
struct Context {
    config: AppConfig,
    secrets: SecretSource,
    store: ArtifactStore,
}

impl Context {
    fn load(config_path: Option<&Path>, output_dir: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        let secrets = SecretSource::from(&config);
        let root = output_dir.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));
        Ok(Self {
            config,
            secrets,
            store: ArtifactStore::new(root),
        })
    }
}

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config,
        output_dir,
        command,
        ..
    } = cli;

    if let Command::Config { action } = &command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config.as_deref()),
        };
    }

    let ctx = Context::load(config.as_deref(), output_dir)?;
    match command {
        Command::Intake {
            identifier,
            table,
            links,
            links_file,
        } => cmd_intake(&ctx, &identifier, &table, links, links_file.as_deref()),
        Command::Catalog { identifier } => cmd_catalog(&ctx, &identifier).await,
        Command::Sample { identifier } => cmd_sample(&ctx, &identifier).await,
        Command::Capture { identifier } => cmd_capture(&ctx, &identifier).await,
        Command::Synthesize { identifier } => cmd_synthesize(&ctx, &identifier).await,
        Command::Run { identifier } => cmd_run(&ctx, &identifier).await,
        Command::Config { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Stage commands
// ---------------------------------------------------------------------------

fn cmd_intake(
    ctx: &Context,
    identifier: &str,
    table: &str,
    links: Option<String>,
    links_file: Option<&Path>,
) -> Result<()> {
    let links_text = match (links, links_file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read links file '{}': {e}", path.display()))?,
        (None, None) => String::new(),
    };

    let record = IntakeRecord::from_submission(identifier, table, &links_text)?;
    let path = submit_intake(&ctx.store, &record)?;

    println!("✅ Intake saved: {}", path.display());
    println!("   Table: {}", record.target_table);
    println!("   Links: {}", record.documentation_links.len());
    Ok(())
}

async fn cmd_catalog(ctx: &Context, identifier: &str) -> Result<()> {
    let id = Identifier::parse(identifier)?;
    let settings = CatalogSettings::resolve(&ctx.config, &ctx.secrets)?;
    let provider = provider_from_settings(&settings.auth)?;

    info!(%id, endpoint = %settings.endpoint, "fetching catalog record");
    let path = run_catalog_fetch(&ctx.store, &settings, provider.as_ref(), &id).await?;

    println!("✅ Catalog metadata saved: {}", path.display());
    Ok(())
}

async fn cmd_sample(ctx: &Context, identifier: &str) -> Result<()> {
    let id = Identifier::parse(identifier)?;
    let settings = QueryEngineSettings::resolve(&ctx.config, &ctx.secrets)?;
    let limit = settings.sample_limit;
    let engine = DremioEngine::new(settings)?;

    let path = run_sampling(&ctx.store, &engine, limit, &id).await?;

    println!("✅ Sample saved: {}", path.display());
    Ok(())
}

async fn cmd_capture(ctx: &Context, identifier: &str) -> Result<()> {
    let id = Identifier::parse(identifier)?;
    let launcher = ChromiumLauncher::new(CaptureSettings::from(&ctx.config));

    match run_capture(&ctx.store, &launcher, &id).await? {
        CaptureOutcome::Skipped => println!("⚠️  No documentation links to capture."),
        CaptureOutcome::Captured(report) => {
            for path in &report.saved {
                println!("✅ Saved: {}", path.display());
            }
            for (link, reason) in &report.failures {
                println!("⚠️  Failed: {link} ({reason})");
            }
        }
    }
    Ok(())
}

async fn cmd_synthesize(ctx: &Context, identifier: &str) -> Result<()> {
    let id = Identifier::parse(identifier)?;
    let settings = LlmSettings::resolve(&ctx.config, &ctx.secrets)?;
    let model = ChatCompletionsClient::new(&settings)?;

    let path = run_synthesis(&ctx.store, &model, settings.preview_rows, &id).await?;

    println!("✅ Analysis complete! Result saved to: {}", path.display());
    Ok(())
}

async fn cmd_run(ctx: &Context, identifier: &str) -> Result<()> {
    let id = Identifier::parse(identifier)?;

    // Resolve every secret before the first network call.
    let catalog = CatalogSettings::resolve(&ctx.config, &ctx.secrets)?;
    let engine_settings = QueryEngineSettings::resolve(&ctx.config, &ctx.secrets)?;
    let llm = LlmSettings::resolve(&ctx.config, &ctx.secrets)?;

    let provider = provider_from_settings(&catalog.auth)?;
    let sample_limit = engine_settings.sample_limit;
    let engine = DremioEngine::new(engine_settings)?;
    let launcher = ChromiumLauncher::new(CaptureSettings::from(&ctx.config));
    let model = ChatCompletionsClient::new(&llm)?;

    let services = PipelineServices {
        catalog: &catalog,
        token_provider: provider.as_ref(),
        engine: &engine,
        sample_limit,
        launcher: &launcher,
        model: &model,
        preview_rows: llm.preview_rows,
    };

    info!(%id, output_dir = %ctx.store.root().display(), "running pipeline");
    let reporter = CliProgress::new();
    let result = run_pipeline(&ctx.store, &id, &services, &reporter).await;
    reporter.spinner.finish_and_clear();
    let result = result?;

    println!();
    println!("  Pipeline complete for {id}");
    println!("  Catalog:   {}", result.catalog_path.display());
    println!("  Sample:    {}", result.sample_path.display());
    match &result.capture {
        CaptureOutcome::Skipped => println!("  Documents: skipped (no links)"),
        CaptureOutcome::Captured(report) => println!(
            "  Documents: {} saved, {} failed",
            report.saved.len(),
            report.failures.len()
        ),
    }
    println!("  Synthesis: {}", result.synthesis_path.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

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
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &PipelineResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
