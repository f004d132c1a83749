//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use pestres_api::CodexClient;
use pestres_core::pipeline::{HarvestProgress, HarvestReport};
use pestres_shared::{AppConfig, FetchConfig, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pestres — harvest Codex Alimentarius pesticide MRL data into CSV.
#[derive(Parser)]
#[command(
    name = "pestres",
    version,
    about = "Harvest Codex Alimentarius pesticide MRL data into flat CSV datasets.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
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
    /// Run the full harvest and write the three CSV datasets.
    Harvest {
        /// Output directory (defaults to the configured output_dir).
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "pestres=info",
        1 => "pestres=debug",
        _ => "pestres=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Harvest { out } => cmd_harvest(out.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

async fn cmd_harvest(out: Option<&str>) -> Result<()> {
    let config = load_config()?;

    let out_dir = PathBuf::from(out.unwrap_or(&config.defaults.output_dir));
    let fetch_config = FetchConfig::from(&config);
    let client = CodexClient::new(&fetch_config)?;

    info!(out_dir = %out_dir.display(), "starting harvest");

    let reporter = CliProgress::new();
    let report = pestres_core::pipeline::harvest(&client, &out_dir, &reporter).await?;

    // Print summary
    println!();
    println!("  Harvest complete!");
    println!("  Commodity MRL rows:  {}", report.commodity_mrl_rows);
    println!("  Pesticide MRL rows:  {}", report.pesticide_mrl_rows);
    println!("  Pesticide rows:      {}", report.pesticide_rows);
    println!("  Output:              {}", report.paths.commodity_mrl.display());
    println!("                       {}", report.paths.pesticide_mrl.display());
    println!("                       {}", report.paths.pesticide.display());
    if !report.failed_commodity_ids.is_empty() {
        println!(
            "  Failed commodity ids ({}): {}",
            report.failed_commodity_ids.len(),
            report.failed_commodity_ids.join(", ")
        );
    }
    if !report.failed_pesticide_ids.is_empty() {
        println!(
            "  Failed pesticide ids ({}): {}",
            report.failed_pesticide_ids.len(),
            report.failed_pesticide_ids.join(", ")
        );
    }
    println!("  Time:                {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl HarvestProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn commodity_fetched(&self, id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Commodity [{current}/{total}] id={id}"));
    }

    fn pesticide_fetched(&self, id: &str, discovered: usize) {
        self.spinner
            .set_message(format!("Pesticide [{discovered} discovered] id={id}"));
    }

    fn done(&self, _report: &HarvestReport) {
        self.spinner.finish_and_clear();
    }
}
