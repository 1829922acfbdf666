//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use tdocgraph_core::pipeline::{
    AnswerOutcome, ProgressReporter, SearchContext, SearchOutcome, SearchRequest, run_search,
};
use tdocgraph_shared::{AppConfig, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// tdocgraph — relevance-ranked retrieval over a standardization document graph.
#[derive(Parser)]
#[command(
    name = "tdocgraph",
    version,
    about = "Search the document graph, stage ranked archives, and generate an answer.",
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
    /// Run a relevance query and the full retrieval/generation pipeline.
    Search {
        /// Free-text query.
        query: String,

        /// Meeting-id substring filter (e.g. RAN1-118). Leave empty if unsure.
        #[arg(short, long)]
        meeting: Option<String>,

        /// Maximum ranked documents (defaults to ranking.result_cap).
        #[arg(short, long)]
        limit: Option<usize>,

        /// Stop after staging; skip the readiness gate and generation.
        #[arg(long)]
        no_generate: bool,

        /// Result export path (defaults to ./search_results.csv).
        #[arg(long)]
        export: Option<String>,
    },

    /// Probe the generation backend readiness once and report.
    Status,

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
        0 => "info",
        1 => "debug",
        _ => "trace",
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
        Command::Search {
            query,
            meeting,
            limit,
            no_generate,
            export,
        } => cmd_search(&query, meeting, limit, no_generate, export.as_deref()).await,
        Command::Status => cmd_status().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// search
// ---------------------------------------------------------------------------

async fn cmd_search(
    query: &str,
    meeting: Option<String>,
    limit: Option<usize>,
    no_generate: bool,
    export: Option<&str>,
) -> Result<()> {
    let config = load_config()?;

    info!(query, meeting = ?meeting, "starting search");

    let ctx = SearchContext::from_config(config).await?;

    let request = SearchRequest {
        query: query.to_string(),
        meeting,
        limit,
        generate: !no_generate,
        export_path: export.map(PathBuf::from),
    };

    let reporter = CliProgress::new();
    let outcome = run_search(&ctx, &request, &reporter).await?;

    if outcome.is_no_results() {
        println!();
        println!("  No matching documents found.");
        println!();
        return Ok(());
    }

    print_ranked_table(&outcome);
    print_fetch_summary(&outcome);
    print_answer(&outcome);

    Ok(())
}

fn print_ranked_table(outcome: &SearchOutcome) {
    println!();
    println!(
        "  {:<14} {:<11} {:<8} {:>8}  {}",
        "DOC ID", "MEETING", "RELEASE", "SCORE", "TITLE"
    );
    for row in &outcome.ranked {
        let title: String = row.title.chars().take(60).collect();
        println!(
            "  {:<14} {:<11} {:<8} {:>8.2}  {}",
            row.doc_id,
            row.meeting_id.as_deref().unwrap_or("-"),
            row.release.as_deref().unwrap_or("-"),
            row.boosted_score,
            title
        );
    }
}

fn print_fetch_summary(outcome: &SearchOutcome) {
    let Some(report) = &outcome.fetch else {
        return;
    };

    println!();
    println!(
        "  Staged {}/{} documents ({} files) in {:.1}s",
        report.succeeded,
        report.attempted,
        report.staged_files,
        report.duration.as_secs_f64()
    );
    for (doc_id, error) in &report.failures {
        println!("  failed: {doc_id}: {error}");
    }
}

fn print_answer(outcome: &SearchOutcome) {
    println!();
    match &outcome.answer {
        AnswerOutcome::Generated(payload) => {
            let rendered = serde_json::to_string_pretty(payload)
                .unwrap_or_else(|_| payload.to_string());
            println!("{rendered}");
        }
        AnswerOutcome::NotReady(message) | AnswerOutcome::Failed(message) => {
            println!("  {message}");
        }
        AnswerOutcome::Skipped => {}
    }
    println!();
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

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _outcome: &SearchOutcome) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// status / config
// ---------------------------------------------------------------------------

async fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let client = tdocgraph_generate::GenerationClient::new(config.generation.clone())?;

    if client.probe().await {
        println!("generation backend ready: {}", config.generation.stats_url);
    } else {
        println!(
            "generation backend NOT ready: {}",
            config.generation.stats_url
        );
    }

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
