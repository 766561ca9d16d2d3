use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use spendlens_core::YearMonth;
use spendlens_finance::{run_ingest, IngestOptions, IngestReport, RulesClassifier};
use std::path::PathBuf;

mod config;
mod dashboard;
mod llm;
mod report;
mod state;

use config::{load_config, Config};
use llm::LlmClassifier;

#[derive(Parser, Debug)]
#[command(
    name = "spendlens",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SPENDLENS_BUILD_SHA"), ")"),
    about = "Bank statement ingestion, categorisation and a spending dashboard"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse OFX statements, classify each transaction and write the dataset CSV
    Ingest {
        /// Directory containing .ofx statement files
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Output CSV (overwritten)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Drop records dated before this day (YYYY-MM-DD)
        #[arg(long, value_parser = parse_day)]
        since: Option<NaiveDate>,

        /// Which classifier assigns categories
        #[arg(long, value_enum, default_value_t = ClassifierKind::Llm)]
        classifier: ClassifierKind,

        /// Classifier calls in flight at once
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Interactive spending dashboard over the dataset CSV
    Dashboard {
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Print the dashboard view for one month without the TUI
    Report {
        #[arg(long)]
        data: Option<PathBuf>,

        /// YYYY-MM (default: most recent month in the data)
        #[arg(long)]
        month: Option<YearMonth>,

        /// Restrict to these categories (repeatable; default: all)
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Manage ~/.spendlens/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,
    /// Print the effective config
    Show,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ClassifierKind {
    /// OpenAI-compatible chat completions endpoint from config
    Llm,
    /// Offline keyword rules
    Rules,
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Ingest {
            dir,
            out,
            since,
            classifier,
            concurrency,
        } => {
            let cfg = load_config()?;
            let opts = ingest_options(&cfg, dir, out, since, concurrency)?;
            ingest(&cfg, &opts, classifier).await?;
        }

        Command::Dashboard { data } => {
            let cfg = load_config()?;
            let data = data.unwrap_or(cfg.dashboard.data);
            dashboard::run_dashboard(&data)?;
        }

        Command::Report {
            data,
            month,
            categories,
            json,
        } => {
            let cfg = load_config()?;
            let data = data.unwrap_or(cfg.dashboard.data);
            report::run_report(&data, month, categories, json)?;
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => config::show_config()?,
        },
    }

    Ok(())
}

fn ingest_options(
    cfg: &Config,
    dir: Option<PathBuf>,
    out: Option<PathBuf>,
    since: Option<NaiveDate>,
    concurrency: Option<usize>,
) -> Result<IngestOptions> {
    let cutoff = match since {
        Some(d) => d,
        None => cfg.ingest.cutoff_date()?,
    };
    Ok(IngestOptions {
        statements_dir: dir.unwrap_or_else(|| cfg.ingest.statements_dir.clone()),
        output: out.unwrap_or_else(|| cfg.ingest.output.clone()),
        cutoff,
        concurrency: concurrency.unwrap_or(cfg.ingest.concurrency).max(1),
    })
}

async fn ingest(cfg: &Config, opts: &IngestOptions, kind: ClassifierKind) -> Result<()> {
    let report = match kind {
        ClassifierKind::Llm => {
            // Missing key fails here, before any file is read or written.
            let classifier = LlmClassifier::from_config(&cfg.llm)?;
            info!("classifying with {} via {}", classifier.model(), cfg.llm.base_url);
            run_ingest(opts, &classifier).await
        }
        ClassifierKind::Rules => run_ingest(opts, &RulesClassifier).await,
    }
    .with_context(|| format!("ingest from {}", opts.statements_dir.display()))?;

    print_summary(&report);
    Ok(())
}

fn print_summary(r: &IngestReport) {
    println!("Read {} statement file(s)", r.files_read);
    for f in &r.failures {
        println!("  skipped {}: {}", f.path.display(), f.message);
    }
    println!(
        "Parsed {} transaction(s), {} unique, {} classifier call(s)",
        r.parsed, r.unique, r.classifier_calls
    );
    for a in &r.accounts {
        let id = if a.account_id.is_empty() { "(no id)" } else { a.account_id.as_str() };
        let types: Vec<String> = a.by_type.iter().map(|(t, n)| format!("{t} {n}")).collect();
        println!(
            "  account {} ({}): {} transaction(s) [{}]",
            id,
            a.kind.label(),
            a.transactions,
            types.join(", ")
        );
    }
    println!("Dropped {} before the cutoff", r.before_cutoff);
    println!("Wrote {} record(s) to {}", r.written, r.output.display());

    if let Some(p) = &r.review_path {
        println!("\n{} record(s) need review ({}):", r.review.len(), p.display());
        for item in &r.review {
            println!("  {} {:?}: {}", item.id, item.description, item.reason);
        }
    }
}
