use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use season_ledger::config::{Backend, LedgerConfig};
use season_ledger::logging::init_tracing;
use season_ledger::pipeline::{self, IngestSummary};
use season_ledger::AppendOutcome;

#[derive(Parser, Debug)]
#[command(name = "season-ledger", version, about = "Season snapshot archive, episodes and analytics")]
struct Cli {
    /// Directory holding season-ledger.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    #[arg(long, global = true)]
    archive_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// files | sqlite
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a snapshot from the roster and archive it if anything changed
    Ingest {
        #[arg(long)]
        roster: PathBuf,
        /// Event log, validated before the archive is touched
        #[arg(long)]
        matches: Option<PathBuf>,
    },
    /// Regenerate every episode from the archive
    Episodes {
        #[arg(long)]
        matches: Option<PathBuf>,
    },
    /// Write the season report for the latest period
    Report,
    /// ingest, episodes and report in one pass
    Run {
        #[arg(long)]
        roster: PathBuf,
        #[arg(long)]
        matches: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> Result<LedgerConfig> {
    let mut config = LedgerConfig::load(&cli.config_dir)?;

    if let Some(dir) = &cli.archive_dir {
        config.archive_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(value) = &cli.backend {
        config.backend = Backend::parse(value)
            .ok_or_else(|| anyhow::anyhow!("unknown backend '{}' (expected files or sqlite)", value))?;
    }

    config.validate()?;
    Ok(config)
}

fn print_ingest(summary: &IngestSummary) {
    println!(
        "📂 Roster: {} rows read, {} kept, {} dropped",
        summary.roster.rows_read, summary.roster.rows_kept, summary.roster.rows_dropped
    );
    if let Some(matches) = &summary.matches {
        println!("⚔️  Match log: {} rows kept", matches.rows_kept);
    }
    match summary.outcome {
        AppendOutcome::Archived { period } => {
            println!("✓ Archived period {} ({} participants)", period, summary.participants)
        }
        AppendOutcome::Unchanged { latest_period } => {
            println!("✓ No change since period {}, nothing archived", latest_period)
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Ingest { roster, matches } => {
            let summary = pipeline::ingest(&config, roster, matches.as_deref())?;
            print_ingest(&summary);
        }
        Commands::Episodes { matches } => {
            let written = pipeline::regenerate_episodes(&config, matches.as_deref())?;
            println!("🎬 Wrote {} episodes to {}", written, pipeline::episodes_dir(&config).display());
        }
        Commands::Report => match pipeline::report(&config)? {
            Some(report) => {
                println!("📊 Season report for period {}", report.analytics.period);
                if let Some(level) = report.analytics.chaos_level {
                    println!("   Chaos: {:?}", level);
                }
                println!("   Written to {}", pipeline::report_path(&config).display());
            }
            None => println!("📭 Archive is empty, no report"),
        },
        Commands::Run { roster, matches } => {
            println!("🚂 Season Ledger run");
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            let summary = pipeline::run(&config, roster, matches.as_deref())?;
            print_ingest(&summary.ingest);
            println!("🎬 Episodes written: {}", summary.episodes_written);
            println!(
                "📊 Season report: {}",
                if summary.report_written { "written" } else { "skipped" }
            );
        }
    }

    Ok(())
}
