// 🚂 Pipeline - one batch run over whatever files exist right now
//
// ingest:   roster (+ match log) → build → signature-gated append → live snapshot
// episodes: archive pairs + resolved matches → output/episodes/
// report:   analytics + standings for the latest period → output/season_report.json
//
// Every input is parsed before the archive is touched. A malformed table
// aborts the run with the archive unchanged.

use crate::analytics::{self, SeasonAnalytics};
use crate::builder::SnapshotBuilder;
use crate::config::{Backend, LedgerConfig};
use crate::db::SqliteStore;
use crate::episode::{build_episodes, write_episodes};
use crate::matches::{MatchResolver, MatchResult};
use crate::parser::{ingest_file, IngestReport, TableKind};
use crate::snapshot::Snapshot;
use crate::standings::{standings, Standings};
use crate::store::{write_json_atomic, AppendOutcome, FileStore, SnapshotStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const LIVE_SNAPSHOT_FILE: &str = "live_snapshot.json";
pub const SEASON_REPORT_FILE: &str = "season_report.json";
pub const EPISODES_DIR: &str = "episodes";
pub const SQLITE_FILE: &str = "archive.db";

// ============================================================================
// OUTPUT TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    pub outcome: AppendOutcome,
    pub roster: IngestReport,
    pub matches: Option<IngestReport>,
    pub participants: usize,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonReport {
    pub generated_at: DateTime<Utc>,
    pub analytics: SeasonAnalytics,
    pub standings: Standings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub ingest: IngestSummary,
    pub episodes_written: usize,
    pub report_written: bool,
}

// ============================================================================
// STORE + PATHS
// ============================================================================

pub fn open_store(config: &LedgerConfig) -> Result<Box<dyn SnapshotStore>> {
    let store: Box<dyn SnapshotStore> = match config.backend {
        Backend::Files => Box::new(
            FileStore::open(&config.archive_dir)
                .with_context(|| format!("opening archive {}", config.archive_dir.display()))?,
        ),
        Backend::Sqlite => {
            let path = config.archive_dir.join(SQLITE_FILE);
            Box::new(
                SqliteStore::open(&path)
                    .with_context(|| format!("opening archive {}", path.display()))?,
            )
        }
    };
    Ok(store)
}

pub fn live_snapshot_path(config: &LedgerConfig) -> PathBuf {
    config.output_dir.join(LIVE_SNAPSHOT_FILE)
}

pub fn episodes_dir(config: &LedgerConfig) -> PathBuf {
    config.output_dir.join(EPISODES_DIR)
}

pub fn report_path(config: &LedgerConfig) -> PathBuf {
    config.output_dir.join(SEASON_REPORT_FILE)
}

fn load_live_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading live snapshot {}", path.display()))?;
    let snapshot = serde_json::from_str(&text)
        .with_context(|| format!("parsing live snapshot {}", path.display()))?;
    Ok(Some(snapshot))
}

fn resolve_matches(
    config: &LedgerConfig,
    matches: Option<&Path>,
) -> Result<(BTreeMap<u32, MatchResult>, Option<IngestReport>)> {
    let Some(path) = matches else {
        return Ok((BTreeMap::new(), None));
    };
    let ingested = ingest_file(path, TableKind::MatchLog)
        .with_context(|| format!("ingesting match log {}", path.display()))?;
    let results = MatchResolver::new(&config.matches).resolve_all(&ingested.match_rows());
    Ok((results, Some(ingested.report)))
}

// ============================================================================
// STEPS
// ============================================================================

/// Parse inputs, build the next candidate and append it if anything changed
pub fn ingest(config: &LedgerConfig, roster: &Path, matches: Option<&Path>) -> Result<IngestSummary> {
    let roster_table = ingest_file(roster, TableKind::Roster)
        .with_context(|| format!("ingesting roster {}", roster.display()))?;
    let match_report = resolve_matches(config, matches)?.1;

    let mut store = open_store(config)?;
    let live_path = live_snapshot_path(config);
    let prior_live = load_live_snapshot(&live_path)?;

    let builder = SnapshotBuilder::new(&config.source_id, &config.analytics);
    let candidate = builder
        .build(&roster_table.roster_rows(), prior_live.as_ref(), store.as_ref())
        .context("building snapshot")?;

    let outcome = store.append(candidate.clone()).context("appending snapshot")?;
    write_json_atomic(&live_path, &candidate)
        .with_context(|| format!("writing live snapshot {}", live_path.display()))?;

    Ok(IngestSummary {
        outcome,
        roster: roster_table.report,
        matches: match_report,
        participants: candidate.count(),
        signature: candidate.signature,
    })
}

/// Rebuild every episode from the archive; returns how many were written
pub fn regenerate_episodes(config: &LedgerConfig, matches: Option<&Path>) -> Result<usize> {
    let (results, _) = resolve_matches(config, matches)?;
    let store = open_store(config)?;

    let history = store.read_all().context("reading archive")?;
    let episodes = build_episodes(&history, &results, &config.movers).context("building episodes")?;

    let dir = episodes_dir(config);
    let written = write_episodes(&dir, &episodes)
        .with_context(|| format!("writing episodes to {}", dir.display()))?;
    Ok(written)
}

/// Season analytics and standings for the latest period; None for an empty archive
pub fn report(config: &LedgerConfig) -> Result<Option<SeasonReport>> {
    let store = open_store(config)?;
    let history = store.read_all().context("reading archive")?;

    let Some(season) = analytics::analyze(&history, &config.analytics).context("computing analytics")?
    else {
        tracing::info!("archive is empty, no report");
        return Ok(None);
    };
    let Some(latest) = history.last() else {
        return Ok(None);
    };

    let report = SeasonReport {
        generated_at: Utc::now(),
        standings: standings(latest, config.analytics.danger_zone_size),
        analytics: season,
    };

    let path = report_path(config);
    write_json_atomic(&path, &report).with_context(|| format!("writing report {}", path.display()))?;
    tracing::info!(period = report.analytics.period, path = %path.display(), "season report written");
    Ok(Some(report))
}

/// ingest → episodes → report
pub fn run(config: &LedgerConfig, roster: &Path, matches: Option<&Path>) -> Result<RunSummary> {
    let ingest = ingest(config, roster, matches)?;
    let episodes_written = regenerate_episodes(config, matches)?;
    let report_written = report(config)?.is_some();

    Ok(RunSummary {
        ingest,
        episodes_written,
        report_written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;

    fn config_in(root: &Path) -> LedgerConfig {
        LedgerConfig {
            archive_dir: root.join("archive"),
            output_dir: root.join("output"),
            ..LedgerConfig::default()
        }
    }

    #[test]
    fn test_missing_roster_is_malformed_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let err = ingest(&config, &dir.path().join("nope.csv"), None).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::MalformedInput { .. })
        ));
        assert!(!config.archive_dir.exists());
    }

    #[test]
    fn test_report_on_empty_archive_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        assert!(report(&config).unwrap().is_none());
        assert!(!report_path(&config).exists());
    }

    #[test]
    fn test_sqlite_backend_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.backend = Backend::Sqlite;

        let roster = dir.path().join("roster.csv");
        std::fs::write(&roster, "id,name,faction,power\np1,Ana,Red,10\n").unwrap();

        let first = ingest(&config, &roster, None).unwrap();
        let second = ingest(&config, &roster, None).unwrap();

        assert_eq!(first.outcome, AppendOutcome::Archived { period: 0 });
        assert_eq!(second.outcome, AppendOutcome::Unchanged { latest_period: 0 });
        assert!(config.archive_dir.join(SQLITE_FILE).exists());
    }
}
