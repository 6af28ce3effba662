// End-to-end runs against a temporary archive

use season_ledger::config::{Backend, LedgerConfig};
use season_ledger::episode::Episode;
use season_ledger::pipeline::{self, SeasonReport};
use season_ledger::store::{FileStore, SnapshotStore};
use season_ledger::{AppendOutcome, LedgerError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Season {
    dir: TempDir,
    config: LedgerConfig,
}

impl Season {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = LedgerConfig {
            archive_dir: dir.path().join("archive"),
            output_dir: dir.path().join("output"),
            ..LedgerConfig::default()
        };
        Season { dir, config }
    }

    fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn ingest(&self, roster_text: &str) -> AppendOutcome {
        let roster = self.write("roster.csv", roster_text);
        pipeline::ingest(&self.config, &roster, None).unwrap().outcome
    }

    fn archive(&self) -> FileStore {
        FileStore::open(&self.config.archive_dir).unwrap()
    }
}

const WEEK_0: &str = "\
id,name,faction,power,elimination_period
p1,Ana,Red,10,
p2,Bo,Blue,8,
p3,Cy,Blue,6,
";

const WEEK_1: &str = "\
id,name,faction,power,elimination_period
p1,Ana,Red,12,
p2,Bo,Blue,7,
p3,Cy,Blue,6.5,
";

// p1 is out from period 2; its raw numbers keep changing
const WEEK_2: &str = "\
id,name,faction,power,elimination_period
p1,Ana,Red,99,2
p2,Bo,Blue,9,
p3,Cy,Blue,6,
";

const WEEK_3: &str = "\
id,name,faction,power,elimination_period
p1,Ana,Red,50,2
p2,Bo,Blue,9.5,
p3,Cy,Blue,4,
";

const MATCH_LOG: &str = "\
episode,match_id,a_won,b_won
1,m1,1,0
2,m1,1,0
2,m1,1,0
2,m1,0,1
2,m2,1,0
2,m2,0,1
2,m2,0,1
2,m2,0,1
";

fn read_episode(path: &Path) -> Episode {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_double_ingestion_is_idempotent() {
    let season = Season::new();

    assert_eq!(season.ingest(WEEK_0), AppendOutcome::Archived { period: 0 });
    assert_eq!(season.ingest(WEEK_0), AppendOutcome::Unchanged { latest_period: 0 });
    assert_eq!(season.ingest(WEEK_0), AppendOutcome::Unchanged { latest_period: 0 });

    assert_eq!(season.archive().periods().unwrap(), vec![0]);
}

#[test]
fn test_elimination_at_next_index_keeps_ingestion_idempotent() {
    let season = Season::new();
    // p1 is out from period 1, the index a second ingestion would target
    let roster = "\
id,name,faction,power,elimination_period
p1,Ana,Red,10,1
p2,Bo,Blue,8,
";

    assert_eq!(season.ingest(roster), AppendOutcome::Archived { period: 0 });
    assert_eq!(season.ingest(roster), AppendOutcome::Unchanged { latest_period: 0 });
    assert_eq!(season.ingest(roster), AppendOutcome::Unchanged { latest_period: 0 });
    assert_eq!(season.archive().periods().unwrap(), vec![0]);

    let latest = season.archive().latest().unwrap().unwrap();
    assert!(!latest.get("p1").unwrap().is_eliminated);
}

#[test]
fn test_roster_without_usable_header_is_not_archived() {
    let season = Season::new();
    season.ingest(WEEK_0);

    let roster = season.write("roster.csv", "colour,size\nred,4\n");
    let err = pipeline::ingest(&season.config, &roster, None).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<LedgerError>(),
        Some(LedgerError::MalformedInput { .. })
    ));
    assert_eq!(season.archive().periods().unwrap(), vec![0]);
    assert_eq!(season.archive().latest().unwrap().unwrap().count(), 3);
}

#[test]
fn test_archive_stays_contiguous() {
    let season = Season::new();

    for week in [WEEK_0, WEEK_1, WEEK_1, WEEK_2, WEEK_3, WEEK_3] {
        season.ingest(week);
    }

    let archive = season.archive();
    assert_eq!(archive.periods().unwrap(), vec![0, 1, 2, 3]);
    assert!(archive.gaps().unwrap().is_empty());
}

#[test]
fn test_freeze_invariant_end_to_end() {
    let season = Season::new();
    for week in [WEEK_0, WEEK_1, WEEK_2, WEEK_3] {
        season.ingest(week);
    }

    let history = season.archive().read_all().unwrap();
    let power_at = |period: usize| history[period].get("p1").unwrap().power;

    assert_eq!(power_at(1), 12.0);
    assert_eq!(power_at(2), 12.0);
    assert_eq!(power_at(3), power_at(2));

    let latest = history[3].get("p1").unwrap();
    assert!(latest.is_eliminated);
    assert_eq!(latest.observed_power, 50.0);
    assert!(!history[1].get("p1").unwrap().is_eliminated);
}

#[test]
fn test_episodes_regenerate_with_match_results() {
    let season = Season::new();
    for week in [WEEK_0, WEEK_1, WEEK_2] {
        season.ingest(week);
    }
    let log = season.write("matches.csv", MATCH_LOG);

    let written = pipeline::regenerate_episodes(&season.config, Some(&log)).unwrap();
    assert_eq!(written, 2);

    let dir = pipeline::episodes_dir(&season.config);
    let first = read_episode(&dir.join("episode_0001.json"));
    let second = read_episode(&dir.join("episode_0002.json"));

    assert_eq!(first.summary.compared_players, 3);
    assert_eq!(first.summary.top_risers[0].id, "p1");
    assert_eq!(first.match_result.as_ref().unwrap().winner, "A");

    let decided = second.match_result.as_ref().unwrap();
    assert_eq!(decided.match_id, "m2");
    assert_eq!(decided.winner, "B");
    assert_eq!(decided.margin, 2);

    // Regenerating again yields the same files
    let before = std::fs::read_to_string(dir.join("episode_0002.json")).unwrap();
    pipeline::regenerate_episodes(&season.config, Some(&log)).unwrap();
    let after = std::fs::read_to_string(dir.join("episode_0002.json")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_malformed_input_aborts_before_archive_write() {
    let season = Season::new();
    season.ingest(WEEK_0);
    let live_before = std::fs::read_to_string(pipeline::live_snapshot_path(&season.config)).unwrap();

    let roster = season.write("roster.csv", WEEK_1);
    let missing_log = season.dir.path().join("missing.csv");
    let err = pipeline::ingest(&season.config, &roster, Some(&missing_log)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LedgerError>(),
        Some(LedgerError::MalformedInput { .. })
    ));

    let empty = season.write("empty.csv", "\n\n");
    let err = pipeline::ingest(&season.config, &empty, None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LedgerError>(),
        Some(LedgerError::MalformedInput { .. })
    ));

    assert_eq!(season.archive().periods().unwrap(), vec![0]);
    let live_after = std::fs::read_to_string(pipeline::live_snapshot_path(&season.config)).unwrap();
    assert_eq!(live_before, live_after);
}

#[test]
fn test_missing_period_lists_every_gap() {
    let season = Season::new();
    for week in [WEEK_0, WEEK_1, WEEK_2, WEEK_3] {
        season.ingest(week);
    }
    let archive = season.archive();
    std::fs::remove_file(archive.path_for(1)).unwrap();
    std::fs::remove_file(archive.path_for(2)).unwrap();

    let err = pipeline::regenerate_episodes(&season.config, None).unwrap_err();

    match err.downcast_ref::<LedgerError>() {
        Some(LedgerError::MissingPeriod { missing }) => assert_eq!(missing, &vec![1, 2]),
        other => panic!("expected MissingPeriod, got {:?}", other),
    }
}

#[test]
fn test_run_on_sqlite_backend_writes_report() {
    let mut season = Season::new();
    season.config.backend = Backend::Sqlite;

    let log = season.write("matches.csv", MATCH_LOG);
    let mut last = None;
    for week in [WEEK_0, WEEK_1, WEEK_2] {
        let roster = season.write("roster.csv", week);
        last = Some(pipeline::run(&season.config, &roster, Some(&log)).unwrap());
    }
    let summary = last.unwrap();

    assert_eq!(summary.ingest.outcome, AppendOutcome::Archived { period: 2 });
    assert_eq!(summary.episodes_written, 2);
    assert!(summary.report_written);

    let text = std::fs::read_to_string(pipeline::report_path(&season.config)).unwrap();
    let report: SeasonReport = serde_json::from_str(&text).unwrap();

    assert_eq!(report.analytics.period, 2);
    assert_eq!(report.analytics.periods_elapsed, 3);
    assert_eq!(report.analytics.chaos_series.len(), 2);
    assert!(report.analytics.chaos_level.is_some());

    // p1 is eliminated at period 2: shown on the roster, not on the leaderboard
    assert_eq!(report.standings.leaderboard.len(), 2);
    assert!(report.standings.leaderboard.iter().all(|e| e.id != "p1"));
    let red = report.standings.factions.iter().find(|f| f.faction == "Red").unwrap();
    assert_eq!(red.active, 0);
    assert_eq!(red.eliminated, 1);
}
