// Season Ledger - Core Library
// Snapshot archive, diffs, match resolution and season analytics
// Exposes all modules for use in the CLI and tests

pub mod error;
pub mod config;
pub mod logging;
pub mod parser;         // C1: delimited tables → typed records
pub mod participant;
pub mod lifecycle;      // C5: Active → Eliminated, stat freeze
pub mod snapshot;
pub mod builder;        // C2: rows → canonical ranking
pub mod store;          // Append-only archive (files)
pub mod db;             // Append-only archive (SQLite) + audit events
pub mod diff;           // C3: movers engine
pub mod matches;        // C4: event-log match resolver
pub mod analytics;      // C6: momentum, reliability, chaos
pub mod standings;
pub mod episode;
pub mod pipeline;

// Re-export commonly used types
pub use error::{LedgerError, LedgerResult};
pub use config::{AnalyticsConfig, Backend, LedgerConfig, MatchConfig, MoverLimits};
pub use parser::{
    detect_delimiter, detect_kind, get_parser, ingest_auto, ingest_file, ingest_text,
    IngestReport, Ingested, MatchRow, Record, RosterRow, TableKind, TableParser,
};
pub use participant::{Participant, Trend};
pub use lifecycle::{EliminationState, FrozenStats};
pub use snapshot::{content_signature, Snapshot};
pub use builder::SnapshotBuilder;
pub use store::{AppendOutcome, FileStore, SnapshotStore};
pub use db::{Event, SqliteStore};
pub use diff::{diff, diff_with, EpisodeSummary, FactionMovers, Mover};
pub use matches::{MatchResolver, MatchResult, DRAW};
pub use analytics::{analyze, momentum, ChaosLevel, SeasonAnalytics};
pub use standings::{standings, Standings};
pub use episode::{build_episodes, Episode};
pub use pipeline::{IngestSummary, RunSummary, SeasonReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
