// 🏗️ Table Ingestion
// Delimited text → typed records, resolved once against synonym tables
//
// Two known tables:
// - Roster: one row per participant with power + elimination columns
// - Match log: one row per head-to-head sub-contest with win indicators
//
// Anything else lands in Record::Other with its normalized columns.

use crate::error::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// CORE TYPES
// ============================================================================

/// TableKind - Which known export a table matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    Roster,
    MatchLog,
    Unknown,
}

impl TableKind {
    pub fn name(&self) -> &str {
        match self {
            TableKind::Roster => "roster",
            TableKind::MatchLog => "match log",
            TableKind::Unknown => "unknown table",
        }
    }
}

/// Table - header-normalized rows, still as strings
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub delimiter: u8,
    pub rows: Vec<BTreeMap<String, String>>,
}

/// RosterRow - one competitor line from a roster export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterRow {
    pub id: String,
    pub name: String,
    pub faction: String,
    pub adjusted_power: Option<f64>,
    pub raw_power: Option<f64>,
    pub elimination_period: Option<u32>,
    pub win_rate: Option<f64>,
    pub line_number: usize,

    /// Columns no synonym table claimed
    pub extras: BTreeMap<String, String>,
}

impl RosterRow {
    /// Adjusted power over raw power over zero
    pub fn power(&self) -> f64 {
        self.adjusted_power.or(self.raw_power).unwrap_or(0.0)
    }
}

/// MatchRow - one sub-contest from the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRow {
    pub period: u32,
    pub match_id: String,
    pub side_a_won: bool,
    pub side_b_won: bool,
    pub line_number: usize,
    pub extras: BTreeMap<String, String>,
}

/// Record - tagged union of everything ingestion can produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Roster(RosterRow),
    Match(MatchRow),
    Other(BTreeMap<String, String>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
    pub unknown_columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Ingested {
    pub kind: TableKind,
    pub records: Vec<Record>,
    pub report: IngestReport,
}

impl Ingested {
    pub fn roster_rows(&self) -> Vec<RosterRow> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::Roster(row) => Some(row.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn match_rows(&self) -> Vec<MatchRow> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::Match(row) => Some(row.clone()),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// SYNONYM TABLES
// ============================================================================

const ID_KEYS: &[&str] = &["id", "player_id", "participant_id", "competitor_id", "pid"];
const NAME_KEYS: &[&str] = &["name", "player", "player_name", "participant", "competitor"];
const FACTION_KEYS: &[&str] = &["faction", "team", "tribe", "side", "group"];
const ADJUSTED_POWER_KEYS: &[&str] = &[
    "adjusted_power",
    "adj_power",
    "power_adjusted",
    "power_adj",
    "adjusted_score",
];
const RAW_POWER_KEYS: &[&str] = &["power", "raw_power", "power_score", "rating", "score"];
const ELIMINATION_KEYS: &[&str] = &[
    "elimination_period",
    "eliminated_period",
    "elimination_episode",
    "eliminated_episode",
    "eliminated_in",
    "out_episode",
];
const WIN_RATE_KEYS: &[&str] = &["win_pct", "win_rate", "win_ratio", "challenge_win_pct"];

const PERIOD_KEYS: &[&str] = &["period", "episode", "ep", "episode_id", "week", "round"];
const MATCH_ID_KEYS: &[&str] = &["match_id", "match", "game_id", "challenge_id", "contest_id"];
const SIDE_A_KEYS: &[&str] = &["side_a_won", "a_won", "a_win", "team_a_win", "faction_a_won"];
const SIDE_B_KEYS: &[&str] = &["side_b_won", "b_won", "b_win", "team_b_win", "faction_b_won"];

fn lookup<'a>(row: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

fn is_claimed(key: &str, groups: &[&[&str]]) -> bool {
    groups.iter().any(|g| g.contains(&key))
}

// ============================================================================
// KEY NORMALIZATION + COERCION
// ============================================================================

/// Lower-case, `%` → `pct`, every other non-alphanumeric run → `_`, trimmed
///
/// "Win %" → "win_pct", "Player ID" → "player_id"
pub fn normalize_key(raw: &str) -> String {
    let mut expanded = String::with_capacity(raw.len() + 4);
    for c in raw.chars() {
        if c == '%' {
            expanded.push_str("_pct_");
        } else if c.is_alphanumeric() {
            expanded.extend(c.to_lowercase());
        } else {
            expanded.push('_');
        }
    }

    let mut out = String::with_capacity(expanded.len());
    for c in expanded.chars() {
        if c == '_' && (out.is_empty() || out.ends_with('_')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Permissive numeric coercion
///
/// Strips currency/percent symbols and thousands separators. A trailing `%`
/// divides by 100; otherwise a ratio column with magnitude above 1 is also
/// divided by 100.
pub fn coerce_number(raw: &str, ratio: bool) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let has_percent = trimmed.ends_with('%');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '%' | ',' | '+' | '_') && !c.is_whitespace())
        .collect();

    let value = cleaned.parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }

    if has_percent {
        Some(value / 100.0)
    } else if ratio && value.abs() > 1.0 {
        Some(value / 100.0)
    } else {
        Some(value)
    }
}

/// Period-like values: "5", "5.0", "Ep 5", "E05"
pub fn coerce_period(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if let Some(n) = coerce_number(trimmed, false) {
        return if n >= 0.0 && n.fract() == 0.0 {
            Some(n as u32)
        } else {
            None
        };
    }

    let digits: String = trimmed
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Win indicators: positive numbers and yes/true/x/w count as a win
pub fn coerce_flag(raw: &str) -> bool {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "true" | "yes" | "y" | "x" | "w" | "win" | "won" => true,
        _ => coerce_number(&lower, false).map_or(false, |n| n > 0.0),
    }
}

// ============================================================================
// DELIMITED TEXT
// ============================================================================

/// Pick the delimiter with the most occurrences in the header line
///
/// Candidates: tab, comma, semicolon. Ties prefer comma, then tab.
pub fn detect_delimiter(header_line: &str) -> u8 {
    let candidates = [b',', b'\t', b';'];
    let mut best = b',';
    let mut best_count = 0usize;

    for candidate in candidates {
        let count = header_line.bytes().filter(|b| *b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }

    best
}

/// Parse delimited text with quoted fields (doubled-quote escaping)
pub fn read_table(text: &str, table: &str) -> LedgerResult<Table> {
    let text = text.trim_start_matches('\u{feff}');
    let header_line = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| LedgerError::malformed(table, "no header row"))?;

    let delimiter = detect_delimiter(header_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(normalize_key)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(LedgerError::malformed(table, "header row has no usable columns"));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        let mut row = BTreeMap::new();
        for (key, value) in headers.iter().zip(record.iter()) {
            if key.is_empty() {
                continue;
            }
            // First column wins when two headers normalize to the same key
            row.entry(key.clone()).or_insert_with(|| value.to_string());
        }
        rows.push(row);
    }

    Ok(Table {
        headers,
        delimiter,
        rows,
    })
}

// ============================================================================
// TABLE PARSERS
// ============================================================================

/// TableParser - maps a normalized table onto typed records
pub trait TableParser: Send + Sync {
    fn kind(&self) -> TableKind;

    /// Rows that fail validation are dropped and counted, never an error
    fn parse_table(&self, table: &Table) -> Ingested;

    /// Parse raw text (header required)
    fn parse_text(&self, text: &str) -> LedgerResult<Ingested> {
        let table = read_table(text, self.kind().name())?;
        require_headers(self.kind(), &table.headers)?;
        Ok(self.parse_table(&table))
    }
}

/// A required table must carry the columns its rows are keyed on
///
/// Roster: id, name and faction. Match log: period, match id and a win
/// indicator. Anything less has no parseable header.
pub fn require_headers(kind: TableKind, headers: &[String]) -> LedgerResult<()> {
    let has = |keys: &[&str]| headers.iter().any(|h| keys.contains(&h.as_str()));

    let missing: Vec<&str> = match kind {
        TableKind::Roster => [("id", ID_KEYS), ("name", NAME_KEYS), ("faction", FACTION_KEYS)]
            .into_iter()
            .filter(|(_, keys)| !has(keys))
            .map(|(label, _)| label)
            .collect(),
        TableKind::MatchLog => {
            let mut missing: Vec<&str> = [("period", PERIOD_KEYS), ("match id", MATCH_ID_KEYS)]
                .into_iter()
                .filter(|(_, keys)| !has(keys))
                .map(|(label, _)| label)
                .collect();
            if !has(SIDE_A_KEYS) && !has(SIDE_B_KEYS) {
                missing.push("win indicator");
            }
            missing
        }
        TableKind::Unknown => Vec::new(),
    };

    if missing.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::malformed(
            kind.name(),
            format!("header has no {} column", missing.join(", ")),
        ))
    }
}

/// Guess the table kind from its normalized headers
pub fn detect_kind(headers: &[String]) -> TableKind {
    let has = |keys: &[&str]| headers.iter().any(|h| keys.contains(&h.as_str()));

    if has(PERIOD_KEYS) && has(MATCH_ID_KEYS) && (has(SIDE_A_KEYS) || has(SIDE_B_KEYS)) {
        TableKind::MatchLog
    } else if has(ID_KEYS) || has(NAME_KEYS) {
        TableKind::Roster
    } else {
        TableKind::Unknown
    }
}

pub fn get_parser(kind: TableKind) -> Box<dyn TableParser> {
    match kind {
        TableKind::Roster => Box::new(RosterParser),
        TableKind::MatchLog => Box::new(MatchLogParser),
        TableKind::Unknown => Box::new(PassthroughParser),
    }
}

fn unknown_columns(headers: &[String], claimed: &[&[&str]]) -> Vec<String> {
    headers
        .iter()
        .filter(|h| !h.is_empty() && !is_claimed(h, claimed))
        .cloned()
        .collect()
}

fn extras(row: &BTreeMap<String, String>, claimed: &[&[&str]]) -> BTreeMap<String, String> {
    row.iter()
        .filter(|(k, _)| !is_claimed(k, claimed))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub struct RosterParser;

const ROSTER_CLAIMED: &[&[&str]] = &[
    ID_KEYS,
    NAME_KEYS,
    FACTION_KEYS,
    ADJUSTED_POWER_KEYS,
    RAW_POWER_KEYS,
    ELIMINATION_KEYS,
    WIN_RATE_KEYS,
];

impl RosterParser {
    fn parse_row(&self, row: &BTreeMap<String, String>, line_number: usize) -> Option<RosterRow> {
        let id = lookup(row, ID_KEYS)?;
        let name = lookup(row, NAME_KEYS)?;
        let faction = lookup(row, FACTION_KEYS)?;

        Some(RosterRow {
            id: id.to_string(),
            name: name.to_string(),
            faction: faction.to_string(),
            adjusted_power: lookup(row, ADJUSTED_POWER_KEYS).and_then(|v| coerce_number(v, false)),
            raw_power: lookup(row, RAW_POWER_KEYS).and_then(|v| coerce_number(v, false)),
            elimination_period: lookup(row, ELIMINATION_KEYS).and_then(coerce_period),
            // Ratio column: 0-100 exports are scaled down
            win_rate: lookup(row, WIN_RATE_KEYS).and_then(|v| coerce_number(v, true)),
            line_number,
            extras: extras(row, ROSTER_CLAIMED),
        })
    }
}

impl TableParser for RosterParser {
    fn kind(&self) -> TableKind {
        TableKind::Roster
    }

    fn parse_table(&self, table: &Table) -> Ingested {
        let mut records = Vec::new();
        let mut report = IngestReport {
            rows_read: table.rows.len(),
            unknown_columns: unknown_columns(&table.headers, ROSTER_CLAIMED),
            ..IngestReport::default()
        };

        for (i, row) in table.rows.iter().enumerate() {
            // +2: 1-indexed plus header row
            match self.parse_row(row, i + 2) {
                Some(parsed) => records.push(Record::Roster(parsed)),
                None => report.rows_dropped += 1,
            }
        }
        report.rows_kept = records.len();

        if report.rows_dropped > 0 {
            tracing::debug!(dropped = report.rows_dropped, "roster rows without id/name/faction skipped");
        }

        Ingested {
            kind: TableKind::Roster,
            records,
            report,
        }
    }
}

pub struct MatchLogParser;

const MATCH_CLAIMED: &[&[&str]] = &[PERIOD_KEYS, MATCH_ID_KEYS, SIDE_A_KEYS, SIDE_B_KEYS];

impl MatchLogParser {
    fn parse_row(&self, row: &BTreeMap<String, String>, line_number: usize) -> Option<MatchRow> {
        let period = lookup(row, PERIOD_KEYS).and_then(coerce_period)?;
        let match_id = lookup(row, MATCH_ID_KEYS)?;

        Some(MatchRow {
            period,
            match_id: match_id.to_string(),
            side_a_won: lookup(row, SIDE_A_KEYS).map_or(false, coerce_flag),
            side_b_won: lookup(row, SIDE_B_KEYS).map_or(false, coerce_flag),
            line_number,
            extras: extras(row, MATCH_CLAIMED),
        })
    }
}

impl TableParser for MatchLogParser {
    fn kind(&self) -> TableKind {
        TableKind::MatchLog
    }

    fn parse_table(&self, table: &Table) -> Ingested {
        let mut records = Vec::new();
        let mut report = IngestReport {
            rows_read: table.rows.len(),
            unknown_columns: unknown_columns(&table.headers, MATCH_CLAIMED),
            ..IngestReport::default()
        };

        for (i, row) in table.rows.iter().enumerate() {
            match self.parse_row(row, i + 2) {
                Some(parsed) => records.push(Record::Match(parsed)),
                None => report.rows_dropped += 1,
            }
        }
        report.rows_kept = records.len();

        if report.rows_dropped > 0 {
            tracing::debug!(dropped = report.rows_dropped, "match rows without period/match id skipped");
        }

        Ingested {
            kind: TableKind::MatchLog,
            records,
            report,
        }
    }
}

/// Keeps rows of unrecognized tables as plain key/value maps
pub struct PassthroughParser;

impl TableParser for PassthroughParser {
    fn kind(&self) -> TableKind {
        TableKind::Unknown
    }

    fn parse_table(&self, table: &Table) -> Ingested {
        let records: Vec<Record> = table.rows.iter().cloned().map(Record::Other).collect();
        Ingested {
            kind: TableKind::Unknown,
            report: IngestReport {
                rows_read: records.len(),
                rows_kept: records.len(),
                rows_dropped: 0,
                unknown_columns: table.headers.clone(),
            },
            records,
        }
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Parse text as a specific table kind
pub fn ingest_text(text: &str, kind: TableKind) -> LedgerResult<Ingested> {
    get_parser(kind).parse_text(text)
}

/// Parse text, detecting the table kind from its headers
pub fn ingest_auto(text: &str) -> LedgerResult<Ingested> {
    let table = read_table(text, "table")?;
    let kind = detect_kind(&table.headers);
    Ok(get_parser(kind).parse_table(&table))
}

/// Read and parse a required table; a missing file is malformed input
pub fn ingest_file(path: &Path, kind: TableKind) -> LedgerResult<Ingested> {
    if !path.exists() {
        return Err(LedgerError::malformed(
            kind.name(),
            format!("file not found: {}", path.display()),
        ));
    }
    let text = std::fs::read_to_string(path)?;
    let table = read_table(&text, kind.name())?;
    require_headers(kind, &table.headers)?;

    let ingested = get_parser(kind).parse_table(&table);
    tracing::info!(
        table = kind.name(),
        path = %path.display(),
        kept = ingested.report.rows_kept,
        dropped = ingested.report.rows_dropped,
        "table ingested"
    );
    Ok(ingested)
}

// ============================================================================
// TESTS
// ============================================================================
