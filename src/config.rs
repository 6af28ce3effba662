// ⚙️ Ledger Configuration
//
// Resolution order (highest priority first):
// 1. CLI flags (applied by the binary)
// 2. Environment variables (LEDGER_*)
// 3. season-ledger.toml
// 4. Compiled defaults

use crate::error::{LedgerError, LedgerResult};
use crate::matches::DRAW;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "season-ledger.toml";

// ============================================================================
// ARCHIVE BACKEND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One JSON file per period
    Files,

    /// Single SQLite database with an audit trail
    Sqlite,
}

impl Backend {
    pub fn parse(value: &str) -> Option<Backend> {
        match value.trim().to_lowercase().as_str() {
            "files" | "file" | "json" => Some(Backend::Files),
            "sqlite" | "db" => Some(Backend::Sqlite),
            _ => None,
        }
    }
}

// ============================================================================
// SUB-CONFIGS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverLimits {
    /// Risers/fallers kept in the global lists
    pub global_top_n: usize,

    /// Risers/fallers kept per faction
    pub faction_top_n: usize,
}

impl Default for MoverLimits {
    fn default() -> Self {
        MoverLimits {
            global_top_n: 10,
            faction_top_n: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Minimum series length for momentum and reliability
    pub min_history: usize,

    /// Slope dead band for up/down classification
    pub slope_threshold: f64,

    /// Chaos percentile rank below which the level is LOW
    pub chaos_low_pct: f64,

    /// Chaos percentile rank below which the level is MED
    pub chaos_high_pct: f64,

    /// Bottom-K active participants reported as the danger zone
    pub danger_zone_size: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            min_history: 5,
            slope_threshold: 0.05,
            chaos_low_pct: 33.0,
            chaos_high_pct: 66.0,
            danger_zone_size: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Faction credited by the first win indicator column
    pub side_a: String,

    /// Faction credited by the second win indicator column
    pub side_b: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            side_a: "A".to_string(),
            side_b: "B".to_string(),
        }
    }
}

// ============================================================================
// LEDGER CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub archive_dir: PathBuf,
    pub output_dir: PathBuf,
    pub backend: Backend,

    /// Recorded on every snapshot as its source identifier
    pub source_id: String,

    pub movers: MoverLimits,
    pub analytics: AnalyticsConfig,
    pub matches: MatchConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            archive_dir: PathBuf::from("archive"),
            output_dir: PathBuf::from("output"),
            backend: Backend::Files,
            source_id: "roster".to_string(),
            movers: MoverLimits::default(),
            analytics: AnalyticsConfig::default(),
            matches: MatchConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Load `season-ledger.toml` from `root` (if present), then apply env overrides
    pub fn load(root: &Path) -> LedgerResult<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            Self::from_toml(&text)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> LedgerResult<Self> {
        toml::from_str(text).map_err(|e| LedgerError::Config(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("LEDGER_ARCHIVE_DIR") {
            self.archive_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("LEDGER_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Ok(value) = std::env::var("LEDGER_BACKEND") {
            match Backend::parse(&value) {
                Some(backend) => self.backend = backend,
                None => tracing::warn!(value = %value, "ignoring unknown LEDGER_BACKEND"),
            }
        }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.movers.global_top_n == 0 || self.movers.faction_top_n == 0 {
            return Err(LedgerError::Config(
                "movers top-N limits must be at least 1".to_string(),
            ));
        }
        if self.analytics.slope_threshold < 0.0 {
            return Err(LedgerError::Config(
                "analytics.slope_threshold must be non-negative".to_string(),
            ));
        }
        let (low, high) = (self.analytics.chaos_low_pct, self.analytics.chaos_high_pct);
        if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&high) || low >= high {
            return Err(LedgerError::Config(
                "chaos percentiles must satisfy 0 <= low < high <= 100".to_string(),
            ));
        }
        if self.matches.side_a == DRAW || self.matches.side_b == DRAW {
            return Err(LedgerError::Config(format!(
                "matches side labels may not be \"{}\"",
                DRAW
            )));
        }
        if self.matches.side_a == self.matches.side_b {
            return Err(LedgerError::Config(
                "matches.side_a and matches.side_b must differ".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LedgerConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.movers.global_top_n, 10);
        assert_eq!(config.movers.faction_top_n, 5);
        assert_eq!(config.analytics.min_history, 5);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LedgerConfig::from_toml(
            r#"
            backend = "sqlite"

            [matches]
            side_a = "Heroes"
            side_b = "Villains"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.matches.side_a, "Heroes");
        assert_eq!(config.movers.global_top_n, 10);
        assert_eq!(config.analytics.slope_threshold, 0.05);
    }

    #[test]
    fn test_inverted_chaos_percentiles_rejected() {
        let mut config = LedgerConfig::default();
        config.analytics.chaos_low_pct = 70.0;

        assert!(matches!(config.validate(), Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_draw_side_label_rejected() {
        let mut config = LedgerConfig::default();
        config.matches.side_b = "Draw".to_string();

        assert!(matches!(config.validate(), Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!(Backend::parse("JSON"), Some(Backend::Files));
        assert_eq!(Backend::parse("sqlite"), Some(Backend::Sqlite));
        assert_eq!(Backend::parse("redis"), None);
    }
}
