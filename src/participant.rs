// 👤 Participant - Stable identity + per-period values
//
// "id is IDENTITY (never changes), power/trend are VALUES (change per period)"

use crate::lifecycle::{self, EliminationState};
use serde::{Deserialize, Serialize};

// ============================================================================
// TREND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,

    /// No earlier value to compare against
    New,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
            Trend::New => "new",
        }
    }

    /// Dead-band classification shared by slopes and single-period deltas
    pub fn classify(value: f64, threshold: f64) -> Trend {
        if value > threshold {
            Trend::Up
        } else if value < -threshold {
            Trend::Down
        } else {
            Trend::Flat
        }
    }
}

// ============================================================================
// PARTICIPANT
// ============================================================================

/// One participant's state inside a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    pub id: String,
    pub name: String,

    /// Open key: not restricted to a fixed set of factions
    pub faction: String,

    // ========================================================================
    // PER-PERIOD VALUES
    // ========================================================================
    /// Ranking scalar (frozen once eliminated)
    pub power: f64,

    /// What this period's source row said, kept even when `power` is frozen
    pub observed_power: f64,

    pub trend: Trend,

    /// 1-based position in the snapshot ordering
    pub rank: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_rate: Option<f64>,

    // ========================================================================
    // LIFECYCLE
    // ========================================================================
    pub elimination_period: Option<u32>,

    /// Derived from `elimination_period` and the snapshot period at build time
    pub is_eliminated: bool,
}

impl Participant {
    pub fn state_at(&self, period: u32) -> EliminationState {
        lifecycle::state_at(self.elimination_period, period)
    }

    pub fn is_active_at(&self, period: u32) -> bool {
        self.state_at(period).is_active()
    }

    /// Faction used for grouping; blank factions collapse to "Unknown"
    pub fn faction_key(&self) -> &str {
        let trimmed = self.faction.trim();
        if trimmed.is_empty() {
            "Unknown"
        } else {
            trimmed
        }
    }
}
