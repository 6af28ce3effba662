// 📈 Season Analytics
// Pure functions over the archived snapshot history
//
// - Momentum: OLS slope of power vs period (x = 1..n), None below min history
// - Reliability: sample standard deviation of the power series
// - Chaos: mean |Δpower| between consecutive periods, ranked within the season

use crate::config::AnalyticsConfig;
use crate::error::LedgerResult;
use crate::participant::Trend;
use crate::snapshot::{ensure_contiguous, Snapshot};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// SERIES
// ============================================================================

/// Power values for `id` across `history`, dropping post-elimination periods
pub fn power_series(id: &str, history: &[Snapshot]) -> Vec<f64> {
    history
        .iter()
        .filter_map(|s| {
            let p = s.get(id)?;
            match p.elimination_period {
                Some(k) if s.period > k => None,
                _ => Some(p.power),
            }
        })
        .collect()
}

/// OLS slope against x = 1..n; None when fewer than `min_points` values
pub fn momentum(series: &[f64], min_points: usize) -> Option<f64> {
    let n = series.len();
    if n < min_points || n < 2 {
        return None;
    }

    let n_f = n as f64;
    let mean_x = (n_f + 1.0) / 2.0;
    let mean_y = series.iter().sum::<f64>() / n_f;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in series.iter().enumerate() {
        let dx = (i + 1) as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }

    Some(sxy / sxx)
}

/// Sample standard deviation (n - 1); None below two values
pub fn sample_stdev(series: &[f64]) -> Option<f64> {
    let n = series.len();
    if n < 2 {
        return None;
    }
    let mean = series.iter().sum::<f64>() / n as f64;
    let var = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(var.sqrt())
}

// ============================================================================
// CHAOS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChaosLevel {
    Low,
    Med,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosPoint {
    /// Later period of the pair
    pub period: u32,
    pub value: f64,
    pub compared: usize,
}

/// Mean absolute power change over participants present in both snapshots
///
/// Eliminated participants still count. Their frozen power contributes a
/// zero delta, so the mean covers the whole roster, not only active players.
pub fn chaos(prev: &Snapshot, curr: &Snapshot) -> Option<(f64, usize)> {
    let prev_power: HashMap<&str, f64> = prev
        .participants
        .iter()
        .map(|p| (p.id.as_str(), p.power))
        .collect();

    let deltas: Vec<f64> = curr
        .participants
        .iter()
        .filter_map(|p| prev_power.get(p.id.as_str()).map(|before| (p.power - before).abs()))
        .collect();

    if deltas.is_empty() {
        return None;
    }
    Some((deltas.iter().sum::<f64>() / deltas.len() as f64, deltas.len()))
}

/// Chaos for every consecutive pair in the season
pub fn chaos_series(history: &[Snapshot]) -> Vec<ChaosPoint> {
    history
        .windows(2)
        .filter_map(|pair| {
            chaos(&pair[0], &pair[1]).map(|(value, compared)| ChaosPoint {
                period: pair[1].period,
                value,
                compared,
            })
        })
        .collect()
}

/// Percentile rank (0-100) of `values[index]` within `values`
///
/// Stable: equal values keep their season order, so a tie with an earlier
/// period ranks above it.
pub fn percentile_rank(values: &[f64], index: usize) -> f64 {
    if values.len() < 2 {
        return 50.0;
    }
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));

    let position = order.iter().position(|i| *i == index).unwrap_or(0);
    position as f64 / (values.len() - 1) as f64 * 100.0
}

pub fn classify_chaos(percentile: f64, low_pct: f64, high_pct: f64) -> ChaosLevel {
    if percentile < low_pct {
        ChaosLevel::Low
    } else if percentile < high_pct {
        ChaosLevel::Med
    } else {
        ChaosLevel::High
    }
}

// ============================================================================
// SEASON ANALYTICS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantAnalytics {
    pub id: String,
    pub name: String,
    pub faction: String,
    pub is_eliminated: bool,
    pub points: usize,

    /// None for eliminated participants and short histories
    pub momentum: Option<f64>,
    pub momentum_trend: Option<Trend>,
    pub stdev: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityEntry {
    pub id: String,
    pub name: String,
    pub stdev: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonAnalytics {
    pub period: u32,
    pub periods_elapsed: usize,
    pub participants: Vec<ParticipantAnalytics>,
    pub most_reliable: Option<ReliabilityEntry>,
    pub most_unreliable: Option<ReliabilityEntry>,
    pub chaos_series: Vec<ChaosPoint>,
    pub chaos_percentile: Option<f64>,
    pub chaos_level: Option<ChaosLevel>,
}

/// Analytics for the latest period of a contiguous history
///
/// Returns None for an empty archive.
pub fn analyze(history: &[Snapshot], config: &AnalyticsConfig) -> LedgerResult<Option<SeasonAnalytics>> {
    ensure_contiguous(history)?;
    let Some(latest) = history.last() else {
        return Ok(None);
    };

    let periods_elapsed = history.len();
    let reliability_min = config.min_history.min(periods_elapsed).max(2);

    // Each participant's series is independent and read-only over history
    let participants: Vec<ParticipantAnalytics> = latest
        .participants
        .par_iter()
        .map(|p| {
            let series = power_series(&p.id, history);
            let eliminated = p.is_eliminated;

            let slope = if eliminated {
                None
            } else {
                momentum(&series, config.min_history)
            };
            let stdev = if series.len() >= reliability_min {
                sample_stdev(&series)
            } else {
                None
            };

            ParticipantAnalytics {
                id: p.id.clone(),
                name: p.name.clone(),
                faction: p.faction_key().to_string(),
                is_eliminated: eliminated,
                points: series.len(),
                momentum: slope,
                momentum_trend: slope.map(|s| Trend::classify(s, config.slope_threshold)),
                stdev,
            }
        })
        .collect();

    let (most_reliable, most_unreliable) = reliability_extremes(&participants);

    let chaos_points = chaos_series(history);
    let values: Vec<f64> = chaos_points.iter().map(|c| c.value).collect();
    let chaos_percentile = if values.is_empty() {
        None
    } else {
        Some(percentile_rank(&values, values.len() - 1))
    };
    let chaos_level = chaos_percentile
        .map(|pct| classify_chaos(pct, config.chaos_low_pct, config.chaos_high_pct));

    Ok(Some(SeasonAnalytics {
        period: latest.period,
        periods_elapsed,
        participants,
        most_reliable,
        most_unreliable,
        chaos_series: chaos_points,
        chaos_percentile,
        chaos_level,
    }))
}

/// Min/max stdev among active participants; first in ranking order wins ties
fn reliability_extremes(
    participants: &[ParticipantAnalytics],
) -> (Option<ReliabilityEntry>, Option<ReliabilityEntry>) {
    let mut min: Option<&ParticipantAnalytics> = None;
    let mut max: Option<&ParticipantAnalytics> = None;

    for p in participants.iter().filter(|p| !p.is_eliminated) {
        let Some(stdev) = p.stdev else { continue };
        if min.map_or(true, |m| stdev < m.stdev.unwrap_or(f64::INFINITY)) {
            min = Some(p);
        }
        if max.map_or(true, |m| stdev > m.stdev.unwrap_or(f64::NEG_INFINITY)) {
            max = Some(p);
        }
    }

    let entry = |p: &ParticipantAnalytics| ReliabilityEntry {
        id: p.id.clone(),
        name: p.name.clone(),
        stdev: p.stdev.unwrap_or_default(),
    };
    (min.map(entry), max.map(entry))
}

// ============================================================================
// TESTS
// ============================================================================
