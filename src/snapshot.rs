// 📸 Snapshot - Immutable, period-indexed ranking
//
// Period indices are contiguous from 0. A snapshot is archived only when its
// content signature differs from the latest archived one.

use crate::error::{LedgerError, LedgerResult};
use crate::participant::Participant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Period index (0, 1, 2, ...)
    pub period: u32,

    /// Unique id for this build, not part of the signature
    pub snapshot_id: String,

    pub built_at: DateTime<Utc>,

    /// Where the roster came from
    pub source: String,

    /// SHA-256 of the canonical content string
    pub signature: String,

    /// Ordered by power, descending
    pub participants: Vec<Participant>,

    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Snapshot {
    /// Create a snapshot; participants must already be in ranking order
    pub fn new(period: u32, source: &str, participants: Vec<Participant>) -> Self {
        let signature = content_signature(&participants);
        Snapshot {
            period,
            snapshot_id: uuid::Uuid::new_v4().to_string(),
            built_at: Utc::now(),
            source: source.to_string(),
            signature,
            participants,
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn count(&self) -> usize {
        self.participants.len()
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Signature recomputed from content (ignores the stored field)
    pub fn recompute_signature(&self) -> String {
        content_signature(&self.participants)
    }
}

// ============================================================================
// CONTENT SIGNATURE
// ============================================================================

fn round4(value: f64) -> f64 {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    // -0.0 and 0.0 must sign identically
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Canonical, order-independent content string
///
/// One line per participant, sorted by id:
/// `id|power (4 dp)|elimination period or -|eliminated 0/1`
pub fn signature_material(participants: &[Participant]) -> String {
    let mut lines: Vec<String> = participants
        .iter()
        .map(|p| {
            format!(
                "{}|{:.4}|{}|{}",
                p.id,
                round4(p.power),
                p.elimination_period
                    .map_or_else(|| "-".to_string(), |e| e.to_string()),
                if p.is_eliminated { 1 } else { 0 }
            )
        })
        .collect();
    lines.sort();
    lines.join("\n")
}

pub fn content_signature(participants: &[Participant]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature_material(participants).as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// CONTIGUITY
// ============================================================================

/// Periods missing from `0..=max(periods)`
pub fn missing_periods(periods: &[u32]) -> Vec<u32> {
    let Some(&max) = periods.iter().max() else {
        return Vec::new();
    };
    (0..=max).filter(|p| !periods.contains(p)).collect()
}

/// Fails with every missing index when `history` is not exactly 0..N in order
pub fn ensure_contiguous(history: &[Snapshot]) -> LedgerResult<()> {
    let periods: Vec<u32> = history.iter().map(|s| s.period).collect();
    let missing = missing_periods(&periods);
    if !missing.is_empty() {
        tracing::warn!(?missing, "snapshot history has gaps");
        return Err(LedgerError::MissingPeriod { missing });
    }

    let ordered = periods.iter().enumerate().all(|(i, p)| *p as usize == i);
    if !ordered {
        return Err(LedgerError::MalformedInput {
            table: "snapshot history".to_string(),
            reason: "snapshots out of order or duplicated".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::Trend;

    fn entry(id: &str, power: f64, elimination_period: Option<u32>, is_eliminated: bool) -> Participant {
        Participant {
            id: id.to_string(),
            name: id.to_uppercase(),
            faction: "Red".to_string(),
            power,
            observed_power: power,
            trend: Trend::New,
            rank: 0,
            win_rate: None,
            elimination_period,
            is_eliminated,
        }
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = vec![entry("p1", 10.0, None, false), entry("p2", 8.0, Some(3), false)];
        let b = vec![entry("p2", 8.0, Some(3), false), entry("p1", 10.0, None, false)];

        assert_eq!(content_signature(&a), content_signature(&b));
        assert_eq!(content_signature(&a).len(), 64);
    }

    #[test]
    fn test_signature_rounds_to_four_decimals() {
        let a = vec![entry("p1", 10.00001, None, false)];
        let b = vec![entry("p1", 10.00004, None, false)];
        let c = vec![entry("p1", 10.0001, None, false)];

        assert_eq!(content_signature(&a), content_signature(&b));
        assert_ne!(content_signature(&a), content_signature(&c));
    }

    #[test]
    fn test_signature_ignores_display_fields() {
        let a = vec![entry("p1", 10.0, None, false)];
        let mut b = a.clone();
        b[0].name = "Renamed".to_string();
        b[0].trend = Trend::Up;
        b[0].observed_power = 99.0;

        assert_eq!(content_signature(&a), content_signature(&b));
    }

    #[test]
    fn test_signature_tracks_elimination() {
        let a = vec![entry("p1", 10.0, Some(4), false)];
        let b = vec![entry("p1", 10.0, Some(4), true)];
        let c = vec![entry("p1", 10.0, Some(5), false)];

        assert_ne!(content_signature(&a), content_signature(&b));
        assert_ne!(content_signature(&a), content_signature(&c));
    }

    #[test]
    fn test_signature_material_format() {
        let material = signature_material(&[
            entry("b", 1.23456, Some(2), true),
            entry("a", -0.00001, None, false),
        ]);

        assert_eq!(material, "a|0.0000|-|0\nb|1.2346|2|1");
    }

    #[test]
    fn test_missing_periods_lists_all_gaps() {
        assert_eq!(missing_periods(&[0, 1, 4, 6]), vec![2, 3, 5]);
        assert_eq!(missing_periods(&[3]), vec![0, 1, 2]);
        assert!(missing_periods(&[]).is_empty());
    }

    #[test]
    fn test_ensure_contiguous() {
        let ok: Vec<Snapshot> = (0..3).map(|p| Snapshot::new(p, "t", vec![])).collect();
        assert!(ensure_contiguous(&ok).is_ok());

        let gap: Vec<Snapshot> = [0, 2, 5].iter().map(|p| Snapshot::new(*p, "t", vec![])).collect();
        match ensure_contiguous(&gap) {
            Err(LedgerError::MissingPeriod { missing }) => assert_eq!(missing, vec![1, 3, 4]),
            other => panic!("expected MissingPeriod, got {:?}", other),
        }
    }
}
