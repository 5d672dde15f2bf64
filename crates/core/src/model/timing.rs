use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Cumulative elapsed-time markers reported by a transfer, in seconds since
/// the request started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    NameLookup,
    Connect,
    PreTransfer,
    StartTransfer,
    Total,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 5] = [
        Checkpoint::NameLookup,
        Checkpoint::Connect,
        Checkpoint::PreTransfer,
        Checkpoint::StartTransfer,
        Checkpoint::Total,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::NameLookup => "namelookup_time",
            Self::Connect => "connect_time",
            Self::PreTransfer => "pretransfer_time",
            Self::StartTransfer => "starttransfer_time",
            Self::Total => "total_time",
        }
    }
}

/// Raw checkpoint mapping as handed over by the transport. Keys this crate
/// does not know are kept but never read; non-numeric values are dropped on
/// deserialization.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Checkpoints(BTreeMap<String, f64>);

impl<'de> Deserialize<'de> for Checkpoints {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .filter_map(|(k, v)| v.as_f64().map(|v| (k, v)))
            .collect())
    }
}

impl Checkpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, checkpoint: Checkpoint, seconds: f64) {
        self.0.insert(checkpoint.key().to_string(), seconds);
    }

    pub fn insert(&mut self, key: impl Into<String>, seconds: f64) {
        self.0.insert(key.into(), seconds);
    }

    /// A checkpoint counts as present only when it holds a finite value.
    pub fn get(&self, checkpoint: Checkpoint) -> Option<f64> {
        self.0
            .get(checkpoint.key())
            .copied()
            .filter(|v| v.is_finite())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Checkpoints {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Resolving,
    Connecting,
    Negotiating,
    Waiting,
    Processing,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 5] = [
        PhaseKind::Resolving,
        PhaseKind::Connecting,
        PhaseKind::Negotiating,
        PhaseKind::Waiting,
        PhaseKind::Processing,
    ];

    /// Start and end checkpoints; `None` as start means the literal 0.
    pub const fn bounds(self) -> (Option<Checkpoint>, Checkpoint) {
        match self {
            Self::Resolving => (None, Checkpoint::NameLookup),
            Self::Connecting => (Some(Checkpoint::NameLookup), Checkpoint::Connect),
            Self::Negotiating => (Some(Checkpoint::Connect), Checkpoint::PreTransfer),
            Self::Waiting => (Some(Checkpoint::PreTransfer), Checkpoint::StartTransfer),
            Self::Processing => (Some(Checkpoint::StartTransfer), Checkpoint::Total),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Connecting => "connecting",
            Self::Negotiating => "negotiating",
            Self::Waiting => "waiting",
            Self::Processing => "processing",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Phase {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub percentage: f64,
    pub start_percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Timing {
    pub phases: BTreeMap<PhaseKind, Phase>,
    pub total: f64,
}

impl Timing {
    pub fn phase(&self, kind: PhaseKind) -> Option<&Phase> {
        self.phases.get(&kind)
    }

    /// Phases in transfer order.
    pub fn iter(&self) -> impl Iterator<Item = (PhaseKind, &Phase)> {
        self.phases.iter().map(|(k, p)| (*k, p))
    }

    pub fn phase_duration_sum(&self) -> f64 {
        self.phases.values().map(|p| p.duration).sum()
    }
}

pub fn compute_phases(raw: &Checkpoints) -> Timing {
    let total = raw.get(Checkpoint::Total).unwrap_or(0.0);

    let mut phases = BTreeMap::new();
    for kind in PhaseKind::ALL {
        let (start_cp, end_cp) = kind.bounds();
        let start = match start_cp {
            Some(cp) => raw.get(cp),
            None => Some(0.0),
        };
        let (Some(start), Some(end)) = (start, raw.get(end_cp)) else {
            continue;
        };

        let duration = end - start;
        let (percentage, start_percentage) = if total != 0.0 {
            (duration / total * 100.0, start / total * 100.0)
        } else {
            (0.0, 0.0)
        };
        phases.insert(
            kind,
            Phase {
                start,
                end,
                duration,
                percentage,
                start_percentage,
            },
        );
    }

    Timing { phases, total }
}
