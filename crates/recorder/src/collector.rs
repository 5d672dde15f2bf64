use callscope_capture::Normalizer;
use callscope_core::summary::{Summary, aggregate};

/// Produces a fresh summary on every call. Never fails.
pub trait Collect: Send + Sync {
    fn collect(&self) -> Summary;
}

/// Normalizes and aggregates whatever one recorder holds right now.
#[derive(Clone)]
pub struct RecorderCollector {
    recorder: crate::Recorder,
    normalizer: Normalizer,
}

impl RecorderCollector {
    pub fn new(recorder: crate::Recorder, normalizer: Normalizer) -> Self {
        Self {
            recorder,
            normalizer,
        }
    }

    pub fn recorder(&self) -> &crate::Recorder {
        &self.recorder
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }
}

impl Collect for RecorderCollector {
    fn collect(&self) -> Summary {
        // Normalize outside the recorder lock.
        let snapshot = self.recorder.list();
        aggregate(snapshot.iter().map(|tx| self.normalizer.normalize(tx)))
    }
}

/// Merges several collectors in registration order.
#[derive(Default)]
pub struct CompositeCollector {
    members: Vec<(String, Box<dyn Collect>)>,
}

impl CompositeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C>(&mut self, name: impl Into<String>, collector: C)
    where
        C: Collect + 'static,
    {
        self.members.push((name.into(), Box::new(collector)));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Collect for CompositeCollector {
    fn collect(&self) -> Summary {
        self.members
            .iter()
            .fold(Summary::empty(), |acc, (_, member)| acc.combine(member.collect()))
    }
}
