use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::CallId;
use crate::model::call::NormalizedCall;

/// Aggregate view over normalized calls, derived on every inspection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub calls: Vec<NormalizedCall>,
    pub methods: BTreeMap<String, u64>,
    pub total_time: f64,
    pub error_count: u64,
}

impl Summary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&mut self, call: NormalizedCall) {
        *self.methods.entry(call.method().to_string()).or_insert(0) += 1;
        self.total_time += call.timing.total;
        self.error_count += u64::from(call.is_error);
        self.calls.push(call);
    }

    /// Disjoint union of two summaries. Calls of `other` follow calls of
    /// `self`; counts and totals are summed.
    pub fn combine(mut self, other: Summary) -> Summary {
        for (method, count) in other.methods {
            *self.methods.entry(method).or_insert(0) += count;
        }
        self.total_time += other.total_time;
        self.error_count += other.error_count;
        self.calls.extend(other.calls);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    pub fn find(&self, id: &CallId) -> Option<&NormalizedCall> {
        self.calls.iter().find(|c| c.id == *id)
    }
}

/// Folds calls into a summary in a single pass, keeping observation order.
pub fn aggregate<I>(calls: I) -> Summary
where
    I: IntoIterator<Item = NormalizedCall>,
{
    let mut summary = Summary::empty();
    for call in calls {
        summary.push(call);
    }
    summary
}
