//! Run metrics collected from the event stream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use settlement_core::prelude::*;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Jobs created by the matcher or construction ticker.
    pub jobs_created: u32,
    /// Jobs that reached their terminal state.
    pub jobs_completed: u32,
    /// Aborted jobs by reason.
    pub jobs_aborted: BTreeMap<String, u32>,
    /// Assignments postponed for lack of a path.
    pub assignments_deferred: u32,
    /// Units delivered per resource.
    pub delivered: BTreeMap<Resource, u32>,
    /// Units lost to full destinations per resource.
    pub discarded: BTreeMap<Resource, u32>,
    /// Finished production cycles.
    pub production_cycles: u32,
    /// Finished construction sites.
    pub constructions_completed: u32,
    /// Tick of the first delivery, if any.
    pub first_delivery_tick: Option<u64>,
}

/// Folds events into [`RunMetrics`].
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: RunMetrics,
}

impl MetricsCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every event emitted during `tick`.
    pub fn record(&mut self, tick: u64, events: &[SimEvent]) {
        let m = &mut self.metrics;
        for event in events {
            match event {
                SimEvent::JobCreated { .. } => m.jobs_created += 1,
                SimEvent::JobCompleted { .. } => m.jobs_completed += 1,
                SimEvent::JobAborted { reason, .. } => {
                    *m.jobs_aborted.entry(reason.to_string()).or_default() += 1;
                }
                SimEvent::AssignmentDeferred { .. } => m.assignments_deferred += 1,
                SimEvent::ResourceDelivered {
                    resource, amount, ..
                } => {
                    *m.delivered.entry(*resource).or_default() += amount;
                    m.first_delivery_tick.get_or_insert(tick);
                }
                SimEvent::ResourceDiscarded {
                    resource, amount, ..
                } => {
                    *m.discarded.entry(*resource).or_default() += amount;
                }
                SimEvent::ProductionCompleted { .. } => m.production_cycles += 1,
                SimEvent::ConstructionCompleted { .. } => m.constructions_completed += 1,
                _ => {}
            }
        }
    }

    /// Counters so far.
    #[must_use]
    pub const fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Consume the collector.
    #[must_use]
    pub fn finish(self) -> RunMetrics {
        self.metrics
    }
}
