//! Headless runner: drives the tick loop with the tile stepper.

use serde::{Deserialize, Serialize};

use settlement_core::prelude::*;

use crate::metrics::{MetricsCollector, RunMetrics};
use crate::scenario::{Scenario, ScenarioError};

/// Headless runner configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadlessConfig {
    /// Milliseconds passed to every tick.
    pub delta_ms: u32,
    /// Tiles each agent walks per tick.
    pub tiles_per_step: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            delta_ms: TICK_DURATION_MS,
            tiles_per_step: 1,
        }
    }
}

/// Final state of one building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingSummary {
    /// Identifier.
    pub id: BuildingId,
    /// Type.
    pub kind: BuildingKind,
    /// Whether construction finished.
    pub complete: bool,
    /// Stock at the end of the run.
    pub stock: Stock,
}

/// JSON report printed after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Ticks simulated.
    pub ticks: u64,
    /// Final state hash.
    pub state_hash: u64,
    /// Event counters.
    pub metrics: RunMetrics,
    /// Jobs still open at the end.
    pub open_jobs: usize,
    /// Construction sites still open at the end.
    pub open_sites: usize,
    /// Buildings in id order.
    pub buildings: Vec<BuildingSummary>,
}

/// Runs a simulation without rendering.
#[derive(Debug)]
pub struct HeadlessRunner {
    name: String,
    sim: Simulation,
    stepper: TileStepper,
    config: HeadlessConfig,
    collector: MetricsCollector,
}

impl HeadlessRunner {
    /// Wrap a prepared simulation.
    #[must_use]
    pub fn new(name: impl Into<String>, sim: Simulation, config: HeadlessConfig) -> Self {
        Self {
            name: name.into(),
            sim,
            stepper: TileStepper::new(config.tiles_per_step),
            config,
            collector: MetricsCollector::new(),
        }
    }

    /// Build the scenario and wrap it.
    pub fn from_scenario(
        scenario: &Scenario,
        catalog: BuildingCatalog,
        config: HeadlessConfig,
    ) -> Result<Self, ScenarioError> {
        let sim = scenario.build(catalog)?;
        Ok(Self::new(scenario.name.clone(), sim, config))
    }

    /// The simulation being driven.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Advance one tick, then move every agent.
    pub fn step(&mut self) -> Vec<SimEvent> {
        let mut events = self.sim.tick(self.config.delta_ms);
        events.extend(self.stepper.step(&mut self.sim));
        self.collector.record(self.sim.get_tick(), &events);
        events
    }

    /// Run `ticks` steps.
    pub fn run(&mut self, ticks: u64) {
        tracing::info!(scenario = %self.name, ticks, delta_ms = self.config.delta_ms, "run started");
        for _ in 0..ticks {
            self.step();
        }
        let metrics = self.collector.metrics();
        tracing::info!(
            tick = self.sim.get_tick(),
            jobs_completed = metrics.jobs_completed,
            constructions = metrics.constructions_completed,
            "run finished"
        );
    }

    /// Report on the current state.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let ctx = self.sim.context();
        RunSummary {
            scenario: self.name.clone(),
            ticks: self.sim.get_tick(),
            state_hash: self.sim.state_hash(),
            metrics: self.collector.metrics().clone(),
            open_jobs: ctx.jobs.len(),
            open_sites: ctx.sites.len(),
            buildings: ctx
                .settlement
                .buildings()
                .map(|b| BuildingSummary {
                    id: b.id,
                    kind: b.kind,
                    complete: b.is_complete(),
                    stock: b.stock,
                })
                .collect(),
        }
    }
}
