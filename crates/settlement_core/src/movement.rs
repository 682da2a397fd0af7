//! In-flight movement records and a deterministic tile stepper.
//!
//! A [`Movement`] exists while an agent travels one leg of a job. The
//! external mover consumes its path and reports the arrival through
//! [`Simulation::on_agent_arrived`].

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::events::SimEvent;
use crate::grid::Tile;
use crate::ids::{AgentId, JobId};
use crate::simulation::Simulation;

/// Whether the mover has started the current leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementStatus {
    /// Path set, not yet started.
    Ready,
    /// Agent walking.
    InProgress,
}

/// Which leg of the job is being travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementPhase {
    /// Transport agent heading to the source.
    ToPickup,
    /// Transport agent carrying cargo to the destination.
    ToDelivery,
    /// Builder heading to a construction site.
    ToConstruction,
}

/// One agent's current leg.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Movement {
    /// Moving agent.
    pub agent: AgentId,
    /// Job served.
    pub job: JobId,
    /// Mover state.
    pub status: MovementStatus,
    /// Leg.
    pub phase: MovementPhase,
    /// Tiles still to walk, excluding the agent's current tile.
    pub path: VecDeque<Tile>,
}

impl Movement {
    /// Start a leg from a full path whose first tile is the agent's position.
    #[must_use]
    pub fn new(agent: AgentId, job: JobId, phase: MovementPhase, path: Vec<Tile>) -> Self {
        let mut movement = Self {
            agent,
            job,
            status: MovementStatus::Ready,
            phase,
            path: VecDeque::new(),
        };
        movement.set_leg(phase, path);
        movement
    }

    /// Replace the current leg.
    pub fn set_leg(&mut self, phase: MovementPhase, path: Vec<Tile>) {
        self.phase = phase;
        self.status = MovementStatus::Ready;
        self.path = path.into_iter().skip(1).collect();
    }

    /// Whether the leg has been fully walked.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.path.is_empty()
    }
}

/// Movements keyed by job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementStore {
    movements: BTreeMap<JobId, Movement>,
}

impl MovementStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the movement for its job.
    pub fn insert(&mut self, movement: Movement) {
        self.movements.insert(movement.job, movement);
    }

    /// Movement for `job`.
    #[must_use]
    pub fn get(&self, job: JobId) -> Option<&Movement> {
        self.movements.get(&job)
    }

    /// Mutable movement for `job`.
    pub fn get_mut(&mut self, job: JobId) -> Option<&mut Movement> {
        self.movements.get_mut(&job)
    }

    /// Remove the movement for `job`.
    pub fn remove(&mut self, job: JobId) -> Option<Movement> {
        self.movements.remove(&job)
    }

    /// Movements in job order.
    pub fn iter(&self) -> impl Iterator<Item = &Movement> {
        self.movements.values()
    }

    /// Number of movements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.movements.len()
    }

    /// Whether no agent is travelling.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }
}

/// Mover that advances every agent one tile per step.
///
/// Arrivals are reported in job order after all agents have moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileStepper {
    tiles_per_step: u32,
}

impl Default for TileStepper {
    fn default() -> Self {
        Self { tiles_per_step: 1 }
    }
}

impl TileStepper {
    /// Create a stepper moving `tiles_per_step` tiles per call (at least one).
    #[must_use]
    pub fn new(tiles_per_step: u32) -> Self {
        Self {
            tiles_per_step: tiles_per_step.max(1),
        }
    }

    /// Advance every movement and deliver arrival notifications.
    pub fn step(&self, sim: &mut Simulation) -> Vec<SimEvent> {
        let ctx = sim.context_mut();
        let mut arrived = Vec::new();
        let mut positions = Vec::new();

        for movement in ctx.movements.movements.values_mut() {
            movement.status = MovementStatus::InProgress;
            for _ in 0..self.tiles_per_step {
                let Some(tile) = movement.path.pop_front() else {
                    break;
                };
                positions.push((movement.agent, tile));
            }
            if movement.is_finished() {
                arrived.push(movement.job);
            }
        }
        for (agent, tile) in positions {
            if let Some(agent) = ctx.settlement.agent_mut(agent) {
                agent.position = tile;
            }
        }

        arrived
            .into_iter()
            .flat_map(|job| sim.on_agent_arrived(job))
            .collect()
    }
}
