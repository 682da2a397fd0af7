//! Events emitted by the tick loop and arrival handling.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::construction::ConstructionKind;
use crate::grid::Tile;
use crate::ids::{AgentId, BuildingId, JobId, SiteId, Target};
use crate::resources::Resource;

/// Why a job was dropped before completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbortReason {
    /// No path between the agent and its next stop.
    Unreachable,
    /// Source stock ran out between matching and pickup.
    InsufficientStock,
    /// Source building no longer exists.
    MissingSource,
    /// Destination building or site no longer exists.
    MissingDestination,
    /// Job and movement disagree about the agent.
    AgentMismatch,
    /// The arrival does not fit the job's kind or the agent's cargo.
    InvalidPhase,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unreachable => "unreachable",
            Self::InsufficientStock => "insufficient stock",
            Self::MissingSource => "missing source",
            Self::MissingDestination => "missing destination",
            Self::AgentMismatch => "agent mismatch",
            Self::InvalidPhase => "invalid phase",
        };
        f.write_str(text)
    }
}

/// Observable state change inside the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimEvent {
    /// The matcher created a job.
    JobCreated {
        /// New job.
        job: JobId,
    },
    /// An agent was assigned and sent on its first leg.
    JobAssigned {
        /// Job.
        job: JobId,
        /// Assigned agent.
        agent: AgentId,
    },
    /// An idle agent was found but no path exists; the job stays ready.
    AssignmentDeferred {
        /// Job.
        job: JobId,
        /// Agent that was released again.
        agent: AgentId,
    },
    /// An agent picked up cargo.
    PickedUp {
        /// Job.
        job: JobId,
        /// Source building.
        source: BuildingId,
        /// Resource.
        resource: Resource,
        /// Amount.
        amount: u32,
    },
    /// Cargo arrived at its destination.
    ResourceDelivered {
        /// Job.
        job: JobId,
        /// Receiving building or site.
        target: Target,
        /// Resource.
        resource: Resource,
        /// Amount accepted.
        amount: u32,
    },
    /// Cargo that did not fit at the destination was dropped.
    ResourceDiscarded {
        /// Job.
        job: JobId,
        /// Receiving building or site.
        target: Target,
        /// Resource.
        resource: Resource,
        /// Amount lost.
        amount: u32,
    },
    /// A job reached its terminal state.
    JobCompleted {
        /// Job.
        job: JobId,
    },
    /// A job was dropped and its agent released.
    JobAborted {
        /// Job.
        job: JobId,
        /// Cause.
        reason: AbortReason,
    },
    /// A builder reached its construction site.
    BuilderArrived {
        /// Site.
        site: SiteId,
        /// Builder.
        agent: AgentId,
    },
    /// A building began a production cycle.
    ProductionStarted {
        /// Building.
        building: BuildingId,
    },
    /// A production cycle finished and credited its outputs.
    ProductionCompleted {
        /// Building.
        building: BuildingId,
    },
    /// A production cycle ended without output because inputs vanished.
    ProductionCancelled {
        /// Building.
        building: BuildingId,
    },
    /// A construction site reached 100% and was finalised.
    ConstructionCompleted {
        /// Site.
        site: SiteId,
        /// What was built.
        kind: ConstructionKind,
        /// Site origin.
        origin: Tile,
        /// Finished building, for building sites.
        building: Option<BuildingId>,
    },
}

impl SimEvent {
    /// Job referenced by this event, if any.
    #[must_use]
    pub const fn job(&self) -> Option<JobId> {
        match self {
            Self::JobCreated { job }
            | Self::JobAssigned { job, .. }
            | Self::AssignmentDeferred { job, .. }
            | Self::PickedUp { job, .. }
            | Self::ResourceDelivered { job, .. }
            | Self::ResourceDiscarded { job, .. }
            | Self::JobCompleted { job }
            | Self::JobAborted { job, .. } => Some(*job),
            _ => None,
        }
    }
}
