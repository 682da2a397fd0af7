//! Job records, the job store and the dispatcher.
//!
//! A job is one transfer of resources (or one construction assignment)
//! served by exactly one agent. Terminal jobs are removed from the store,
//! so every stored job is active.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agents::AgentKind;
use crate::events::SimEvent;
use crate::grid::Tile;
use crate::ids::{AgentId, BuildingId, JobId, SiteId, Target};
use crate::movement::{Movement, MovementPhase};
use crate::pathfinding::find_path;
use crate::resources::Resource;
use crate::simulation::SimContext;

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting for an agent.
    Ready,
    /// Agent assigned and travelling to pickup (or working).
    InProgress,
    /// Cargo picked up, travelling to the destination.
    Delivering,
}

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Move resources between two buildings.
    Delivery {
        /// Source building.
        source: BuildingId,
        /// Destination building.
        destination: BuildingId,
        /// Resource moved.
        resource: Resource,
        /// Units moved.
        amount: u32,
    },
    /// Move resources from a building to a construction site.
    ConstructionDelivery {
        /// Source building.
        source: BuildingId,
        /// Destination site.
        site: SiteId,
        /// Resource moved.
        resource: Resource,
        /// Units moved.
        amount: u32,
    },
    /// Work on a construction site.
    Construction {
        /// Site.
        site: SiteId,
    },
}

/// A scheduled unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Job {
    /// Identifier.
    pub id: JobId,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Payload.
    pub kind: JobKind,
    /// Agent class able to serve the job.
    pub agent_kind: AgentKind,
    /// First stop: pickup entry point or construction entry point.
    pub origin: Tile,
    /// Final stop.
    pub destination: Tile,
    /// Assigned agent while in progress.
    pub assigned_agent: Option<AgentId>,
}

impl Job {
    /// Source building of a transfer.
    #[must_use]
    pub const fn source(&self) -> Option<BuildingId> {
        match self.kind {
            JobKind::Delivery { source, .. } | JobKind::ConstructionDelivery { source, .. } => {
                Some(source)
            }
            JobKind::Construction { .. } => None,
        }
    }

    /// Receiving building or site of a transfer.
    #[must_use]
    pub const fn target(&self) -> Option<Target> {
        match self.kind {
            JobKind::Delivery { destination, .. } => Some(Target::Building(destination)),
            JobKind::ConstructionDelivery { site, .. } => Some(Target::Site(site)),
            JobKind::Construction { .. } => None,
        }
    }

    /// Resource and amount of a transfer.
    #[must_use]
    pub const fn cargo(&self) -> Option<(Resource, u32)> {
        match self.kind {
            JobKind::Delivery {
                resource, amount, ..
            }
            | JobKind::ConstructionDelivery {
                resource, amount, ..
            } => Some((resource, amount)),
            JobKind::Construction { .. } => None,
        }
    }

    /// Site of a construction job.
    #[must_use]
    pub const fn construction_site(&self) -> Option<SiteId> {
        match self.kind {
            JobKind::Construction { site } => Some(site),
            _ => None,
        }
    }

    /// Whether cargo has not yet been picked up.
    #[must_use]
    pub fn awaiting_pickup(&self) -> bool {
        self.status != JobStatus::Delivering
    }
}

/// All active jobs, keyed in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobStore {
    jobs: BTreeMap<JobId, Job>,
    next_id: u32,
}

impl JobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ready job.
    pub fn create(
        &mut self,
        kind: JobKind,
        agent_kind: AgentKind,
        origin: Tile,
        destination: Tile,
    ) -> JobId {
        self.next_id += 1;
        let id = JobId::new(self.next_id);
        self.jobs.insert(
            id,
            Job {
                id,
                status: JobStatus::Ready,
                kind,
                agent_kind,
                origin,
                destination,
                assigned_agent: None,
            },
        );
        id
    }

    /// Job by id.
    #[must_use]
    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Mutable job by id.
    pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.get_mut(&id)
    }

    /// Remove a job.
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        self.jobs.remove(&id)
    }

    /// Jobs in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Number of active jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether there are no active jobs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Ids of ready jobs in creation order.
    #[must_use]
    pub fn ready_ids(&self) -> Vec<JobId> {
        self.jobs
            .values()
            .filter(|j| j.status == JobStatus::Ready)
            .map(|j| j.id)
            .collect()
    }

    /// Construction job for `site`, if one exists.
    #[must_use]
    pub fn construction_job(&self, site: SiteId) -> Option<JobId> {
        self.jobs
            .values()
            .find(|j| j.construction_site() == Some(site))
            .map(|j| j.id)
    }

    /// Whether a construction job exists for `site`.
    #[must_use]
    pub fn has_construction_job(&self, site: SiteId) -> bool {
        self.construction_job(site).is_some()
    }

    /// Whether any active job carries `resource` to `target`.
    #[must_use]
    pub fn has_active_for(&self, target: Target, resource: Resource) -> bool {
        self.jobs
            .values()
            .any(|j| j.target() == Some(target) && j.cargo().map(|(r, _)| r) == Some(resource))
    }

    /// Units of `resource` promised from `source` but not yet picked up.
    #[must_use]
    pub fn pending_pickups(&self, source: BuildingId, resource: Resource) -> u32 {
        self.jobs
            .values()
            .filter(|j| j.source() == Some(source) && j.awaiting_pickup())
            .filter_map(Job::cargo)
            .filter(|&(r, _)| r == resource)
            .map(|(_, amount)| amount)
            .sum()
    }

    /// Units of `resource` in flight to any target other than `excluded`.
    #[must_use]
    pub fn pending_deliveries(&self, resource: Resource, excluded: Option<Target>) -> u32 {
        self.jobs
            .values()
            .filter(|j| j.target().is_some() && j.target() != excluded)
            .filter_map(Job::cargo)
            .filter(|&(r, _)| r == resource)
            .map(|(_, amount)| amount)
            .sum()
    }

    /// Find two active transfers sharing a `(target, resource)` pair.
    #[must_use]
    pub fn duplicate_target(&self) -> Option<(Target, Resource)> {
        let mut seen = std::collections::BTreeSet::new();
        self.jobs
            .values()
            .filter_map(|j| Some((j.target()?, j.cargo()?.0)))
            .find(|pair| !seen.insert(*pair))
    }
}

/// Assign idle agents to ready jobs and start their first leg.
///
/// Jobs are visited in creation order. A job with no idle agent of its
/// class stays ready. A job whose first leg is unreachable releases the
/// agent again and stays ready for a later cycle.
pub fn dispatch(ctx: &mut SimContext) -> Vec<SimEvent> {
    let mut events = Vec::new();

    for job_id in ctx.jobs.ready_ids() {
        let Some(job) = ctx.jobs.get(job_id) else {
            continue;
        };
        let (agent_kind, origin, construction) =
            (job.agent_kind, job.origin, job.construction_site().is_some());

        let Some(agent_id) = ctx.settlement.idle_agent(agent_kind) else {
            continue;
        };
        let Some(agent) = ctx.settlement.agent_mut(agent_id) else {
            continue;
        };
        agent.claim();
        let position = agent.position;

        let path = if position == origin {
            Some(vec![position])
        } else {
            find_path(&ctx.grid, position, origin, agent_kind.path_options())
        };

        let Some(path) = path else {
            ctx.settlement.release_agent(agent_id);
            tracing::warn!(job = %job_id, agent = %agent_id, %position, %origin, "no path to job origin");
            events.push(SimEvent::AssignmentDeferred {
                job: job_id,
                agent: agent_id,
            });
            continue;
        };

        if let Some(job) = ctx.jobs.get_mut(job_id) {
            job.status = JobStatus::InProgress;
            job.assigned_agent = Some(agent_id);
        }
        let phase = if construction {
            MovementPhase::ToConstruction
        } else {
            MovementPhase::ToPickup
        };
        ctx.movements
            .insert(Movement::new(agent_id, job_id, phase, path));

        tracing::debug!(job = %job_id, agent = %agent_id, ?phase, "job assigned");
        events.push(SimEvent::JobAssigned {
            job: job_id,
            agent: agent_id,
        });
    }

    events
}
