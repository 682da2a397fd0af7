//! Arrival handling: the per-job state machine.
//!
//! Every finished leg ends up here. Transport jobs go
//! `ToPickup -> ToDelivery -> done`; construction jobs go
//! `ToConstruction -> working` and finish when the site completes.
//! Stale notifications (no movement for the job) are ignored.

use crate::agents::Cargo;
use crate::events::{AbortReason, SimEvent};
use crate::ids::{AgentId, JobId, Target};
use crate::jobs::{Job, JobStatus};
use crate::movement::MovementPhase;
use crate::pathfinding::find_path;
use crate::production::capacity;
use crate::simulation::SimContext;

/// Handle the end of the current leg of `job_id`.
pub fn on_agent_arrived(ctx: &mut SimContext, job_id: JobId) -> Vec<SimEvent> {
    let Some(movement) = ctx.movements.get(job_id) else {
        tracing::trace!(job = %job_id, "arrival without movement ignored");
        return Vec::new();
    };
    let (agent, phase) = (movement.agent, movement.phase);

    let Some(job) = ctx.jobs.get(job_id).cloned() else {
        ctx.movements.remove(job_id);
        ctx.settlement.release_agent(agent);
        return Vec::new();
    };
    if job.assigned_agent != Some(agent) {
        return vec![abort_job(ctx, job_id, AbortReason::AgentMismatch)];
    }

    match phase {
        MovementPhase::ToPickup => pick_up(ctx, &job, agent),
        MovementPhase::ToDelivery => deliver(ctx, &job, agent),
        MovementPhase::ToConstruction => builder_arrived(ctx, &job, agent),
    }
}

fn pick_up(ctx: &mut SimContext, job: &Job, agent_id: AgentId) -> Vec<SimEvent> {
    let (Some(source), Some((resource, amount))) = (job.source(), job.cargo()) else {
        return vec![abort_job(ctx, job.id, AbortReason::InvalidPhase)];
    };
    let Some(building) = ctx.settlement.building_mut(source) else {
        return vec![abort_job(ctx, job.id, AbortReason::MissingSource)];
    };
    // All or nothing: no partial pickups
    if !building.stock.take(resource, amount) {
        return vec![abort_job(ctx, job.id, AbortReason::InsufficientStock)];
    }

    let Some(agent) = ctx.settlement.agent_mut(agent_id) else {
        if let Some(building) = ctx.settlement.building_mut(source) {
            building.stock.add(resource, amount);
        }
        return vec![abort_job(ctx, job.id, AbortReason::AgentMismatch)];
    };
    agent.carrying = Some(Cargo { resource, amount });
    let (position, options) = (agent.position, agent.kind.path_options());

    let path = if position == job.destination {
        Some(vec![position])
    } else {
        find_path(&ctx.grid, position, job.destination, options)
    };
    let Some(path) = path else {
        // Full rollback before giving up
        if let Some(building) = ctx.settlement.building_mut(source) {
            building.stock.add(resource, amount);
        }
        if let Some(agent) = ctx.settlement.agent_mut(agent_id) {
            agent.carrying = None;
        }
        return vec![abort_job(ctx, job.id, AbortReason::Unreachable)];
    };

    if let Some(stored) = ctx.jobs.get_mut(job.id) {
        stored.status = JobStatus::Delivering;
    }
    if let Some(movement) = ctx.movements.get_mut(job.id) {
        movement.set_leg(MovementPhase::ToDelivery, path);
    }
    tracing::debug!(job = %job.id, agent = %agent_id, %resource, amount, "picked up");
    vec![SimEvent::PickedUp {
        job: job.id,
        source,
        resource,
        amount,
    }]
}

fn deliver(ctx: &mut SimContext, job: &Job, agent_id: AgentId) -> Vec<SimEvent> {
    let carried = ctx
        .settlement
        .agent_mut(agent_id)
        .and_then(|agent| agent.carrying.take());
    let (Some(target), Some(cargo)) = (job.target(), carried) else {
        return vec![abort_job(ctx, job.id, AbortReason::InvalidPhase)];
    };
    let Cargo { resource, amount } = cargo;

    let accepted = match target {
        Target::Building(id) => {
            let catalog = &ctx.catalog;
            let config = &ctx.config;
            ctx.settlement.building_mut(id).map(|building| {
                let cap = catalog
                    .get(building.kind)
                    .map_or(config.default_max_stock, |info| capacity(info, resource, config));
                let accepted = amount.min(cap.saturating_sub(building.stock[resource]));
                building.stock.add(resource, accepted);
                accepted
            })
        }
        Target::Site(id) => ctx.sites.deliver_resource(id, resource, amount),
    };

    let mut events = Vec::new();
    let Some(accepted) = accepted else {
        events.push(SimEvent::ResourceDiscarded {
            job: job.id,
            target,
            resource,
            amount,
        });
        events.push(abort_job(ctx, job.id, AbortReason::MissingDestination));
        return events;
    };

    if accepted > 0 {
        events.push(SimEvent::ResourceDelivered {
            job: job.id,
            target,
            resource,
            amount: accepted,
        });
    }
    if accepted < amount {
        tracing::debug!(job = %job.id, %target, %resource, lost = amount - accepted, "overflow discarded");
        events.push(SimEvent::ResourceDiscarded {
            job: job.id,
            target,
            resource,
            amount: amount - accepted,
        });
    }

    ctx.settlement.release_agent(agent_id);
    ctx.jobs.remove(job.id);
    ctx.movements.remove(job.id);
    tracing::debug!(job = %job.id, %target, %resource, accepted, "job completed");
    events.push(SimEvent::JobCompleted { job: job.id });
    events
}

fn builder_arrived(ctx: &mut SimContext, job: &Job, agent_id: AgentId) -> Vec<SimEvent> {
    let Some(site) = job.construction_site() else {
        return vec![abort_job(ctx, job.id, AbortReason::InvalidPhase)];
    };
    if !ctx.sites.on_builder_arrived(site, agent_id) {
        return vec![abort_job(ctx, job.id, AbortReason::MissingDestination)];
    }
    // The builder stays busy until the site completes
    ctx.movements.remove(job.id);
    tracing::debug!(%site, agent = %agent_id, "builder on site");
    vec![SimEvent::BuilderArrived {
        site,
        agent: agent_id,
    }]
}

/// Drop a job, release its agent and reopen its construction site.
pub fn abort_job(ctx: &mut SimContext, job_id: JobId, reason: AbortReason) -> SimEvent {
    if let Some(movement) = ctx.movements.remove(job_id) {
        ctx.settlement.release_agent(movement.agent);
    }
    if let Some(job) = ctx.jobs.remove(job_id) {
        if let Some(agent) = job.assigned_agent {
            ctx.settlement.release_agent(agent);
        }
        if let Some(site) = job.construction_site() {
            ctx.sites.reset(site);
        }
    }
    tracing::warn!(job = %job_id, %reason, "job aborted");
    SimEvent::JobAborted {
        job: job_id,
        reason,
    }
}
