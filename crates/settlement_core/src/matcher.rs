//! Turns the request list into transport jobs.
//!
//! Passes, in order:
//! 1. Building needs, served from production offers (never the depot)
//! 2. Construction needs, served from any offer
//! 3. Surplus offers offloaded to the depot
//! 4. Needs still open, served from depot stock
//!
//! A job is only created when no active job already carries the same
//! resource to the same target, and when the source still has stock not
//! promised to an earlier pickup.

use std::collections::BTreeMap;

use crate::agents::AgentKind;
use crate::events::SimEvent;
use crate::ids::{BuildingId, JobId, Target};
use crate::jobs::JobKind;
use crate::requests::Request;
use crate::resources::Resource;
use crate::simulation::SimContext;

/// Check whether `source` can cover one more job of `resource`.
fn source_has_free_stock(ctx: &SimContext, source: BuildingId, resource: Resource) -> bool {
    let unit = ctx.config.job_unit_amount;
    let Some(building) = ctx.settlement.building(source) else {
        return false;
    };
    let promised = ctx.jobs.pending_pickups(source, resource);
    building.stock[resource] >= promised.saturating_add(unit)
}

/// Check every rule that would block a new `source -> target` transfer.
fn can_route(ctx: &SimContext, source: BuildingId, target: Target, resource: Resource) -> bool {
    target != Target::Building(source)
        && !ctx.jobs.has_active_for(target, resource)
        && source_has_free_stock(ctx, source, resource)
}

/// Create a single transfer job. Returns `None` when either end has no entry point.
fn create_transfer(
    ctx: &mut SimContext,
    source: BuildingId,
    target: Target,
    resource: Resource,
) -> Option<JobId> {
    let origin = ctx.building_entry(source)?;
    let destination = ctx.target_entry(target)?;
    let amount = ctx.config.job_unit_amount;

    let kind = match target {
        Target::Building(building) => JobKind::Delivery {
            source,
            destination: building,
            resource,
            amount,
        },
        Target::Site(site) => JobKind::ConstructionDelivery {
            source,
            site,
            resource,
            amount,
        },
    };
    let job = ctx
        .jobs
        .create(kind, AgentKind::Servant, origin, destination);
    tracing::debug!(%job, %source, %target, %resource, amount, "transport job created");
    Some(job)
}

/// Sort by descending priority, keeping scan order for ties.
fn by_priority<'a>(requests: impl Iterator<Item = &'a Request>) -> Vec<&'a Request> {
    let mut sorted: Vec<&Request> = requests.collect();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
    sorted
}

/// Run every matching pass over `requests`.
///
/// # Returns
///
/// One [`SimEvent::JobCreated`] per new job, in creation order.
pub fn match_requests(ctx: &mut SimContext, requests: &[Request]) -> Vec<SimEvent> {
    let mut created = Vec::new();
    let depot = ctx.settlement.depot_id();

    let building_needs = by_priority(
        requests
            .iter()
            .filter(|r| r.is_need() && !r.is_construction()),
    );
    let site_needs = by_priority(
        requests
            .iter()
            .filter(|r| r.is_need() && r.is_construction()),
    );
    let offers = by_priority(requests.iter().filter(|r| !r.is_need()));

    // Demand not yet covered by in-flight deliveries, per resource
    let mut demand: BTreeMap<Resource, u32> = BTreeMap::new();
    for need in building_needs.iter().chain(site_needs.iter()) {
        *demand.entry(need.resource).or_default() += need.amount;
    }
    let depot_target = depot.map(Target::Building);
    for (resource, open) in &mut demand {
        *open = open.saturating_sub(ctx.jobs.pending_deliveries(*resource, depot_target));
    }

    // Passes 1 and 2: production offers to needs, one job per need
    for (needs, allow_depot) in [(&building_needs, false), (&site_needs, true)] {
        for need in needs.iter() {
            let candidate = offers.iter().find_map(|offer| {
                let source = offer.target.building()?;
                let usable = offer.resource == need.resource
                    && (allow_depot || Some(source) != depot)
                    && can_route(ctx, source, need.target, need.resource);
                usable.then_some(source)
            });
            let Some(source) = candidate else {
                continue;
            };
            if let Some(job) = create_transfer(ctx, source, need.target, need.resource) {
                if let Some(open) = demand.get_mut(&need.resource) {
                    *open = open.saturating_sub(ctx.config.job_unit_amount);
                }
                created.push(job);
            }
        }
    }

    // Pass 3: offload surplus to the depot
    if let Some(depot) = depot {
        let threshold = ctx.config.priorities.depot_offload_threshold;
        for offer in &offers {
            let Some(source) = offer.target.building() else {
                continue;
            };
            if source == depot {
                continue;
            }
            let has_consumer = building_needs
                .iter()
                .chain(site_needs.iter())
                .any(|need| need.resource == offer.resource && need.target != offer.target);
            let open = demand.get(&offer.resource).copied().unwrap_or(0);
            let surplus = !has_consumer || open == 0 || offer.priority >= threshold;
            if surplus && can_route(ctx, source, Target::Building(depot), offer.resource) {
                if let Some(job) = create_transfer(ctx, source, Target::Building(depot), offer.resource) {
                    created.push(job);
                }
            }
        }

        // Pass 4: serve open needs from depot stock
        for need in building_needs.iter().chain(site_needs.iter()) {
            if can_route(ctx, depot, need.target, need.resource) {
                if let Some(job) = create_transfer(ctx, depot, need.target, need.resource) {
                    created.push(job);
                }
            }
        }
    }

    #[cfg(feature = "debug-validation")]
    if let Some((target, resource)) = ctx.jobs.duplicate_target() {
        tracing::error!(%target, %resource, "two active jobs share a destination");
    }

    created
        .into_iter()
        .map(|job| SimEvent::JobCreated { job })
        .collect()
}
