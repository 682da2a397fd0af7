//! Demand/supply scanning.
//!
//! Each scan rebuilds the full request list from current stock; nothing is
//! carried over between scans.

use serde::{Deserialize, Serialize};

use crate::buildings::Building;
use crate::catalog::{BuildingInfo, Recipe};
use crate::config::{PriorityConfig, SimConfig};
use crate::construction::{ConstructionSite, SiteStatus};
use crate::ids::Target;
use crate::production::capacity;
use crate::resources::Resource;
use crate::simulation::SimContext;

/// Direction of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// The target wants the resource.
    Need,
    /// The target can hand out the resource.
    Offer,
}

/// One need or offer found by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    /// Requesting building or site.
    pub target: Target,
    /// Resource concerned.
    pub resource: Resource,
    /// Shortfall for needs, stock for offers.
    pub amount: u32,
    /// Need or offer.
    pub kind: RequestKind,
    /// Urgency; higher is served first.
    pub priority: u32,
}

impl Request {
    /// Check if this request is a need.
    #[must_use]
    pub fn is_need(&self) -> bool {
        self.kind == RequestKind::Need
    }

    /// Check if this request comes from a construction site.
    #[must_use]
    pub const fn is_construction(&self) -> bool {
        matches!(self.target, Target::Site(_))
    }
}

/// Offer priority from current fill level.
#[must_use]
pub fn offer_priority(stock: u32, cap: u32, priorities: &PriorityConfig) -> u32 {
    let filled = u64::from(stock) * 100;
    let nearly = u64::from(cap) * u64::from(priorities.nearly_full_percent);
    if stock >= cap {
        priorities.offer_base + priorities.offer_full_bonus
    } else if filled >= nearly {
        priorities.offer_base + priorities.offer_nearly_full_bonus
    } else {
        priorities.offer_base
    }
}

/// Need priority from current stock and building category.
#[must_use]
pub fn need_priority(stock: u32, food_chain: bool, priorities: &PriorityConfig) -> u32 {
    let mut priority = priorities.need_base;
    if stock == 0 {
        priority += priorities.need_empty_bonus;
    }
    if food_chain {
        priority += priorities.need_food_chain_bonus;
    }
    priority
}

fn scan_building(
    building: &Building,
    info: &BuildingInfo,
    recipe: &Recipe,
    config: &SimConfig,
    out: &mut Vec<Request>,
) {
    let target = Target::Building(building.id);

    for (resource, _) in recipe.output.iter_set() {
        let stock = building.stock[resource];
        if stock == 0 {
            continue;
        }
        let cap = capacity(info, resource, config);
        out.push(Request {
            target,
            resource,
            amount: stock,
            kind: RequestKind::Offer,
            priority: offer_priority(stock, cap, &config.priorities),
        });
    }

    for (resource, _) in recipe.input.iter_set() {
        let stock = building.stock[resource];
        let buffer = info
            .max_stock(resource)
            .unwrap_or(config.default_input_buffer);
        if stock >= buffer {
            continue;
        }
        out.push(Request {
            target,
            resource,
            amount: buffer - stock,
            kind: RequestKind::Need,
            priority: need_priority(stock, building.kind.is_food_chain(), &config.priorities),
        });
    }
}

fn scan_site(site: &ConstructionSite, config: &SimConfig, out: &mut Vec<Request>) {
    let open = matches!(site.status, SiteStatus::WaitingBuilder | SiteStatus::InProgress);
    if !open || site.entry_point.is_none() {
        return;
    }
    for (resource, _) in site.required.iter_set() {
        let outstanding = site.outstanding(resource);
        if outstanding > 0 {
            out.push(Request {
                target: Target::Site(site.id),
                resource,
                amount: outstanding,
                kind: RequestKind::Need,
                priority: config.priorities.construction,
            });
        }
    }
}

/// Build the request list for the current state.
///
/// Buildings are visited in id order (offers before needs, resources in
/// enum order), then construction sites in id order. The depot and
/// unfinished buildings are skipped.
#[must_use]
pub fn scan(ctx: &SimContext) -> Vec<Request> {
    let mut requests = Vec::new();

    for building in ctx.settlement.buildings() {
        if building.kind.is_depot() || !building.is_complete() {
            continue;
        }
        let Some(info) = ctx.catalog.get(building.kind) else {
            continue;
        };
        let Some(recipe) = info.recipe.as_ref() else {
            continue;
        };
        scan_building(building, info, recipe, &ctx.config, &mut requests);
    }

    for site in ctx.sites.iter() {
        scan_site(site, &ctx.config, &mut requests);
    }

    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentKind;
    use crate::catalog::{BuildingCatalog, BuildingKind};
    use crate::construction::{create_site, ConstructionRequest};
    use crate::grid::{Grid, Tile};
    use crate::resources::Stock;

    fn context() -> SimContext {
        let mut ctx = SimContext::new(Grid::new(20, 10), BuildingCatalog::standard(), SimConfig::default());
        for x in 1..19 {
            ctx.place_road(Tile::new(x, 5));
        }
        ctx
    }

    #[test]
    fn test_offer_priority_levels() {
        let p = PriorityConfig::default();
        assert_eq!(offer_priority(1, 8, &p), 30);
        assert_eq!(offer_priority(7, 8, &p), 50);
        assert_eq!(offer_priority(8, 8, &p), 70);
        assert_eq!(offer_priority(9, 8, &p), 70);
    }

    #[test]
    fn test_need_priority_levels() {
        let p = PriorityConfig::default();
        assert_eq!(need_priority(2, false, &p), 50);
        assert_eq!(need_priority(0, false, &p), 80);
        assert_eq!(need_priority(0, true, &p), 100);
        assert!(p.construction > need_priority(0, true, &p));
    }

    #[test]
    fn test_mill_needs_corn_before_offering_flour() {
        let mut ctx = context();
        let mill = ctx.spawn_building(BuildingKind::Mill, Tile::new(3, 3)).unwrap();
        ctx.settlement.building_mut(mill).unwrap().stock = Stock::new().with(Resource::Corn, 1);

        let requests = scan(&ctx);
        assert_eq!(
            requests,
            vec![Request {
                target: Target::Building(mill),
                resource: Resource::Corn,
                amount: 3,
                kind: RequestKind::Need,
                priority: 70,
            }]
        );

        ctx.settlement.building_mut(mill).unwrap().stock = Stock::new().with(Resource::Flour, 1);
        let requests = scan(&ctx);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].kind, RequestKind::Offer);
        assert_eq!(requests[0].resource, Resource::Flour);
        assert_eq!(requests[1].priority, 100);
    }

    #[test]
    fn test_depot_and_unfinished_skipped() {
        let mut ctx = context();
        let depot = ctx.spawn_building(BuildingKind::Storehouse, Tile::new(2, 2)).unwrap();
        ctx.settlement.building_mut(depot).unwrap().stock = Stock::new().with(Resource::Wood, 9);
        let quarry = ctx.spawn_building(BuildingKind::Quarry, Tile::new(8, 3)).unwrap();
        let q = ctx.settlement.building_mut(quarry).unwrap();
        q.stock = Stock::new().with(Resource::Stone, 2);
        q.construction = Some(crate::math::Fixed::ZERO);

        assert!(scan(&ctx).is_empty());
    }

    #[test]
    fn test_site_needs_only_once_waiting() {
        let mut ctx = context();
        ctx.spawn_agent(AgentKind::Builder, Tile::new(1, 5));
        let site = create_site(&mut ctx, ConstructionRequest::road(Tile::new(4, 6))).unwrap();
        assert!(scan(&ctx).is_empty());

        crate::construction::update(&mut ctx, 0);
        let requests = scan(&ctx);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target, Target::Site(site));
        assert_eq!(requests[0].resource, Resource::Stone);
        assert_eq!(requests[0].priority, 110);
        assert!(requests[0].is_construction());
    }
}
