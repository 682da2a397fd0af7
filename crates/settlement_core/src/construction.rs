//! Construction sites: placement, builder assignment, progress and completion.
//!
//! A site moves through `Planned -> WaitingBuilder -> InProgress` and is
//! removed when its progress reaches 100%. Progress never exceeds the
//! share of required materials already delivered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agents::AgentKind;
use crate::buildings::{can_place_building, door_tile, place_building, Building};
use crate::catalog::BuildingKind;
use crate::error::{Result, SimError};
use crate::events::SimEvent;
use crate::grid::{Grid, Tile};
use crate::ids::{AgentId, BuildingId, JobId, SiteId};
use crate::jobs::JobKind;
use crate::math::{accrued, fixed_serde, percent_of, Fixed, HUNDRED};
use crate::resources::{Resource, Stock};
use crate::simulation::SimContext;

/// What a site turns into once finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstructionKind {
    /// A building of the given type.
    Building(BuildingKind),
    /// A single road tile.
    Road,
    /// A field tile.
    Field,
    /// A vines tile.
    Vines,
}

impl ConstructionKind {
    /// Materials needed for a single-tile site.
    ///
    /// Building sites take their cost from the catalog instead.
    #[must_use]
    pub fn tile_cost(self) -> Stock {
        match self {
            Self::Road => Stock::new().with(Resource::Stone, 1),
            Self::Vines => Stock::new().with(Resource::Wood, 1),
            Self::Field | Self::Building(_) => Stock::new(),
        }
    }
}

/// Lifecycle of a construction site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SiteStatus {
    /// Waiting for a builder to be assigned.
    #[default]
    Planned,
    /// A builder is on the way.
    WaitingBuilder,
    /// A builder is on site.
    InProgress,
    /// Finished; the site is about to be removed.
    Completed,
}

/// A placement order from the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructionRequest {
    /// What to build.
    pub kind: ConstructionKind,
    /// Top-left tile (or the tile itself for roads, fields and vines).
    pub origin: Tile,
}

impl ConstructionRequest {
    /// Request a building at `origin`.
    #[must_use]
    pub const fn building(kind: BuildingKind, origin: Tile) -> Self {
        Self {
            kind: ConstructionKind::Building(kind),
            origin,
        }
    }

    /// Request a road tile.
    #[must_use]
    pub const fn road(origin: Tile) -> Self {
        Self {
            kind: ConstructionKind::Road,
            origin,
        }
    }
}

/// A not-yet-finished building, road, field or vines tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructionSite {
    /// Identifier.
    pub id: SiteId,
    /// Target of the work.
    pub kind: ConstructionKind,
    /// Placement tile.
    pub origin: Tile,
    /// Building created for a building site.
    pub building: Option<BuildingId>,
    /// Materials needed.
    pub required: Stock,
    /// Materials received so far.
    pub delivered: Stock,
    /// Lifecycle state.
    pub status: SiteStatus,
    /// Progress in percent.
    #[serde(with = "fixed_serde")]
    pub progress: Fixed,
    /// Builder on site.
    pub assigned_builder: Option<AgentId>,
    /// Standing tile for the builder and deliveries.
    pub entry_point: Option<Tile>,
    /// Tiles marked as being built by this site.
    pub reserved: Vec<Tile>,
}

impl ConstructionSite {
    /// Highest progress the delivered materials allow.
    #[must_use]
    pub fn max_progress(&self) -> Fixed {
        percent_of(self.delivered.total(), self.required.total())
    }

    /// Units of `resource` still missing.
    #[must_use]
    pub fn outstanding(&self, resource: Resource) -> u32 {
        self.required[resource].saturating_sub(self.delivered[resource])
    }

    /// Record a delivery, clamped to what is still missing.
    ///
    /// Returns the accepted amount.
    pub fn deliver(&mut self, resource: Resource, amount: u32) -> u32 {
        let accepted = amount.min(self.outstanding(resource));
        self.delivered.add(resource, accepted);
        accepted
    }

    /// Whether a builder has work to do here.
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.status == SiteStatus::InProgress && self.assigned_builder.is_some()
    }
}

/// Every open construction site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstructionStore {
    sites: BTreeMap<SiteId, ConstructionSite>,
    next_id: u32,
}

impl ConstructionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> SiteId {
        self.next_id += 1;
        SiteId::new(self.next_id)
    }

    /// Site by id.
    #[must_use]
    pub fn get(&self, id: SiteId) -> Option<&ConstructionSite> {
        self.sites.get(&id)
    }

    /// Mutable site by id.
    pub fn get_mut(&mut self, id: SiteId) -> Option<&mut ConstructionSite> {
        self.sites.get_mut(&id)
    }

    /// Remove a site.
    pub fn remove(&mut self, id: SiteId) -> Option<ConstructionSite> {
        self.sites.remove(&id)
    }

    /// Sites in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ConstructionSite> {
        self.sites.values()
    }

    /// Site ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<SiteId> {
        self.sites.keys().copied().collect()
    }

    /// Number of open sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether there are no open sites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Record that `builder` reached the site. Returns `false` for an unknown site.
    pub fn on_builder_arrived(&mut self, id: SiteId, builder: AgentId) -> bool {
        let Some(site) = self.sites.get_mut(&id) else {
            return false;
        };
        site.assigned_builder = Some(builder);
        site.status = SiteStatus::InProgress;
        true
    }

    /// Add materials to a site's ledger.
    ///
    /// Returns the accepted amount, or `None` for an unknown site.
    pub fn deliver_resource(&mut self, id: SiteId, resource: Resource, amount: u32) -> Option<u32> {
        self.sites
            .get_mut(&id)
            .map(|site| site.deliver(resource, amount))
    }

    /// Put a site back to `Planned` so a new builder can be assigned.
    pub fn reset(&mut self, id: SiteId) {
        if let Some(site) = self.sites.get_mut(&id) {
            site.status = SiteStatus::Planned;
            site.assigned_builder = None;
        }
    }
}

/// Validate a single-tile site and return its entry road.
fn check_tile_site(grid: &Grid, kind: ConstructionKind, tile: Tile) -> Result<Tile> {
    let Some(cell) = grid.get_cell(tile) else {
        return Err(SimError::OutOfBounds {
            x: tile.x,
            y: tile.y,
        });
    };
    let occupied = match kind {
        ConstructionKind::Road => cell.blocked_road || cell.being_built,
        _ => cell.blocked_road || cell.blocked_building || cell.being_built,
    };
    if occupied {
        return Err(SimError::Blocked {
            x: tile.x,
            y: tile.y,
        });
    }
    grid.adjacent_road(tile).ok_or(SimError::NoAdjacentRoad {
        x: tile.x,
        y: tile.y,
    })
}

/// Open a construction site.
///
/// Building sites stamp the footprint and door road and create the
/// building immediately in the under-construction state. Nothing is
/// changed when an error is returned.
///
/// # Errors
///
/// - [`SimError::UnknownBuildingKind`] when the catalog lacks the type
/// - [`SimError::MissingDoor`] when the footprint has no door
/// - [`SimError::OutOfBounds`] / [`SimError::Blocked`] when the tiles are unavailable
/// - [`SimError::NoAdjacentRoad`] when nothing connects the site to the road network
pub fn create_site(ctx: &mut SimContext, request: ConstructionRequest) -> Result<SiteId> {
    let ConstructionRequest { kind, origin } = request;

    let (required, entry, building, reserved) = match kind {
        ConstructionKind::Building(building_kind) => {
            let info = ctx.catalog.lookup(building_kind)?.clone();
            let door =
                door_tile(origin, &info.footprint).ok_or(SimError::MissingDoor(building_kind))?;
            can_place_building(&ctx.grid, origin, &info.footprint)?;
            if ctx.grid.adjacent_road(door).is_none() {
                return Err(SimError::NoAdjacentRoad {
                    x: door.x,
                    y: door.y,
                });
            }

            place_building(&mut ctx.grid, building_kind, &info, origin)?;
            ctx.settlement.roads.push(door);
            let id = ctx.settlement.next_building_id();
            ctx.settlement.add_building(
                Building::new(id, building_kind, origin, info.health).under_construction(),
            );
            let reserved: Vec<Tile> = info
                .footprint
                .tiles(origin)
                .filter(|&tile| tile != door)
                .collect();
            (info.cost, door, Some(id), reserved)
        }
        ConstructionKind::Road | ConstructionKind::Field | ConstructionKind::Vines => {
            let entry = check_tile_site(&ctx.grid, kind, origin)?;
            (kind.tile_cost(), entry, None, vec![origin])
        }
    };

    for &tile in &reserved {
        ctx.grid.set_being_built(tile, true);
    }
    ctx.invalidate_entry_points();

    let id = ctx.sites.allocate();
    ctx.sites.sites.insert(
        id,
        ConstructionSite {
            id,
            kind,
            origin,
            building,
            required,
            delivered: Stock::new(),
            status: SiteStatus::Planned,
            progress: Fixed::ZERO,
            assigned_builder: None,
            entry_point: Some(entry),
            reserved,
        },
    );
    tracing::debug!(site = %id, ?kind, %origin, "construction site created");
    Ok(id)
}

/// Create a construction job for a planned site if a builder is free.
fn assign_builder(ctx: &mut SimContext, id: SiteId) -> Option<JobId> {
    if ctx.jobs.has_construction_job(id) {
        return None;
    }
    ctx.settlement.idle_agent(AgentKind::Builder)?;
    let site = ctx.sites.get_mut(id)?;
    let entry = site.entry_point?;
    site.status = SiteStatus::WaitingBuilder;

    let job = ctx.jobs.create(
        JobKind::Construction { site: id },
        AgentKind::Builder,
        entry,
        entry,
    );
    tracing::debug!(site = %id, %job, "construction job created");
    Some(job)
}

/// Finalise a site that reached 100%.
fn complete(ctx: &mut SimContext, id: SiteId) -> Option<SimEvent> {
    let mut site = ctx.sites.remove(id)?;
    site.status = SiteStatus::Completed;

    for &tile in &site.reserved {
        ctx.grid.set_being_built(tile, false);
    }

    match site.kind {
        ConstructionKind::Building(_) => {
            if let Some(building) = site.building.and_then(|b| ctx.settlement.building_mut(b)) {
                building.construction = None;
            }
        }
        ConstructionKind::Road => {
            if !ctx.place_road(site.origin) {
                tracing::error!(site = %id, origin = %site.origin, "road tile became unavailable");
            }
        }
        ConstructionKind::Field => {
            ctx.settlement.fields.push(site.origin);
            ctx.grid.block(site.origin);
        }
        ConstructionKind::Vines => {
            ctx.settlement.vines.push(site.origin);
            ctx.grid.block(site.origin);
        }
    }

    if let Some(builder) = site.assigned_builder {
        ctx.settlement.release_agent(builder);
    }
    if let Some(job) = ctx.jobs.construction_job(id) {
        ctx.jobs.remove(job);
        ctx.movements.remove(job);
    }
    ctx.invalidate_entry_points();

    tracing::info!(site = %id, kind = ?site.kind, origin = %site.origin, "construction completed");
    Some(SimEvent::ConstructionCompleted {
        site: id,
        kind: site.kind,
        origin: site.origin,
        building: site.building,
    })
}

/// Advance every site by `delta_ms`.
///
/// Planned sites try to get a builder; sites with a builder on site gain
/// progress up to the material ceiling and are finalised at 100%.
pub fn update(ctx: &mut SimContext, delta_ms: u32) -> Vec<SimEvent> {
    let mut events = Vec::new();
    let rate = ctx.config.construction_work_rate;

    for id in ctx.sites.ids() {
        let Some(site) = ctx.sites.get_mut(id) else {
            continue;
        };

        if site.status == SiteStatus::Planned {
            if let Some(job) = assign_builder(ctx, id) {
                events.push(SimEvent::JobCreated { job });
            }
        } else if site.is_building() {
            let ceiling = site.max_progress();
            site.progress = site.progress.saturating_add(accrued(rate, delta_ms)).min(ceiling);
            let (progress, building) = (site.progress, site.building);

            if let Some(building) = building.and_then(|b| ctx.settlement.building_mut(b)) {
                building.construction = Some(progress);
            }
            if progress >= HUNDRED {
                events.extend(complete(ctx, id));
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BuildingCatalog;
    use crate::config::SimConfig;
    use crate::grid::Grid;

    fn context() -> SimContext {
        let mut ctx = SimContext::new(Grid::new(16, 16), BuildingCatalog::standard(), SimConfig::default());
        for x in 1..15 {
            ctx.place_road(Tile::new(x, 8));
        }
        ctx
    }

    #[test]
    fn test_site_ledger_clamps() {
        let mut site = ConstructionSite {
            id: SiteId::new(1),
            kind: ConstructionKind::Road,
            origin: Tile::new(1, 1),
            building: None,
            required: Stock::new().with(Resource::Stone, 2),
            delivered: Stock::new(),
            status: SiteStatus::Planned,
            progress: Fixed::ZERO,
            assigned_builder: None,
            entry_point: None,
            reserved: Vec::new(),
        };
        assert_eq!(site.max_progress(), Fixed::ZERO);
        assert_eq!(site.deliver(Resource::Stone, 1), 1);
        assert_eq!(site.max_progress(), Fixed::from_num(50));
        assert_eq!(site.deliver(Resource::Stone, 5), 1);
        assert_eq!(site.deliver(Resource::Wood, 1), 0);
        assert_eq!(site.max_progress(), HUNDRED);
    }

    #[test]
    fn test_building_site_creates_under_construction_building() {
        let mut ctx = context();
        // Mill is 3x2 with the door at (1, 1): origin (5, 6) puts the door on (6, 7)
        let id = create_site(&mut ctx, ConstructionRequest::building(BuildingKind::Mill, Tile::new(5, 6)))
            .unwrap();
        let site = ctx.sites.get(id).unwrap();
        assert_eq!(site.entry_point, Some(Tile::new(6, 7)));
        assert_eq!(site.required[Resource::Stone], 3);
        assert_eq!(site.required[Resource::Wood], 4);

        let building = ctx.settlement.building(site.building.unwrap()).unwrap();
        assert!(!building.is_complete());
        assert!(ctx.grid.is_road(Tile::new(6, 7)));
        assert!(ctx.grid.get_cell(Tile::new(5, 6)).unwrap().being_built);
        assert!(!ctx.grid.get_cell(Tile::new(6, 7)).unwrap().being_built);
    }

    #[test]
    fn test_site_without_road_is_refused() {
        let mut ctx = context();
        let before = ctx.grid.clone();
        let err = create_site(&mut ctx, ConstructionRequest::building(BuildingKind::Mill, Tile::new(5, 2)));
        assert!(matches!(err, Err(SimError::NoAdjacentRoad { .. })));
        assert_eq!(ctx.grid, before);
        assert!(ctx.sites.is_empty());
        assert_eq!(ctx.settlement.buildings().count(), 0);

        let err = create_site(&mut ctx, ConstructionRequest::road(Tile::new(5, 3)));
        assert!(matches!(err, Err(SimError::NoAdjacentRoad { x: 5, y: 3 })));
    }

    #[test]
    fn test_road_site_cost_and_entry() {
        let mut ctx = context();
        let id = create_site(&mut ctx, ConstructionRequest::road(Tile::new(5, 9))).unwrap();
        let site = ctx.sites.get(id).unwrap();
        assert_eq!(site.required, Stock::new().with(Resource::Stone, 1));
        // Search order is below, right, left, above: only above is a road
        assert_eq!(site.entry_point, Some(Tile::new(5, 8)));

        let err = create_site(&mut ctx, ConstructionRequest::road(Tile::new(5, 8)));
        assert!(matches!(err, Err(SimError::Blocked { x: 5, y: 8 })));
    }

    #[test]
    fn test_builder_assignment_and_progress() {
        let mut ctx = context();
        let builder = ctx.spawn_agent(AgentKind::Builder, Tile::new(1, 8));
        let id = create_site(&mut ctx, ConstructionRequest {
            kind: ConstructionKind::Field,
            origin: Tile::new(4, 9),
        })
        .unwrap();

        let events = update(&mut ctx, 1000);
        assert!(matches!(events[..], [SimEvent::JobCreated { .. }]));
        assert_eq!(ctx.sites.get(id).unwrap().status, SiteStatus::WaitingBuilder);
        // A second pass does not create another job
        assert!(update(&mut ctx, 1000).is_empty());

        assert!(ctx.sites.on_builder_arrived(id, builder));
        ctx.settlement.agent_mut(builder).unwrap().claim();

        // Fields need no materials: 20%/s, done after 5 s
        for _ in 0..4 {
            assert!(update(&mut ctx, 1000).is_empty());
        }
        assert_eq!(ctx.sites.get(id).unwrap().progress, Fixed::from_num(80));
        let events = update(&mut ctx, 1000);
        assert!(matches!(events[..], [SimEvent::ConstructionCompleted { building: None, .. }]));
        assert!(ctx.sites.is_empty());
        assert!(ctx.jobs.is_empty());
        assert_eq!(ctx.settlement.fields, vec![Tile::new(4, 9)]);
        assert!(ctx.settlement.agent(builder).unwrap().is_idle());
        assert!(ctx.grid.get_cell(Tile::new(4, 9)).unwrap().blocked_building);
        assert!(!ctx.grid.get_cell(Tile::new(4, 9)).unwrap().being_built);
    }

    #[test]
    fn test_progress_capped_by_materials() {
        let mut ctx = context();
        let builder = ctx.spawn_agent(AgentKind::Builder, Tile::new(1, 8));
        let id = create_site(&mut ctx, ConstructionRequest::road(Tile::new(6, 9))).unwrap();
        update(&mut ctx, 0);
        ctx.sites.on_builder_arrived(id, builder);

        update(&mut ctx, 10_000);
        assert_eq!(ctx.sites.get(id).unwrap().progress, Fixed::ZERO);

        ctx.sites.deliver_resource(id, Resource::Stone, 1);
        let events = update(&mut ctx, 10_000);
        assert!(matches!(events[..], [SimEvent::ConstructionCompleted { .. }]));
        assert!(ctx.grid.is_road(Tile::new(6, 9)));
        assert!(ctx.settlement.roads.contains(&Tile::new(6, 9)));
    }
}
