//! Core simulation loop.
//!
//! [`SimContext`] owns every store the logistics systems touch and is
//! passed explicitly to each of them. [`Simulation`] wraps it with the
//! tick loop and the external interface (arrival notifications,
//! construction requests).
//!
//! # Determinism
//!
//! - No floating-point math (progress and path costs are fixed-point)
//! - Every store iterates in id order
//! - Same inputs always produce the same events and state hash
//!
//! # Example
//!
//! ```
//! use settlement_core::prelude::*;
//!
//! let mut sim = Simulation::new(Grid::new(16, 16), BuildingCatalog::standard(), SimConfig::default());
//! for x in 1..15 {
//!     sim.context_mut().place_road(Tile::new(x, 8));
//! }
//! sim.context_mut().spawn_agent(AgentKind::Builder, Tile::new(1, 8));
//! let site = sim
//!     .create_construction_site(ConstructionRequest::road(Tile::new(4, 9)))
//!     .unwrap();
//!
//! let events = sim.tick(TICK_DURATION_MS);
//! assert!(events.iter().any(|e| matches!(e, SimEvent::JobCreated { .. })));
//! assert_eq!(sim.get_tick(), 1);
//! # let _ = site;
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::agents::AgentKind;
use crate::behavior;
use crate::buildings::{entry_point, place_building, Building};
use crate::catalog::{BuildingCatalog, BuildingKind};
use crate::config::SimConfig;
use crate::construction::{self, ConstructionRequest, ConstructionStore};
use crate::error::Result;
use crate::events::SimEvent;
use crate::grid::{Grid, Tile};
use crate::ids::{AgentId, BuildingId, JobId, SiteId, Target};
use crate::jobs::{self, JobStore};
use crate::matcher::match_requests;
use crate::movement::MovementStore;
use crate::production::production_system;
use crate::requests::{scan, Request};
use crate::resources::Resource;
use crate::settlement::Settlement;

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// Everything the logistics systems read and write.
#[derive(Debug, Clone)]
pub struct SimContext {
    /// Tile map.
    pub grid: Grid,
    /// Static building table.
    pub catalog: BuildingCatalog,
    /// Tunables.
    pub config: SimConfig,
    /// Buildings, agents, roads, fields and vines.
    pub settlement: Settlement,
    /// Open construction sites.
    pub sites: ConstructionStore,
    /// Active jobs.
    pub jobs: JobStore,
    /// Agents in transit.
    pub movements: MovementStore,
    entry_points: HashMap<BuildingId, Tile>,
}

impl SimContext {
    /// Create a context with an empty settlement.
    #[must_use]
    pub fn new(grid: Grid, catalog: BuildingCatalog, config: SimConfig) -> Self {
        Self {
            grid,
            catalog,
            config,
            settlement: Settlement::new(),
            sites: ConstructionStore::new(),
            jobs: JobStore::new(),
            movements: MovementStore::new(),
            entry_points: HashMap::new(),
        }
    }

    /// Context on an empty `width x height` grid with the standard catalog.
    #[must_use]
    pub fn with_size(width: u32, height: u32) -> Self {
        Self::new(
            Grid::new(width, height),
            BuildingCatalog::standard(),
            SimConfig::default(),
        )
    }

    /// Entry point of a building, cached until the next road or building change.
    pub fn building_entry(&mut self, id: BuildingId) -> Option<Tile> {
        if let Some(&tile) = self.entry_points.get(&id) {
            return Some(tile);
        }
        let building = self.settlement.building(id)?;
        let info = self.catalog.get(building.kind)?;
        let tile = entry_point(&self.grid, building.origin, &info.footprint)?;
        self.entry_points.insert(id, tile);
        Some(tile)
    }

    /// Standing tile for deliveries to `target`.
    pub fn target_entry(&mut self, target: Target) -> Option<Tile> {
        match target {
            Target::Building(id) => self.building_entry(id),
            Target::Site(id) => self.sites.get(id)?.entry_point,
        }
    }

    /// Forget every cached entry point.
    pub fn invalidate_entry_points(&mut self) {
        self.entry_points.clear();
    }

    /// Place a finished road tile and record it.
    ///
    /// Returns `false` if the tile cannot take a road.
    pub fn place_road(&mut self, tile: Tile) -> bool {
        if !self.grid.place_road(tile) {
            return false;
        }
        self.settlement.roads.push(tile);
        self.invalidate_entry_points();
        true
    }

    /// Place a finished building with empty stock.
    ///
    /// # Errors
    ///
    /// Fails like [`place_building`] or when the catalog lacks `kind`.
    pub fn spawn_building(&mut self, kind: BuildingKind, origin: Tile) -> Result<BuildingId> {
        let info = self.catalog.lookup(kind)?;
        let door = place_building(&mut self.grid, kind, info, origin)?;
        let health = info.health;
        self.settlement.roads.push(door);

        let id = self.settlement.next_building_id();
        self.settlement
            .add_building(Building::new(id, kind, origin, health));
        self.invalidate_entry_points();
        Ok(id)
    }

    /// Spawn an idle agent.
    pub fn spawn_agent(&mut self, kind: AgentKind, position: Tile) -> AgentId {
        self.settlement.spawn_agent(kind, position)
    }
}

/// The main simulation state.
#[derive(Debug, Clone)]
pub struct Simulation {
    ctx: SimContext,
    requests: Vec<Request>,
    tick: u64,
    since_logistics_ms: u32,
}

impl Simulation {
    /// Create a simulation on `grid`.
    ///
    /// The first tick runs the logistics pass immediately.
    #[must_use]
    pub fn new(grid: Grid, catalog: BuildingCatalog, config: SimConfig) -> Self {
        Self::from_context(SimContext::new(grid, catalog, config))
    }

    /// Wrap a prepared context.
    #[must_use]
    pub fn from_context(ctx: SimContext) -> Self {
        let since_logistics_ms = ctx.config.logistics_interval_ms;
        Self {
            ctx,
            requests: Vec::new(),
            tick: 0,
            since_logistics_ms,
        }
    }

    /// Current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Shared state.
    #[must_use]
    pub const fn context(&self) -> &SimContext {
        &self.ctx
    }

    /// Mutable shared state, for setup and external movers.
    pub fn context_mut(&mut self) -> &mut SimContext {
        &mut self.ctx
    }

    /// Requests from the most recent scan.
    #[must_use]
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Advance the simulation by `delta_ms`.
    ///
    /// # System Order
    ///
    /// 1. Production (every tick)
    /// 2. Construction, scan and matching (once per logistics interval)
    /// 3. Dispatch of ready jobs (every tick)
    pub fn tick(&mut self, delta_ms: u32) -> Vec<SimEvent> {
        let mut events = production_system(
            &mut self.ctx.settlement,
            &self.ctx.catalog,
            &self.ctx.config,
            delta_ms,
        );

        self.since_logistics_ms = self.since_logistics_ms.saturating_add(delta_ms);
        if self.since_logistics_ms >= self.ctx.config.logistics_interval_ms {
            let elapsed = std::mem::take(&mut self.since_logistics_ms);
            events.extend(construction::update(&mut self.ctx, elapsed));
            self.requests = scan(&self.ctx);
            events.extend(match_requests(&mut self.ctx, &self.requests));
        }

        events.extend(jobs::dispatch(&mut self.ctx));
        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::trace!(tick = self.tick, state_hash = hash, "simulation state hash");
        }

        events
    }

    /// Report that the agent serving `job` finished its current leg.
    ///
    /// Unknown or already-finished jobs are ignored.
    pub fn on_agent_arrived(&mut self, job: JobId) -> Vec<SimEvent> {
        behavior::on_agent_arrived(&mut self.ctx, job)
    }

    /// Open a construction site.
    ///
    /// # Errors
    ///
    /// See [`construction::create_site`].
    pub fn create_construction_site(&mut self, request: ConstructionRequest) -> Result<SiteId> {
        construction::create_site(&mut self.ctx, request)
    }

    /// Add materials to a site. Returns the accepted amount, `None` for an unknown site.
    pub fn deliver_resource(&mut self, site: SiteId, resource: Resource, amount: u32) -> Option<u32> {
        self.ctx.sites.deliver_resource(site, resource, amount)
    }

    /// Hash of the observable state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.ctx.grid.hash(&mut hasher);
        self.ctx.settlement.hash(&mut hasher);
        self.ctx.sites.hash(&mut hasher);
        self.ctx.jobs.hash(&mut hasher);
        self.ctx.movements.hash(&mut hasher);
        hasher.finish()
    }
}
