//! Test fixtures and helpers.
//!
//! Villages are laid out along a single east-west road. Every building is
//! placed with its door directly above the road, so each one has an entry
//! point as soon as it exists.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};
use settlement_core::prelude::*;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// A building in a [`VillageLayout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedBuilding {
    /// Building type.
    pub kind: BuildingKind,
    /// Left edge of the footprint.
    pub x: u32,
    /// Initial stock.
    #[serde(default)]
    pub stock: Stock,
}

/// An agent in a [`VillageLayout`], standing on the road.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedAgent {
    /// Agent class.
    pub kind: AgentKind,
    /// Column on the road.
    pub x: u32,
}

/// A one-street village.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VillageLayout {
    /// Grid width.
    pub width: u32,
    /// Grid height.
    pub height: u32,
    /// Row of the street.
    pub road_row: u32,
    /// Buildings, left to right.
    pub buildings: Vec<PlacedBuilding>,
    /// Agents.
    pub agents: Vec<PlacedAgent>,
}

/// Storehouse, farm, mill, bakery and inn with two servants and a builder.
pub const BREAD_VILLAGE: &str = r"(
    width: 40,
    height: 12,
    road_row: 8,
    buildings: [
        (kind: storehouse, x: 2, stock: { stone: 4, wood: 6, corn: 2 }),
        (kind: farm, x: 7, stock: { corn: 2 }),
        (kind: mill, x: 13),
        (kind: bakery, x: 18),
        (kind: inn, x: 23),
    ],
    agents: [
        (kind: servant, x: 6),
        (kind: servant, x: 12),
        (kind: builder, x: 30),
    ],
)";

impl VillageLayout {
    /// Parse a layout from RON.
    ///
    /// # Panics
    ///
    /// Panics on malformed RON; layouts are test data.
    #[must_use]
    pub fn from_ron(src: &str) -> Self {
        ron::from_str(src).expect("village layout should be valid RON")
    }

    /// Build the context: street first, then buildings, then agents.
    ///
    /// # Panics
    ///
    /// Panics when a building does not fit.
    #[must_use]
    pub fn build(&self) -> SimContext {
        let mut ctx = SimContext::with_size(self.width, self.height);
        road_row(&mut ctx, self.road_row, 1, self.width - 1);
        for placed in &self.buildings {
            let id = along_road(&mut ctx, placed.kind, placed.x, self.road_row);
            if let Some(building) = ctx.settlement.building_mut(id) {
                building.stock = placed.stock;
            }
        }
        for agent in &self.agents {
            ctx.spawn_agent(agent.kind, Tile::new(agent.x, self.road_row));
        }
        tracing::debug!(
            buildings = self.buildings.len(),
            agents = self.agents.len(),
            "village fixture built"
        );
        ctx
    }
}

/// Place road tiles on row `y` for columns `from..to`.
pub fn road_row(ctx: &mut SimContext, y: u32, from: u32, to: u32) {
    for x in from..to {
        ctx.place_road(Tile::new(x, y));
    }
}

/// Place a finished building whose door sits just above the road on `road_y`.
///
/// # Panics
///
/// Panics when the kind has no door or the footprint does not fit.
pub fn along_road(ctx: &mut SimContext, kind: BuildingKind, x: u32, road_y: u32) -> BuildingId {
    let (_, door_dy) = ctx
        .catalog
        .get(kind)
        .and_then(|info| info.footprint.door())
        .expect("fixture building should have a door");
    let origin = Tile::new(x, road_y - 1 - door_dy);
    ctx.spawn_building(kind, origin)
        .unwrap_or_else(|e| panic!("cannot place {kind} at {origin}: {e}"))
}

/// The bread village as a ready simulation.
#[must_use]
pub fn bread_village() -> Simulation {
    Simulation::from_context(VillageLayout::from_ron(BREAD_VILLAGE).build())
}

/// One tick followed by one mover step.
pub fn step(sim: &mut Simulation) -> Vec<SimEvent> {
    let mut events = sim.tick(TICK_DURATION_MS);
    events.extend(TileStepper::default().step(sim));
    events
}

/// Run `ticks` steps and collect every event.
pub fn run_steps(sim: &mut Simulation, ticks: u32) -> Vec<SimEvent> {
    (0..ticks).flat_map(|_| step(sim)).collect()
}

/// Find a building id by kind.
///
/// # Panics
///
/// Panics if no such building exists.
#[must_use]
pub fn building_of(ctx: &SimContext, kind: BuildingKind) -> BuildingId {
    ctx.settlement
        .buildings()
        .find(|b| b.kind == kind)
        .map(|b| b.id)
        .unwrap_or_else(|| panic!("no {kind} in fixture"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bread_village_entries() {
        let mut ctx = VillageLayout::from_ron(BREAD_VILLAGE).build();
        let ids: Vec<_> = ctx.settlement.buildings().map(|b| b.id).collect();
        assert_eq!(ids.len(), 5);
        for id in ids {
            let entry = ctx.building_entry(id).expect("every building has an entry");
            assert_eq!(entry.y, 8);
        }
        assert_eq!(ctx.settlement.agents().count(), 3);
        let depot = building_of(&ctx, BuildingKind::Storehouse);
        assert_eq!(ctx.settlement.depot_id(), Some(depot));
        assert_eq!(
            ctx.settlement.building(depot).unwrap().stock[Resource::Wood],
            6
        );
    }

    #[test]
    fn test_fixed_helper() {
        assert_eq!(fixed(3), I32F32::from_num(3));
    }
}
