//! Timed production cycles for buildings with a recipe.
//!
//! A cycle starts when every input is in stock and no output is at
//! capacity. Inputs are debited and outputs credited only when the cycle
//! finishes; the credit is not clamped to capacity (collection enforces
//! capacity instead).

use crate::catalog::{BuildingCatalog, BuildingInfo, Recipe};
use crate::config::SimConfig;
use crate::events::SimEvent;
use crate::resources::{Resource, Stock};
use crate::settlement::Settlement;

/// Effective capacity of `resource` in a building of this type.
#[must_use]
pub fn capacity(info: &BuildingInfo, resource: Resource, config: &SimConfig) -> u32 {
    info.max_stock(resource).unwrap_or(config.default_max_stock)
}

/// Whether any recipe output is at or above capacity.
#[must_use]
pub fn output_blocked(
    stock: &Stock,
    info: &BuildingInfo,
    recipe: &Recipe,
    config: &SimConfig,
) -> bool {
    recipe
        .output
        .iter_set()
        .any(|(resource, _)| stock[resource] >= capacity(info, resource, config))
}

/// Advance production in every completed building by `delta_ms`.
///
/// # Returns
///
/// Start, completion and cancellation events in building-id order.
pub fn production_system(
    settlement: &mut Settlement,
    catalog: &BuildingCatalog,
    config: &SimConfig,
    delta_ms: u32,
) -> Vec<SimEvent> {
    let mut events = Vec::new();

    for building in settlement.buildings_mut() {
        if !building.is_complete() {
            continue;
        }
        let Some(info) = catalog.get(building.kind) else {
            continue;
        };
        let Some(recipe) = info.recipe.as_ref() else {
            continue;
        };

        if building.generating {
            building.generation_elapsed_ms = building.generation_elapsed_ms.saturating_add(delta_ms);
            if building.generation_elapsed_ms < recipe.duration_ms {
                continue;
            }
            building.generating = false;
            building.generation_elapsed_ms = 0;

            if !building.stock.covers(&recipe.input) {
                tracing::debug!(building = %building.id, "production cancelled, inputs gone");
                events.push(SimEvent::ProductionCancelled {
                    building: building.id,
                });
                continue;
            }
            for (resource, amount) in recipe.input.iter_set() {
                building.stock.take(resource, amount);
            }
            for (resource, amount) in recipe.output.iter_set() {
                building.stock.add(resource, amount);
            }
            tracing::debug!(building = %building.id, kind = %building.kind, "production completed");
            events.push(SimEvent::ProductionCompleted {
                building: building.id,
            });
        } else if building.stock.covers(&recipe.input)
            && !output_blocked(&building.stock, info, recipe, config)
        {
            building.generating = true;
            building.generation_elapsed_ms = 0;
            events.push(SimEvent::ProductionStarted {
                building: building.id,
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::Building;
    use crate::catalog::BuildingKind;
    use crate::grid::Tile;

    fn setup(kind: BuildingKind, stock: Stock) -> (Settlement, BuildingCatalog) {
        let catalog = BuildingCatalog::standard();
        let mut settlement = Settlement::new();
        let id = settlement.next_building_id();
        settlement.add_building(Building::new(id, kind, Tile::new(2, 2), 350).with_stock(stock));
        (settlement, catalog)
    }

    fn only(settlement: &Settlement) -> &Building {
        settlement.buildings().next().unwrap()
    }

    #[test]
    fn test_mill_cycle() {
        let (mut settlement, catalog) = setup(BuildingKind::Mill, Stock::new().with(Resource::Corn, 1));
        let config = SimConfig::default();

        let events = production_system(&mut settlement, &catalog, &config, 50);
        assert!(matches!(events[..], [SimEvent::ProductionStarted { .. }]));
        assert!(only(&settlement).generating);
        // Inputs stay until the cycle finishes
        assert_eq!(only(&settlement).stock[Resource::Corn], 1);

        let events = production_system(&mut settlement, &catalog, &config, 3999);
        assert!(events.is_empty());

        let events = production_system(&mut settlement, &catalog, &config, 1);
        assert!(matches!(events[..], [SimEvent::ProductionCompleted { .. }]));
        let mill = only(&settlement);
        assert!(!mill.generating);
        assert_eq!(mill.stock[Resource::Corn], 0);
        assert_eq!(mill.stock[Resource::Flour], 1);
    }

    #[test]
    fn test_no_start_without_inputs() {
        let (mut settlement, catalog) = setup(BuildingKind::Mill, Stock::new());
        let events = production_system(&mut settlement, &catalog, &SimConfig::default(), 1000);
        assert!(events.is_empty());
        assert!(!only(&settlement).generating);
    }

    #[test]
    fn test_raw_producer_blocks_at_capacity() {
        let (mut settlement, catalog) =
            setup(BuildingKind::Quarry, Stock::new().with(Resource::Stone, 8));
        let events = production_system(&mut settlement, &catalog, &SimConfig::default(), 1000);
        assert!(events.is_empty());

        settlement.buildings_mut().next().unwrap().stock[Resource::Stone] = 7;
        let events = production_system(&mut settlement, &catalog, &SimConfig::default(), 1000);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_cancel_when_inputs_vanish() {
        let (mut settlement, catalog) = setup(BuildingKind::Mill, Stock::new().with(Resource::Corn, 1));
        let config = SimConfig::default();
        production_system(&mut settlement, &catalog, &config, 0);

        settlement.buildings_mut().next().unwrap().stock[Resource::Corn] = 0;
        let events = production_system(&mut settlement, &catalog, &config, 4000);
        assert!(matches!(events[..], [SimEvent::ProductionCancelled { .. }]));
        assert_eq!(only(&settlement).stock[Resource::Flour], 0);
    }

    #[test]
    fn test_under_construction_is_idle() {
        let catalog = BuildingCatalog::standard();
        let mut settlement = Settlement::new();
        let id = settlement.next_building_id();
        settlement.add_building(
            Building::new(id, BuildingKind::Quarry, Tile::new(2, 2), 250).under_construction(),
        );
        let events = production_system(&mut settlement, &catalog, &SimConfig::default(), 1000);
        assert!(events.is_empty());
    }

    #[test]
    fn test_output_credit_is_unclamped() {
        let (mut settlement, catalog) =
            setup(BuildingKind::Quarry, Stock::new().with(Resource::Stone, 7));
        let config = SimConfig::default();
        production_system(&mut settlement, &catalog, &config, 0);
        // Top the stock up to capacity mid-cycle
        settlement.buildings_mut().next().unwrap().stock[Resource::Stone] = 8;
        production_system(&mut settlement, &catalog, &config, 5000);
        assert_eq!(only(&settlement).stock[Resource::Stone], 9);
    }
}
