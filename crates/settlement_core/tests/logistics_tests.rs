//! End-to-end logistics tests.
//!
//! These drive the full tick loop with the tile stepper and check what an
//! observer of the settlement would see: requests, jobs, stock and events.

use settlement_core::prelude::*;
use settlement_core::requests::scan;
use settlement_test_utils::determinism::strategies;
use settlement_test_utils::fixtures::{bread_village, building_of, road_row, run_steps, step};
use settlement_test_utils::proptest::prelude::*;

// =============================================================================
// Helpers
// =============================================================================

/// 24x10 grid with a street on row 5.
fn street() -> SimContext {
    let mut ctx = SimContext::with_size(24, 10);
    road_row(&mut ctx, 5, 1, 23);
    ctx
}

/// Replace a building's recipe duration so production does not interfere.
fn slow_recipe(ctx: &mut SimContext, kind: BuildingKind) {
    let mut info = ctx.catalog.get(kind).cloned().unwrap();
    if let Some(recipe) = info.recipe.as_mut() {
        recipe.duration_ms = 3_600_000;
    }
    ctx.catalog.insert(kind, info);
}

fn set_stock(ctx: &mut SimContext, id: BuildingId, stock: Stock) {
    ctx.settlement.building_mut(id).unwrap().stock = stock;
}

fn stock_of(sim: &Simulation, id: BuildingId, resource: Resource) -> u32 {
    sim.context().settlement.building(id).unwrap().stock[resource]
}

fn count(events: &[SimEvent], pred: impl Fn(&SimEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

/// Sawmill offering wood 3 and a weapon workshop holding wood 2, one servant.
fn wood_pair() -> (Simulation, BuildingId, BuildingId) {
    let mut ctx = street();
    slow_recipe(&mut ctx, BuildingKind::WeaponWorkshop);
    let sawmill = ctx.spawn_building(BuildingKind::Sawmill, Tile::new(2, 3)).unwrap();
    let workshop = ctx
        .spawn_building(BuildingKind::WeaponWorkshop, Tile::new(10, 3))
        .unwrap();
    set_stock(&mut ctx, sawmill, Stock::new().with(Resource::Wood, 3));
    set_stock(&mut ctx, workshop, Stock::new().with(Resource::Wood, 2));
    ctx.spawn_agent(AgentKind::Servant, Tile::new(6, 5));
    (Simulation::from_context(ctx), sawmill, workshop)
}

// =============================================================================
// Scanner
// =============================================================================

#[test]
fn test_mill_needs_corn_before_offering_flour() {
    let mut ctx = street();
    let mill = ctx.spawn_building(BuildingKind::Mill, Tile::new(4, 3)).unwrap();
    set_stock(&mut ctx, mill, Stock::new().with(Resource::Corn, 1));
    let mut sim = Simulation::from_context(ctx);

    sim.tick(TICK_DURATION_MS);
    let target = Target::Building(mill);
    let corn = sim
        .requests()
        .iter()
        .find(|r| r.target == target && r.resource == Resource::Corn)
        .copied()
        .unwrap();
    assert_eq!(corn.kind, RequestKind::Need);
    assert_eq!(corn.amount, 3);
    assert!(!sim.requests().iter().any(|r| r.resource == Resource::Flour));

    // One 4 s cycle later the flour shows up at the next scan
    for _ in 0..100 {
        sim.tick(TICK_DURATION_MS);
    }
    let flour = sim
        .requests()
        .iter()
        .find(|r| r.resource == Resource::Flour)
        .copied()
        .unwrap();
    assert_eq!(flour.kind, RequestKind::Offer);
    assert_eq!(flour.amount, 1);
    assert_eq!(stock_of(&sim, mill, Resource::Corn), 0);
}

// =============================================================================
// Matching and delivery
// =============================================================================

#[test]
fn test_one_unit_per_cycle_until_delivered() {
    let (mut sim, sawmill, workshop) = wood_pair();

    let mut events = Vec::new();
    let mut first_done = None;
    for tick in 0..200 {
        events.extend(step(&mut sim));
        if events.iter().any(|e| matches!(e, SimEvent::JobCompleted { .. })) {
            first_done = Some(tick);
            break;
        }
    }
    assert!(first_done.is_some(), "first delivery never completed");
    assert_eq!(count(&events, |e| matches!(e, SimEvent::JobCreated { .. })), 1);
    assert_eq!(
        count(&events, |e| matches!(
            e,
            SimEvent::ResourceDelivered { resource: Resource::Wood, amount: 1, .. }
        )),
        1
    );

    // Conservation: exactly one unit moved
    assert_eq!(stock_of(&sim, sawmill, Resource::Wood), 2);
    assert_eq!(stock_of(&sim, workshop, Resource::Wood), 3);

    // Need is still open, so the next cycle creates the next unit's job
    let later = run_steps(&mut sim, 2 * TICK_RATE);
    assert_eq!(count(&later, |e| matches!(e, SimEvent::JobCreated { .. })), 1);
}

#[test]
fn test_arrival_after_completion_is_noop() {
    let (mut sim, sawmill, workshop) = wood_pair();

    let mut finished = None;
    for _ in 0..200 {
        let events = step(&mut sim);
        if let Some(job) = events.iter().find_map(|e| match e {
            SimEvent::JobCompleted { job } => Some(*job),
            _ => None,
        }) {
            finished = Some(job);
            break;
        }
    }
    let job = finished.unwrap();
    let before = (
        stock_of(&sim, sawmill, Resource::Wood),
        stock_of(&sim, workshop, Resource::Wood),
    );

    assert!(sim.on_agent_arrived(job).is_empty());
    assert!(sim.on_agent_arrived(job).is_empty());
    let after = (
        stock_of(&sim, sawmill, Resource::Wood),
        stock_of(&sim, workshop, Resource::Wood),
    );
    assert_eq!(before, after);
}

#[test]
fn test_no_servant_means_job_waits() {
    let mut ctx = street();
    slow_recipe(&mut ctx, BuildingKind::WeaponWorkshop);
    let sawmill = ctx.spawn_building(BuildingKind::Sawmill, Tile::new(2, 3)).unwrap();
    ctx.spawn_building(BuildingKind::WeaponWorkshop, Tile::new(10, 3))
        .unwrap();
    set_stock(&mut ctx, sawmill, Stock::new().with(Resource::Wood, 3));
    let mut sim = Simulation::from_context(ctx);

    let events = run_steps(&mut sim, 3 * TICK_RATE);
    assert_eq!(count(&events, |e| matches!(e, SimEvent::JobCreated { .. })), 1);
    assert!(!events.iter().any(|e| matches!(e, SimEvent::JobAssigned { .. })));
    let job = sim.context().jobs.iter().next().unwrap();
    assert_eq!(job.status, JobStatus::Ready);
    assert_eq!(stock_of(&sim, sawmill, Resource::Wood), 3);
}

#[test]
fn test_bread_village_moves_corn_to_mill() {
    let mut sim = bread_village();
    let mill = building_of(sim.context(), BuildingKind::Mill);

    let events = run_steps(&mut sim, 40 * TICK_RATE);
    let corn_to_mill = count(&events, |e| {
        matches!(
            e,
            SimEvent::ResourceDelivered { target, resource: Resource::Corn, .. }
                if *target == Target::Building(mill)
        )
    });
    assert!(corn_to_mill > 0);
    assert!(events
        .iter()
        .any(|e| matches!(e, SimEvent::ProductionCompleted { building } if *building == mill)));
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_building_site_end_to_end() {
    let mut sim = bread_village();
    let depot = building_of(sim.context(), BuildingKind::Storehouse);
    let stone = stock_of(&sim, depot, Resource::Stone);
    let wood = stock_of(&sim, depot, Resource::Wood);

    // Watchtower: 2x2, door at its bottom-right, just above the street
    let site = sim
        .create_construction_site(ConstructionRequest::building(
            BuildingKind::Watchtower,
            Tile::new(32, 6),
        ))
        .unwrap();
    let building = sim.context().sites.get(site).unwrap().building.unwrap();
    assert!(!sim.context().settlement.building(building).unwrap().is_complete());

    let mut completed = false;
    for _ in 0..3000 {
        let events = step(&mut sim);
        if let Some(s) = sim.context().sites.get(site) {
            assert!(s.progress <= s.max_progress());
        }
        if events
            .iter()
            .any(|e| matches!(e, SimEvent::ConstructionCompleted { site: s, .. } if *s == site))
        {
            completed = true;
            break;
        }
    }

    assert!(completed, "watchtower was never finished");
    let ctx = sim.context();
    assert!(ctx.sites.get(site).is_none());
    assert!(ctx.settlement.building(building).unwrap().is_complete());
    assert_eq!(stock_of(&sim, depot, Resource::Stone), stone - 2);
    assert_eq!(stock_of(&sim, depot, Resource::Wood), wood - 3);
    assert!(ctx.jobs.construction_job(site).is_none());
}

#[test]
fn test_site_without_road_is_refused() {
    let mut sim = bread_village();
    let sites_before = sim.context().sites.len();
    let buildings_before = sim.context().settlement.buildings().count();

    let err = sim
        .create_construction_site(ConstructionRequest::building(
            BuildingKind::Watchtower,
            Tile::new(32, 2),
        ))
        .unwrap_err();
    assert!(matches!(err, SimError::NoAdjacentRoad { .. }));
    assert_eq!(sim.context().sites.len(), sites_before);
    assert_eq!(sim.context().settlement.buildings().count(), buildings_before);
}

// =============================================================================
// Property-based tests
// =============================================================================

/// Mill site on a street with a builder and no transport.
fn supplied_mill_site(stone: u32, wood: u32) -> (Simulation, SiteId) {
    let mut ctx = SimContext::with_size(20, 10);
    road_row(&mut ctx, 5, 1, 19);
    ctx.spawn_agent(AgentKind::Builder, Tile::new(1, 5));
    let mut sim = Simulation::from_context(ctx);
    let site = sim
        .create_construction_site(ConstructionRequest::building(BuildingKind::Mill, Tile::new(8, 3)))
        .unwrap();
    sim.deliver_resource(site, Resource::Stone, stone);
    sim.deliver_resource(site, Resource::Wood, wood);
    (sim, site)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// A mill offers exactly its flour and asks for exactly its corn shortfall.
    #[test]
    fn prop_mill_requests_follow_stock(stock in strategies::arb_stock(4, 10)) {
        let mut ctx = street();
        let mill = ctx.spawn_building(BuildingKind::Mill, Tile::new(3, 3)).unwrap();
        set_stock(&mut ctx, mill, stock);
        let buffer = ctx
            .catalog
            .get(BuildingKind::Mill)
            .unwrap()
            .max_stock(Resource::Corn)
            .unwrap_or(ctx.config.default_input_buffer);

        let requests = scan(&ctx);
        prop_assert!(requests.iter().all(|r| r.target == Target::Building(mill)));
        let offers: Vec<_> = requests
            .iter()
            .filter(|r| !r.is_need())
            .map(|r| (r.resource, r.amount))
            .collect();
        let needs: Vec<_> = requests
            .iter()
            .filter(|r| r.is_need())
            .map(|r| (r.resource, r.amount))
            .collect();

        let flour = stock[Resource::Flour];
        let corn = stock[Resource::Corn];
        prop_assert_eq!(offers, if flour > 0 { vec![(Resource::Flour, flour)] } else { vec![] });
        prop_assert_eq!(needs, if corn < buffer { vec![(Resource::Corn, buffer - corn)] } else { vec![] });
    }

    /// A refused placement leaves map and settlement untouched; an accepted one reserves its footprint.
    #[test]
    fn prop_refused_site_changes_nothing(origin in strategies::arb_inner_tile(24, 10)) {
        let mut sim = Simulation::from_context(street());
        let grid = sim.context().grid.clone();
        let settlement = sim.context().settlement.clone();

        let request = ConstructionRequest::building(BuildingKind::Watchtower, origin);
        match sim.create_construction_site(request) {
            Ok(id) => {
                let ctx = sim.context();
                let site = ctx.sites.get(id).unwrap();
                let building = ctx.settlement.building(site.building.unwrap()).unwrap();
                prop_assert!(!building.is_complete());
                prop_assert!(site
                    .reserved
                    .iter()
                    .all(|&tile| ctx.grid.get_cell(tile).unwrap().being_built));
                prop_assert!(ctx.grid.is_road(site.entry_point.unwrap()));
            }
            Err(_) => {
                prop_assert_eq!(&sim.context().grid, &grid);
                prop_assert_eq!(&sim.context().settlement, &settlement);
                prop_assert!(sim.context().sites.is_empty());
            }
        }
    }

    /// Progress stays under the material ceiling and only a fully supplied site finishes.
    #[test]
    fn prop_progress_never_exceeds_materials(stone in 0u32..=3, wood in 0u32..=4) {
        let (mut sim, site) = supplied_mill_site(stone, wood);
        let mut completed = false;

        for _ in 0..300 {
            let events = step(&mut sim);
            if let Some(s) = sim.context().sites.get(site) {
                prop_assert!(s.progress <= s.max_progress());
                prop_assert!(s.progress <= Fixed::from_num(100));
            }
            completed |= events
                .iter()
                .any(|e| matches!(e, SimEvent::ConstructionCompleted { .. }));
        }

        prop_assert_eq!(completed, stone == 3 && wood == 4);
    }

    /// After every matcher pass, no two active jobs carry the same resource to the same target.
    #[test]
    fn prop_no_duplicate_jobs(
        farm_corn in 0u32..=8,
        mill_flour in 0u32..=8,
        bakery_bread in 0u32..=8,
        depot_corn in 0u32..=6,
    ) {
        let mut sim = bread_village();
        let ctx = sim.context_mut();
        let farm = building_of(ctx, BuildingKind::Farm);
        let mill = building_of(ctx, BuildingKind::Mill);
        let bakery = building_of(ctx, BuildingKind::Bakery);
        let depot = building_of(ctx, BuildingKind::Storehouse);
        ctx.settlement.building_mut(farm).unwrap().stock[Resource::Corn] = farm_corn;
        ctx.settlement.building_mut(mill).unwrap().stock[Resource::Flour] = mill_flour;
        ctx.settlement.building_mut(bakery).unwrap().stock[Resource::Bread] = bakery_bread;
        ctx.settlement.building_mut(depot).unwrap().stock[Resource::Corn] = depot_corn;

        for _ in 0..(20 * TICK_RATE) {
            step(&mut sim);
            prop_assert_eq!(sim.context().jobs.duplicate_target(), None);
        }
    }

    /// Every completed transfer conserves the carried unit.
    #[test]
    fn prop_transfers_conserve_stock(farm_corn in 1u32..=8) {
        let mut sim = bread_village();
        let farm = building_of(sim.context(), BuildingKind::Farm);
        sim.context_mut().settlement.building_mut(farm).unwrap().stock[Resource::Corn] = farm_corn;

        for _ in 0..(15 * TICK_RATE) {
            for event in step(&mut sim) {
                if let SimEvent::PickedUp { amount, .. } = event {
                    prop_assert_eq!(amount, 1);
                }
            }
            // Every unit on the road belongs to exactly one job in delivery
            let carried: u32 = sim
                .context()
                .settlement
                .agents()
                .filter_map(|a| a.carrying)
                .map(|c| c.amount)
                .sum();
            let delivering = sim
                .context()
                .jobs
                .iter()
                .filter(|j| j.status == JobStatus::Delivering)
                .filter_map(Job::cargo)
                .map(|(_, amount)| amount)
                .sum::<u32>();
            prop_assert_eq!(carried, delivering);
        }
    }
}
