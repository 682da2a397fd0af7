//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Sources of non-determinism
//!
//! - **Floating-point math**: progress and path costs use
//!   [`settlement_core::math::Fixed`] instead.
//! - **HashMap iteration order**: every store iterates in id order; the
//!   entry-point cache is never iterated.
//! - **Tie-breaking in search**: the pathfinder breaks f-score ties by
//!   insertion order.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual systems (pathfinding, production, matching)
//! 2. **Property tests**: random stock levels must still replay identically
//! 3. **Integration tests**: full village scenarios are reproducible
//! 4. **Parallel tests**: running N simulations on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use settlement_core::movement::TileStepper;
use settlement_core::simulation::{Simulation, TICK_DURATION_MS};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Advance a simulation one tick and move every agent one tile.
pub fn tick_with_mover(sim: &mut Simulation) {
    sim.tick(TICK_DURATION_MS);
    TileStepper::default().step(sim);
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use settlement_test_utils::determinism::{tick_with_mover, verify_determinism};
/// use settlement_test_utils::fixtures::bread_village;
///
/// let result = verify_determinism(3, 100, bread_village, tick_with_mover, |sim| sim.state_hash());
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a simulation twice with the tile mover and compare final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(2, num_ticks, &setup_fn, tick_with_mover, Simulation::state_hash)
        .is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under different memory
/// layouts (for example hash-map seeds differing per thread).
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        tick_with_mover(&mut sim);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        tick_with_mover(&mut sim1);
        tick_with_mover(&mut sim2);

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for settlement testing.
pub mod strategies {
    use proptest::prelude::*;
    use settlement_core::grid::{Grid, Tile};
    use settlement_core::resources::{Resource, Stock};

    /// Any resource.
    pub fn arb_resource() -> impl Strategy<Value = Resource> {
        proptest::sample::select(Resource::ALL.to_vec())
    }

    /// A sparse stock with up to `max_kinds` resources of at most `max_amount` each.
    pub fn arb_stock(max_kinds: usize, max_amount: u32) -> impl Strategy<Value = Stock> {
        proptest::collection::vec((arb_resource(), 0..=max_amount), 0..=max_kinds)
            .prop_map(|entries| entries.into_iter().collect())
    }

    /// Stock level for a single resource (0..=max).
    pub fn arb_level(max: u32) -> impl Strategy<Value = u32> {
        0..=max
    }

    /// A tile inside a `width x height` grid, off the border.
    pub fn arb_inner_tile(width: u32, height: u32) -> impl Strategy<Value = Tile> {
        (1..width - 1, 1..height - 1).prop_map(|(x, y)| Tile::new(x, y))
    }

    /// A grid with a random road mask over its interior.
    pub fn arb_road_grid(width: u32, height: u32) -> impl Strategy<Value = Grid> {
        let cells = ((width - 2) * (height - 2)) as usize;
        proptest::collection::vec(any::<bool>(), cells).prop_map(move |mask| {
            let mut grid = Grid::new(width, height);
            let inner = width - 2;
            for (i, road) in mask.into_iter().enumerate() {
                if road {
                    let i = u32::try_from(i).unwrap_or(u32::MAX);
                    grid.place_road(Tile::new(1 + i % inner, 1 + i / inner));
                }
            }
            grid
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::bread_village;
    use proptest::prelude::*;
    use settlement_core::prelude::*;

    // =========================================================================
    // Harness tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_unique_hashes_reports_divergence() {
        let result = DeterminismResult {
            is_deterministic: false,
            hashes: vec![3, 1, 3],
            ticks: 1,
        };
        assert_eq!(result.unique_hashes(), vec![1, 3]);
    }

    #[test]
    #[should_panic(expected = "non-deterministic")]
    fn test_assert_deterministic_panics() {
        DeterminismResult {
            is_deterministic: false,
            hashes: vec![1, 2],
            ticks: 1,
        }
        .assert_deterministic();
    }

    // =========================================================================
    // Simulation determinism
    // =========================================================================

    #[test]
    fn test_empty_simulation_determinism() {
        assert!(verify_simulation_determinism(
            || Simulation::from_context(SimContext::with_size(16, 16)),
            100
        ));
    }

    #[test]
    fn test_bread_village_determinism() {
        assert!(verify_simulation_determinism(bread_village, 600));
    }

    #[test]
    fn test_find_divergence_on_deterministic_sim() {
        assert!(find_first_divergence(bread_village, 300).is_none());
    }

    #[test]
    fn test_parallel_village_runs_match() {
        run_parallel_simulations(bread_village, 4, 300).assert_deterministic();
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
    }

    // =========================================================================
    // Property-based tests
    // =========================================================================

    proptest! {
        /// Random farm stock levels replay identically.
        #[test]
        fn prop_random_stock_is_deterministic(corn in strategies::arb_level(8), wood in strategies::arb_level(12)) {
            let setup = move || {
                let mut sim = bread_village();
                let ctx = sim.context_mut();
                let ids: Vec<_> = ctx.settlement.buildings().map(|b| b.id).collect();
                for id in ids {
                    if let Some(b) = ctx.settlement.building_mut(id) {
                        if b.kind == BuildingKind::Farm {
                            b.stock[Resource::Corn] = corn;
                        }
                        if b.kind == BuildingKind::Storehouse {
                            b.stock[Resource::Wood] = wood;
                        }
                    }
                }
                sim
            };
            let result = verify_determinism(2, 200, setup, tick_with_mover, Simulation::state_hash);
            prop_assert!(result.is_deterministic);
        }

        /// Generated road grids keep their border free of roads.
        #[test]
        fn prop_road_grid_respects_border(grid in strategies::arb_road_grid(8, 6)) {
            for x in 0..8 {
                prop_assert!(!grid.is_road(Tile::new(x, 0)));
                prop_assert!(!grid.is_road(Tile::new(x, 5)));
            }
        }
    }
}
