//! Grid-based pathfinding using A* algorithm.
//!
//! All costs use fixed-point math so the same grid, endpoints and policy
//! always give the same path on every platform.
//!
//! Walkability depends on the [`MovementPolicy`]:
//!
//! | policy           | walkable tiles                                         |
//! |------------------|--------------------------------------------------------|
//! | `RoadOnly`       | road tiles                                             |
//! | `RoadPreferred`  | roads, plus open tiles not blocked or being built      |
//! | `Free`           | any tile not blocked for building                      |
//!
//! `RoadPreferred` charges [`OFF_ROAD_MULTIPLIER`] for every step onto a
//! non-road tile.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, Grid, Tile};
use crate::math::Fixed;

/// Walkability and cost ruleset for an agent class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPolicy {
    /// Only road tiles.
    #[default]
    RoadOnly,
    /// Roads at normal cost, open terrain at a penalty.
    RoadPreferred,
    /// Anything not blocked for building.
    Free,
}

/// Options for a single path query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PathOptions {
    /// Movement policy.
    pub policy: MovementPolicy,
    /// Accept a being-built destination and let the search approach it
    /// through the footprint buffer around it.
    pub allow_construction_destination: bool,
}

impl PathOptions {
    /// Options for `policy` without construction access.
    #[must_use]
    pub const fn new(policy: MovementPolicy) -> Self {
        Self {
            policy,
            allow_construction_destination: false,
        }
    }

    /// Same options with construction-destination access set.
    #[must_use]
    pub const fn with_construction_destination(mut self, allow: bool) -> Self {
        self.allow_construction_destination = allow;
        self
    }
}

/// Cost of a cardinal step.
pub const CARDINAL_COST: Fixed = Fixed::ONE;

/// Cost of a diagonal step (1.4).
pub const DIAGONAL_COST: Fixed = Fixed::from_bits(0x1_6666_6666);

/// Cost multiplier for off-road steps under [`MovementPolicy::RoadPreferred`] (1.5).
pub const OFF_ROAD_MULTIPLIER: Fixed = Fixed::from_bits(0x1_8000_0000);

/// Step offsets in expansion order: up, down, left, right, then diagonals.
const DIRECTIONS: [(i32, i32); 8] = [
    (0, -1),
    (0, 1),
    (-1, 0),
    (1, 0),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

/// Check if `tile` is walkable under `policy`.
#[must_use]
pub fn is_walkable(grid: &Grid, tile: Tile, policy: MovementPolicy) -> bool {
    grid.get_cell(tile)
        .is_some_and(|cell| cell_walkable(cell, policy))
}

fn cell_walkable(cell: &Cell, policy: MovementPolicy) -> bool {
    match policy {
        MovementPolicy::RoadOnly => cell.is_road,
        MovementPolicy::RoadPreferred => {
            cell.is_road || !(cell.blocked_building || cell.being_built)
        }
        MovementPolicy::Free => !cell.blocked_building,
    }
}

/// Octile distance using the minimum step costs. Never overestimates.
#[must_use]
pub fn octile_heuristic(from: Tile, to: Tile) -> Fixed {
    let dx = from.x.abs_diff(to.x);
    let dy = from.y.abs_diff(to.y);
    let diagonal = dx.min(dy);
    let straight = dx.max(dy) - diagonal;
    DIAGONAL_COST * Fixed::from_num(diagonal) + CARDINAL_COST * Fixed::from_num(straight)
}

/// Per-query walkability rules bound to a grid, goal and options.
#[derive(Debug, Clone, Copy)]
pub struct SearchRules<'a> {
    grid: &'a Grid,
    goal: Tile,
    options: PathOptions,
}

impl<'a> SearchRules<'a> {
    /// Bind rules for a search towards `goal`.
    #[must_use]
    pub const fn new(grid: &'a Grid, goal: Tile, options: PathOptions) -> Self {
        Self {
            grid,
            goal,
            options,
        }
    }

    fn walkable(&self, tile: Tile) -> bool {
        is_walkable(self.grid, tile, self.options.policy)
    }

    /// Lenient standing-position check: roads, reserved tiles and, for
    /// road-preferred agents, any in-bounds tile.
    #[must_use]
    pub fn valid_start(&self, tile: Tile) -> bool {
        let Some(cell) = self.grid.get_cell(tile) else {
            return false;
        };
        cell.is_road
            || cell.being_built
            || self.options.policy == MovementPolicy::RoadPreferred
            || cell_walkable(cell, self.options.policy)
    }

    /// Destination check, which may accept a reserved tile.
    #[must_use]
    pub fn valid_destination(&self, tile: Tile) -> bool {
        let Some(cell) = self.grid.get_cell(tile) else {
            return false;
        };
        if self.options.allow_construction_destination && cell.being_built {
            return true;
        }
        if self.options.policy == MovementPolicy::RoadPreferred {
            return self.valid_start(tile);
        }
        cell_walkable(cell, self.options.policy)
    }

    /// Footprint buffer next to a construction destination: anything except
    /// reserved tiles and non-road tiles blocked for roads.
    fn approachable(&self, tile: Tile) -> bool {
        self.grid
            .get_cell(tile)
            .is_some_and(|cell| !(cell.blocked_road && !cell.is_road) && !cell.being_built)
    }

    fn can_enter(&self, tile: Tile) -> bool {
        if tile == self.goal {
            self.valid_destination(tile)
        } else if self.options.allow_construction_destination && tile.chebyshev(self.goal) <= 1 {
            self.approachable(tile)
        } else {
            self.walkable(tile)
        }
    }

    fn multiplier(&self, tile: Tile) -> Fixed {
        if self.options.policy == MovementPolicy::RoadPreferred && !self.grid.is_road(tile) {
            OFF_ROAD_MULTIPLIER
        } else {
            Fixed::ONE
        }
    }

    /// Cost of stepping from `from` onto `to`, `None` if the step is illegal.
    #[must_use]
    pub fn step_cost(&self, from: Tile, to: Tile) -> Option<Fixed> {
        let dx = i64::from(to.x) - i64::from(from.x);
        let dy = i64::from(to.y) - i64::from(from.y);
        if dx.abs() > 1 || dy.abs() > 1 || (dx == 0 && dy == 0) {
            return None;
        }
        if dx != 0 && dy != 0 {
            // No corner cutting: at least one flanking cardinal must be open.
            let horizontal = Tile::new(to.x, from.y);
            let vertical = Tile::new(from.x, to.y);
            if !self.walkable(horizontal) && !self.walkable(vertical) {
                return None;
            }
        }
        if !self.can_enter(to) {
            return None;
        }
        let base = if dx != 0 && dy != 0 {
            DIAGONAL_COST
        } else {
            CARDINAL_COST
        };
        Some(base * self.multiplier(to))
    }

    /// Legal successors of `tile` with their step costs, in expansion order.
    pub fn neighbors(self, tile: Tile) -> impl Iterator<Item = (Tile, Fixed)> + 'a {
        DIRECTIONS.iter().filter_map(move |&(dx, dy)| {
            let next = tile.offset(dx, dy)?;
            self.step_cost(tile, next).map(|cost| (next, cost))
        })
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AStarNode {
    tile: Tile,
    g_score: Fixed,
    f_score: Fixed,
    /// Insertion order, so equal f-scores pop first-enqueued first.
    seq: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for lowest-f-first.
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find a path from `start` to `goal`.
///
/// The returned path includes both endpoints; `start == goal` yields a
/// single-tile path. Returns `None` when either endpoint fails validation
/// or the goal is unreachable. Callers treat that as "unreachable", not as
/// a fatal error.
#[must_use]
pub fn find_path(grid: &Grid, start: Tile, goal: Tile, options: PathOptions) -> Option<Vec<Tile>> {
    let rules = SearchRules::new(grid, goal, options);
    if !rules.valid_start(start) || !rules.valid_destination(goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<Tile, Tile> = HashMap::new();
    let mut g_score: HashMap<Tile, Fixed> = HashMap::new();
    let mut seq = 0_u64;

    g_score.insert(start, Fixed::ZERO);
    open_set.push(AStarNode {
        tile: start,
        g_score: Fixed::ZERO,
        f_score: octile_heuristic(start, goal),
        seq,
    });

    while let Some(current) = open_set.pop() {
        // Stale entry superseded by a cheaper route
        if g_score
            .get(&current.tile)
            .is_some_and(|&best| current.g_score > best)
        {
            continue;
        }

        if current.tile == goal {
            return Some(reconstruct_path(&came_from, goal));
        }

        for (next, cost) in rules.neighbors(current.tile) {
            let tentative_g = current.g_score + cost;
            let better = g_score
                .get(&next)
                .map_or(true, |&known| tentative_g < known);
            if better {
                came_from.insert(next, current.tile);
                g_score.insert(next, tentative_g);
                seq += 1;
                open_set.push(AStarNode {
                    tile: next,
                    g_score: tentative_g,
                    f_score: tentative_g + octile_heuristic(next, goal),
                    seq,
                });
            }
        }
    }

    None
}

/// Reconstruct path from came_from map.
fn reconstruct_path(came_from: &HashMap<Tile, Tile>, goal: Tile) -> Vec<Tile> {
    let mut path = vec![goal];
    let mut current = goal;

    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}

/// Total cost of walking `path` under `options`, `None` if any step is illegal.
#[must_use]
pub fn path_cost(grid: &Grid, path: &[Tile], options: PathOptions) -> Option<Fixed> {
    let goal = *path.last()?;
    let rules = SearchRules::new(grid, goal, options);
    path.windows(2)
        .try_fold(Fixed::ZERO, |total, step| {
            rules.step_cost(step[0], step[1]).map(|cost| total + cost)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn all_road(width: u32, height: u32) -> Grid {
        let mut grid = Grid::new(width, height);
        for y in 0..height {
            for x in 0..width {
                grid.place_road(Tile::new(x, y));
            }
        }
        grid
    }

    fn road_only() -> PathOptions {
        PathOptions::new(MovementPolicy::RoadOnly)
    }

    fn is_connected(path: &[Tile]) -> bool {
        path.windows(2).all(|w| w[0].chebyshev(w[1]) == 1)
    }

    // =========================================================================
    // Basic Pathfinding
    // =========================================================================

    #[test]
    fn test_diagonal_across_road_grid() {
        let grid = all_road(5, 5);
        let path = find_path(&grid, Tile::new(0, 0), Tile::new(4, 4), road_only()).unwrap();

        assert_eq!(path.len(), 5);
        assert_eq!(path.first(), Some(&Tile::new(0, 0)));
        assert_eq!(path.last(), Some(&Tile::new(4, 4)));
        assert_eq!(
            path_cost(&grid, &path, road_only()),
            Some(DIAGONAL_COST * Fixed::from_num(4))
        );
    }

    #[test]
    fn test_start_equals_goal() {
        let grid = all_road(3, 3);
        let path = find_path(&grid, Tile::new(1, 1), Tile::new(1, 1), road_only()).unwrap();
        assert_eq!(path, vec![Tile::new(1, 1)]);
    }

    #[test]
    fn test_out_of_bounds_endpoints() {
        let grid = all_road(3, 3);
        assert!(find_path(&grid, Tile::new(5, 5), Tile::new(1, 1), road_only()).is_none());
        assert!(find_path(&grid, Tile::new(1, 1), Tile::new(3, 0), road_only()).is_none());
    }

    #[test]
    fn test_road_only_rejects_non_road_goal() {
        let mut grid = Grid::new(5, 5);
        grid.place_road(Tile::new(1, 1));
        assert!(find_path(&grid, Tile::new(1, 1), Tile::new(2, 2), road_only()).is_none());
    }

    #[test]
    fn test_road_only_follows_road() {
        // L-shaped road: along row 1, then down column 3.
        let mut grid = Grid::new(6, 6);
        for x in 1..=3 {
            grid.place_road(Tile::new(x, 1));
        }
        for y in 2..=4 {
            grid.place_road(Tile::new(3, y));
        }
        let path = find_path(&grid, Tile::new(1, 1), Tile::new(3, 4), road_only()).unwrap();
        assert!(path.iter().all(|&t| grid.is_road(t)));
        assert!(is_connected(&path));
    }

    #[test]
    fn test_no_corner_cutting() {
        // Roads at (1,1) and (2,2) touch only diagonally; both flanks are open ground.
        let mut grid = Grid::new(4, 4);
        grid.place_road(Tile::new(1, 1));
        grid.place_road(Tile::new(2, 2));
        assert!(find_path(&grid, Tile::new(1, 1), Tile::new(2, 2), road_only()).is_none());

        // Opening one flank allows the diagonal.
        grid.place_road(Tile::new(2, 1));
        let path = find_path(&grid, Tile::new(1, 1), Tile::new(2, 2), road_only()).unwrap();
        assert_eq!(path, vec![Tile::new(1, 1), Tile::new(2, 2)]);
    }

    #[test]
    fn test_road_preferred_bias() {
        // A road arc beats the straight off-road line (3.8 vs 4.0).
        let mut grid = Grid::new(6, 5);
        for tile in [(1, 3), (2, 2), (3, 2), (4, 3)] {
            grid.place_road(tile.into());
        }
        let options = PathOptions::new(MovementPolicy::RoadPreferred);
        let path = find_path(&grid, Tile::new(1, 3), Tile::new(4, 3), options).unwrap();
        assert_eq!(
            path,
            vec![Tile::new(1, 3), Tile::new(2, 2), Tile::new(3, 2), Tile::new(4, 3)]
        );
        assert_eq!(
            path_cost(&grid, &path, options),
            Some(DIAGONAL_COST + CARDINAL_COST + DIAGONAL_COST)
        );

        // Without the penalty the straight line wins.
        let free = PathOptions::new(MovementPolicy::Free);
        let path = find_path(&grid, Tile::new(1, 3), Tile::new(4, 3), free).unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path_cost(&grid, &path, free), Some(Fixed::from_num(3)));
    }

    #[test]
    fn test_road_preferred_start_off_road() {
        let mut grid = Grid::new(6, 6);
        grid.place_road(Tile::new(3, 3));
        let options = PathOptions::new(MovementPolicy::RoadPreferred);
        // Start on the building-blocked border.
        let path = find_path(&grid, Tile::new(0, 3), Tile::new(3, 3), options);
        assert!(path.is_some());
    }

    #[test]
    fn test_being_built_requires_permission() {
        let mut grid = all_road(5, 3);
        let site = Tile::new(4, 1);
        grid.cell_mut(site).unwrap().is_road = false;
        grid.set_being_built(site, true);

        let plain = PathOptions::new(MovementPolicy::RoadPreferred);
        assert!(find_path(&grid, Tile::new(0, 1), site, plain).is_some());

        let road = PathOptions::new(MovementPolicy::RoadOnly);
        assert!(find_path(&grid, Tile::new(0, 1), site, road).is_none());
        let builder = road.with_construction_destination(true);
        let path = find_path(&grid, Tile::new(0, 1), site, builder).unwrap();
        assert_eq!(path.last(), Some(&site));
    }

    #[test]
    fn test_construction_approach_through_buffer() {
        // Site cut off by a column of building buffer.
        let mut grid = Grid::new(7, 5);
        for x in 1..=3 {
            grid.place_road(Tile::new(x, 2));
        }
        for y in 0..5 {
            grid.cell_mut(Tile::new(4, y)).unwrap().blocked_building = true;
        }
        let buffer = Tile::new(4, 2);
        let site = Tile::new(5, 2);
        grid.set_being_built(site, true);

        let options = PathOptions::new(MovementPolicy::RoadPreferred);
        assert!(find_path(&grid, Tile::new(1, 2), site, options).is_none());

        let builder = options.with_construction_destination(true);
        let path = find_path(&grid, Tile::new(1, 2), site, builder).unwrap();
        assert!(path.contains(&buffer));
    }

    #[test]
    fn test_free_policy_avoids_blocked_building() {
        let mut grid = Grid::new(5, 5);
        for y in 0..5 {
            grid.cell_mut(Tile::new(2, y)).unwrap().blocked_building = true;
        }
        let options = PathOptions::new(MovementPolicy::Free);
        assert!(find_path(&grid, Tile::new(1, 1), Tile::new(3, 1), options).is_none());

        grid.cell_mut(Tile::new(2, 2)).unwrap().blocked_building = false;
        let path = find_path(&grid, Tile::new(1, 1), Tile::new(3, 1), options).unwrap();
        assert!(path.contains(&Tile::new(2, 2)));
    }

    #[test]
    fn test_deterministic_paths() {
        let grid = all_road(8, 8);
        let first = find_path(&grid, Tile::new(0, 7), Tile::new(7, 2), road_only());
        for _ in 0..10 {
            assert_eq!(find_path(&grid, Tile::new(0, 7), Tile::new(7, 2), road_only()), first);
        }
    }

    #[test]
    fn test_heuristic_octile() {
        let h = octile_heuristic(Tile::new(0, 0), Tile::new(3, 1));
        assert_eq!(h, DIAGONAL_COST + Fixed::from_num(2));
    }

    // =========================================================================
    // Property tests
    // =========================================================================

    /// Plain Dijkstra over the same step rules.
    fn dijkstra(grid: &Grid, start: Tile, goal: Tile, options: PathOptions) -> Option<Fixed> {
        let rules = SearchRules::new(grid, goal, options);
        if !rules.valid_start(start) || !rules.valid_destination(goal) {
            return None;
        }
        let mut dist: BTreeMap<Tile, Fixed> = BTreeMap::new();
        let mut done: BTreeSet<Tile> = BTreeSet::new();
        dist.insert(start, Fixed::ZERO);
        loop {
            let (tile, d) = dist
                .iter()
                .filter(|(t, _)| !done.contains(*t))
                .min_by_key(|(_, d)| **d)
                .map(|(t, d)| (*t, *d))?;
            if tile == goal {
                return Some(d);
            }
            done.insert(tile);
            for (n, cost) in rules.neighbors(tile) {
                let candidate = d + cost;
                if dist.get(&n).map_or(true, |&known| candidate < known) {
                    dist.insert(n, candidate);
                }
            }
        }
    }

    fn grid_strategy() -> impl Strategy<Value = (Grid, Tile, Tile, MovementPolicy)> {
        let size = 6_u32;
        (
            prop::collection::vec(0_u8..4, (size * size) as usize),
            (0..size, 0..size),
            (0..size, 0..size),
            prop_oneof![
                Just(MovementPolicy::RoadOnly),
                Just(MovementPolicy::RoadPreferred),
                Just(MovementPolicy::Free),
            ],
        )
            .prop_map(move |(cells, start, goal, policy)| {
                let mut grid = Grid::new(size, size);
                for (i, kind) in cells.into_iter().enumerate() {
                    let i = u32::try_from(i).unwrap();
                    let tile = Tile::new(i % size, i / size);
                    match kind {
                        0 | 1 => {
                            grid.place_road(tile);
                        }
                        2 => grid.cell_mut(tile).unwrap().blocked_building = true,
                        _ => {}
                    }
                }
                (grid, start.into(), goal.into(), policy)
            })
    }

    proptest! {
        #[test]
        fn prop_path_is_valid_and_optimal((grid, start, goal, policy) in grid_strategy()) {
            let options = PathOptions::new(policy);
            let found = find_path(&grid, start, goal, options);
            let best = dijkstra(&grid, start, goal, options);

            prop_assert_eq!(found.is_some(), best.is_some());
            if let Some(path) = found {
                prop_assert_eq!(path.first(), Some(&start));
                prop_assert_eq!(path.last(), Some(&goal));
                prop_assert!(is_connected(&path));
                prop_assert_eq!(path_cost(&grid, &path, options), best);
                if policy == MovementPolicy::RoadOnly {
                    prop_assert!(path.iter().all(|&t| grid.is_road(t)));
                }
            }
        }
    }
}
