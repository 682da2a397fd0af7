//! Tile grid with per-cell placement and traversal flags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer tile coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Tile {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl Tile {
    /// Create a tile coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Tile at `(x + dx, y + dy)`, or `None` if it would be negative or overflow.
    #[must_use]
    pub fn offset(self, dx: i32, dy: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }

    /// Chebyshev (king-move) distance.
    #[must_use]
    pub const fn chebyshev(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy {
            dx
        } else {
            dy
        }
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(u32, u32)> for Tile {
    fn from((x, y): (u32, u32)) -> Self {
        Self::new(x, y)
    }
}

/// Flags for a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Tile carries a road.
    pub is_road: bool,
    /// Buildings may not be placed here.
    pub blocked_building: bool,
    /// Roads may not be placed here.
    pub blocked_road: bool,
    /// Reserved by an unfinished construction site.
    pub being_built: bool,
}

/// Adjacent-road search order: below, right, left, above.
pub const ROAD_SEARCH_ORDER: [(i32, i32); 4] = [(0, 1), (1, 0), (-1, 0), (0, -1)];

/// Fixed-size grid of cells, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create a grid whose border cells are blocked for building.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0, "Grid width must be positive");
        assert!(height > 0, "Grid height must be positive");

        let mut grid = Self {
            width,
            height,
            cells: vec![Cell::default(); (width as usize) * (height as usize)],
        };
        for y in 0..height {
            for x in 0..width {
                if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    grid.cells[(y as usize) * (width as usize) + (x as usize)].blocked_building =
                        true;
                }
            }
        }
        grid
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, tile: Tile) -> Option<usize> {
        self.in_bounds(tile)
            .then(|| (tile.y as usize) * (self.width as usize) + (tile.x as usize))
    }

    /// Check if a tile lies inside the grid.
    #[must_use]
    pub const fn in_bounds(&self, tile: Tile) -> bool {
        tile.x < self.width && tile.y < self.height
    }

    /// Cell at `tile`, `None` if out of bounds.
    #[must_use]
    pub fn get_cell(&self, tile: Tile) -> Option<&Cell> {
        self.index(tile).map(|i| &self.cells[i])
    }

    /// Mutable cell at `tile`, `None` if out of bounds.
    pub fn cell_mut(&mut self, tile: Tile) -> Option<&mut Cell> {
        self.index(tile).map(move |i| &mut self.cells[i])
    }

    /// Check if `tile` carries a road.
    #[must_use]
    pub fn is_road(&self, tile: Tile) -> bool {
        self.get_cell(tile).is_some_and(|c| c.is_road)
    }

    /// Place a road on `tile`.
    ///
    /// Returns `false` (and changes nothing) if the tile is out of bounds or
    /// already blocked for roads.
    pub fn place_road(&mut self, tile: Tile) -> bool {
        match self.cell_mut(tile) {
            Some(cell) if !cell.blocked_road => {
                cell.is_road = true;
                cell.blocked_road = true;
                true
            }
            _ => false,
        }
    }

    /// Set or clear the being-built reservation on `tile`.
    pub fn set_being_built(&mut self, tile: Tile, reserved: bool) {
        if let Some(cell) = self.cell_mut(tile) {
            cell.being_built = reserved;
        }
    }

    /// Mark `tile` as blocked for roads and building (fields, vines).
    pub fn block(&mut self, tile: Tile) {
        if let Some(cell) = self.cell_mut(tile) {
            cell.blocked_road = true;
            cell.blocked_building = true;
        }
    }

    /// First road tile next to `tile`, searched below, right, left, above.
    #[must_use]
    pub fn adjacent_road(&self, tile: Tile) -> Option<Tile> {
        ROAD_SEARCH_ORDER
            .iter()
            .filter_map(|&(dx, dy)| tile.offset(dx, dy))
            .find(|&t| self.is_road(t))
    }

    /// Iterate over every `(tile, cell)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Tile, &Cell)> + '_ {
        let width = self.width as usize;
        self.cells.iter().enumerate().map(move |(i, cell)| {
            // Both parts are bounded by the u32 dimensions.
            #[allow(clippy::cast_possible_truncation)]
            let tile = Tile::new((i % width) as u32, (i / width) as u32);
            (tile, cell)
        })
    }
}

impl Default for Grid {
    /// A 64x64 grid.
    fn default() -> Self {
        Self::new(64, 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_blocked_for_building() {
        let grid = Grid::new(5, 4);
        for (tile, cell) in grid.iter() {
            let border = tile.x == 0 || tile.y == 0 || tile.x == 4 || tile.y == 3;
            assert_eq!(cell.blocked_building, border, "{tile}");
            assert!(!cell.is_road);
        }
    }

    #[test]
    fn test_place_road() {
        let mut grid = Grid::new(5, 5);
        let tile = Tile::new(2, 2);
        assert!(grid.place_road(tile));
        let cell = grid.get_cell(tile).unwrap();
        assert!(cell.is_road && cell.blocked_road);
        assert!(!cell.blocked_building);

        // Second placement refused
        assert!(!grid.place_road(tile));
        assert!(!grid.place_road(Tile::new(9, 9)));
    }

    #[test]
    fn test_adjacent_road_prefers_below() {
        let mut grid = Grid::new(6, 6);
        grid.place_road(Tile::new(3, 2)); // right of (2, 2)
        grid.place_road(Tile::new(2, 3)); // below
        assert_eq!(grid.adjacent_road(Tile::new(2, 2)), Some(Tile::new(2, 3)));
        assert_eq!(grid.adjacent_road(Tile::new(4, 4)), None);
    }

    #[test]
    fn test_offset_rejects_negative() {
        assert_eq!(Tile::new(0, 3).offset(-1, 0), None);
        assert_eq!(Tile::new(1, 3).offset(-1, 1), Some(Tile::new(0, 4)));
    }

    #[test]
    fn test_chebyshev() {
        assert_eq!(Tile::new(0, 0).chebyshev(Tile::new(3, 1)), 3);
        assert_eq!(Tile::new(2, 5).chebyshev(Tile::new(2, 5)), 0);
    }
}
