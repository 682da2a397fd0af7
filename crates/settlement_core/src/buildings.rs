//! Buildings and footprint placement on the grid.
//!
//! Placement stamps three things:
//! 1. The footprint's bounding box is blocked for roads and buildings
//! 2. A one-tile ring around it is blocked for buildings
//! 3. The door tile becomes a road
//!
//! The standing position for pickups and deliveries is the road next to
//! the door (the entry point).

use serde::{Deserialize, Serialize};

use crate::catalog::{BuildingInfo, BuildingKind, Footprint};
use crate::error::{Result, SimError};
use crate::grid::{Grid, Tile};
use crate::ids::BuildingId;
use crate::math::{option_fixed_serde, Fixed};
use crate::resources::Stock;

/// A building owned by the settlement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Building {
    /// Identifier.
    pub id: BuildingId,
    /// Building type.
    pub kind: BuildingKind,
    /// Top-left tile of the footprint.
    pub origin: Tile,
    /// Stock ledger.
    pub stock: Stock,
    /// Current health.
    pub health: u32,
    /// Construction progress in percent, `Some` while under construction.
    #[serde(with = "option_fixed_serde")]
    pub construction: Option<Fixed>,
    /// A production cycle is running.
    pub generating: bool,
    /// Time spent in the running production cycle.
    pub generation_elapsed_ms: u32,
}

impl Building {
    /// Create a finished building with empty stock.
    #[must_use]
    pub fn new(id: BuildingId, kind: BuildingKind, origin: Tile, health: u32) -> Self {
        Self {
            id,
            kind,
            origin,
            stock: Stock::new(),
            health,
            construction: None,
            generating: false,
            generation_elapsed_ms: 0,
        }
    }

    /// Same building, marked as under construction at zero progress.
    #[must_use]
    pub fn under_construction(mut self) -> Self {
        self.construction = Some(Fixed::ZERO);
        self
    }

    /// Same building with an initial stock.
    #[must_use]
    pub fn with_stock(mut self, stock: Stock) -> Self {
        self.stock = stock;
        self
    }

    /// Whether construction has finished.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.construction.is_none()
    }

    /// Absolute door tile, if the footprint has one.
    #[must_use]
    pub fn door(&self, footprint: &Footprint) -> Option<Tile> {
        door_tile(self.origin, footprint)
    }
}

/// Absolute door tile for a footprint placed at `origin`.
#[must_use]
pub fn door_tile(origin: Tile, footprint: &Footprint) -> Option<Tile> {
    let (dx, dy) = footprint.door()?;
    Some(Tile::new(origin.x.checked_add(dx)?, origin.y.checked_add(dy)?))
}

/// Road tile next to the door of a footprint at `origin`.
#[must_use]
pub fn entry_point(grid: &Grid, origin: Tile, footprint: &Footprint) -> Option<Tile> {
    grid.adjacent_road(door_tile(origin, footprint)?)
}

/// Check that a footprint fits at `origin`.
///
/// # Errors
///
/// Returns [`SimError::OutOfBounds`] for the first tile outside the grid and
/// [`SimError::Blocked`] for the first tile that is blocked for building,
/// carries a road or is reserved.
pub fn can_place_building(grid: &Grid, origin: Tile, footprint: &Footprint) -> Result<()> {
    for (dx, dy) in footprint.offsets() {
        let x = origin.x.saturating_add(dx);
        let y = origin.y.saturating_add(dy);
        let Some(cell) = grid.get_cell(Tile::new(x, y)) else {
            return Err(SimError::OutOfBounds { x, y });
        };
        if cell.blocked_building || cell.is_road || cell.being_built {
            return Err(SimError::Blocked { x, y });
        }
    }
    Ok(())
}

/// Validate and stamp a building footprint, returning the door tile.
///
/// Nothing is written unless every check passes.
///
/// # Errors
///
/// Returns [`SimError::MissingDoor`] when the pattern has no door, or the
/// error from [`can_place_building`].
pub fn place_building(
    grid: &mut Grid,
    kind: BuildingKind,
    info: &BuildingInfo,
    origin: Tile,
) -> Result<Tile> {
    let footprint = &info.footprint;
    let door = door_tile(origin, footprint).ok_or(SimError::MissingDoor(kind))?;
    can_place_building(grid, origin, footprint)?;

    for tile in footprint.tiles(origin) {
        grid.block(tile);
    }
    for tile in ring(origin, footprint) {
        if let Some(cell) = grid.cell_mut(tile) {
            cell.blocked_building = true;
        }
    }
    if let Some(cell) = grid.cell_mut(door) {
        cell.is_road = true;
    }

    Ok(door)
}

/// Tiles in the one-tile ring around a footprint, clipped at the top/left edge.
fn ring(origin: Tile, footprint: &Footprint) -> impl Iterator<Item = Tile> {
    let width = i64::from(footprint.width());
    let height = i64::from(footprint.height());
    (-1..=height).flat_map(move |dy| {
        (-1..=width).filter_map(move |dx| {
            let inside = (0..width).contains(&dx) && (0..height).contains(&dy);
            if inside {
                return None;
            }
            let x = u32::try_from(i64::from(origin.x) + dx).ok()?;
            let y = u32::try_from(i64::from(origin.y) + dy).ok()?;
            Some(Tile::new(x, y))
        })
    })
}
