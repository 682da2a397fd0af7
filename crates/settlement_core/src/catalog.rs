//! Static building table: costs, footprints, capacities and recipes.
//!
//! The catalog is read-only during a simulation. [`BuildingCatalog::standard`]
//! provides the built-in table; scenarios may load a replacement from RON.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::grid::Tile;
use crate::resources::{Resource, ResourceMap, Stock};

/// Every building type the settlement can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum BuildingKind {
    School,
    Inn,
    Quarry,
    Woodcutter,
    Sawmill,
    Farm,
    Mill,
    Bakery,
    SwineFarm,
    Butcher,
    Fisherman,
    Vineyard,
    GoldMine,
    CoalMine,
    Metallurgist,
    WeaponWorkshop,
    Tannery,
    ArmoryWorkshop,
    Stables,
    IronMine,
    IronSmithy,
    WeaponSmithy,
    ArmorSmithy,
    Barracks,
    TownHall,
    Storehouse,
    Watchtower,
    SiegeWorkshop,
    Marketplace,
}

impl BuildingKind {
    /// All building kinds in declaration order.
    pub const ALL: [BuildingKind; 29] = [
        Self::School,
        Self::Inn,
        Self::Quarry,
        Self::Woodcutter,
        Self::Sawmill,
        Self::Farm,
        Self::Mill,
        Self::Bakery,
        Self::SwineFarm,
        Self::Butcher,
        Self::Fisherman,
        Self::Vineyard,
        Self::GoldMine,
        Self::CoalMine,
        Self::Metallurgist,
        Self::WeaponWorkshop,
        Self::Tannery,
        Self::ArmoryWorkshop,
        Self::Stables,
        Self::IronMine,
        Self::IronSmithy,
        Self::WeaponSmithy,
        Self::ArmorSmithy,
        Self::Barracks,
        Self::TownHall,
        Self::Storehouse,
        Self::Watchtower,
        Self::SiegeWorkshop,
        Self::Marketplace,
    ];

    /// Whether this kind is the central depot.
    #[must_use]
    pub const fn is_depot(self) -> bool {
        matches!(self, Self::Storehouse)
    }

    /// Whether this kind belongs to the food chain (boosted need priority).
    #[must_use]
    pub const fn is_food_chain(self) -> bool {
        matches!(self, Self::Bakery | Self::Inn | Self::Butcher | Self::Mill)
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Footprint cell value marking the door, the road-facing entry tile.
/// `0` is empty space and `1` an occupied tile.
pub const FOOTPRINT_DOOR: u8 = 2;

/// Footprint pattern, indexed `[row][column]` from the building origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Footprint(Vec<Vec<u8>>);

impl Footprint {
    /// Create a footprint from pattern rows.
    #[must_use]
    pub fn new(rows: Vec<Vec<u8>>) -> Self {
        Self(rows)
    }

    fn from_rows(rows: &[&[u8]]) -> Self {
        Self(rows.iter().map(|row| row.to_vec()).collect())
    }

    /// Width of the bounding box.
    #[must_use]
    pub fn width(&self) -> u32 {
        let widest = self.0.iter().map(Vec::len).max().unwrap_or(0);
        u32::try_from(widest).unwrap_or(u32::MAX)
    }

    /// Height of the bounding box.
    #[must_use]
    pub fn height(&self) -> u32 {
        u32::try_from(self.0.len()).unwrap_or(u32::MAX)
    }

    /// Pattern value at `(dx, dy)`, `None` outside the pattern.
    #[must_use]
    pub fn cell(&self, dx: u32, dy: u32) -> Option<u8> {
        self.0
            .get(dy as usize)
            .and_then(|row| row.get(dx as usize))
            .copied()
    }

    /// Offset of the first door cell in row-major order.
    #[must_use]
    pub fn door(&self) -> Option<(u32, u32)> {
        self.offsets()
            .find(|&(dx, dy)| self.cell(dx, dy) == Some(FOOTPRINT_DOOR))
    }

    /// Number of door cells.
    #[must_use]
    pub fn door_count(&self) -> usize {
        self.0
            .iter()
            .flatten()
            .filter(|&&v| v == FOOTPRINT_DOOR)
            .count()
    }

    /// Every offset inside the bounding box, row-major.
    pub fn offsets(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width();
        (0..self.height()).flat_map(move |dy| (0..width).map(move |dx| (dx, dy)))
    }

    /// Absolute tiles of the bounding box placed at `origin`.
    ///
    /// Tiles that would overflow `u32` are skipped.
    pub fn tiles(&self, origin: Tile) -> impl Iterator<Item = Tile> + '_ {
        self.offsets().filter_map(move |(dx, dy)| {
            Some(Tile::new(origin.x.checked_add(dx)?, origin.y.checked_add(dy)?))
        })
    }
}

/// A production recipe: consume `input`, wait `duration_ms`, credit `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Generation time in milliseconds.
    pub duration_ms: u32,
    /// Resources debited per cycle.
    #[serde(default)]
    pub input: Stock,
    /// Resources credited per cycle.
    #[serde(default)]
    pub output: Stock,
}

impl Recipe {
    /// Create a recipe with no inputs or outputs.
    #[must_use]
    pub fn new(duration_ms: u32) -> Self {
        Self {
            duration_ms,
            input: Stock::new(),
            output: Stock::new(),
        }
    }

    /// Add an input.
    #[must_use]
    pub fn consumes(mut self, resource: Resource, amount: u32) -> Self {
        self.input[resource] = amount;
        self
    }

    /// Add an output.
    #[must_use]
    pub fn produces(mut self, resource: Resource, amount: u32) -> Self {
        self.output[resource] = amount;
        self
    }
}

/// Static information for one building kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingInfo {
    /// Resources required to construct the building.
    #[serde(default)]
    pub cost: Stock,
    /// Total health.
    pub health: u32,
    /// Footprint pattern.
    pub footprint: Footprint,
    /// Per-resource capacity. Zero entries fall back to the configured default.
    #[serde(default)]
    pub max_stock: ResourceMap<u32>,
    /// Production recipe, if the building produces or consumes anything.
    #[serde(default)]
    pub recipe: Option<Recipe>,
}

impl BuildingInfo {
    /// Create an entry with a stone/wood cost and no recipe.
    #[must_use]
    pub fn new(stone: u32, wood: u32, health: u32, footprint: Footprint) -> Self {
        Self {
            cost: Stock::new()
                .with(Resource::Stone, stone)
                .with(Resource::Wood, wood),
            health,
            footprint,
            max_stock: ResourceMap::new(),
            recipe: None,
        }
    }

    /// Attach a recipe.
    #[must_use]
    pub fn with_recipe(mut self, recipe: Recipe) -> Self {
        self.recipe = Some(recipe);
        self
    }

    /// Set an explicit capacity for `resource`.
    #[must_use]
    pub fn with_max_stock(mut self, resource: Resource, amount: u32) -> Self {
        self.max_stock[resource] = amount;
        self
    }

    /// Explicitly configured capacity for `resource`, if any.
    #[must_use]
    pub fn max_stock(&self, resource: Resource) -> Option<u32> {
        match self.max_stock[resource] {
            0 => None,
            n => Some(n),
        }
    }
}

/// Lookup table from building kind to its static information.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingCatalog(BTreeMap<BuildingKind, BuildingInfo>);

fn basic(stone: u32, wood: u32, health: u32, rows: &[&[u8]]) -> BuildingInfo {
    BuildingInfo::new(stone, wood, health, Footprint::from_rows(rows))
}

/// Attach `recipe` with the standard input and output capacities.
fn producer(info: BuildingInfo, recipe: Recipe) -> BuildingInfo {
    let info = recipe
        .input
        .iter_set()
        .fold(info, |info, (r, _)| info.with_max_stock(r, INPUT_CAPACITY));
    let info = recipe
        .output
        .iter_set()
        .fold(info, |info, (r, _)| info.with_max_stock(r, OUTPUT_CAPACITY));
    info.with_recipe(recipe)
}

/// Output capacity used by the standard producing buildings.
const OUTPUT_CAPACITY: u32 = 8;
/// Input buffer used by the standard consuming buildings.
const INPUT_CAPACITY: u32 = 4;

impl BuildingCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table covering every [`BuildingKind`].
    #[must_use]
    pub fn standard() -> Self {
        use BuildingKind as K;
        use Resource as R;

        let entries = [
            (K::School, basic(5, 6, 550, &[&[1, 1, 1], &[1, 1, 1], &[1, 2, 1]])),
            (
                K::Inn,
                producer(
                    basic(5, 6, 550, &[&[0, 1, 1, 1], &[1, 1, 1, 1], &[1, 2, 1, 1]]),
                    Recipe::new(6000).consumes(R::Bread, 1),
                ),
            ),
            (
                K::Quarry,
                producer(
                    basic(2, 3, 250, &[&[1, 1, 1], &[1, 2, 1]]),
                    Recipe::new(5000).produces(R::Stone, 1),
                ),
            ),
            (
                K::Woodcutter,
                producer(
                    basic(2, 3, 250, &[&[1, 1, 1], &[1, 1, 2]]),
                    Recipe::new(4000).produces(R::Trunk, 1),
                ),
            ),
            (
                K::Sawmill,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 1, 1], &[1, 2, 1, 1]]),
                    Recipe::new(3000).consumes(R::Trunk, 1).produces(R::Wood, 1),
                ),
            ),
            (
                K::Farm,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 1, 1], &[1, 1, 1, 1], &[1, 2, 1, 1]]),
                    Recipe::new(8000).produces(R::Corn, 1),
                ),
            ),
            (
                K::Mill,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 1], &[1, 2, 1]]),
                    Recipe::new(4000).consumes(R::Corn, 1).produces(R::Flour, 1),
                ),
            ),
            (
                K::Bakery,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 1], &[1, 1, 1], &[1, 1, 2]]),
                    Recipe::new(4000).consumes(R::Flour, 1).produces(R::Bread, 1),
                ),
            ),
            (
                K::SwineFarm,
                producer(
                    basic(3, 4, 350, &[&[0, 1, 1, 1], &[1, 1, 1, 1], &[1, 1, 1, 2]]),
                    Recipe::new(8000).consumes(R::Corn, 1).produces(R::Pig, 1),
                ),
            ),
            (
                K::Butcher,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 0], &[1, 1, 1], &[1, 1, 2]]),
                    Recipe::new(5000)
                        .consumes(R::Pig, 1)
                        .produces(R::Sausage, 1)
                        .produces(R::Skin, 1),
                ),
            ),
            (
                K::Fisherman,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 0], &[2, 1, 1]]),
                    Recipe::new(6000).produces(R::Fish, 1),
                ),
            ),
            (
                K::Vineyard,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 1], &[1, 1, 2]]),
                    Recipe::new(8000).produces(R::Wine, 1),
                ),
            ),
            (
                K::GoldMine,
                producer(
                    basic(2, 3, 250, &[&[1, 2]]),
                    Recipe::new(7000).produces(R::GoldOre, 1),
                ),
            ),
            (
                K::CoalMine,
                producer(
                    basic(2, 3, 250, &[&[1, 1, 1], &[1, 2, 1]]),
                    Recipe::new(6000).produces(R::Coal, 1),
                ),
            ),
            (
                K::Metallurgist,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 1], &[1, 1, 1], &[1, 2, 1]]),
                    Recipe::new(6000)
                        .consumes(R::GoldOre, 1)
                        .consumes(R::Coal, 1)
                        .produces(R::Gold, 1),
                ),
            ),
            (
                K::WeaponWorkshop,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 1, 1], &[1, 2, 1, 1]]),
                    Recipe::new(6000).consumes(R::Wood, 1).produces(R::Bow, 1),
                ),
            ),
            (
                K::Tannery,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 1], &[1, 2, 1]]),
                    Recipe::new(5000).consumes(R::Skin, 1).produces(R::Leather, 1),
                ),
            ),
            (
                K::ArmoryWorkshop,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 0], &[1, 1, 1], &[2, 1, 1]]),
                    Recipe::new(6000)
                        .consumes(R::Wood, 1)
                        .produces(R::WoodenShield, 1),
                ),
            ),
            (
                K::Stables,
                producer(
                    basic(5, 6, 550, &[&[1, 1, 1, 1], &[1, 1, 1, 1], &[1, 1, 2, 1]]),
                    Recipe::new(8000).consumes(R::Corn, 1).produces(R::Horse, 1),
                ),
            ),
            (
                K::IronMine,
                producer(
                    basic(2, 3, 250, &[&[1, 2, 1]]),
                    Recipe::new(7000).produces(R::IronOre, 1),
                ),
            ),
            (
                K::IronSmithy,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 1, 1], &[1, 1, 2, 1]]),
                    Recipe::new(6000)
                        .consumes(R::IronOre, 1)
                        .consumes(R::Coal, 1)
                        .produces(R::Iron, 1),
                ),
            ),
            (
                K::WeaponSmithy,
                producer(
                    basic(3, 4, 350, &[&[1, 1, 1, 1], &[1, 2, 1, 1]]),
                    Recipe::new(7000)
                        .consumes(R::Iron, 1)
                        .consumes(R::Coal, 1)
                        .produces(R::Sword, 1),
                ),
            ),
            (
                K::ArmorSmithy,
                producer(
                    basic(3, 4, 350, &[&[0, 1, 1, 0], &[1, 1, 1, 1], &[1, 2, 1, 1]]),
                    Recipe::new(7000)
                        .consumes(R::Iron, 1)
                        .consumes(R::Coal, 1)
                        .produces(R::IronArmor, 1),
                ),
            ),
            (
                K::Barracks,
                basic(
                    5,
                    6,
                    600,
                    &[&[1, 1, 1, 1], &[1, 1, 1, 1], &[1, 1, 1, 1], &[1, 2, 1, 1]],
                ),
            ),
            (K::TownHall, basic(5, 6, 550, &[&[1, 1, 1], &[1, 1, 1], &[1, 2, 1]])),
            (K::Storehouse, basic(5, 6, 550, &[&[1, 1, 1], &[1, 1, 1], &[1, 2, 1]])),
            (K::Watchtower, basic(2, 3, 250, &[&[1, 1], &[1, 2]])),
            (K::SiegeWorkshop, basic(3, 4, 300, &[&[1]])),
            (
                K::Marketplace,
                basic(6, 5, 550, &[&[0, 1, 1, 1], &[1, 1, 1, 1], &[1, 1, 1, 2]]),
            ),
        ];

        Self(entries.into_iter().collect())
    }

    /// Parse a catalog from RON text and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DataParseError`] on malformed RON or an invalid entry.
    pub fn from_ron_str(src: &str, path: &str) -> Result<Self> {
        let catalog: Self = ron::from_str(src).map_err(|e| SimError::DataParseError {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        catalog.validate().map_err(|e| SimError::DataParseError {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Ok(catalog)
    }

    /// Look up static information for a kind.
    #[must_use]
    pub fn get(&self, kind: BuildingKind) -> Option<&BuildingInfo> {
        self.0.get(&kind)
    }

    /// Look up static information, failing for unknown kinds.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownBuildingKind`] if the kind is absent.
    pub fn lookup(&self, kind: BuildingKind) -> Result<&BuildingInfo> {
        self.get(kind).ok_or(SimError::UnknownBuildingKind(kind))
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, kind: BuildingKind, info: BuildingInfo) {
        self.0.insert(kind, info);
    }

    /// Iterate entries in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (BuildingKind, &BuildingInfo)> {
        self.0.iter().map(|(&kind, info)| (kind, info))
    }

    /// Check that every footprint is non-empty with at most one door and
    /// that every recipe has a positive duration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] describing the first bad entry.
    pub fn validate(&self) -> Result<()> {
        for (kind, info) in self.iter() {
            if info.footprint.width() == 0 || info.footprint.height() == 0 {
                return Err(SimError::InvalidConfig(format!(
                    "{kind} has an empty footprint"
                )));
            }
            if info.footprint.door_count() > 1 {
                return Err(SimError::InvalidConfig(format!(
                    "{kind} footprint has more than one door"
                )));
            }
            if info.recipe.as_ref().is_some_and(|r| r.duration_ms == 0) {
                return Err(SimError::InvalidConfig(format!(
                    "{kind} recipe has zero duration"
                )));
            }
        }
        Ok(())
    }
}
