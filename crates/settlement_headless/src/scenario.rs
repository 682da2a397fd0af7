//! Scenario loading and setup.
//!
//! A scenario describes the starting state of a settlement: grid size,
//! road network, finished buildings with their stock, agents and the
//! construction orders placed at tick zero.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use settlement_core::prelude::*;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A road segment is neither horizontal nor vertical.
    #[error("Road segment {from:?} -> {to:?} is not axis-aligned")]
    DiagonalRoad {
        /// Segment start.
        from: (u32, u32),
        /// Segment end.
        to: (u32, u32),
    },
    /// The map has a zero dimension.
    #[error("Map size {0}x{1} must be positive in both dimensions")]
    InvalidMapSize(u32, u32),
    /// A road tile could not be placed.
    #[error("Cannot place road at ({0}, {1})")]
    RoadBlocked(u32, u32),
    /// The core refused part of the setup.
    #[error("Invalid scenario setup: {0}")]
    Setup(#[from] SimError),
}

/// A straight run of road tiles, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadSegment {
    /// First tile.
    pub from: (u32, u32),
    /// Last tile.
    pub to: (u32, u32),
}

impl RoadSegment {
    /// Tiles covered by the segment, in order from `from` to `to`.
    pub fn tiles(&self) -> Result<Vec<Tile>, ScenarioError> {
        let ((x0, y0), (x1, y1)) = (self.from, self.to);
        if x0 == x1 {
            Ok(span(y0, y1).map(|y| Tile::new(x0, y)).collect())
        } else if y0 == y1 {
            Ok(span(x0, x1).map(|x| Tile::new(x, y0)).collect())
        } else {
            Err(ScenarioError::DiagonalRoad {
                from: self.from,
                to: self.to,
            })
        }
    }
}

fn span(a: u32, b: u32) -> Box<dyn Iterator<Item = u32>> {
    if a <= b {
        Box::new(a..=b)
    } else {
        Box::new((b..=a).rev())
    }
}

/// A finished building placed at setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Building type.
    pub kind: BuildingKind,
    /// Top-left footprint tile.
    pub position: (u32, u32),
    /// Initial stock.
    #[serde(default)]
    pub stock: Stock,
}

/// One or more agents of a class on the same tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPlacement {
    /// Agent class.
    pub kind: AgentKind,
    /// Spawn tile.
    pub position: (u32, u32),
    /// Number of agents.
    #[serde(default = "default_count")]
    pub count: u32,
}

const fn default_count() -> u32 {
    1
}

/// A construction order placed at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionOrder {
    /// What to build.
    pub kind: ConstructionKind,
    /// Origin tile.
    pub position: (u32, u32),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Grid dimensions (width, height) in tiles.
    pub map_size: (u32, u32),
    /// Road network.
    #[serde(default)]
    pub roads: Vec<RoadSegment>,
    /// Finished buildings.
    #[serde(default)]
    pub buildings: Vec<BuildingPlacement>,
    /// Agents.
    #[serde(default)]
    pub agents: Vec<AgentPlacement>,
    /// Construction orders.
    #[serde(default)]
    pub construction: Vec<ConstructionOrder>,
    /// Overrides for the default tunables.
    #[serde(default)]
    pub config: Option<SimConfig>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::village()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A small bread economy along one street, with a road order and a
    /// watchtower to build from depot stock.
    #[must_use]
    pub fn village() -> Self {
        Self {
            name: "Village".to_string(),
            description: "Farm, mill, bakery and inn fed by two servants".to_string(),
            map_size: (40, 12),
            roads: vec![RoadSegment {
                from: (1, 8),
                to: (38, 8),
            }],
            buildings: vec![
                BuildingPlacement {
                    kind: BuildingKind::Storehouse,
                    position: (2, 5),
                    stock: Stock::new()
                        .with(Resource::Stone, 6)
                        .with(Resource::Wood, 8),
                },
                BuildingPlacement {
                    kind: BuildingKind::Farm,
                    position: (7, 5),
                    stock: Stock::new().with(Resource::Corn, 2),
                },
                BuildingPlacement {
                    kind: BuildingKind::Mill,
                    position: (13, 6),
                    stock: Stock::new(),
                },
                BuildingPlacement {
                    kind: BuildingKind::Bakery,
                    position: (18, 5),
                    stock: Stock::new(),
                },
                BuildingPlacement {
                    kind: BuildingKind::Inn,
                    position: (23, 5),
                    stock: Stock::new(),
                },
            ],
            agents: vec![
                AgentPlacement {
                    kind: AgentKind::Servant,
                    position: (6, 8),
                    count: 2,
                },
                AgentPlacement {
                    kind: AgentKind::Builder,
                    position: (30, 8),
                    count: 1,
                },
            ],
            construction: vec![
                ConstructionOrder {
                    kind: ConstructionKind::Road,
                    position: (28, 9),
                },
                ConstructionOrder {
                    kind: ConstructionKind::Building(BuildingKind::Watchtower),
                    position: (32, 6),
                },
            ],
            config: None,
        }
    }

    /// Build a ready simulation: roads, buildings, agents, then construction orders.
    pub fn build(&self, catalog: BuildingCatalog) -> Result<Simulation, ScenarioError> {
        let config = self.config.clone().unwrap_or_default();
        config.validate()?;
        catalog.validate()?;

        let (width, height) = self.map_size;
        if width == 0 || height == 0 {
            return Err(ScenarioError::InvalidMapSize(width, height));
        }
        let grid = Grid::new(width, height);
        let mut sim = Simulation::new(grid, catalog, config);
        let ctx = sim.context_mut();

        for segment in &self.roads {
            for tile in segment.tiles()? {
                // Crossings repeat tiles
                if ctx.grid.is_road(tile) {
                    continue;
                }
                if !ctx.place_road(tile) {
                    return Err(ScenarioError::RoadBlocked(tile.x, tile.y));
                }
            }
        }

        for placement in &self.buildings {
            let id = ctx.spawn_building(placement.kind, Tile::from(placement.position))?;
            if let Some(building) = ctx.settlement.building_mut(id) {
                building.stock = placement.stock;
            }
        }

        for placement in &self.agents {
            for _ in 0..placement.count {
                ctx.spawn_agent(placement.kind, Tile::from(placement.position));
            }
        }

        for order in &self.construction {
            sim.create_construction_site(ConstructionRequest {
                kind: order.kind,
                origin: Tile::from(order.position),
            })?;
        }

        tracing::info!(
            scenario = %self.name,
            buildings = self.buildings.len(),
            sites = self.construction.len(),
            "scenario loaded"
        );
        Ok(sim)
    }
}
