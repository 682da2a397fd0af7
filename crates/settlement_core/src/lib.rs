//! # Settlement Core
//!
//! Deterministic logistics core for a tile-based settlement economy.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`grid`] - Tile map and placement flags
//! - [`pathfinding`] - A* search with per-agent movement policies
//! - [`production`] - Timed production cycles
//! - [`requests`] - Demand/supply scanner
//! - [`matcher`] - Request-to-job matching
//! - [`jobs`] - Job store and dispatcher
//! - [`behavior`] - Arrival state machine
//! - [`construction`] - Construction sites
//! - [`simulation`] - Context and tick loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agents;
pub mod behavior;
pub mod buildings;
pub mod catalog;
pub mod config;
pub mod construction;
pub mod error;
pub mod events;
pub mod grid;
pub mod ids;
pub mod jobs;
pub mod matcher;
pub mod math;
pub mod movement;
pub mod pathfinding;
pub mod production;
pub mod requests;
pub mod resources;
pub mod settlement;
pub mod simulation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agents::{Agent, AgentKind, AgentState, Cargo};
    pub use crate::buildings::Building;
    pub use crate::catalog::{BuildingCatalog, BuildingInfo, BuildingKind, Footprint, Recipe};
    pub use crate::config::{PriorityConfig, SimConfig};
    pub use crate::construction::{
        ConstructionKind, ConstructionRequest, ConstructionSite, SiteStatus,
    };
    pub use crate::error::SimError;
    pub use crate::events::{AbortReason, SimEvent};
    pub use crate::grid::{Grid, Tile};
    pub use crate::ids::{AgentId, BuildingId, JobId, SiteId, Target};
    pub use crate::jobs::{Job, JobKind, JobStatus};
    pub use crate::math::Fixed;
    pub use crate::movement::{MovementPhase, TileStepper};
    pub use crate::pathfinding::{find_path, MovementPolicy, PathOptions};
    pub use crate::requests::{Request, RequestKind};
    pub use crate::resources::{Resource, ResourceMap, Stock};
    pub use crate::simulation::{SimContext, Simulation, TICK_DURATION_MS, TICK_RATE};
}
