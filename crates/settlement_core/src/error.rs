//! Error types for the settlement simulation.
//!
//! Only caller-facing failures live here. Runtime logistics failures
//! (unreachable targets, stock races, stale ids) are recovered inside the
//! tick and reported as [`SimEvent`](crate::events::SimEvent)s instead.

use thiserror::Error;

use crate::catalog::BuildingKind;
use crate::ids::{AgentId, BuildingId, JobId, SiteId};

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the settlement core.
#[derive(Debug, Error)]
pub enum SimError {
    /// Tile lies outside the grid.
    #[error("Tile ({x}, {y}) is outside the grid")]
    OutOfBounds {
        /// Tile x coordinate.
        x: u32,
        /// Tile y coordinate.
        y: u32,
    },

    /// Tile is blocked for the requested placement.
    #[error("Tile ({x}, {y}) is blocked")]
    Blocked {
        /// Tile x coordinate.
        x: u32,
        /// Tile y coordinate.
        y: u32,
    },

    /// No road tile touches the placement, so it cannot join the network.
    #[error("No road adjacent to ({x}, {y})")]
    NoAdjacentRoad {
        /// Tile x coordinate.
        x: u32,
        /// Tile y coordinate.
        y: u32,
    },

    /// Footprint pattern has no door (`2`) cell.
    #[error("Footprint for {0:?} has no door tile")]
    MissingDoor(BuildingKind),

    /// Building kind is absent from the catalog.
    #[error("Building kind {0:?} is not in the catalog")]
    UnknownBuildingKind(BuildingKind),

    /// Invalid building identifier.
    #[error("Unknown building: {0}")]
    UnknownBuilding(BuildingId),

    /// Invalid construction site identifier.
    #[error("Unknown construction site: {0}")]
    UnknownSite(SiteId),

    /// Invalid agent identifier.
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    /// Invalid job identifier.
    #[error("Unknown job: {0}")]
    UnknownJob(JobId),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path (or label) of the source that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
