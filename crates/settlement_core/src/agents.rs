//! Mobile agents: transport servants, builders and operator classes.

use serde::{Deserialize, Serialize};

use crate::grid::Tile;
use crate::ids::AgentId;
use crate::pathfinding::{MovementPolicy, PathOptions};
use crate::resources::Resource;

/// Character class of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Carries resources between buildings.
    Servant,
    /// Works on construction sites.
    Builder,
    /// Quarry operator.
    Stonemason,
    /// Woodcutter operator.
    Woodcutter,
    /// Sawmill operator.
    Carpenter,
    /// Farm operator.
    Farmer,
    /// Mill operator.
    Miller,
    /// Bakery operator.
    Baker,
    /// Butcher operator.
    Butcher,
    /// Fisherman operator.
    Fisher,
    /// Vineyard operator.
    Winegrower,
    /// Mine operator.
    Miner,
    /// Smithy operator.
    Smith,
}

impl AgentKind {
    /// Movement policy used when routing this kind.
    #[must_use]
    pub const fn movement_policy(self) -> MovementPolicy {
        match self {
            Self::Servant | Self::Builder => MovementPolicy::RoadPreferred,
            _ => MovementPolicy::RoadOnly,
        }
    }

    /// Path options for this kind's first leg. Builders may target a
    /// being-built tile.
    #[must_use]
    pub const fn path_options(self) -> PathOptions {
        PathOptions::new(self.movement_policy())
            .with_construction_destination(matches!(self, Self::Builder))
    }
}

/// Whether an agent is free to take a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentState {
    /// Available.
    #[default]
    Idle,
    /// Owned by exactly one job.
    Busy,
}

/// Resources held by a transport agent between pickup and delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cargo {
    /// Carried resource.
    pub resource: Resource,
    /// Carried amount.
    pub amount: u32,
}

/// A mobile agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Agent {
    /// Identifier.
    pub id: AgentId,
    /// Current tile.
    pub position: Tile,
    /// Character class.
    pub kind: AgentKind,
    /// Idle or busy.
    pub state: AgentState,
    /// Carried cargo, set only between pickup and delivery.
    pub carrying: Option<Cargo>,
}

impl Agent {
    /// Create an idle agent.
    #[must_use]
    pub const fn new(id: AgentId, kind: AgentKind, position: Tile) -> Self {
        Self {
            id,
            position,
            kind,
            state: AgentState::Idle,
            carrying: None,
        }
    }

    /// Check if the agent can take a job.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == AgentState::Idle
    }

    /// Mark the agent busy.
    pub fn claim(&mut self) {
        self.state = AgentState::Busy;
    }

    /// Return the agent to idle and drop any cargo.
    pub fn release(&mut self) {
        self.state = AgentState::Idle;
        self.carrying = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies() {
        assert_eq!(AgentKind::Servant.movement_policy(), MovementPolicy::RoadPreferred);
        assert_eq!(AgentKind::Miner.movement_policy(), MovementPolicy::RoadOnly);
        assert!(AgentKind::Builder.path_options().allow_construction_destination);
        assert!(!AgentKind::Servant.path_options().allow_construction_destination);
    }

    #[test]
    fn test_claim_release() {
        let mut agent = Agent::new(AgentId::new(1), AgentKind::Servant, Tile::new(2, 2));
        assert!(agent.is_idle());
        agent.claim();
        agent.carrying = Some(Cargo {
            resource: Resource::Wood,
            amount: 1,
        });
        assert!(!agent.is_idle());
        agent.release();
        assert!(agent.is_idle());
        assert!(agent.carrying.is_none());
    }
}
