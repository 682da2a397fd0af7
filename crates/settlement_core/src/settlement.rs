//! Per-player entity container: buildings, agents, roads, fields and vines.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agents::{Agent, AgentKind};
use crate::buildings::Building;
use crate::catalog::BuildingKind;
use crate::grid::Tile;
use crate::ids::{AgentId, BuildingId};

/// Entities owned by the local player.
///
/// Buildings and agents live in ordered maps so every iteration visits
/// them in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Settlement {
    buildings: BTreeMap<BuildingId, Building>,
    agents: BTreeMap<AgentId, Agent>,
    /// Road tiles in placement order.
    pub roads: Vec<Tile>,
    /// Completed fields.
    pub fields: Vec<Tile>,
    /// Completed vines.
    pub vines: Vec<Tile>,
    next_building_id: u32,
    next_agent_id: u32,
}

impl Settlement {
    /// Create an empty settlement.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next building id.
    pub fn next_building_id(&mut self) -> BuildingId {
        self.next_building_id += 1;
        BuildingId::new(self.next_building_id)
    }

    /// Add a building. Its id must come from [`Self::next_building_id`].
    pub fn add_building(&mut self, building: Building) -> BuildingId {
        let id = building.id;
        self.buildings.insert(id, building);
        id
    }

    /// Spawn an idle agent at `position`.
    pub fn spawn_agent(&mut self, kind: AgentKind, position: Tile) -> AgentId {
        self.next_agent_id += 1;
        let id = AgentId::new(self.next_agent_id);
        self.agents.insert(id, Agent::new(id, kind, position));
        id
    }

    /// Building by id.
    #[must_use]
    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// Mutable building by id.
    pub fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(&id)
    }

    /// Remove a building (demolition).
    pub fn remove_building(&mut self, id: BuildingId) -> Option<Building> {
        self.buildings.remove(&id)
    }

    /// Buildings in id order.
    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    /// Mutable buildings in id order.
    pub fn buildings_mut(&mut self) -> impl Iterator<Item = &mut Building> {
        self.buildings.values_mut()
    }

    /// Agent by id.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Mutable agent by id.
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Agents in id order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Lowest-id idle agent of `kind`.
    #[must_use]
    pub fn idle_agent(&self, kind: AgentKind) -> Option<AgentId> {
        self.agents
            .values()
            .find(|a| a.kind == kind && a.is_idle())
            .map(|a| a.id)
    }

    /// Release an agent back to idle, if it exists.
    pub fn release_agent(&mut self, id: AgentId) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.release();
        }
    }

    /// The depot: the lowest-id completed storehouse.
    #[must_use]
    pub fn depot_id(&self) -> Option<BuildingId> {
        self.buildings
            .values()
            .find(|b| b.kind.is_depot() && b.is_complete())
            .map(|b| b.id)
    }

    /// Number of buildings of `kind`, complete or not.
    #[must_use]
    pub fn count_kind(&self, kind: BuildingKind) -> usize {
        self.buildings.values().filter(|b| b.kind == kind).count()
    }
}
