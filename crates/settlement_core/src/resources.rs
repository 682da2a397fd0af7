//! Resource types and enum-indexed resource ledgers.
//!
//! All stock accounting uses integer math on a closed [`Resource`]
//! enumeration, so ledgers are fixed-size arrays rather than string maps.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Every resource that can be produced, carried or stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Tree trunks from the woodcutter.
    Trunk,
    /// Stone from the quarry.
    Stone,
    /// Ore from the iron mine.
    IronOre,
    /// Ore from the gold mine.
    GoldOre,
    /// Coal from the coal mine.
    Coal,
    /// Corn from the farm.
    Corn,
    /// Timber from the sawmill.
    Wood,
    /// Iron bars.
    Iron,
    /// Gold bars.
    Gold,
    /// Flour from the mill.
    Flour,
    /// Bread from the bakery.
    Bread,
    /// Sausage from the butcher.
    Sausage,
    /// Fish from the fisherman.
    Fish,
    /// Wine from the vineyard.
    Wine,
    /// Pigs from the swine farm.
    Pig,
    /// Pig skin.
    Skin,
    /// Leather from the tannery.
    Leather,
    /// Horses from the stables.
    Horse,
    /// Axe.
    Axe,
    /// Sword.
    Sword,
    /// Lance.
    Lance,
    /// Pike.
    Pike,
    /// Bow.
    Bow,
    /// Crossbow.
    Crossbow,
    /// Wooden shield.
    WoodenShield,
    /// Iron shield.
    IronShield,
    /// Leather armor.
    LeatherArmor,
    /// Iron armor.
    IronArmor,
}

/// Grouping used for summaries and UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    /// Gathered directly from the land.
    Raw,
    /// Refined from raw materials.
    Processed,
    /// Consumable food.
    Food,
    /// Animals and their products.
    Animal,
    /// Weapons.
    Weapon,
    /// Armor and shields.
    Armor,
}

impl Resource {
    /// Number of resource variants.
    pub const COUNT: usize = 28;

    /// All resources in declaration order.
    pub const ALL: [Resource; Self::COUNT] = [
        Self::Trunk,
        Self::Stone,
        Self::IronOre,
        Self::GoldOre,
        Self::Coal,
        Self::Corn,
        Self::Wood,
        Self::Iron,
        Self::Gold,
        Self::Flour,
        Self::Bread,
        Self::Sausage,
        Self::Fish,
        Self::Wine,
        Self::Pig,
        Self::Skin,
        Self::Leather,
        Self::Horse,
        Self::Axe,
        Self::Sword,
        Self::Lance,
        Self::Pike,
        Self::Bow,
        Self::Crossbow,
        Self::WoodenShield,
        Self::IronShield,
        Self::LeatherArmor,
        Self::IronArmor,
    ];

    /// Array index of this resource.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Category this resource belongs to.
    #[must_use]
    pub const fn category(self) -> ResourceCategory {
        use Resource::*;

        match self {
            Trunk | Stone | IronOre | GoldOre | Coal | Corn => ResourceCategory::Raw,
            Wood | Iron | Gold | Flour => ResourceCategory::Processed,
            Bread | Sausage | Fish | Wine => ResourceCategory::Food,
            Pig | Skin | Leather | Horse => ResourceCategory::Animal,
            Axe | Sword | Lance | Pike | Bow | Crossbow => ResourceCategory::Weapon,
            WoodenShield | IronShield | LeatherArmor | IronArmor => ResourceCategory::Armor,
        }
    }

    /// Snake-case name, matching the data file spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        use Resource::*;

        match self {
            Trunk => "trunk",
            Stone => "stone",
            IronOre => "iron_ore",
            GoldOre => "gold_ore",
            Coal => "coal",
            Corn => "corn",
            Wood => "wood",
            Iron => "iron",
            Gold => "gold",
            Flour => "flour",
            Bread => "bread",
            Sausage => "sausage",
            Fish => "fish",
            Wine => "wine",
            Pig => "pig",
            Skin => "skin",
            Leather => "leather",
            Horse => "horse",
            Axe => "axe",
            Sword => "sword",
            Lance => "lance",
            Pike => "pike",
            Bow => "bow",
            Crossbow => "crossbow",
            WoodenShield => "wooden_shield",
            IronShield => "iron_shield",
            LeatherArmor => "leather_armor",
            IronArmor => "iron_armor",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value per resource, stored in a fixed array indexed by [`Resource`].
///
/// Serializes as a map containing only the non-default entries, so data
/// files read like `{ stone: 2, wood: 3 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceMap<T> {
    values: [T; Resource::COUNT],
}

/// Per-building stock ledger.
pub type Stock = ResourceMap<u32>;

impl<T: Copy + Default> Default for ResourceMap<T> {
    fn default() -> Self {
        Self {
            values: [T::default(); Resource::COUNT],
        }
    }
}

impl<T: Copy + Default> ResourceMap<T> {
    /// Create a map with every entry at its default value.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, resource: Resource, value: T) -> Self {
        self.values[resource.index()] = value;
        self
    }

    /// Iterate over every `(resource, value)` pair in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Resource, T)> + '_ {
        Resource::ALL
            .iter()
            .map(move |&resource| (resource, self.values[resource.index()]))
    }
}

impl<T: Copy + Default + PartialEq> ResourceMap<T> {
    /// Iterate over entries that differ from the default value.
    pub fn iter_set(&self) -> impl Iterator<Item = (Resource, T)> + '_ {
        self.iter().filter(|(_, value)| *value != T::default())
    }

    /// Check whether every entry is at its default value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter_set().next().is_none()
    }
}

impl ResourceMap<u32> {
    /// Sum of all amounts.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.values.iter().sum()
    }

    /// Add `amount` of `resource`.
    pub fn add(&mut self, resource: Resource, amount: u32) {
        let slot = &mut self.values[resource.index()];
        *slot = slot.saturating_add(amount);
    }

    /// Remove `amount` of `resource` if that much is present.
    ///
    /// Returns `true` if the withdrawal succeeded. Nothing changes on failure.
    pub fn take(&mut self, resource: Resource, amount: u32) -> bool {
        let slot = &mut self.values[resource.index()];
        if *slot >= amount {
            *slot -= amount;
            true
        } else {
            false
        }
    }

    /// Check whether every entry of `other` is covered by this ledger.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        other
            .iter_set()
            .all(|(resource, amount)| self[resource] >= amount)
    }
}

impl<T> Index<Resource> for ResourceMap<T> {
    type Output = T;

    fn index(&self, resource: Resource) -> &T {
        &self.values[resource.index()]
    }
}

impl<T> IndexMut<Resource> for ResourceMap<T> {
    fn index_mut(&mut self, resource: Resource) -> &mut T {
        &mut self.values[resource.index()]
    }
}

impl<T: Copy + Default> FromIterator<(Resource, T)> for ResourceMap<T> {
    fn from_iter<I: IntoIterator<Item = (Resource, T)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (resource, value) in iter {
            map[resource] = value;
        }
        map
    }
}

impl<T: Copy + Default + PartialEq + Serialize> Serialize for ResourceMap<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let entries: BTreeMap<Resource, T> = self.iter_set().collect();
        entries.serialize(serializer)
    }
}

impl<'de, T: Copy + Default + Deserialize<'de>> Deserialize<'de> for ResourceMap<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = BTreeMap::<Resource, T>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
