//! Identifier newtypes shared across the stores.
//!
//! Stores reference each other only through these ids, never through
//! embedded references, so ownership stays acyclic.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            /// Create a new identifier.
            #[must_use]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a building owned by the settlement.
    BuildingId,
    "building"
);
define_id!(
    /// Unique identifier for an agent (servant, builder, ...).
    AgentId,
    "agent"
);
define_id!(
    /// Unique identifier for a construction site.
    SiteId,
    "construction"
);
define_id!(
    /// Unique identifier for a job.
    JobId,
    "job"
);

/// Something that can receive resources: a finished building or a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Target {
    /// A building's stock ledger.
    Building(BuildingId),
    /// A construction site's delivered-resources ledger.
    Site(SiteId),
}

impl Target {
    /// The building id, if this target is a building.
    #[must_use]
    pub const fn building(self) -> Option<BuildingId> {
        match self {
            Self::Building(id) => Some(id),
            Self::Site(_) => None,
        }
    }

    /// The site id, if this target is a construction site.
    #[must_use]
    pub const fn site(self) -> Option<SiteId> {
        match self {
            Self::Site(id) => Some(id),
            Self::Building(_) => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Building(id) => id.fmt(f),
            Self::Site(id) => id.fmt(f),
        }
    }
}
