//! Tunable simulation constants.
//!
//! Every knob has a default, so a RON override only needs the fields it
//! changes:
//!
//! ```ron
//! (
//!     logistics_interval_ms: 500,
//!     priorities: (construction: 150),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Priority constants used by the demand/supply scanner and matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    /// Base priority of every offer.
    pub offer_base: u32,
    /// Added when the offering building is at or above capacity.
    pub offer_full_bonus: u32,
    /// Added when the offering building is nearly full.
    pub offer_nearly_full_bonus: u32,
    /// Fill percentage counted as "nearly full".
    pub nearly_full_percent: u32,
    /// Base priority of every building need.
    pub need_base: u32,
    /// Added when the needed input is completely absent.
    pub need_empty_bonus: u32,
    /// Added for food-chain buildings.
    pub need_food_chain_bonus: u32,
    /// Fixed priority of construction-site needs.
    pub construction: u32,
    /// Offers at or above this priority are offloaded to the depot.
    pub depot_offload_threshold: u32,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            offer_base: 30,
            offer_full_bonus: 40,
            offer_nearly_full_bonus: 20,
            nearly_full_percent: 80,
            need_base: 50,
            need_empty_bonus: 30,
            need_food_chain_bonus: 20,
            construction: 110,
            depot_offload_threshold: 50,
        }
    }
}

impl PriorityConfig {
    /// Highest priority an ordinary building need can reach.
    #[must_use]
    pub const fn max_building_need(&self) -> u32 {
        self.need_base + self.need_empty_bonus + self.need_food_chain_bonus
    }
}

/// Simulation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// How often the scanner, matcher and construction ticker run.
    pub logistics_interval_ms: u32,
    /// Construction progress gained per second with a builder on site, in percent.
    pub construction_work_rate: u32,
    /// Units moved by a single transport job.
    pub job_unit_amount: u32,
    /// Input buffer used when a building has no explicit capacity for an input.
    pub default_input_buffer: u32,
    /// Capacity used when a building has no explicit capacity for a resource.
    pub default_max_stock: u32,
    /// Request priorities.
    pub priorities: PriorityConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            logistics_interval_ms: 1000,
            construction_work_rate: 20,
            job_unit_amount: 1,
            default_input_buffer: 4,
            default_max_stock: 255,
            priorities: PriorityConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse and validate a configuration from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DataParseError`] if the text is not valid RON and
    /// [`SimError::InvalidConfig`] if the values are inconsistent.
    pub fn from_ron_str(src: &str, path: &str) -> Result<Self> {
        let config: Self = ron::from_str(src).map_err(|e| SimError::DataParseError {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the scheduler cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.logistics_interval_ms == 0 {
            return Err(SimError::InvalidConfig(
                "logistics_interval_ms must be positive".into(),
            ));
        }
        if self.job_unit_amount == 0 {
            return Err(SimError::InvalidConfig(
                "job_unit_amount must be positive".into(),
            ));
        }
        if self.default_max_stock == 0 {
            return Err(SimError::InvalidConfig(
                "default_max_stock must be positive".into(),
            ));
        }
        if self.priorities.nearly_full_percent > 100 {
            return Err(SimError::InvalidConfig(
                "nearly_full_percent must not exceed 100".into(),
            ));
        }
        if self.priorities.construction <= self.priorities.max_building_need() {
            return Err(SimError::InvalidConfig(format!(
                "construction priority {} must outrank building needs (max {})",
                self.priorities.construction,
                self.priorities.max_building_need()
            )));
        }
        Ok(())
    }
}
