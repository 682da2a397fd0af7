//! Parallel replays of one scenario.
//!
//! Runs the same scenario several times on the rayon pool and compares
//! the final state hashes. Any difference means the core leaked
//! non-determinism.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use settlement_core::catalog::BuildingCatalog;

use crate::runner::{HeadlessConfig, HeadlessRunner, RunSummary};
use crate::scenario::{Scenario, ScenarioError};

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks per run.
    pub ticks: u64,
    /// Final hash of every run, in run order.
    pub hashes: Vec<u64>,
    /// Whether every hash matched.
    pub deterministic: bool,
}

fn run_once(
    scenario: &Scenario,
    catalog: &BuildingCatalog,
    config: HeadlessConfig,
    ticks: u64,
) -> Result<RunSummary, ScenarioError> {
    let mut runner = HeadlessRunner::from_scenario(scenario, catalog.clone(), config)?;
    runner.run(ticks);
    Ok(runner.summary())
}

/// Run `runs` copies of `scenario` in parallel and compare their hashes.
pub fn verify_determinism(
    scenario: &Scenario,
    catalog: &BuildingCatalog,
    config: HeadlessConfig,
    ticks: u64,
    runs: u32,
) -> Result<VerifyReport, ScenarioError> {
    let summaries: Vec<RunSummary> = (0..runs)
        .into_par_iter()
        .map(|_| run_once(scenario, catalog, config, ticks))
        .collect::<Result<_, _>>()?;

    let hashes: Vec<u64> = summaries.iter().map(|s| s.state_hash).collect();
    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !deterministic {
        tracing::error!(scenario = %scenario.name, ?hashes, "runs diverged");
    }

    Ok(VerifyReport {
        scenario: scenario.name.clone(),
        ticks,
        hashes,
        deterministic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_village_is_deterministic() {
        let report = verify_determinism(
            &Scenario::village(),
            &BuildingCatalog::standard(),
            HeadlessConfig::default(),
            500,
            4,
        )
        .unwrap();
        assert_eq!(report.hashes.len(), 4);
        assert!(report.deterministic);
    }

    #[test]
    fn test_setup_error_propagates() {
        let mut scenario = Scenario::village();
        scenario.map_size = (4, 4);
        let result = verify_determinism(
            &scenario,
            &BuildingCatalog::standard(),
            HeadlessConfig::default(),
            10,
            2,
        );
        assert!(result.is_err());
    }
}
