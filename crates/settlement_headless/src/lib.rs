//! Headless settlement runner for CI verification and tuning.
//!
//! Loads a RON scenario, drives the deterministic core with a
//! tile-stepping mover and reports the outcome as JSON.
//!
//! - **stdout**: JSON summaries
//! - **stderr**: logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Run the bundled village for one minute of game time
//! cargo run -p settlement_headless -- run --scenario scenarios/village.ron --ticks 1200
//!
//! # Check that four parallel runs agree
//! cargo run -p settlement_headless -- verify --runs 4
//! ```

pub mod batch;
pub mod metrics;
pub mod runner;
pub mod scenario;

pub use batch::{verify_determinism, VerifyReport};
pub use metrics::{MetricsCollector, RunMetrics};
pub use runner::{HeadlessConfig, HeadlessRunner, RunSummary};
pub use scenario::{Scenario, ScenarioError};
