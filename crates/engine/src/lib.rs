//! Metron Engine
//!
//! Evaluates attribute models under scenarios: builds the dependency
//! graph from declared dependencies, condenses cycles into strongly
//! connected components, schedules levels of the condensed graph in
//! parallel, converges cyclic groups by Gauss-Seidel fixed-point
//! iteration, and caches results per (model version, scenario,
//! resolved inputs) fingerprint.

pub mod analyze;
pub mod cache;
pub mod engine;
pub mod error;
pub mod graph;
pub mod schedule;
mod solver;
pub mod types;

pub use analyze::{analyze, Analysis, Component, Level};
pub use cache::{CacheEntry, CacheManager, Lookup};
pub use engine::SimulationEngine;
pub use error::{Error, Result};
pub use graph::DependencyGraph;
pub use schedule::{ScheduleOutcome, Scheduler};
pub use types::{CancelToken, GroupDiagnostic, RunOptions, RunResult, RunState};
