// imports of other modules from this crate
mod error;
pub use error::{OptimizationError, Result};

mod config_utils;

mod city;
pub use city::City;

mod demand;
pub use demand::Demand;

mod passengers;
pub use passengers::Passenger;

pub mod pt_system;
pub use pt_system::{Direction, Mode, Route, TransportNetwork};

pub mod extended_graph;
pub use extended_graph::ExtendedGraph;

pub mod hyperpath;
pub use hyperpath::{compute_hyperpath, compute_hyperpaths, Hyperpath, Hyperpaths};

pub mod assignment;
pub use assignment::{assign, Assignment, RouteAssignment};

pub mod costs;
pub use costs::{CostComponent, CostTerm};

pub mod constrains;

mod optimizer;
pub use optimizer::{CostBreakdown, Evaluation, LinesPosition, Optimizer, OverallResults,
                    RouteResult};

pub mod search;
pub use search::{SearchConfig, SearchResult};

mod scenario;
pub use scenario::Scenario;

#[cfg(test)]
mod test_utils;

