use thiserror::Error;


pub type Result<T> = std::result::Result<T, OptimizationError>;

/// Everything that can make an evaluation of the network fail.  None of these are recoverable
/// inside the engine; they propagate up to the optimizer's entry points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizationError {
    #[error("node {0:?} is defined more than once")]
    DuplicateNode(String),
    #[error("unknown node {0:?}")]
    UnknownNode(String),
    #[error("invalid edge {from:?} -> {to:?}: {reason}")]
    InvalidEdge { from: String, to: String, reason: String },
    #[error("route {route:?} uses edge {from:?} -> {to:?}, which is not in the city graph")]
    MissingEdge { route: String, from: String, to: String },
    #[error("route {route:?} is invalid: {reason}")]
    InvalidRoute { route: String, reason: String },
    #[error("route {0:?} is defined more than once")]
    DuplicateRoute(String),
    #[error("route {route:?} refers to unknown mode {mode:?}")]
    UnknownMode { route: String, mode: String },
    #[error("mode {mode:?} is invalid: {reason}")]
    InvalidMode { mode: String, reason: String },
    #[error("invalid demand from {origin} to {destination}: {reason}")]
    InvalidDemand { origin: usize, destination: usize, reason: String },
    #[error("invalid passenger parameters: {0}")]
    InvalidPassenger(String),
    #[error("the transport network has no routes")]
    EmptyNetwork,
    #[error("expected {expected} frequencies, got {found}")]
    FrequencyCountMismatch { expected: usize, found: usize },
    #[error("route {route:?} has non-positive or non-finite frequency {frequency}")]
    NonPositiveFrequency { route: String, frequency: f64 },
    #[error("extended graph edge {edge} has negative or non-finite cost {cost}")]
    NegativeCost { edge: usize, cost: f64 },
    #[error("{demand} trips/h from node {origin} cannot reach node {destination}")]
    Unreachable { origin: usize, destination: usize, demand: f64 },
    #[error("hyperpath labelling toward node {destination} did not converge at extended node \
             {node}")]
    NonConvergent { destination: usize, node: usize },
    #[error("successor probabilities at extended node {node} (destination {destination}) sum to \
             {sum}")]
    ProbabilityNormalization { destination: usize, node: usize, sum: f64 },
    #[error("{assigned} trips/h reached node {destination}, but {expected} were sent")]
    FlowNotConserved { destination: usize, expected: f64, assigned: f64 },
}
