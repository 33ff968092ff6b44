//! Error taxonomy for the engine.
//!
//! Errors are split by phase: [`BuildError`] (graph construction and
//! finalization), [`StartError`] (adapter/engine startup), and
//! [`RuntimeError`] (cycle loop). [`EngineError`] is the top-level union
//! returned by `Engine::run`.

use thiserror::Error;

use crate::types::{EdgeId, NodeId, Time};
use crate::value::ValueType;

/// Errors raised while building or finalizing a graph.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("cycle detected through node {node} ({name}); declare a feedback edge to close loops")]
    CycleDetected { node: NodeId, name: String },

    #[error("type mismatch on edge {edge}: edge carries {edge_type}, binding declared {declared}")]
    TypeMismatch {
        edge: EdgeId,
        edge_type: ValueType,
        declared: ValueType,
    },

    #[error("input {input} of node {node} ({name}) reads edge {edge} which has no producer")]
    UnwiredInput {
        node: NodeId,
        name: String,
        input: usize,
        edge: EdgeId,
    },

    #[error("duplicate edge: {reason}")]
    DuplicateEdge { reason: String },

    #[error("node {node} ({name}) declares more than {max} inputs")]
    TooManyInputs { node: NodeId, name: String, max: usize },

    #[error("node {node} ({name}) would fire before its producer; sub-graph inputs must rank below the instance")]
    RankOrder { node: NodeId, name: String },

    #[error("unknown {what} id {id}")]
    UnknownId { what: &'static str, id: u64 },
}

/// Errors raised while starting a run.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("adapter {name} failed to initialize: {reason}")]
    AdapterInit { name: String, reason: String },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Errors raised by an adapter implementation.
///
/// `Init` failures abort the run during start; `Source` failures mark the
/// adapter terminal while the engine keeps running.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("init: {0}")]
    Init(String),

    #[error("source: {0}")]
    Source(String),
}

/// Errors raised during the cycle loop.
///
/// `AdapterSource`, `LateTick` and `HistoryUnderflow` are recoverable;
/// the rest are fatal and terminate the run after `on_stop` hooks.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("time regression: attempted write at {attempted} behind last sample at {last}")]
    TimeRegression { last: Time, attempted: Time },

    #[error("history underflow: requested sample {requested} ticks back, only {available} available")]
    HistoryUnderflow { requested: usize, available: usize },

    #[error("late tick after replay: t={t} is not after last replay time {last_replay}")]
    LateAfterReplay { t: Time, last_replay: Time },

    #[error("adapter {name} source error: {reason}")]
    AdapterSource { name: String, reason: String },

    #[error("node {name} failed: {source}")]
    NodeFailed { name: String, source: NodeError },

    #[error("engine invariant violated: {0}")]
    InvariantViolation(String),
}

/// An error raised inside a node handler.
///
/// Node-level domain errors are the node's own concern; propagating one out
/// of `on_fire` is fatal to the run.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct NodeError {
    message: String,
}

impl NodeError {
    /// Creates a node error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Top-level error returned by `Engine::run`.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("start error: {0}")]
    Start(#[from] StartError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl EngineError {
    /// Process exit code for a CLI wrapper embedding the engine.
    ///
    /// 64 = graph-build error, 65 = runtime error (start errors count as
    /// runtime for the wrapper). Normal completion is 0 and external
    /// interruption is 130, both reported by the engine, not here.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Build(_) => 64,
            EngineError::Start(_) => 65,
            EngineError::Runtime(_) => 65,
        }
    }
}

/// Result alias for fallible engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
