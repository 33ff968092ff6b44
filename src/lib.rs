//! # Tickflow Streaming Engine
//!
//! A deterministic discrete-event engine for directed graphs of typed,
//! timestamped tick streams. Graphs are wired statically, then run
//! identically over historical data (as-fast-as-possible simulation) or
//! live wall-clock data (real-time).
//!
//! ## Design Principles
//!
//! - **Reactive nodes**: a node fires iff at least one of its active
//!   inputs ticked at the current engine time, at most once per cycle.
//! - **Deterministic scheduling**: one priority queue ordered by
//!   (time, rank, seq); identical inputs produce identical outputs.
//! - **Rank-ordered propagation**: producers always fire before their
//!   consumers within a cycle; cycles are rejected at build time unless
//!   closed by a feedback edge delivered in the next same-time cycle.
//! - **Adapters at the boundary**: pull (historical), push (live) and
//!   push-pull (replay then live) sources cross into the single-threaded
//!   engine through one lock and one condition variable.
//! - **Dynamic sub-graphs**: keyed graph fragments instantiated and torn
//!   down at runtime, ranked past their managing node.
//!
//! ## Example
//!
//! ```
//! use tickflow::adapter::{AdapterDecl, SeriesPull};
//! use tickflow::nodes::AddNode;
//! use tickflow::{run, GraphBuilder, InputOpts, RunOptions, Value, ValueType};
//!
//! let mut g = GraphBuilder::new();
//! let a = g.add_edge(ValueType::Int);
//! let b = g.add_edge(ValueType::Int);
//! let sum = g.add_edge(ValueType::Int);
//! let adder = g.add_node("adder", Box::new(AddNode::new(2)));
//! g.bind_input(adder, a, InputOpts::active()).unwrap();
//! g.bind_input(adder, b, InputOpts::active()).unwrap();
//! g.bind_output(adder, sum, ValueType::Int).unwrap();
//! g.tap(sum, "sum").unwrap();
//! g.add_adapter(AdapterDecl::pull(
//!     "a",
//!     Box::new(SeriesPull::new(vec![(10, Value::Int(1))])),
//!     a,
//!     ValueType::Int,
//! ))
//! .unwrap();
//! g.add_adapter(AdapterDecl::pull(
//!     "b",
//!     Box::new(SeriesPull::new(vec![(20, Value::Int(10))])),
//!     b,
//!     ValueType::Int,
//! ))
//! .unwrap();
//!
//! let output = run(g.finalize().unwrap(), RunOptions::simulation(0, 100)).unwrap();
//! assert_eq!(output.tap("sum"), &[(10, Value::Int(1)), (20, Value::Int(11))]);
//! ```

pub mod adapter;
pub mod config;
pub mod dynamic;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod registry;
mod sched;
pub mod series;
pub mod stats;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use adapter::{LatePolicy, PullAdapter, PushAdapter, PushPullAdapter, PushSink, ReplaySink};
pub use dynamic::{SubgraphBuilder, SubgraphTemplate};
pub use engine::{run, Engine, EngineHandle, Mode, RunOptions, RunOutput, StopReason};
pub use error::{
    AdapterError, BuildError, EngineError, EngineResult, NodeError, RuntimeError, StartError,
};
pub use graph::{Graph, GraphBuilder, InputOpts};
pub use node::{AlarmHandle, Node, NodeCtx};
pub use registry::{default_registry, NodeRegistry};
pub use stats::RunStats;
pub use types::{EdgeId, NodeId, Rank, Seq, Time};
pub use value::{Key, StructValue, Value, ValueType};
