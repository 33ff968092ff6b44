//! Built-in utility nodes.
//!
//! Small reusable nodes used by the tests, demos and configuration-driven
//! graphs. Domain logic belongs in user nodes; these cover the plumbing.

pub mod heartbeat;
pub mod math;
pub mod stream;

pub use heartbeat::HeartbeatNode;
pub use math::AddNode;
pub use stream::{CollectorNode, PassthroughNode, SampleHoldNode};
