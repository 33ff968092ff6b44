//! Node-kind factory registry for configuration-driven graphs.
//!
//! The registry maps kind names to factories so that graphs can be
//! assembled from declarative configuration (see [`crate::config`]).
//!
//! # Example
//!
//! ```
//! use tickflow::registry::NodeRegistry;
//! use tickflow::node::{Node, NodeCtx};
//! use tickflow::error::NodeError;
//! use std::collections::HashMap;
//!
//! struct MyNode;
//! impl Node for MyNode {
//!     fn on_fire(&mut self, _ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = NodeRegistry::new();
//! registry.register("MyNode", |_attrs| Box::new(MyNode));
//! let node = registry.create("MyNode", &HashMap::new()).unwrap();
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::node::Node;

/// Type alias for node factory functions.
pub type NodeFactory = Arc<dyn Fn(&HashMap<String, String>) -> Box<dyn Node> + Send + Sync>;

/// A registry of node factories keyed by kind name.
#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&HashMap<String, String>) -> Box<dyn Node> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    /// Creates a node of the given kind, or `None` if unregistered.
    pub fn create(&self, kind: &str, attrs: &HashMap<String, String>) -> Option<Box<dyn Node>> {
        self.factories.get(kind).map(|f| f(attrs))
    }

    /// True if `kind` is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Iterates over registered kind names.
    pub fn kinds(&self) -> impl Iterator<Item = &String> {
        self.factories.keys()
    }

    /// Removes a kind; returns whether it was present.
    pub fn unregister(&mut self, kind: &str) -> bool {
        self.factories.remove(kind).is_some()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Creates a registry with the built-in utility nodes.
///
/// Registered kinds:
/// - `Heartbeat` — attrs: `period` (ns, default 1ms), `value` (int, default 1)
/// - `Add` — attrs: `arity` (default 2), `require_all` (default false)
/// - `Passthrough`
/// - `SampleHold`
pub fn default_registry() -> NodeRegistry {
    use crate::nodes::{AddNode, HeartbeatNode, PassthroughNode, SampleHoldNode};
    use crate::types::MILLIS;
    use crate::value::Value;

    let mut registry = NodeRegistry::new();

    registry.register("Heartbeat", |attrs| {
        let period = attrs
            .get("period")
            .and_then(|s| s.parse().ok())
            .unwrap_or(MILLIS);
        let value = attrs
            .get("value")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);
        Box::new(HeartbeatNode::new(period, Value::Int(value)))
    });

    registry.register("Add", |attrs| {
        let arity = attrs.get("arity").and_then(|s| s.parse().ok()).unwrap_or(2);
        let require_all = attrs
            .get("require_all")
            .and_then(|s| s.parse().ok())
            .unwrap_or(false);
        let node = AddNode::new(arity);
        Box::new(if require_all { node.requiring_all() } else { node })
    });

    registry.register("Passthrough", |_| Box::new(PassthroughNode::new()));

    registry.register("SampleHold", |_| Box::new(SampleHoldNode::new()));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::PassthroughNode;

    #[test]
    fn test_register_and_create() {
        let mut registry = NodeRegistry::new();
        assert!(registry.is_empty());

        registry.register("Pass", |_| Box::new(PassthroughNode::new()));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("Pass"));

        let attrs = HashMap::new();
        assert!(registry.create("Pass", &attrs).is_some());
        assert!(registry.create("Missing", &attrs).is_none());
    }

    #[test]
    fn test_factory_reads_attrs() {
        let registry = default_registry();
        let mut attrs = HashMap::new();
        attrs.insert("period".to_string(), "500".to_string());
        assert!(registry.create("Heartbeat", &attrs).is_some());
    }

    #[test]
    fn test_default_registry_kinds() {
        let registry = default_registry();
        for kind in ["Heartbeat", "Add", "Passthrough", "SampleHold"] {
            assert!(registry.contains(kind), "missing {}", kind);
        }
    }

    #[test]
    fn test_unregister() {
        let mut registry = default_registry();
        assert!(registry.unregister("Add"));
        assert!(!registry.contains("Add"));
        assert!(!registry.unregister("Add"));
    }
}
