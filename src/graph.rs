//! Graph construction, rank assignment and the frozen runtime graph.
//!
//! Building is strictly separated from running: a [`GraphBuilder`] records
//! nodes, edges, subscriptions, adapters and sub-graph templates, and
//! [`GraphBuilder::finalize`] performs topological ranking (Kahn), cycle
//! detection and buffer sizing, producing a frozen [`Graph`] the engine
//! consumes. The static portion of a finalized graph never changes; keyed
//! sub-graph instances extend the node and edge tables at runtime.

use std::collections::VecDeque;

use crate::adapter::AdapterDecl;
use crate::dynamic::SubgraphTemplate;
use crate::error::BuildError;
use crate::node::{Consumer, InputBinding, Node, MAX_INPUTS};
use crate::series::TickBuffer;
use crate::types::{EdgeId, NodeId, Rank};
use crate::value::{Key, ValueType};

/// Who writes an edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Producer {
    /// A node's output slot
    Node(NodeId),
    /// An adapter (index into the adapter table)
    Adapter(usize),
    /// The basket output of a sub-graph template, logically owned by the
    /// managing node
    Basket { manager: NodeId, template: usize },
}

/// One output slot of a node.
#[derive(Clone, Debug)]
pub(crate) struct OutputBinding {
    /// Target edge
    pub edge: EdgeId,
    /// For dynamic instance nodes writing a basket: the instance key each
    /// sample is tagged with.
    pub keyed: Option<Key>,
}

/// Static description of a node in the frozen graph.
#[derive(Debug)]
pub(crate) struct NodeMeta {
    pub name: String,
    pub rank: Rank,
    pub inputs: Vec<InputBinding>,
    pub outputs: Vec<OutputBinding>,
    /// Declared alarm payload types, by alarm slot.
    pub alarms: Vec<ValueType>,
}

/// Runtime state of an edge: type, wiring and tick history.
#[derive(Debug)]
pub(crate) struct EdgeSlot {
    pub ty: ValueType,
    pub feedback: bool,
    /// `None` only for an edge nothing consumes or produces.
    pub producer: Option<Producer>,
    pub consumers: Vec<Consumer>,
    pub buffer: TickBuffer,
    /// Name under which this edge's ticks are recorded in the run output.
    pub tap: Option<String>,
}

/// Options for an input subscription.
#[derive(Clone, Debug)]
pub struct InputOpts {
    /// Active inputs cause the node to fire when they tick.
    pub active: bool,
    /// How many past ticks the node may read (≥ 1).
    pub history: usize,
    /// Optional declared type; checked against the edge type at bind time.
    pub expects: Option<ValueType>,
}

impl Default for InputOpts {
    fn default() -> Self {
        Self {
            active: true,
            history: 1,
            expects: None,
        }
    }
}

impl InputOpts {
    /// An active subscription with default history.
    pub fn active() -> Self {
        Self::default()
    }

    /// A passive subscription: ticks update the node's view but do not
    /// fire it.
    pub fn passive() -> Self {
        Self {
            active: false,
            ..Self::default()
        }
    }

    /// Requests access to the last `history` ticks.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history.max(1);
        self
    }

    /// Declares the expected edge type, checked at bind time.
    pub fn expecting(mut self, ty: ValueType) -> Self {
        self.expects = Some(ty);
        self
    }
}

struct BuilderEdge {
    ty: ValueType,
    feedback: bool,
    producer: Option<Producer>,
    consumers: Vec<Consumer>,
    tap: Option<String>,
}

struct BuilderNode {
    name: String,
    imp: Box<dyn Node>,
    inputs: Vec<InputBinding>,
    outputs: Vec<OutputBinding>,
    alarms: Vec<ValueType>,
}

/// Declared sub-graph template plus its wiring.
pub(crate) struct TemplateDecl {
    pub template: SubgraphTemplate,
    /// Edge receiving the keyed output of all instances, if any.
    pub basket: Option<EdgeId>,
}

/// Records nodes, edges and adapters; frozen into a [`Graph`] by
/// [`finalize`](GraphBuilder::finalize).
///
/// # Example
///
/// ```ignore
/// let mut g = GraphBuilder::new();
/// let prices = g.add_edge(ValueType::Float);
/// let avg = g.add_edge(ValueType::Float);
/// let n = g.add_node("ema", Box::new(EmaNode::new(0.1)));
/// g.bind_input(n, prices, InputOpts::active())?;
/// g.bind_output(n, avg, ValueType::Float)?;
/// let graph = g.finalize()?;
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<BuilderNode>,
    edges: Vec<BuilderEdge>,
    adapters: Vec<AdapterDecl>,
    templates: Vec<TemplateDecl>,
}

impl GraphBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a forward edge carrying values of type `ty`.
    pub fn add_edge(&mut self, ty: ValueType) -> EdgeId {
        self.push_edge(ty, false)
    }

    /// Creates a feedback edge carrying values of type `ty`.
    ///
    /// Feedback edges are excluded from ranking and cycle detection; their
    /// deliveries are deferred to the next cycle at the same engine time.
    pub fn add_feedback_edge(&mut self, ty: ValueType) -> EdgeId {
        self.push_edge(ty, true)
    }

    fn push_edge(&mut self, ty: ValueType, feedback: bool) -> EdgeId {
        let id = self.edges.len() as EdgeId;
        self.edges.push(BuilderEdge {
            ty,
            feedback,
            producer: None,
            consumers: Vec::new(),
            tap: None,
        });
        id
    }

    /// Adds a node and returns its id.
    pub fn add_node(&mut self, name: impl Into<String>, imp: Box<dyn Node>) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(BuilderNode {
            name: name.into(),
            imp,
            inputs: Vec::new(),
            outputs: Vec::new(),
            alarms: Vec::new(),
        });
        id
    }

    /// Subscribes `node` to `edge`; returns the input slot index.
    pub fn bind_input(
        &mut self,
        node: NodeId,
        edge: EdgeId,
        opts: InputOpts,
    ) -> Result<usize, BuildError> {
        let ty = self.edge_type(edge)?.clone();
        if let Some(expected) = &opts.expects {
            if *expected != ty {
                return Err(BuildError::TypeMismatch {
                    edge,
                    edge_type: ty,
                    declared: expected.clone(),
                });
            }
        }
        let entry = self.node_mut(node)?;
        if entry.inputs.iter().any(|b| b.edge == edge) {
            return Err(BuildError::DuplicateEdge {
                reason: format!("node {} already subscribes edge {}", entry.name, edge),
            });
        }
        let input = entry.inputs.len();
        entry.inputs.push(InputBinding {
            edge,
            active: opts.active,
            history: opts.history.max(1),
        });
        let node_idx = node;
        self.edges[edge as usize].consumers.push(Consumer {
            node: node_idx,
            input,
        });
        Ok(input)
    }

    /// Makes `node` the producer of `edge`; returns the output slot index.
    ///
    /// `produces` is the type the node emits on this slot and must match
    /// the edge type.
    pub fn bind_output(
        &mut self,
        node: NodeId,
        edge: EdgeId,
        produces: ValueType,
    ) -> Result<usize, BuildError> {
        let ty = self.edge_type(edge)?.clone();
        if produces != ty {
            return Err(BuildError::TypeMismatch {
                edge,
                edge_type: ty,
                declared: produces,
            });
        }
        self.claim_edge(edge, Producer::Node(node))?;
        let entry = self.node_mut(node)?;
        let output = entry.outputs.len();
        entry.outputs.push(OutputBinding { edge, keyed: None });
        Ok(output)
    }

    /// Declares an alarm slot of payload type `ty` on `node`; returns the
    /// alarm slot index.
    pub fn add_alarm(&mut self, node: NodeId, ty: ValueType) -> Result<usize, BuildError> {
        let entry = self.node_mut(node)?;
        entry.alarms.push(ty);
        Ok(entry.alarms.len() - 1)
    }

    /// Records the tick stream of `edge` in the run output under `name`.
    pub fn tap(&mut self, edge: EdgeId, name: impl Into<String>) -> Result<(), BuildError> {
        let name = name.into();
        if self
            .edges
            .iter()
            .any(|e| e.tap.as_deref() == Some(name.as_str()))
        {
            return Err(BuildError::DuplicateEdge {
                reason: format!("tap name {} already in use", name),
            });
        }
        self.edge_mut(edge)?.tap = Some(name);
        Ok(())
    }

    /// Registers an adapter as the producer of an edge.
    ///
    /// Used through the typed helpers on [`crate::adapter`]; the
    /// declaration carries the adapter's output type, checked against the
    /// edge here.
    pub fn add_adapter(&mut self, decl: AdapterDecl) -> Result<usize, BuildError> {
        let edge = decl.edge();
        let ty = self.edge_type(edge)?.clone();
        if *decl.value_type() != ty {
            return Err(BuildError::TypeMismatch {
                edge,
                edge_type: ty,
                declared: decl.value_type().clone(),
            });
        }
        let idx = self.adapters.len();
        self.claim_edge(edge, Producer::Adapter(idx))?;
        self.adapters.push(decl);
        Ok(idx)
    }

    /// Registers a keyed sub-graph template; returns the template id used
    /// with [`NodeCtx::spawn_keyed`](crate::node::NodeCtx::spawn_keyed).
    ///
    /// `basket` is the edge receiving every instance's keyed output; its
    /// producer becomes the template's managing node. Instances write into
    /// it with their samples wrapped by [`crate::value::Value::keyed`];
    /// deliveries are deferred one cycle, like feedback.
    pub fn add_template(
        &mut self,
        manager: NodeId,
        basket: Option<EdgeId>,
        template: SubgraphTemplate,
    ) -> Result<usize, BuildError> {
        self.node_mut(manager)?;
        let id = self.templates.len();
        if let Some(edge) = basket {
            self.edge_type(edge)?;
            self.claim_edge(edge, Producer::Basket { manager, template: id })?;
        }
        self.templates.push(TemplateDecl { template, basket });
        Ok(id)
    }

    fn claim_edge(&mut self, edge: EdgeId, producer: Producer) -> Result<(), BuildError> {
        let entry = self.edge_mut(edge)?;
        if entry.producer.is_some() {
            return Err(BuildError::DuplicateEdge {
                reason: format!("edge {} already has a producer", edge),
            });
        }
        entry.producer = Some(producer);
        Ok(())
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut BuilderNode, BuildError> {
        self.nodes.get_mut(node as usize).ok_or(BuildError::UnknownId {
            what: "node",
            id: node as u64,
        })
    }

    fn edge_mut(&mut self, edge: EdgeId) -> Result<&mut BuilderEdge, BuildError> {
        self.edges.get_mut(edge as usize).ok_or(BuildError::UnknownId {
            what: "edge",
            id: edge as u64,
        })
    }

    fn edge_type(&self, edge: EdgeId) -> Result<&ValueType, BuildError> {
        self.edges
            .get(edge as usize)
            .map(|e| &e.ty)
            .ok_or(BuildError::UnknownId {
                what: "edge",
                id: edge as u64,
            })
    }

    /// Freezes the graph: validates wiring, assigns ranks and sizes
    /// buffers.
    ///
    /// Ranks are longest-path topological numbers over non-feedback
    /// node-to-node edges; a cycle not closed by a feedback edge fails
    /// with [`BuildError::CycleDetected`].
    pub fn finalize(self) -> Result<Graph, BuildError> {
        let node_count = self.nodes.len();

        for (id, node) in self.nodes.iter().enumerate() {
            if node.inputs.len() > MAX_INPUTS {
                return Err(BuildError::TooManyInputs {
                    node: id as NodeId,
                    name: node.name.clone(),
                    max: MAX_INPUTS,
                });
            }
        }

        // Every consumed edge needs a producer.
        for edge in &self.edges {
            if edge.producer.is_none() {
                if let Some(consumer) = edge.consumers.first() {
                    let node = &self.nodes[consumer.node as usize];
                    let bound = node.inputs[consumer.input].edge;
                    return Err(BuildError::UnwiredInput {
                        node: consumer.node,
                        name: node.name.clone(),
                        input: consumer.input,
                        edge: bound,
                    });
                }
            }
        }

        // Kahn over node-to-node forward edges, tracking longest paths.
        let mut in_degree = vec![0usize; node_count];
        let mut ranks = vec![0 as Rank; node_count];
        for edge in &self.edges {
            if edge.feedback {
                continue;
            }
            if let Some(Producer::Node(_)) = edge.producer {
                for consumer in &edge.consumers {
                    in_degree[consumer.node as usize] += 1;
                }
            }
        }

        let mut queue: VecDeque<NodeId> = (0..node_count as NodeId)
            .filter(|&n| in_degree[n as usize] == 0)
            .collect();
        let mut processed = 0usize;
        while let Some(node) = queue.pop_front() {
            processed += 1;
            for output in &self.nodes[node as usize].outputs {
                let edge = &self.edges[output.edge as usize];
                if edge.feedback {
                    continue;
                }
                for consumer in &edge.consumers {
                    let idx = consumer.node as usize;
                    ranks[idx] = ranks[idx].max(ranks[node as usize] + 1);
                    in_degree[idx] -= 1;
                    if in_degree[idx] == 0 {
                        queue.push_back(consumer.node);
                    }
                }
            }
        }
        if processed != node_count {
            let stuck = in_degree
                .iter()
                .position(|&d| d > 0)
                .unwrap_or(0);
            return Err(BuildError::CycleDetected {
                node: stuck as NodeId,
                name: self.nodes[stuck].name.clone(),
            });
        }

        // Buffer depth: deepest subscription history + 1, at least 2.
        let mut edges = Vec::with_capacity(self.edges.len());
        for builder_edge in &self.edges {
            let max_history = builder_edge
                .consumers
                .iter()
                .map(|c| self.nodes[c.node as usize].inputs[c.input].history)
                .max()
                .unwrap_or(1);
            edges.push(Some(EdgeSlot {
                ty: builder_edge.ty.clone(),
                feedback: builder_edge.feedback,
                producer: builder_edge.producer.clone(),
                consumers: builder_edge.consumers.clone(),
                buffer: TickBuffer::new(max_history + 1),
                tap: builder_edge.tap.clone(),
            }));
        }

        let mut metas = Vec::with_capacity(node_count);
        let mut impls = Vec::with_capacity(node_count);
        for (id, node) in self.nodes.into_iter().enumerate() {
            metas.push(Some(NodeMeta {
                name: node.name,
                rank: ranks[id],
                inputs: node.inputs,
                outputs: node.outputs,
                alarms: node.alarms,
            }));
            impls.push(Some(node.imp));
        }

        let mut start_order: Vec<NodeId> = (0..node_count as NodeId).collect();
        start_order.sort_by_key(|&n| (ranks[n as usize], n));

        let max_rank = ranks.iter().copied().max().unwrap_or(0);
        Ok(Graph {
            metas,
            impls,
            edges,
            adapters: self.adapters,
            templates: self.templates,
            start_order,
            max_rank,
        })
    }
}

/// A frozen, runnable graph.
///
/// Produced by [`GraphBuilder::finalize`]; consumed by the engine. The
/// static node and edge tables are fixed; keyed sub-graph instances append
/// behind them and vacate their slots on teardown.
pub struct Graph {
    pub(crate) metas: Vec<Option<NodeMeta>>,
    pub(crate) impls: Vec<Option<Box<dyn Node>>>,
    pub(crate) edges: Vec<Option<EdgeSlot>>,
    pub(crate) adapters: Vec<AdapterDecl>,
    pub(crate) templates: Vec<TemplateDecl>,
    /// Static nodes in (rank, id) order, used for start/stop hooks.
    pub(crate) start_order: Vec<NodeId>,
    pub(crate) max_rank: Rank,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.metas.len())
            .field("edge_count", &self.edges.len())
            .field("max_rank", &self.max_rank)
            .finish()
    }
}

impl crate::node::EdgeReader for Graph {
    fn buffer(&self, edge: EdgeId) -> Option<&TickBuffer> {
        self.edges
            .get(edge as usize)?
            .as_ref()
            .map(|slot| &slot.buffer)
    }
}

impl Graph {
    /// Number of live nodes (static plus dynamic instances).
    pub fn node_count(&self) -> usize {
        self.metas.iter().filter(|m| m.is_some()).count()
    }

    /// Number of live edges.
    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    /// Rank of `node`, if alive.
    pub fn rank(&self, node: NodeId) -> Option<Rank> {
        self.metas.get(node as usize)?.as_ref().map(|m| m.rank)
    }

    /// Highest rank among static nodes.
    pub fn max_rank(&self) -> Rank {
        self.max_rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::node::NodeCtx;

    struct NullNode;

    impl Node for NullNode {
        fn on_fire(&mut self, _ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
            Ok(())
        }
    }

    fn null() -> Box<dyn Node> {
        Box::new(NullNode)
    }

    #[test]
    fn test_linear_ranks() {
        let mut g = GraphBuilder::new();
        let e1 = g.add_edge(ValueType::Int);
        let e2 = g.add_edge(ValueType::Int);
        let a = g.add_node("a", null());
        let b = g.add_node("b", null());
        let c = g.add_node("c", null());
        g.bind_output(a, e1, ValueType::Int).unwrap();
        g.bind_input(b, e1, InputOpts::active()).unwrap();
        g.bind_output(b, e2, ValueType::Int).unwrap();
        g.bind_input(c, e2, InputOpts::active()).unwrap();

        let graph = g.finalize().unwrap();
        assert_eq!(graph.rank(a), Some(0));
        assert_eq!(graph.rank(b), Some(1));
        assert_eq!(graph.rank(c), Some(2));
        assert_eq!(graph.max_rank(), 2);
    }

    #[test]
    fn test_diamond_longest_path_ranks() {
        // a -> b -> d and a -> d directly: d ranks past the longer path.
        let mut g = GraphBuilder::new();
        let ab = g.add_edge(ValueType::Int);
        let bd = g.add_edge(ValueType::Int);
        let ad = g.add_edge(ValueType::Int);
        let a = g.add_node("a", null());
        let b = g.add_node("b", null());
        let d = g.add_node("d", null());
        g.bind_output(a, ab, ValueType::Int).unwrap();
        g.bind_output(b, bd, ValueType::Int).unwrap();
        g.bind_input(b, ab, InputOpts::active()).unwrap();
        g.bind_input(d, bd, InputOpts::active()).unwrap();
        // Second output of a, consumed directly by d
        let a_out2 = g.bind_output(a, ad, ValueType::Int).unwrap();
        assert_eq!(a_out2, 1);
        g.bind_input(d, ad, InputOpts::active()).unwrap();

        let graph = g.finalize().unwrap();
        assert_eq!(graph.rank(a), Some(0));
        assert_eq!(graph.rank(b), Some(1));
        assert_eq!(graph.rank(d), Some(2));
    }

    #[test]
    fn test_cycle_detected() {
        let mut g = GraphBuilder::new();
        let e1 = g.add_edge(ValueType::Int);
        let e2 = g.add_edge(ValueType::Int);
        let n1 = g.add_node("n1", null());
        let n2 = g.add_node("n2", null());
        g.bind_output(n1, e1, ValueType::Int).unwrap();
        g.bind_input(n2, e1, InputOpts::active()).unwrap();
        g.bind_output(n2, e2, ValueType::Int).unwrap();
        g.bind_input(n1, e2, InputOpts::active()).unwrap();

        assert!(matches!(
            g.finalize(),
            Err(BuildError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_feedback_edge_breaks_cycle() {
        let mut g = GraphBuilder::new();
        let fwd = g.add_edge(ValueType::Int);
        let back = g.add_feedback_edge(ValueType::Int);
        let n1 = g.add_node("n1", null());
        let n2 = g.add_node("n2", null());
        g.bind_output(n1, fwd, ValueType::Int).unwrap();
        g.bind_input(n2, fwd, InputOpts::active()).unwrap();
        g.bind_output(n2, back, ValueType::Int).unwrap();
        g.bind_input(n1, back, InputOpts::passive()).unwrap();

        let graph = g.finalize().unwrap();
        assert_eq!(graph.rank(n1), Some(0));
        assert_eq!(graph.rank(n2), Some(1));
    }

    #[test]
    fn test_duplicate_producer_rejected() {
        let mut g = GraphBuilder::new();
        let e = g.add_edge(ValueType::Int);
        let a = g.add_node("a", null());
        let b = g.add_node("b", null());
        g.bind_output(a, e, ValueType::Int).unwrap();
        assert!(matches!(
            g.bind_output(b, e, ValueType::Int),
            Err(BuildError::DuplicateEdge { .. })
        ));
    }

    #[test]
    fn test_duplicate_subscription_rejected() {
        let mut g = GraphBuilder::new();
        let e = g.add_edge(ValueType::Int);
        let a = g.add_node("a", null());
        let b = g.add_node("b", null());
        g.bind_output(a, e, ValueType::Int).unwrap();
        g.bind_input(b, e, InputOpts::active()).unwrap();
        assert!(matches!(
            g.bind_input(b, e, InputOpts::passive()),
            Err(BuildError::DuplicateEdge { .. })
        ));
    }

    #[test]
    fn test_type_mismatch_on_bind() {
        let mut g = GraphBuilder::new();
        let e = g.add_edge(ValueType::Int);
        let a = g.add_node("a", null());
        assert!(matches!(
            g.bind_output(a, e, ValueType::Float),
            Err(BuildError::TypeMismatch { .. })
        ));
        let b = g.add_node("b", null());
        assert!(matches!(
            g.bind_input(b, e, InputOpts::active().expecting(ValueType::Str)),
            Err(BuildError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unwired_input_rejected() {
        let mut g = GraphBuilder::new();
        let e = g.add_edge(ValueType::Int);
        let b = g.add_node("b", null());
        g.bind_input(b, e, InputOpts::active()).unwrap();
        assert!(matches!(
            g.finalize(),
            Err(BuildError::UnwiredInput { input: 0, .. })
        ));
    }

    #[test]
    fn test_buffer_sized_from_deepest_history() {
        let mut g = GraphBuilder::new();
        let e = g.add_edge(ValueType::Int);
        let a = g.add_node("a", null());
        let b = g.add_node("b", null());
        let c = g.add_node("c", null());
        g.bind_output(a, e, ValueType::Int).unwrap();
        g.bind_input(b, e, InputOpts::active().with_history(5)).unwrap();
        g.bind_input(c, e, InputOpts::active()).unwrap();

        let graph = g.finalize().unwrap();
        let slot = graph.edges[e as usize].as_ref().unwrap();
        assert_eq!(slot.buffer.capacity(), 6);
    }

    #[test]
    fn test_tap_names_unique() {
        let mut g = GraphBuilder::new();
        let e1 = g.add_edge(ValueType::Int);
        let e2 = g.add_edge(ValueType::Int);
        g.tap(e1, "out").unwrap();
        assert!(matches!(
            g.tap(e2, "out"),
            Err(BuildError::DuplicateEdge { .. })
        ));
    }
}
