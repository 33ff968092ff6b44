//! Keyed sub-graph templates and runtime instantiation.
//!
//! A template describes a graph fragment that the engine stamps out once
//! per discriminator key, on request of its managing node (see
//! [`NodeCtx::spawn_keyed`](crate::node::NodeCtx::spawn_keyed)). Instance
//! ranks are offsets past the manager's rank, fixed when the template is
//! written, so instantiation never re-runs topological sort. Instances are
//! started before the cycle loop resumes and torn down at cycle end.

use tracing::debug;

use crate::error::BuildError;
use crate::graph::{EdgeSlot, Graph, NodeMeta, OutputBinding, Producer};
use crate::node::{Consumer, InputBinding, Node, MAX_INPUTS};
use crate::series::TickBuffer;
use crate::types::{EdgeId, NodeId, Rank};
use crate::value::{Key, ValueType};

type TemplateFn = Box<dyn Fn(&mut SubgraphBuilder<'_>) -> Result<(), BuildError> + Send>;

/// A buildable sub-graph, instantiated once per key.
pub struct SubgraphTemplate {
    name: String,
    build: TemplateFn,
}

impl SubgraphTemplate {
    /// Creates a template; `build` runs once per new key with a builder
    /// scoped to the instance.
    pub fn new(
        name: impl Into<String>,
        build: impl Fn(&mut SubgraphBuilder<'_>) -> Result<(), BuildError> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            build: Box::new(build),
        }
    }

    /// Template name, for logs and stats.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stamps out the template for `key`, appending nodes and edges to the
    /// live graph. Instance ranks start at `base_rank` (one past the
    /// manager).
    pub(crate) fn instantiate(
        &self,
        key: &Key,
        graph: &mut Graph,
        base_rank: Rank,
        basket: Option<EdgeId>,
    ) -> Result<Instance, BuildError> {
        let mut builder = SubgraphBuilder {
            graph,
            key,
            base_rank,
            basket,
            nodes: Vec::new(),
            edges: Vec::new(),
            external_subs: Vec::new(),
        };
        (self.build)(&mut builder)?;
        let instance = builder.finish()?;
        debug!(
            template = %self.name,
            key = %key,
            nodes = instance.nodes.len(),
            edges = instance.edges.len(),
            "sub-graph instantiated"
        );
        Ok(instance)
    }
}

/// Bookkeeping for one live sub-graph instance.
#[derive(Debug)]
pub(crate) struct Instance {
    /// Instance nodes in (rank, id) order.
    pub nodes: Vec<NodeId>,
    /// Edges owned by the instance.
    pub edges: Vec<EdgeId>,
    /// Subscriptions the instance holds on edges that outlive it, to be
    /// unhooked at teardown.
    pub external_subs: Vec<(EdgeId, NodeId)>,
}

/// Builder handed to a template's build function.
///
/// Mirrors the static [`GraphBuilder`](crate::graph::GraphBuilder) API,
/// scoped to one instance: nodes rank relative to the manager, inputs may
/// subscribe to pre-existing edges of strictly lower rank, and outputs may
/// write instance edges or the template's basket.
pub struct SubgraphBuilder<'a> {
    graph: &'a mut Graph,
    key: &'a Key,
    base_rank: Rank,
    basket: Option<EdgeId>,
    nodes: Vec<NodeId>,
    edges: Vec<EdgeId>,
    external_subs: Vec<(EdgeId, NodeId)>,
}

impl<'a> SubgraphBuilder<'a> {
    /// The discriminator key this instance is built for.
    pub fn key(&self) -> &Key {
        self.key
    }

    /// Creates an edge owned by this instance.
    pub fn add_edge(&mut self, ty: ValueType) -> EdgeId {
        let id = self.graph.edges.len() as EdgeId;
        self.graph.edges.push(Some(EdgeSlot {
            ty,
            feedback: false,
            producer: None,
            consumers: Vec::new(),
            buffer: TickBuffer::new(1),
            tap: None,
        }));
        self.edges.push(id);
        id
    }

    /// Adds an instance node at rank `base + rank_offset`.
    ///
    /// Offsets order the instance internally, exactly like static ranks;
    /// wire producers at lower offsets than their consumers.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        imp: Box<dyn Node>,
        rank_offset: Rank,
    ) -> NodeId {
        let id = self.graph.metas.len() as NodeId;
        self.graph.metas.push(Some(NodeMeta {
            name: name.into(),
            rank: self.base_rank + rank_offset,
            inputs: Vec::new(),
            outputs: Vec::new(),
            alarms: Vec::new(),
        }));
        self.graph.impls.push(Some(imp));
        self.nodes.push(id);
        id
    }

    /// Subscribes an instance node to `edge`, which may be an instance
    /// edge or any pre-existing edge whose producer ranks strictly below
    /// the node.
    pub fn bind_input(
        &mut self,
        node: NodeId,
        edge: EdgeId,
        opts: crate::graph::InputOpts,
    ) -> Result<usize, BuildError> {
        self.check_owned_node(node)?;
        let node_rank = self.node_meta(node)?.rank;
        let slot = self.edge_slot(edge)?;
        if let Some(expected) = &opts.expects {
            if *expected != slot.ty {
                return Err(BuildError::TypeMismatch {
                    edge,
                    edge_type: slot.ty.clone(),
                    declared: expected.clone(),
                });
            }
        }
        let external = !self.edges.contains(&edge);
        if !slot.feedback {
            let producer_rank = match &slot.producer {
                Some(Producer::Node(p)) => self.graph.rank(*p),
                Some(Producer::Basket { manager, .. }) => self.graph.rank(*manager),
                Some(Producer::Adapter(_)) => Some(0),
                None => None,
            };
            if let Some(pr) = producer_rank {
                if pr >= node_rank {
                    let name = self.node_meta(node)?.name.clone();
                    return Err(BuildError::RankOrder { node, name });
                }
            }
        }

        let meta = self
            .graph
            .metas
            .get_mut(node as usize)
            .and_then(Option::as_mut)
            .ok_or(BuildError::UnknownId {
                what: "node",
                id: node as u64,
            })?;
        if meta.inputs.iter().any(|b| b.edge == edge) {
            return Err(BuildError::DuplicateEdge {
                reason: format!("node {} already subscribes edge {}", meta.name, edge),
            });
        }
        if meta.inputs.len() >= MAX_INPUTS {
            return Err(BuildError::TooManyInputs {
                node,
                name: meta.name.clone(),
                max: MAX_INPUTS,
            });
        }
        let input = meta.inputs.len();
        meta.inputs.push(InputBinding {
            edge,
            active: opts.active,
            history: opts.history.max(1),
        });
        let slot = self
            .graph
            .edges
            .get_mut(edge as usize)
            .and_then(Option::as_mut)
            .ok_or(BuildError::UnknownId {
                what: "edge",
                id: edge as u64,
            })?;
        slot.consumers.push(Consumer { node, input });
        if external {
            self.external_subs.push((edge, node));
        }
        Ok(input)
    }

    /// Makes an instance node the producer of an instance edge.
    pub fn bind_output(
        &mut self,
        node: NodeId,
        edge: EdgeId,
        produces: ValueType,
    ) -> Result<usize, BuildError> {
        self.check_owned_node(node)?;
        if !self.edges.contains(&edge) {
            return Err(BuildError::DuplicateEdge {
                reason: format!("edge {} is not owned by this sub-graph instance", edge),
            });
        }
        let slot = self.edge_slot(edge)?;
        if slot.ty != produces {
            return Err(BuildError::TypeMismatch {
                edge,
                edge_type: slot.ty.clone(),
                declared: produces,
            });
        }
        if slot.producer.is_some() {
            return Err(BuildError::DuplicateEdge {
                reason: format!("edge {} already has a producer", edge),
            });
        }
        let node_rank = self.node_meta(node)?.rank;
        for consumer in &slot.consumers {
            if self.graph.rank(consumer.node).unwrap_or(0) <= node_rank {
                let name = self.node_meta(consumer.node)?.name.clone();
                return Err(BuildError::RankOrder {
                    node: consumer.node,
                    name,
                });
            }
        }
        self.graph.edges[edge as usize]
            .as_mut()
            .expect("slot checked above")
            .producer = Some(Producer::Node(node));
        let meta = self
            .graph
            .metas
            .get_mut(node as usize)
            .and_then(Option::as_mut)
            .expect("node checked above");
        let output = meta.outputs.len();
        meta.outputs.push(OutputBinding { edge, keyed: None });
        Ok(output)
    }

    /// Routes one of `node`'s output slots to the template basket.
    ///
    /// Samples written there are wrapped by [`Value::keyed`] with this
    /// instance's key and delivered in the next cycle at the same time.
    pub fn bind_basket(&mut self, node: NodeId) -> Result<usize, BuildError> {
        self.check_owned_node(node)?;
        let basket = self.basket.ok_or(BuildError::DuplicateEdge {
            reason: "template has no basket edge".to_string(),
        })?;
        let meta = self
            .graph
            .metas
            .get_mut(node as usize)
            .and_then(Option::as_mut)
            .ok_or(BuildError::UnknownId {
                what: "node",
                id: node as u64,
            })?;
        let output = meta.outputs.len();
        meta.outputs.push(OutputBinding {
            edge: basket,
            keyed: Some(self.key.clone()),
        });
        Ok(output)
    }

    /// Declares an alarm slot on an instance node.
    pub fn add_alarm(&mut self, node: NodeId, ty: ValueType) -> Result<usize, BuildError> {
        self.check_owned_node(node)?;
        let meta = self
            .graph
            .metas
            .get_mut(node as usize)
            .and_then(Option::as_mut)
            .ok_or(BuildError::UnknownId {
                what: "node",
                id: node as u64,
            })?;
        meta.alarms.push(ty);
        Ok(meta.alarms.len() - 1)
    }

    fn check_owned_node(&self, node: NodeId) -> Result<(), BuildError> {
        if self.nodes.contains(&node) {
            Ok(())
        } else {
            Err(BuildError::UnknownId {
                what: "node",
                id: node as u64,
            })
        }
    }

    fn node_meta(&self, node: NodeId) -> Result<&NodeMeta, BuildError> {
        self.graph
            .metas
            .get(node as usize)
            .and_then(Option::as_ref)
            .ok_or(BuildError::UnknownId {
                what: "node",
                id: node as u64,
            })
    }

    fn edge_slot(&self, edge: EdgeId) -> Result<&EdgeSlot, BuildError> {
        self.graph
            .edges
            .get(edge as usize)
            .and_then(Option::as_ref)
            .ok_or(BuildError::UnknownId {
                what: "edge",
                id: edge as u64,
            })
    }

    fn finish(self) -> Result<Instance, BuildError> {
        // Every consumed instance edge needs a producer.
        for &edge in &self.edges {
            let slot = self.graph.edges[edge as usize].as_ref().expect("owned edge");
            if slot.producer.is_none() {
                if let Some(consumer) = slot.consumers.first() {
                    let meta = self.graph.metas[consumer.node as usize]
                        .as_ref()
                        .expect("owned node");
                    return Err(BuildError::UnwiredInput {
                        node: consumer.node,
                        name: meta.name.clone(),
                        input: consumer.input,
                        edge,
                    });
                }
            }
        }
        // Size instance buffers from the deepest subscription.
        for &edge in &self.edges {
            let slot = self.graph.edges[edge as usize].as_ref().expect("owned edge");
            let max_history = slot
                .consumers
                .iter()
                .filter_map(|c| {
                    self.graph.metas[c.node as usize]
                        .as_ref()
                        .map(|m| m.inputs[c.input].history)
                })
                .max()
                .unwrap_or(1);
            let capacity = max_history + 1;
            let slot = self.graph.edges[edge as usize].as_mut().expect("owned edge");
            if slot.buffer.capacity() < capacity {
                slot.buffer = TickBuffer::new(capacity);
            }
        }

        let mut nodes = self.nodes;
        let graph = &*self.graph;
        nodes.sort_by_key(|&n| (graph.rank(n).unwrap_or(0), n));
        Ok(Instance {
            nodes,
            edges: self.edges,
            external_subs: self.external_subs,
        })
    }
}
