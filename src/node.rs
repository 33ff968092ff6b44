//! Node runtime: the `Node` trait and its invocation context.
//!
//! Nodes are the units of computation in the graph. Each node is a private
//! state machine wired to typed input and output edges; the scheduler calls
//! `on_fire` whenever at least one of the node's active inputs ticked at the
//! current engine time.
//!
//! Handlers never touch the engine directly. Reads go through [`NodeCtx`];
//! writes, alarms and dynamic sub-graph requests are queued as [`Action`]s
//! that the engine applies in deterministic (rank, seq) order after the
//! handler returns.

use crate::error::{NodeError, RuntimeError};
use crate::series::TickBuffer;
use crate::types::{EdgeId, NodeId, Span, Time};
use crate::value::{Key, Value};

/// Maximum number of input subscriptions per node (ticked-set is a bitmask).
pub const MAX_INPUTS: usize = 64;

/// A node's subscription to one input edge.
#[derive(Clone, Debug)]
pub struct InputBinding {
    /// The subscribed edge
    pub edge: EdgeId,
    /// Active subscriptions cause the node to fire when the edge ticks;
    /// passive ones only update the node's view.
    pub active: bool,
    /// Number of past ticks the node may read (`input_at(input, k)` for
    /// `k < history`).
    pub history: usize,
}

/// A consumer entry on an edge: which node, which input slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Consumer {
    /// Subscribing node
    pub node: NodeId,
    /// Input index on that node
    pub input: usize,
}

/// Handle to a pending alarm, used for cancellation.
///
/// Canceling a handle whose alarm already fired is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AlarmHandle(pub(crate) u64);

/// A deferred effect queued by a node handler.
///
/// Actions are applied by the engine after the handler returns, in the
/// order they were queued.
#[derive(Debug)]
pub(crate) enum Action {
    /// Write `value` to the node's output slot `output` at the current time.
    Write { output: usize, value: Value },
    /// Schedule alarm slot `alarm` to fire after `delay`.
    ScheduleAlarm {
        alarm: usize,
        delay: Span,
        value: Value,
        handle: AlarmHandle,
    },
    /// Cancel a pending alarm.
    CancelAlarm { handle: AlarmHandle },
    /// Instantiate the keyed sub-graph `template` for `key`.
    Spawn { template: usize, key: Key },
    /// Tear down the keyed sub-graph `template`/`key` at cycle end.
    Remove { template: usize, key: Key },
}

/// Read access to edge buffers, implemented by the engine's edge store.
pub trait EdgeReader {
    /// Returns the tick buffer of `edge`, if the edge is alive.
    fn buffer(&self, edge: EdgeId) -> Option<&TickBuffer>;
}

/// The invocation context handed to node handlers.
///
/// Provides the current engine time, the set of inputs that ticked this
/// cycle, read access to input histories, and queues for outputs, alarms
/// and dynamic sub-graph requests.
pub struct NodeCtx<'a> {
    pub(crate) node: NodeId,
    pub(crate) name: &'a str,
    pub(crate) time: Time,
    pub(crate) ticked: u64,
    pub(crate) inputs: &'a [InputBinding],
    pub(crate) edges: &'a dyn EdgeReader,
    /// Alarm payloads delivered this cycle, indexed by alarm slot.
    pub(crate) alarm_ticks: &'a [Option<Value>],
    pub(crate) actions: &'a mut Vec<Action>,
    pub(crate) next_alarm_handle: &'a mut u64,
}

impl<'a> NodeCtx<'a> {
    /// The current engine time.
    pub fn time(&self) -> Time {
        self.time
    }

    /// This node's id.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// This node's name, as registered at build time.
    pub fn name(&self) -> &str {
        self.name
    }

    /// True iff input `input` ticked in the current cycle.
    pub fn ticked(&self, input: usize) -> bool {
        input < self.inputs.len() && self.ticked & (1 << input) != 0
    }

    /// Bitmask of inputs (active and passive) that ticked this cycle.
    ///
    /// Bit `i` corresponds to input `i`. Zero during `on_start` and
    /// alarm-only fires.
    pub fn ticked_mask(&self) -> u64 {
        self.ticked
    }

    /// Last value on input `input`, or `None` if the edge never ticked.
    pub fn input(&self, input: usize) -> Option<&Value> {
        let binding = self.inputs.get(input)?;
        self.edges.buffer(binding.edge)?.last().map(|(_, v)| v)
    }

    /// Time of the last tick on input `input`.
    pub fn input_time(&self, input: usize) -> Option<Time> {
        let binding = self.inputs.get(input)?;
        self.edges.buffer(binding.edge)?.last_time()
    }

    /// The sample `k` ticks ago on input `input` (`k == 0` is the latest).
    ///
    /// Fails with [`RuntimeError::HistoryUnderflow`] when the edge holds
    /// fewer than `k + 1` samples; whether to propagate is the node's
    /// choice.
    pub fn input_at(&self, input: usize, k: usize) -> Result<(Time, &Value), RuntimeError> {
        let binding = self
            .inputs
            .get(input)
            .ok_or_else(|| RuntimeError::InvariantViolation(format!("no input {}", input)))?;
        let buffer = self.edges.buffer(binding.edge).ok_or_else(|| {
            RuntimeError::InvariantViolation(format!("input {} edge is gone", input))
        })?;
        buffer.at(k)
    }

    /// True iff alarm slot `alarm` fired this cycle.
    pub fn alarm_ticked(&self, alarm: usize) -> bool {
        self.alarm_ticks.get(alarm).map_or(false, Option::is_some)
    }

    /// Payload of alarm slot `alarm`, if it fired this cycle.
    pub fn alarm_value(&self, alarm: usize) -> Option<&Value> {
        self.alarm_ticks.get(alarm)?.as_ref()
    }

    /// Writes `value` to output slot `output` at the current engine time.
    ///
    /// The write propagates to all consumers after this handler returns;
    /// downstream nodes fire within the same cycle at their (higher) rank.
    /// Writes to a feedback edge are delivered in the next cycle at the
    /// same engine time.
    pub fn output(&mut self, output: usize, value: Value) {
        self.actions.push(Action::Write { output, value });
    }

    /// Schedules alarm slot `alarm` to deliver `value` after `delay`.
    ///
    /// A zero delay fires at the current engine time, but only after all
    /// same-time direct propagation has settled.
    pub fn schedule_alarm(&mut self, alarm: usize, delay: Span, value: Value) -> AlarmHandle {
        let handle = AlarmHandle(*self.next_alarm_handle);
        *self.next_alarm_handle += 1;
        self.actions.push(Action::ScheduleAlarm {
            alarm,
            delay,
            value,
            handle,
        });
        handle
    }

    /// Cancels a pending alarm. No-op if the alarm already fired.
    pub fn cancel_alarm(&mut self, handle: AlarmHandle) {
        self.actions.push(Action::CancelAlarm { handle });
    }

    /// Requests instantiation of keyed sub-graph `template` for `key`.
    ///
    /// The instance is built, ranked past this node, and started before the
    /// cycle loop resumes; it can fire no earlier than this cycle at a
    /// higher rank. Spawning an already-live key is a no-op.
    pub fn spawn_keyed(&mut self, template: usize, key: Key) {
        self.actions.push(Action::Spawn { template, key });
    }

    /// Requests teardown of keyed sub-graph `template`/`key`.
    ///
    /// Teardown is deferred to the end of the current cycle.
    pub fn remove_keyed(&mut self, template: usize, key: Key) {
        self.actions.push(Action::Remove { template, key });
    }
}

/// The core trait implemented by every node.
///
/// Lifecycle: `on_start` runs once after all edges are wired, in rank
/// order; `on_fire` runs at most once per cycle, whenever an active input
/// or an alarm ticked; `on_stop` runs at shutdown in reverse rank order.
///
/// Handlers must not block: the engine is single-threaded and a blocking
/// handler stalls every node.
pub trait Node: Send {
    /// Called once before the first cycle. May write initial outputs and
    /// schedule alarms; those effects are delivered at the engine start
    /// time like any other event.
    fn on_start(&mut self, _ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
        Ok(())
    }

    /// Called when at least one active input or alarm ticked at the
    /// current engine time.
    fn on_fire(&mut self, ctx: &mut NodeCtx<'_>) -> Result<(), NodeError>;

    /// Called once at shutdown or sub-graph teardown.
    fn on_stop(&mut self, _ctx: &mut NodeCtx<'_>) {}
}
