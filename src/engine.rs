//! The execution engine: cycle loop, modes and lifecycle.
//!
//! The engine consumes a frozen [`Graph`] and drives it over a timeline:
//! pop the earliest scheduled time, apply that time's edge writes and
//! alarms, fire affected nodes rank by rank, and repeat. Feedback
//! deliveries and zero-delay alarms open follow-on cycles at the same
//! engine time, so direct propagation within a cycle can never re-fire a
//! node.
//!
//! In simulation mode the clock jumps to the next scheduled event and the
//! run ends when the queue drains. In real-time mode the clock tracks wall
//! time and the loop blocks on the push crossing's condition variable
//! until the next event is due, a push arrives, or `endtime` passes.
//!
//! The whole cycle loop is single-threaded; only push adapters and
//! [`EngineHandle::stop`] touch the engine from outside, through one mutex,
//! one condition variable and one atomic flag.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::adapter::{AdapterManager, PushShared};
use crate::dynamic::Instance;
use crate::error::{EngineError, EngineResult, RuntimeError};
use crate::graph::{Graph, Producer, TemplateDecl};
use crate::node::{Action, Consumer, NodeCtx};
use crate::sched::{EventKind, EventQueue, Scheduled};
use crate::series::Write as SeriesWrite;
use crate::stats::{NodeCounters, RunStats, Timer};
use crate::types::{EdgeId, NodeId, Rank, Time};
use crate::value::{Key, Value};

/// Execution mode for a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// As-fast-as-possible over historical data.
    Simulation,
    /// Engine clock tracks wall clock; live adapters feed the run.
    RealTime,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Simulation => write!(f, "simulation"),
            Mode::RealTime => write!(f, "realtime"),
        }
    }
}

/// Start time, end time and mode of a run.
#[derive(Clone, Copy, Debug)]
pub struct RunOptions {
    /// First engine time of the run.
    pub start: Time,
    /// Last engine time of the run (inclusive).
    pub end: Time,
    /// Execution mode.
    pub mode: Mode,
}

impl RunOptions {
    /// A simulation run over `[start, end]`.
    pub fn simulation(start: Time, end: Time) -> Self {
        Self {
            start,
            end,
            mode: Mode::Simulation,
        }
    }

    /// A real-time run over `[start, end]`.
    pub fn realtime(start: Time, end: Time) -> Self {
        Self {
            start,
            end,
            mode: Mode::RealTime,
        }
    }
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The queue drained (simulation).
    EndOfData,
    /// The end time passed.
    EndTime,
    /// [`EngineHandle::stop`] was called.
    Stopped,
}

/// Result of a completed run: tapped tick streams plus statistics.
#[derive(Debug)]
pub struct RunOutput {
    /// Recorded tick streams of tapped edges, keyed by tap name.
    pub taps: BTreeMap<String, Vec<(Time, Value)>>,
    /// Run statistics.
    pub stats: RunStats,
    /// Why the run ended.
    pub reason: StopReason,
}

impl RunOutput {
    /// The recorded stream of a tap, empty if it never ticked.
    pub fn tap(&self, name: &str) -> &[(Time, Value)] {
        self.taps.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Process exit code for a CLI wrapper: 0 on completion, 130 when
    /// externally stopped.
    pub fn exit_code(&self) -> i32 {
        match self.reason {
            StopReason::Stopped => 130,
            _ => 0,
        }
    }
}

/// Thread-safe external control of a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<PushShared>,
}

impl EngineHandle {
    /// Requests a stop. Idempotent and callable from any thread; the run
    /// terminates after the in-flight cycle completes and `on_stop` hooks
    /// run normally.
    pub fn stop(&self) {
        self.shared.stop.store(true, AtomicOrdering::Release);
        self.shared.notify();
    }

    /// True once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(AtomicOrdering::Acquire)
    }
}

enum Hook {
    Start,
    Fire,
    Stop,
}

struct WallClock {
    anchor: Instant,
    start: Time,
}

impl WallClock {
    fn new(start: Time) -> Self {
        Self {
            anchor: Instant::now(),
            start,
        }
    }

    fn now(&self) -> Time {
        self.start + self.anchor.elapsed().as_nanos() as Time
    }
}

/// The engine. Owns the graph, the event queue and all adapters for the
/// duration of one run.
pub struct Engine {
    graph: Graph,
    manager: AdapterManager,
    templates: Vec<TemplateDecl>,
    queue: EventQueue,
    /// Same-time follow-on deliveries: feedback writes, basket writes and
    /// zero-delay alarms, drained as the next cycle at the current time.
    deferred: Vec<Scheduled>,
    shared: Arc<PushShared>,
    now: Time,
    /// True while `on_start` hooks run; their writes are queued rather
    /// than applied to a cycle.
    startup: bool,

    // Per-cycle state, cleared at each cycle start.
    fires: BTreeMap<Rank, Vec<NodeId>>,
    fired: HashSet<NodeId>,
    ticked: HashMap<NodeId, u64>,
    alarm_payloads: HashMap<NodeId, Vec<Option<Value>>>,

    instances: HashMap<(usize, Key), Instance>,
    pending_removals: Vec<(usize, Key)>,
    started: Vec<NodeId>,
    next_alarm_handle: u64,
    node_fires: Vec<u64>,
    taps: BTreeMap<String, Vec<(Time, Value)>>,
    stats: RunStats,
    push_buf: Vec<(EdgeId, Time, Value)>,
}

impl Engine {
    /// Wraps a finalized graph for execution.
    pub fn new(mut graph: Graph) -> Self {
        let shared = Arc::new(PushShared::default());
        let adapters = std::mem::take(&mut graph.adapters);
        let templates = std::mem::take(&mut graph.templates);
        let manager = AdapterManager::new(adapters, Arc::clone(&shared));
        let node_fires = vec![0; graph.metas.len()];
        let mut taps = BTreeMap::new();
        for slot in graph.edges.iter().flatten() {
            if let Some(name) = &slot.tap {
                taps.insert(name.clone(), Vec::new());
            }
        }
        Self {
            graph,
            manager,
            templates,
            queue: EventQueue::new(),
            deferred: Vec::new(),
            shared,
            now: 0,
            startup: false,
            fires: BTreeMap::new(),
            fired: HashSet::new(),
            ticked: HashMap::new(),
            alarm_payloads: HashMap::new(),
            instances: HashMap::new(),
            pending_removals: Vec::new(),
            started: Vec::new(),
            next_alarm_handle: 0,
            node_fires,
            taps,
            stats: RunStats::new(),
            push_buf: Vec::new(),
        }
    }

    /// A handle for stopping the run from another thread.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Runs the graph to completion.
    ///
    /// Initializes adapters, runs `on_start` hooks in rank order, drains
    /// the cycle loop until end of data, `endtime`, or an external stop,
    /// then runs `on_stop` hooks in reverse rank order and shuts adapters
    /// down. On a fatal runtime error the same shutdown path runs before
    /// the error is returned.
    pub fn run(mut self, opts: RunOptions) -> EngineResult<RunOutput> {
        let timer = Timer::start();
        self.stats.record_start();
        self.stats.metadata.mode = opts.mode.to_string();
        self.now = opts.start;

        self.manager
            .open(opts.start, opts.end, &mut self.queue)
            .map_err(EngineError::from)?;
        debug!(start = opts.start, end = opts.end, mode = %opts.mode, "engine starting");

        let mut fatal: Option<EngineError> = None;

        self.startup = true;
        let order = self.graph.start_order.clone();
        for node in order {
            match self.start_node(opts.start, node) {
                Ok(()) => {}
                Err(e) => {
                    warn!(error = %e, "start hook failed");
                    fatal = Some(e.into());
                    break;
                }
            }
        }
        self.startup = false;

        let wall = match opts.mode {
            Mode::RealTime => Some(WallClock::new(opts.start)),
            Mode::Simulation => None,
        };

        let reason = if fatal.is_some() {
            StopReason::Stopped
        } else {
            loop {
                if self.shared.stop.load(AtomicOrdering::Acquire) {
                    break StopReason::Stopped;
                }
                let live_floor = match &wall {
                    Some(clock) => clock.now().max(self.now),
                    None => self.now,
                };
                self.drain_pushes(live_floor);
                let Some(t) = self.queue.peek_time() else {
                    match &wall {
                        None => break StopReason::EndOfData,
                        Some(clock) => {
                            let now_wall = clock.now();
                            if now_wall >= opts.end {
                                break StopReason::EndTime;
                            }
                            self.manager
                                .wait_pending(StdDuration::from_nanos(opts.end - now_wall));
                            continue;
                        }
                    }
                };
                if t > opts.end {
                    break StopReason::EndTime;
                }
                if let Some(clock) = &wall {
                    let now_wall = clock.now();
                    if t > now_wall {
                        self.manager
                            .wait_pending(StdDuration::from_nanos(t - now_wall));
                        continue;
                    }
                }
                if let Err(e) = self.run_at(t) {
                    warn!(error = %e, "fatal runtime error; stopping");
                    fatal = Some(e.into());
                    break StopReason::Stopped;
                }
            }
        };

        let stop_time = self.now.max(opts.start);
        self.shutdown_nodes(stop_time);
        self.manager.shutdown();
        debug!(reason = ?reason, final_time = self.now, "engine stopped");

        if let Some(e) = fatal {
            return Err(e);
        }

        self.stats.record_end();
        self.stats.engine.node_count = self.graph.node_count();
        self.stats.engine.edge_count = self.graph.edge_count();
        self.stats.nodes = self
            .graph
            .metas
            .iter()
            .enumerate()
            .filter_map(|(id, meta)| {
                meta.as_ref().map(|m| NodeCounters {
                    id: id as NodeId,
                    name: m.name.clone(),
                    rank: m.rank,
                    fires: self.node_fires.get(id).copied().unwrap_or(0),
                })
            })
            .collect();
        self.stats.compute_timing(timer.elapsed_ms());

        Ok(RunOutput {
            taps: self.taps,
            stats: self.stats,
            reason,
        })
    }

    /// Moves pending pushes into the queue under the late policy.
    ///
    /// `live_floor` is wall-now in real-time mode, engine-now in
    /// simulation.
    fn drain_pushes(&mut self, live_floor: Time) {
        let mut buf = std::mem::take(&mut self.push_buf);
        let counts = self.manager.drain_pending(self.now, live_floor, &mut buf);
        self.stats.engine.late_clamped += counts.clamped;
        self.stats.engine.late_dropped += counts.dropped;
        for (edge, t, value) in buf.drain(..) {
            self.queue.push(t, 0, EventKind::EdgeWrite { edge, value });
        }
        self.push_buf = buf;
    }

    /// Processes every cycle at engine time `t`.
    fn run_at(&mut self, t: Time) -> Result<(), RuntimeError> {
        self.now = t;
        self.stats.engine.times_processed += 1;
        self.stats.engine.final_time = t;

        let mut events = self.queue.pop_at(t);
        loop {
            self.fires.clear();
            self.fired.clear();
            self.ticked.clear();
            self.alarm_payloads.clear();

            for ev in events.drain(..) {
                self.stats.engine.events += 1;
                self.apply_event(t, ev)?;
            }
            while let Some((_rank, nodes)) = self.fires.pop_first() {
                for node in nodes {
                    self.fire_node(t, node)?;
                }
            }
            self.process_removals(t);
            self.stats.engine.cycles += 1;

            if self.deferred.is_empty() {
                break;
            }
            self.deferred.sort_by_key(|e| (e.rank, e.seq));
            events = std::mem::take(&mut self.deferred);
            trace!(t, follow_on = events.len(), "same-time follow-on cycle");
        }
        Ok(())
    }

    fn apply_event(&mut self, t: Time, ev: Scheduled) -> Result<(), RuntimeError> {
        match ev.kind {
            EventKind::EdgeWrite { edge, value } => self.apply_write(t, edge, value),
            EventKind::AdapterTick {
                source,
                edge,
                value,
            } => {
                self.apply_write(t, edge, value)?;
                self.manager.refill(source, &mut self.queue);
                Ok(())
            }
            EventKind::Alarm {
                node,
                alarm,
                value,
                handle,
            } => {
                if self.queue.consume_alarm(handle) {
                    return Ok(());
                }
                let Some(meta) = self.graph.metas.get(node as usize).and_then(Option::as_ref)
                else {
                    // Owner was torn down; the alarm dies with it.
                    return Ok(());
                };
                let payloads = self
                    .alarm_payloads
                    .entry(node)
                    .or_insert_with(|| vec![None; meta.alarms.len()]);
                if alarm < payloads.len() {
                    payloads[alarm] = Some(value);
                }
                self.stats.engine.alarms_fired += 1;
                if self.fired.insert(node) {
                    self.fires.entry(meta.rank).or_default().push(node);
                }
                Ok(())
            }
        }
    }

    /// Writes `value` to `edge` at `t` and schedules consumer fires.
    ///
    /// A same-time rewrite updates the sample without re-notifying
    /// consumers.
    fn apply_write(&mut self, t: Time, edge: EdgeId, value: Value) -> Result<(), RuntimeError> {
        let Some(slot) = self.graph.edges.get_mut(edge as usize).and_then(Option::as_mut) else {
            // Target edge belonged to a torn-down instance.
            trace!(edge, "dropping write to dead edge");
            return Ok(());
        };
        if !slot.ty.admits(&value) {
            return Err(RuntimeError::InvariantViolation(format!(
                "edge {} of type {} rejected a mistyped write",
                edge, slot.ty
            )));
        }
        let tap_value = slot.tap.as_ref().map(|_| value.clone());
        let outcome = slot.buffer.write(t, value)?;
        self.stats.engine.writes += 1;

        if let (Some(name), Some(v)) = (&slot.tap, tap_value) {
            let series = self.taps.entry(name.clone()).or_default();
            match outcome {
                SeriesWrite::Appended => series.push((t, v)),
                SeriesWrite::Rewritten => match series.last_mut() {
                    Some(last) if last.0 == t => last.1 = v,
                    _ => series.push((t, v)),
                },
            }
        }
        if outcome == SeriesWrite::Rewritten {
            return Ok(());
        }

        for &Consumer { node, input } in &slot.consumers {
            let Some(meta) = self.graph.metas.get(node as usize).and_then(Option::as_ref) else {
                continue;
            };
            *self.ticked.entry(node).or_insert(0) |= 1u64 << input;
            if meta.inputs[input].active && self.fired.insert(node) {
                self.fires.entry(meta.rank).or_default().push(node);
            }
        }
        Ok(())
    }

    /// Invokes a lifecycle hook on `node` with a fresh context.
    ///
    /// Returns the queued actions, or `None` if the node is gone. The
    /// implementation is always put back, even when the handler fails.
    fn invoke(
        &mut self,
        t: Time,
        node: NodeId,
        hook: Hook,
    ) -> Result<Option<Vec<Action>>, RuntimeError> {
        if self
            .graph
            .metas
            .get(node as usize)
            .and_then(Option::as_ref)
            .is_none()
        {
            return Ok(None);
        }
        let Some(mut imp) = self
            .graph
            .impls
            .get_mut(node as usize)
            .and_then(Option::take)
        else {
            return Ok(None);
        };

        let ticked = match hook {
            Hook::Fire => self.ticked.get(&node).copied().unwrap_or(0),
            _ => 0,
        };
        let alarm_ticks = match hook {
            Hook::Fire => self.alarm_payloads.remove(&node).unwrap_or_default(),
            _ => Vec::new(),
        };

        let mut actions = Vec::new();
        let result = {
            let meta = self.graph.metas[node as usize]
                .as_ref()
                .expect("liveness checked above");
            let mut ctx = NodeCtx {
                node,
                name: &meta.name,
                time: t,
                ticked,
                inputs: &meta.inputs,
                edges: &self.graph,
                alarm_ticks: &alarm_ticks,
                actions: &mut actions,
                next_alarm_handle: &mut self.next_alarm_handle,
            };
            match hook {
                Hook::Start => imp.on_start(&mut ctx),
                Hook::Fire => imp.on_fire(&mut ctx),
                Hook::Stop => {
                    imp.on_stop(&mut ctx);
                    Ok(())
                }
            }
        };
        self.graph.impls[node as usize] = Some(imp);

        match result {
            Ok(()) => Ok(Some(actions)),
            Err(e) => Err(RuntimeError::NodeFailed {
                name: self.node_name(node),
                source: e,
            }),
        }
    }

    fn node_name(&self, node: NodeId) -> String {
        self.graph
            .metas
            .get(node as usize)
            .and_then(Option::as_ref)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| format!("node {}", node))
    }

    fn start_node(&mut self, t: Time, node: NodeId) -> Result<(), RuntimeError> {
        if let Some(actions) = self.invoke(t, node, Hook::Start)? {
            self.started.push(node);
            self.apply_actions(t, node, actions)?;
        }
        Ok(())
    }

    fn fire_node(&mut self, t: Time, node: NodeId) -> Result<(), RuntimeError> {
        if let Some(actions) = self.invoke(t, node, Hook::Fire)? {
            self.stats.engine.fires += 1;
            if let Some(count) = self.node_fires.get_mut(node as usize) {
                *count += 1;
            }
            self.apply_actions(t, node, actions)?;
        }
        Ok(())
    }

    fn stop_node(&mut self, t: Time, node: NodeId) {
        match self.invoke(t, node, Hook::Stop) {
            Ok(Some(actions)) if !actions.is_empty() => {
                trace!(node, dropped = actions.len(), "actions from on_stop discarded");
            }
            _ => {}
        }
    }

    /// Applies a handler's queued actions in order.
    fn apply_actions(
        &mut self,
        t: Time,
        node: NodeId,
        actions: Vec<Action>,
    ) -> Result<(), RuntimeError> {
        for action in actions {
            match action {
                Action::Write { output, value } => {
                    let (edge, keyed, rank) = {
                        let meta = self
                            .graph
                            .metas
                            .get(node as usize)
                            .and_then(Option::as_ref)
                            .ok_or_else(|| {
                                RuntimeError::InvariantViolation(format!(
                                    "write from dead node {}",
                                    node
                                ))
                            })?;
                        let binding = meta.outputs.get(output).ok_or_else(|| {
                            RuntimeError::InvariantViolation(format!(
                                "node {} has no output {}",
                                meta.name, output
                            ))
                        })?;
                        (binding.edge, binding.keyed.clone(), meta.rank)
                    };
                    let value = match &keyed {
                        Some(key) => Value::keyed(key, value),
                        None => value,
                    };
                    let defer = {
                        match self.graph.edges.get(edge as usize).and_then(Option::as_ref) {
                            None => {
                                trace!(edge, "dropping write to dead edge");
                                continue;
                            }
                            Some(slot) => {
                                slot.feedback
                                    || matches!(slot.producer, Some(Producer::Basket { .. }))
                            }
                        }
                    };
                    if self.startup {
                        self.queue.push(t, rank, EventKind::EdgeWrite { edge, value });
                    } else if defer {
                        let seq = self.queue.next_seq();
                        self.deferred.push(Scheduled {
                            time: t,
                            rank,
                            seq,
                            kind: EventKind::EdgeWrite { edge, value },
                        });
                    } else {
                        self.apply_write(t, edge, value)?;
                    }
                }
                Action::ScheduleAlarm {
                    alarm,
                    delay,
                    value,
                    handle,
                } => {
                    let rank = {
                        let meta = self
                            .graph
                            .metas
                            .get(node as usize)
                            .and_then(Option::as_ref)
                            .ok_or_else(|| {
                                RuntimeError::InvariantViolation(format!(
                                    "alarm from dead node {}",
                                    node
                                ))
                            })?;
                        let ty = meta.alarms.get(alarm).ok_or_else(|| {
                            RuntimeError::InvariantViolation(format!(
                                "node {} has no alarm slot {}",
                                meta.name, alarm
                            ))
                        })?;
                        if !ty.admits(&value) {
                            return Err(RuntimeError::InvariantViolation(format!(
                                "alarm slot {} of node {} rejected a mistyped payload",
                                alarm, meta.name
                            )));
                        }
                        meta.rank
                    };
                    self.stats.engine.alarms_scheduled += 1;
                    if delay == 0 && !self.startup {
                        // Same engine time, but only after this cycle's
                        // propagation settles.
                        let seq = self.queue.next_seq();
                        self.queue.register_alarm(handle);
                        self.deferred.push(Scheduled {
                            time: t,
                            rank,
                            seq,
                            kind: EventKind::Alarm {
                                node,
                                alarm,
                                value,
                                handle,
                            },
                        });
                    } else {
                        self.queue.push(
                            t + delay,
                            rank,
                            EventKind::Alarm {
                                node,
                                alarm,
                                value,
                                handle,
                            },
                        );
                    }
                }
                Action::CancelAlarm { handle } => {
                    if self.queue.cancel(handle) {
                        self.stats.engine.alarms_canceled += 1;
                    }
                }
                Action::Spawn { template, key } => {
                    self.spawn_instance(t, node, template, key)?;
                }
                Action::Remove { template, key } => {
                    if self.instances.contains_key(&(template, key.clone())) {
                        self.pending_removals.push((template, key));
                    } else {
                        debug!(template, key = %key, "remove for unknown sub-graph key ignored");
                    }
                }
            }
        }
        Ok(())
    }

    /// Builds, wires and starts a keyed sub-graph instance.
    fn spawn_instance(
        &mut self,
        t: Time,
        manager: NodeId,
        template: usize,
        key: Key,
    ) -> Result<(), RuntimeError> {
        if self.instances.contains_key(&(template, key.clone())) {
            debug!(template, key = %key, "sub-graph key already live");
            return Ok(());
        }
        let base_rank = self.graph.rank(manager).unwrap_or(0) + 1;
        let decl = self.templates.get(template).ok_or_else(|| {
            RuntimeError::InvariantViolation(format!("unknown sub-graph template {}", template))
        })?;
        let instance = decl
            .template
            .instantiate(&key, &mut self.graph, base_rank, decl.basket)
            .map_err(|e| {
                RuntimeError::InvariantViolation(format!("sub-graph instantiation failed: {}", e))
            })?;
        self.node_fires.resize(self.graph.metas.len(), 0);
        self.stats.engine.instances_spawned += 1;

        let nodes = instance.nodes.clone();
        self.instances.insert((template, key), instance);
        for node in nodes {
            self.start_node(t, node)?;
        }
        Ok(())
    }

    /// Tears down sub-graphs whose removal was requested this cycle.
    fn process_removals(&mut self, t: Time) {
        if self.pending_removals.is_empty() {
            return;
        }
        for (template, key) in std::mem::take(&mut self.pending_removals) {
            let Some(instance) = self.instances.remove(&(template, key.clone())) else {
                continue;
            };
            for &node in instance.nodes.iter().rev() {
                self.stop_node(t, node);
            }
            for &(edge, node) in &instance.external_subs {
                if let Some(slot) = self.graph.edges.get_mut(edge as usize).and_then(Option::as_mut)
                {
                    slot.consumers.retain(|c| c.node != node);
                }
            }
            for &node in &instance.nodes {
                self.graph.metas[node as usize] = None;
                self.graph.impls[node as usize] = None;
                self.started.retain(|&n| n != node);
            }
            for &edge in &instance.edges {
                self.graph.edges[edge as usize] = None;
            }
            self.stats.engine.instances_removed += 1;
            debug!(template, key = %key, "sub-graph torn down");
        }
    }

    /// Runs `on_stop` for every live started node in reverse rank order.
    fn shutdown_nodes(&mut self, t: Time) {
        let mut live: Vec<NodeId> = self
            .started
            .iter()
            .copied()
            .filter(|&n| {
                self.graph
                    .impls
                    .get(n as usize)
                    .map_or(false, Option::is_some)
            })
            .collect();
        live.sort_by_key(|&n| (self.graph.rank(n).unwrap_or(0), n));
        for &node in live.iter().rev() {
            self.stop_node(t, node);
        }
    }
}

/// Builds an engine from `graph` and runs it; the one-call entry point.
pub fn run(graph: Graph, opts: RunOptions) -> EngineResult<RunOutput> {
    Engine::new(graph).run(opts)
}
