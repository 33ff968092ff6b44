//! Adapters: the bridges between external sources and the scheduler.
//!
//! Three contracts are supported:
//!
//! - [`PullAdapter`]: a historical source polled by the engine. Ticks must
//!   be non-decreasing in time; the scheduler keeps one pending tick per
//!   source and refills as it drains, so long histories stream through the
//!   heap in O(sources) memory.
//! - [`PushAdapter`]: a live source running on its own thread, delivering
//!   through a [`PushSink`]. Stale timestamps are clamped or dropped per
//!   the adapter's [`LatePolicy`].
//! - [`PushPullAdapter`]: replays history through a [`ReplaySink`], calls
//!   `flag_replay_complete` exactly once, then pushes live ticks. Live
//!   ticks at or before the last replayed time are rejected.
//!
//! The adapter→engine crossing is one mutex plus one condition variable;
//! the engine drains pending pushes at the top of each cycle iteration, and
//! ordering between concurrent pushers is defined by lock acquisition.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AdapterError, RuntimeError, StartError};
use crate::sched::{EventKind, EventQueue};
use crate::types::{EdgeId, Time};
use crate::value::{Value, ValueType};

/// What to do with a live push whose timestamp is behind engine time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LatePolicy {
    /// Stamp the tick with `max(t, engine_now)` (default).
    #[default]
    Clamp,
    /// Discard the tick with a warning.
    Drop,
}

/// A historical source polled by the engine.
pub trait PullAdapter: Send {
    /// Called once during engine start.
    fn open(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Returns the next tick, or `None` at end of data. Times must be
    /// non-decreasing and no earlier than the engine start time.
    fn next(&mut self) -> Result<Option<(Time, Value)>, AdapterError>;

    /// Called once during engine shutdown.
    fn close(&mut self) {}
}

/// A live source running on its own execution context.
///
/// `start` receives the sink and must not block for the lifetime of the
/// run: spawn a thread and return. `stop` must make that thread wind down.
pub trait PushAdapter: Send {
    fn start(&mut self, sink: PushSink, start: Time, end: Time) -> Result<(), AdapterError>;

    fn stop(&mut self);
}

/// A hybrid source: historical replay first, then live pushes.
///
/// Replay ticks must be delivered (monotonically) before `start` returns,
/// so the engine still sits at its start time; the live phase then runs on
/// the adapter's own thread like a plain push adapter.
pub trait PushPullAdapter: Send {
    fn start(&mut self, sink: ReplaySink, start: Time, end: Time) -> Result<(), AdapterError>;

    fn stop(&mut self);
}

/// A tick delivered through the push crossing, before late-policy triage.
#[derive(Debug)]
pub(crate) struct PushedTick {
    pub adapter: usize,
    pub edge: EdgeId,
    pub time: Time,
    pub value: Value,
    /// Replay ticks bypass the late policy.
    pub replay: bool,
}

/// The single synchronization point between adapter threads and the engine.
#[derive(Debug, Default)]
pub(crate) struct PushShared {
    pub pending: Mutex<Vec<PushedTick>>,
    pub signal: Condvar,
    /// External stop request; checked by the engine between cycles.
    pub stop: AtomicBool,
}

impl PushShared {
    pub fn notify(&self) {
        self.signal.notify_all();
    }
}

/// Sink handed to a push adapter; cloneable across its threads.
#[derive(Clone)]
pub struct PushSink {
    shared: Arc<PushShared>,
    adapter: usize,
    edge: EdgeId,
}

impl PushSink {
    /// Delivers a live tick to the engine.
    ///
    /// Never blocks on the engine's progress; backpressure handling (block
    /// or drop upstream) is the adapter's own policy.
    pub fn push_tick(&self, t: Time, value: Value) {
        let mut pending = self.shared.pending.lock();
        pending.push(PushedTick {
            adapter: self.adapter,
            edge: self.edge,
            time: t,
            value,
            replay: false,
        });
        drop(pending);
        self.shared.notify();
    }
}

#[derive(Debug, Default)]
struct ReplayState {
    done: AtomicBool,
    last_replay: AtomicU64,
    has_replay: AtomicBool,
}

/// Sink handed to a push-pull adapter.
///
/// Gates the replay→live transition: replay ticks are only accepted before
/// [`flag_replay_complete`](ReplaySink::flag_replay_complete), live ticks
/// only after, and live ticks must be strictly later than the last
/// replayed tick.
#[derive(Clone)]
pub struct ReplaySink {
    inner: PushSink,
    name: Arc<str>,
    state: Arc<ReplayState>,
}

impl ReplaySink {
    /// Delivers a tick; `live` selects the phase.
    pub fn push_tick(&self, live: bool, t: Time, value: Value) -> Result<(), RuntimeError> {
        let done = self.state.done.load(Ordering::Acquire);
        if live {
            if !done {
                return Err(RuntimeError::AdapterSource {
                    name: self.name.to_string(),
                    reason: "live tick before replay completed".to_string(),
                });
            }
            if self.state.has_replay.load(Ordering::Acquire) {
                let last = self.state.last_replay.load(Ordering::Acquire);
                if t <= last {
                    return Err(RuntimeError::LateAfterReplay {
                        t,
                        last_replay: last,
                    });
                }
            }
            self.inner.push_tick(t, value);
            return Ok(());
        }
        if done {
            return Err(RuntimeError::AdapterSource {
                name: self.name.to_string(),
                reason: "replay tick after flag_replay_complete".to_string(),
            });
        }
        if self.state.has_replay.load(Ordering::Acquire)
            && t < self.state.last_replay.load(Ordering::Acquire)
        {
            return Err(RuntimeError::AdapterSource {
                name: self.name.to_string(),
                reason: "replay ticks must be non-decreasing".to_string(),
            });
        }
        self.state.last_replay.store(t, Ordering::Release);
        self.state.has_replay.store(true, Ordering::Release);
        let mut pending = self.inner.shared.pending.lock();
        pending.push(PushedTick {
            adapter: self.inner.adapter,
            edge: self.inner.edge,
            time: t,
            value,
            replay: true,
        });
        drop(pending);
        self.inner.shared.notify();
        Ok(())
    }

    /// Signals the end of historical playback. Must be called exactly once.
    pub fn flag_replay_complete(&self) {
        self.state.done.store(true, Ordering::Release);
        debug!(adapter = %self.name, "replay complete");
    }
}

/// An adapter registration produced by the typed constructors below and
/// consumed by [`crate::graph::GraphBuilder::add_adapter`].
pub enum AdapterDecl {
    Pull {
        name: String,
        imp: Box<dyn PullAdapter>,
        edge: EdgeId,
        ty: ValueType,
    },
    Push {
        name: String,
        imp: Box<dyn PushAdapter>,
        edge: EdgeId,
        ty: ValueType,
        policy: LatePolicy,
    },
    PushPull {
        name: String,
        imp: Box<dyn PushPullAdapter>,
        edge: EdgeId,
        ty: ValueType,
    },
}

impl AdapterDecl {
    /// Declares a pull adapter producing `edge`.
    pub fn pull(
        name: impl Into<String>,
        imp: Box<dyn PullAdapter>,
        edge: EdgeId,
        ty: ValueType,
    ) -> Self {
        AdapterDecl::Pull {
            name: name.into(),
            imp,
            edge,
            ty,
        }
    }

    /// Declares a push adapter producing `edge` under `policy`.
    pub fn push(
        name: impl Into<String>,
        imp: Box<dyn PushAdapter>,
        edge: EdgeId,
        ty: ValueType,
        policy: LatePolicy,
    ) -> Self {
        AdapterDecl::Push {
            name: name.into(),
            imp,
            edge,
            ty,
            policy,
        }
    }

    /// Declares a push-pull adapter producing `edge`.
    pub fn push_pull(
        name: impl Into<String>,
        imp: Box<dyn PushPullAdapter>,
        edge: EdgeId,
        ty: ValueType,
    ) -> Self {
        AdapterDecl::PushPull {
            name: name.into(),
            imp,
            edge,
            ty,
        }
    }

    pub(crate) fn edge(&self) -> EdgeId {
        match self {
            AdapterDecl::Pull { edge, .. }
            | AdapterDecl::Push { edge, .. }
            | AdapterDecl::PushPull { edge, .. } => *edge,
        }
    }

    pub(crate) fn value_type(&self) -> &ValueType {
        match self {
            AdapterDecl::Pull { ty, .. }
            | AdapterDecl::Push { ty, .. }
            | AdapterDecl::PushPull { ty, .. } => ty,
        }
    }

    pub(crate) fn name(&self) -> &str {
        match self {
            AdapterDecl::Pull { name, .. }
            | AdapterDecl::Push { name, .. }
            | AdapterDecl::PushPull { name, .. } => name,
        }
    }
}

struct PullSource {
    name: String,
    imp: Box<dyn PullAdapter>,
    edge: EdgeId,
    last_time: Option<Time>,
    terminal: bool,
}

enum LiveAdapter {
    Push(Box<dyn PushAdapter>),
    PushPull(Box<dyn PushPullAdapter>),
}

struct LiveSource {
    name: String,
    imp: LiveAdapter,
    edge: EdgeId,
    policy: LatePolicy,
}

/// Triage counters filled while draining the push crossing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainCounts {
    pub accepted: u64,
    pub clamped: u64,
    pub dropped: u64,
}

/// Engine-side owner of all adapters and the push crossing.
pub(crate) struct AdapterManager {
    pulls: Vec<PullSource>,
    lives: Vec<LiveSource>,
    shared: Arc<PushShared>,
}

impl AdapterManager {
    pub fn new(decls: Vec<AdapterDecl>, shared: Arc<PushShared>) -> Self {
        let mut pulls = Vec::new();
        let mut lives = Vec::new();
        for decl in decls {
            match decl {
                AdapterDecl::Pull {
                    name, imp, edge, ..
                } => pulls.push(PullSource {
                    name,
                    imp,
                    edge,
                    last_time: None,
                    terminal: false,
                }),
                AdapterDecl::Push {
                    name,
                    imp,
                    edge,
                    policy,
                    ..
                } => lives.push(LiveSource {
                    name,
                    imp: LiveAdapter::Push(imp),
                    edge,
                    policy,
                }),
                AdapterDecl::PushPull {
                    name, imp, edge, ..
                } => lives.push(LiveSource {
                    name,
                    imp: LiveAdapter::PushPull(imp),
                    edge,
                    policy: LatePolicy::Clamp,
                }),
            }
        }
        Self {
            pulls,
            lives,
            shared,
        }
    }

    /// Opens every adapter and primes the queue with each pull source's
    /// first tick. Push-pull replay lands in the pending queue here.
    pub fn open(
        &mut self,
        start: Time,
        end: Time,
        queue: &mut EventQueue,
    ) -> Result<(), StartError> {
        for idx in 0..self.pulls.len() {
            let source = &mut self.pulls[idx];
            source.imp.open().map_err(|e| StartError::AdapterInit {
                name: source.name.clone(),
                reason: e.to_string(),
            })?;
            debug!(adapter = %source.name, "pull adapter open");
            Self::refill_source(&mut self.pulls[idx], idx, start, queue);
        }
        for (idx, live) in self.lives.iter_mut().enumerate() {
            let sink = PushSink {
                shared: Arc::clone(&self.shared),
                adapter: idx,
                edge: live.edge,
            };
            let started = match &mut live.imp {
                LiveAdapter::Push(imp) => imp.start(sink, start, end),
                LiveAdapter::PushPull(imp) => {
                    let sink = ReplaySink {
                        inner: sink,
                        name: Arc::from(live.name.as_str()),
                        state: Arc::new(ReplayState::default()),
                    };
                    imp.start(sink, start, end)
                }
            };
            started.map_err(|e| StartError::AdapterInit {
                name: live.name.clone(),
                reason: e.to_string(),
            })?;
            debug!(adapter = %live.name, "live adapter started");
        }
        Ok(())
    }

    /// Pulls the next tick of `source` into the queue. A source error or a
    /// time regression marks the source terminal; the engine keeps running.
    pub fn refill(&mut self, source: usize, queue: &mut EventQueue) {
        if let Some(entry) = self.pulls.get_mut(source) {
            let floor = entry.last_time.unwrap_or(0);
            Self::refill_source(entry, source, floor, queue);
        }
    }

    fn refill_source(entry: &mut PullSource, idx: usize, floor: Time, queue: &mut EventQueue) {
        if entry.terminal {
            return;
        }
        match entry.imp.next() {
            Ok(Some((t, value))) => {
                if t < floor {
                    warn!(
                        adapter = %entry.name,
                        t,
                        floor,
                        "pull adapter regressed in time; marking terminal"
                    );
                    entry.terminal = true;
                    return;
                }
                entry.last_time = Some(t);
                queue.push(
                    t,
                    0,
                    EventKind::AdapterTick {
                        source: idx,
                        edge: entry.edge,
                        value,
                    },
                );
            }
            Ok(None) => {
                debug!(adapter = %entry.name, "pull adapter exhausted");
                entry.terminal = true;
            }
            Err(e) => {
                warn!(adapter = %entry.name, error = %e, "pull adapter source error");
                entry.terminal = true;
            }
        }
    }

    /// Moves pending pushes into `out`, applying each adapter's late
    /// policy.
    ///
    /// `live_floor` is the engine-now a live tick must not precede (wall
    /// clock in real-time mode, last processed time in simulation).
    /// Replay ticks bypass the policy; `replay_floor` only keeps them from
    /// landing behind times the scheduler already passed.
    pub fn drain_pending(
        &mut self,
        replay_floor: Time,
        live_floor: Time,
        out: &mut Vec<(EdgeId, Time, Value)>,
    ) -> DrainCounts {
        let mut drained = {
            let mut pending = self.shared.pending.lock();
            std::mem::take(&mut *pending)
        };
        let mut counts = DrainCounts::default();
        for tick in drained.drain(..) {
            if tick.replay {
                counts.accepted += 1;
                out.push((tick.edge, tick.time.max(replay_floor), tick.value));
                continue;
            }
            let policy = self
                .lives
                .get(tick.adapter)
                .map(|l| l.policy)
                .unwrap_or_default();
            if tick.time < live_floor {
                match policy {
                    LatePolicy::Clamp => {
                        counts.clamped += 1;
                        counts.accepted += 1;
                        out.push((tick.edge, live_floor, tick.value));
                    }
                    LatePolicy::Drop => {
                        counts.dropped += 1;
                        warn!(
                            adapter = tick.adapter,
                            t = tick.time,
                            live_floor,
                            "dropping late push tick"
                        );
                    }
                }
            } else {
                counts.accepted += 1;
                out.push((tick.edge, tick.time, tick.value));
            }
        }
        counts
    }

    /// Blocks until a push arrives, the stop flag rises, or `timeout`
    /// elapses. Real-time mode only.
    pub fn wait_pending(&self, timeout: Duration) {
        let mut pending = self.shared.pending.lock();
        if !pending.is_empty() || self.shared.stop.load(Ordering::Acquire) {
            return;
        }
        let _ = self.shared.signal.wait_for(&mut pending, timeout);
    }

    /// Stops live adapters and closes pull sources.
    pub fn shutdown(&mut self) {
        for live in &mut self.lives {
            match &mut live.imp {
                LiveAdapter::Push(imp) => imp.stop(),
                LiveAdapter::PushPull(imp) => imp.stop(),
            }
            debug!(adapter = %live.name, "live adapter stopped");
        }
        for pull in &mut self.pulls {
            pull.imp.close();
            debug!(adapter = %pull.name, "pull adapter closed");
        }
    }

    #[cfg(test)]
    pub fn test_sink(&self, adapter: usize, edge: EdgeId) -> PushSink {
        PushSink {
            shared: Arc::clone(&self.shared),
            adapter,
            edge,
        }
    }

    #[cfg(test)]
    pub fn test_replay_sink(&self, adapter: usize, edge: EdgeId) -> ReplaySink {
        ReplaySink {
            inner: self.test_sink(adapter, edge),
            name: Arc::from("test"),
            state: Arc::new(ReplayState::default()),
        }
    }
}

/// A pull adapter over a fixed in-memory series; the reference source for
/// tests and demos.
pub struct SeriesPull {
    ticks: std::vec::IntoIter<(Time, Value)>,
}

impl SeriesPull {
    /// Creates a pull adapter replaying `ticks` in order.
    pub fn new(ticks: Vec<(Time, Value)>) -> Self {
        Self {
            ticks: ticks.into_iter(),
        }
    }
}

impl PullAdapter for SeriesPull {
    fn next(&mut self) -> Result<Option<(Time, Value)>, AdapterError> {
        Ok(self.ticks.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> AdapterManager {
        AdapterManager::new(Vec::new(), Arc::new(PushShared::default()))
    }

    fn manager_with_policy(policy: LatePolicy) -> AdapterManager {
        struct Idle;
        impl PushAdapter for Idle {
            fn start(&mut self, _: PushSink, _: Time, _: Time) -> Result<(), AdapterError> {
                Ok(())
            }
            fn stop(&mut self) {}
        }
        AdapterManager::new(
            vec![AdapterDecl::push("p", Box::new(Idle), 0, ValueType::Int, policy)],
            Arc::new(PushShared::default()),
        )
    }

    #[test]
    fn test_series_pull_prime_and_refill() {
        let mut queue = EventQueue::new();
        let mut mgr = AdapterManager::new(
            vec![AdapterDecl::pull(
                "hist",
                Box::new(SeriesPull::new(vec![
                    (10, Value::Int(1)),
                    (30, Value::Int(3)),
                ])),
                0,
                ValueType::Int,
            )],
            Arc::new(PushShared::default()),
        );
        mgr.open(0, 100, &mut queue).unwrap();
        assert_eq!(queue.peek_time(), Some(10));
        queue.pop_at(10);
        mgr.refill(0, &mut queue);
        assert_eq!(queue.peek_time(), Some(30));
        queue.pop_at(30);
        mgr.refill(0, &mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pull_regression_marks_terminal() {
        let mut queue = EventQueue::new();
        let mut mgr = AdapterManager::new(
            vec![AdapterDecl::pull(
                "bad",
                Box::new(SeriesPull::new(vec![
                    (30, Value::Int(1)),
                    (10, Value::Int(2)),
                ])),
                0,
                ValueType::Int,
            )],
            Arc::new(PushShared::default()),
        );
        mgr.open(0, 100, &mut queue).unwrap();
        queue.pop_at(30);
        mgr.refill(0, &mut queue);
        // The regressed tick was discarded and the source is terminal
        assert!(queue.is_empty());
        mgr.refill(0, &mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_clamps_late_ticks() {
        let mut mgr = manager_with_policy(LatePolicy::Clamp);
        let sink = mgr.test_sink(0, 0);
        sink.push_tick(5, Value::Int(1));
        sink.push_tick(50, Value::Int(2));

        let mut out = Vec::new();
        let counts = mgr.drain_pending(20, 20, &mut out);
        assert_eq!(counts.accepted, 2);
        assert_eq!(counts.clamped, 1);
        assert_eq!(counts.dropped, 0);
        assert_eq!(out[0].1, 20);
        assert_eq!(out[1].1, 50);
    }

    #[test]
    fn test_drain_drops_late_ticks() {
        let mut mgr = manager_with_policy(LatePolicy::Drop);
        let sink = mgr.test_sink(0, 0);
        sink.push_tick(5, Value::Int(1));
        sink.push_tick(50, Value::Int(2));

        let mut out = Vec::new();
        let counts = mgr.drain_pending(20, 20, &mut out);
        assert_eq!(counts.accepted, 1);
        assert_eq!(counts.dropped, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1, 50);
    }

    #[test]
    fn test_push_order_preserved_within_adapter() {
        let mgr = manager();
        let sink = mgr.test_sink(0, 3);
        for i in 0..5 {
            sink.push_tick(100 + i, Value::Int(i as i64));
        }
        let pending = mgr.shared.pending.lock();
        let times: Vec<Time> = pending.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![100, 101, 102, 103, 104]);
    }

    #[test]
    fn test_replay_gate() {
        let mgr = manager();
        let sink = mgr.test_replay_sink(0, 0);

        // Live before replay completes is a source error
        assert!(matches!(
            sink.push_tick(true, 10, Value::Int(0)),
            Err(RuntimeError::AdapterSource { .. })
        ));

        sink.push_tick(false, 10, Value::str("A")).unwrap();
        sink.push_tick(false, 11, Value::str("B")).unwrap();
        sink.flag_replay_complete();

        // Live tick past the replay boundary is accepted
        sink.push_tick(true, 12, Value::str("C")).unwrap();
        // Boundary and earlier are rejected
        assert!(matches!(
            sink.push_tick(true, 11, Value::str("D")),
            Err(RuntimeError::LateAfterReplay { t: 11, last_replay: 11 })
        ));
        // Replay after completion is a source error
        assert!(matches!(
            sink.push_tick(false, 13, Value::str("E")),
            Err(RuntimeError::AdapterSource { .. })
        ));
    }

    #[test]
    fn test_replay_must_be_monotonic() {
        let mgr = manager();
        let sink = mgr.test_replay_sink(0, 0);
        sink.push_tick(false, 10, Value::Int(1)).unwrap();
        assert!(matches!(
            sink.push_tick(false, 5, Value::Int(2)),
            Err(RuntimeError::AdapterSource { .. })
        ));
    }

    #[test]
    fn test_late_policy_default_is_clamp() {
        assert_eq!(LatePolicy::default(), LatePolicy::Clamp);
    }
}
