//! Periodic self-ticking source node.

use crate::error::NodeError;
use crate::node::{Node, NodeCtx};
use crate::types::Span;
use crate::value::Value;

/// Emits a fixed value on output 0 every `period`, driven by its own
/// alarm (slot 0).
///
/// The first tick lands one period after engine start; the node keeps
/// rescheduling itself until the run ends.
///
/// # Wiring
/// - no inputs
/// - output 0: the emitted value
/// - alarm 0: `Bool` wake-up
#[derive(Debug)]
pub struct HeartbeatNode {
    /// Interval between ticks
    pub period: Span,
    /// Value emitted on every tick
    pub value: Value,
    /// Ticks emitted so far
    pub beats: u64,
}

impl HeartbeatNode {
    /// Creates a heartbeat with the given period and payload.
    pub fn new(period: Span, value: Value) -> Self {
        Self {
            period,
            value,
            beats: 0,
        }
    }
}

impl Node for HeartbeatNode {
    fn on_start(&mut self, ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
        self.beats = 0;
        ctx.schedule_alarm(0, self.period, Value::Bool(true));
        Ok(())
    }

    fn on_fire(&mut self, ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
        if ctx.alarm_ticked(0) {
            self.beats += 1;
            ctx.output(0, self.value.clone());
            ctx.schedule_alarm(0, self.period, Value::Bool(true));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{run, RunOptions};
    use crate::graph::GraphBuilder;
    use crate::value::ValueType;

    #[test]
    fn test_heartbeat_emits_on_schedule() {
        let mut g = GraphBuilder::new();
        let out = g.add_edge(ValueType::Int);
        let n = g.add_node("hb", Box::new(HeartbeatNode::new(10, Value::Int(1))));
        g.bind_output(n, out, ValueType::Int).unwrap();
        g.add_alarm(n, ValueType::Bool).unwrap();
        g.tap(out, "beats").unwrap();
        let graph = g.finalize().unwrap();

        let output = run(graph, RunOptions::simulation(0, 35)).unwrap();
        let times: Vec<u64> = output.tap("beats").iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }
}
