//! Stream plumbing nodes: passthrough, sample-hold and collection.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::NodeError;
use crate::node::{Node, NodeCtx};
use crate::types::Time;
use crate::value::Value;

/// Copies input 0 to output 0 on every tick.
#[derive(Debug, Default)]
pub struct PassthroughNode {
    /// Ticks forwarded
    pub forwarded: u64,
}

impl PassthroughNode {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for PassthroughNode {
    fn on_fire(&mut self, ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
        if let Some(v) = ctx.input(0).cloned() {
            self.forwarded += 1;
            ctx.output(0, v);
        }
        Ok(())
    }
}

/// Emits the held value of a passive data input whenever an active
/// trigger input ticks.
///
/// # Wiring
/// - input 0: data (bind passive)
/// - input 1: trigger (bind active)
/// - output 0: sampled data
#[derive(Debug, Default)]
pub struct SampleHoldNode {
    /// Samples emitted
    pub samples: u64,
}

impl SampleHoldNode {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for SampleHoldNode {
    fn on_fire(&mut self, ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
        if !ctx.ticked(1) {
            return Ok(());
        }
        if let Some(v) = ctx.input(0).cloned() {
            self.samples += 1;
            ctx.output(0, v);
        }
        Ok(())
    }
}

/// Shared recording of a collector's observed ticks.
pub type Collected = Arc<Mutex<Vec<(Time, Value)>>>;

/// Records every tick of input 0 into shared storage.
///
/// Useful when embedding the engine without edge taps; the storage handle
/// stays valid after the run ends.
pub struct CollectorNode {
    sink: Collected,
}

impl CollectorNode {
    /// Creates a collector and returns it with its storage handle.
    pub fn new() -> (Self, Collected) {
        let sink: Collected = Arc::new(Mutex::new(Vec::new()));
        (Self { sink: Arc::clone(&sink) }, sink)
    }
}

impl Node for CollectorNode {
    fn on_fire(&mut self, ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
        if let Some(v) = ctx.input(0).cloned() {
            self.sink.lock().push((ctx.time(), v));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterDecl, SeriesPull};
    use crate::engine::{run, RunOptions};
    use crate::graph::{GraphBuilder, InputOpts};
    use crate::value::ValueType;

    #[test]
    fn test_passthrough_forwards() {
        let mut g = GraphBuilder::new();
        let src = g.add_edge(ValueType::Str);
        let out = g.add_edge(ValueType::Str);
        let n = g.add_node("pass", Box::new(PassthroughNode::new()));
        g.bind_input(n, src, InputOpts::active()).unwrap();
        g.bind_output(n, out, ValueType::Str).unwrap();
        g.tap(out, "out").unwrap();
        g.add_adapter(AdapterDecl::pull(
            "src",
            Box::new(SeriesPull::new(vec![
                (1, Value::str("a")),
                (2, Value::str("b")),
            ])),
            src,
            ValueType::Str,
        ))
        .unwrap();

        let output = run(g.finalize().unwrap(), RunOptions::simulation(0, 10)).unwrap();
        assert_eq!(
            output.tap("out"),
            &[(1, Value::str("a")), (2, Value::str("b"))]
        );
    }

    #[test]
    fn test_sample_hold_ignores_data_ticks() {
        let mut g = GraphBuilder::new();
        let data = g.add_edge(ValueType::Int);
        let trigger = g.add_edge(ValueType::Bool);
        let out = g.add_edge(ValueType::Int);
        let n = g.add_node("sample", Box::new(SampleHoldNode::new()));
        g.bind_input(n, data, InputOpts::passive()).unwrap();
        g.bind_input(n, trigger, InputOpts::active()).unwrap();
        g.bind_output(n, out, ValueType::Int).unwrap();
        g.tap(out, "sampled").unwrap();
        g.add_adapter(AdapterDecl::pull(
            "data",
            Box::new(SeriesPull::new(vec![
                (5, Value::Int(1)),
                (15, Value::Int(2)),
                (25, Value::Int(3)),
            ])),
            data,
            ValueType::Int,
        ))
        .unwrap();
        g.add_adapter(AdapterDecl::pull(
            "trigger",
            Box::new(SeriesPull::new(vec![
                (10, Value::Bool(true)),
                (30, Value::Bool(true)),
            ])),
            trigger,
            ValueType::Bool,
        ))
        .unwrap();

        let output = run(g.finalize().unwrap(), RunOptions::simulation(0, 100)).unwrap();
        // Data ticks alone never fire the node
        assert_eq!(
            output.tap("sampled"),
            &[(10, Value::Int(1)), (30, Value::Int(3))]
        );
    }

    #[test]
    fn test_collector_records() {
        let mut g = GraphBuilder::new();
        let src = g.add_edge(ValueType::Int);
        let (collector, collected) = CollectorNode::new();
        let n = g.add_node("collect", Box::new(collector));
        g.bind_input(n, src, InputOpts::active()).unwrap();
        g.add_adapter(AdapterDecl::pull(
            "src",
            Box::new(SeriesPull::new(vec![(7, Value::Int(42))])),
            src,
            ValueType::Int,
        ))
        .unwrap();

        run(g.finalize().unwrap(), RunOptions::simulation(0, 10)).unwrap();
        assert_eq!(*collected.lock(), vec![(7, Value::Int(42))]);
    }
}
