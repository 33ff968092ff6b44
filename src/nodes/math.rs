//! Arithmetic combinator nodes.

use crate::error::NodeError;
use crate::node::{Node, NodeCtx};
use crate::value::Value;

/// Sums all integer inputs on any tick of any of them.
///
/// An input that has never ticked contributes 0. With `require_all` set,
/// the node only emits when every input ticks in the same cycle.
///
/// # Wiring
/// - inputs 0..n: `Int` summands
/// - output 0: `Int` sum
#[derive(Debug)]
pub struct AddNode {
    /// Number of summand inputs
    pub arity: usize,
    /// Emit only when every input ticked this cycle
    pub require_all: bool,
}

impl AddNode {
    /// Creates an adder over `arity` inputs, treating missing inputs as 0.
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            require_all: false,
        }
    }

    /// Emits only when all inputs tick together.
    pub fn requiring_all(mut self) -> Self {
        self.require_all = true;
        self
    }
}

impl Node for AddNode {
    fn on_fire(&mut self, ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
        if self.require_all && (0..self.arity).any(|input| !ctx.ticked(input)) {
            return Ok(());
        }
        let mut sum = 0i64;
        for input in 0..self.arity {
            if let Some(v) = ctx.input(input).and_then(Value::as_int) {
                sum += v;
            }
        }
        ctx.output(0, Value::Int(sum));
        Ok(())
    }
}
