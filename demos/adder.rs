//! Two historical sources feeding an adder.
//!
//! Run with: `cargo run --example adder`

use tickflow::adapter::{AdapterDecl, SeriesPull};
use tickflow::nodes::AddNode;
use tickflow::{run, GraphBuilder, InputOpts, RunOptions, Value, ValueType};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut g = GraphBuilder::new();
    let a = g.add_edge(ValueType::Int);
    let b = g.add_edge(ValueType::Int);
    let sum = g.add_edge(ValueType::Int);

    let adder = g.add_node("adder", Box::new(AddNode::new(2)));
    g.bind_input(adder, a, InputOpts::active())?;
    g.bind_input(adder, b, InputOpts::active())?;
    g.bind_output(adder, sum, ValueType::Int)?;
    g.tap(sum, "sum")?;

    g.add_adapter(AdapterDecl::pull(
        "a",
        Box::new(SeriesPull::new(vec![
            (10, Value::Int(1)),
            (30, Value::Int(3)),
        ])),
        a,
        ValueType::Int,
    ))?;
    g.add_adapter(AdapterDecl::pull(
        "b",
        Box::new(SeriesPull::new(vec![
            (20, Value::Int(10)),
            (30, Value::Int(20)),
        ])),
        b,
        ValueType::Int,
    ))?;

    let output = run(g.finalize()?, RunOptions::simulation(0, 100))?;

    println!("sum ticks:");
    for (t, v) in output.tap("sum") {
        println!("  t={:>3}ns  {:?}", t, v);
    }
    println!();
    print!("{}", output.stats.summary());
    Ok(())
}
