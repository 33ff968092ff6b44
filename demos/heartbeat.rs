//! A self-ticking heartbeat graph built from declarative configuration.
//!
//! Run with: `cargo run --example heartbeat`

use tickflow::config::SimulationConfig;
use tickflow::registry::default_registry;
use tickflow::run;

const CONFIG: &str = r#"
engine:
  name: heartbeat-demo
  start: 0
  end: 50000000        # 50ms
  mode: simulation

edges:
  - name: beats
    type: int

nodes:
  - name: heart
    kind: Heartbeat
    attrs:
      period: "10000000"   # 10ms
      value: "1"
    outputs: [beats]
    alarms: [bool]

taps: [beats]
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = SimulationConfig::from_yaml_str(CONFIG)?;
    let registry = default_registry();
    let (g, _edges) = config.build_graph(&registry)?;

    let output = run(g.finalize()?, config.run_options())?;

    println!("heartbeats:");
    for (t, v) in output.tap("beats") {
        println!("  t={:>9}ns  {:?}", t, v);
    }
    println!();
    print!("{}", output.stats.summary());
    Ok(())
}
