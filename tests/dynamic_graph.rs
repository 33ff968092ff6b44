//! Keyed sub-graph instantiation and teardown driven by a live graph.

use tickflow::adapter::{AdapterDecl, SeriesPull};
use tickflow::dynamic::SubgraphTemplate;
use tickflow::types::{Span, MILLIS, SECONDS};
use tickflow::value::KEYED_STRUCT;
use tickflow::{
    run, Graph, GraphBuilder, InputOpts, Key, Node, NodeCtx, NodeError, RunOptions, Time, Value,
    ValueType,
};

/// Spawns a sub-graph per key on input 0 and removes it per key on
/// input 1.
struct KeyManager {
    template: usize,
}

impl Node for KeyManager {
    fn on_fire(&mut self, ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
        if ctx.ticked(0) {
            if let Some(s) = ctx.input(0).and_then(Value::as_str) {
                ctx.spawn_keyed(self.template, Key::str(s));
            }
        }
        if ctx.ticked(1) {
            if let Some(s) = ctx.input(1).and_then(Value::as_str) {
                ctx.remove_keyed(self.template, Key::str(s));
            }
        }
        Ok(())
    }
}

/// Echoes the current engine time onto the basket, `period` after start
/// and (optionally) every `period` thereafter.
struct Echo {
    period: Span,
    repeat: bool,
}

impl Node for Echo {
    fn on_start(&mut self, ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
        ctx.schedule_alarm(0, self.period, Value::Bool(true));
        Ok(())
    }

    fn on_fire(&mut self, ctx: &mut NodeCtx<'_>) -> Result<(), NodeError> {
        if ctx.alarm_ticked(0) {
            ctx.output(0, Value::Time(ctx.time()));
            if self.repeat {
                ctx.schedule_alarm(0, self.period, Value::Bool(true));
            }
        }
        Ok(())
    }
}

fn keyed_graph(
    adds: Vec<(Time, &str)>,
    removals: Vec<(Time, &str)>,
    period: Span,
    repeat: bool,
) -> Graph {
    let mut g = GraphBuilder::new();
    let keys = g.add_edge(ValueType::Str);
    let gone = g.add_edge(ValueType::Str);
    let basket = g.add_edge(ValueType::Struct(KEYED_STRUCT.to_string()));
    let manager = g.add_node("manager", Box::new(KeyManager { template: 0 }));
    g.bind_input(manager, keys, InputOpts::active()).unwrap();
    g.bind_input(manager, gone, InputOpts::active()).unwrap();
    let template = SubgraphTemplate::new("echo", move |sg| {
        let echo = sg.add_node("echo", Box::new(Echo { period, repeat }), 0);
        sg.add_alarm(echo, ValueType::Bool)?;
        sg.bind_basket(echo)?;
        Ok(())
    });
    let template_id = g.add_template(manager, Some(basket), template).unwrap();
    assert_eq!(template_id, 0);
    g.tap(basket, "echoes").unwrap();

    let to_values = |ticks: Vec<(Time, &str)>| {
        ticks
            .into_iter()
            .map(|(t, s)| (t, Value::str(s)))
            .collect::<Vec<_>>()
    };
    g.add_adapter(AdapterDecl::pull(
        "adds",
        Box::new(SeriesPull::new(to_values(adds))),
        keys,
        ValueType::Str,
    ))
    .unwrap();
    g.add_adapter(AdapterDecl::pull(
        "removals",
        Box::new(SeriesPull::new(to_values(removals))),
        gone,
        ValueType::Str,
    ))
    .unwrap();
    g.finalize().unwrap()
}

fn keyed_echoes(output: &tickflow::RunOutput) -> Vec<(String, Time)> {
    output
        .tap("echoes")
        .iter()
        .map(|(_, v)| {
            let s = v.as_struct().expect("basket samples are keyed structs");
            (
                s.field("key").and_then(Value::as_str).unwrap().to_string(),
                s.field("value").and_then(Value::as_time).unwrap(),
            )
        })
        .collect()
}

#[test]
fn each_key_spawns_one_echoing_instance() {
    let graph = keyed_graph(
        vec![(1 * SECONDS, "X"), (2 * SECONDS, "Y")],
        vec![],
        100 * MILLIS,
        false,
    );
    let output = run(graph, RunOptions::simulation(0, 5 * SECONDS)).unwrap();

    assert_eq!(
        keyed_echoes(&output),
        vec![
            ("X".to_string(), 1 * SECONDS + 100 * MILLIS),
            ("Y".to_string(), 2 * SECONDS + 100 * MILLIS),
        ]
    );
    assert_eq!(output.stats.engine.instances_spawned, 2);
    assert_eq!(output.stats.engine.instances_removed, 0);
}

#[test]
fn respawning_a_key_after_removal_builds_a_fresh_instance() {
    let graph = keyed_graph(
        vec![(1 * SECONDS, "X"), (2 * SECONDS, "Y"), (4 * SECONDS, "X")],
        vec![(3 * SECONDS, "X")],
        100 * MILLIS,
        false,
    );
    let output = run(graph, RunOptions::simulation(0, 5 * SECONDS)).unwrap();

    assert_eq!(
        keyed_echoes(&output),
        vec![
            ("X".to_string(), 1 * SECONDS + 100 * MILLIS),
            ("Y".to_string(), 2 * SECONDS + 100 * MILLIS),
            ("X".to_string(), 4 * SECONDS + 100 * MILLIS),
        ]
    );
    assert_eq!(output.stats.engine.instances_spawned, 3);
    assert_eq!(output.stats.engine.instances_removed, 1);
}

#[test]
fn teardown_silences_a_repeating_instance() {
    let graph = keyed_graph(
        vec![(1 * SECONDS, "X")],
        vec![(3 * SECONDS, "X")],
        400 * MILLIS,
        true,
    );
    let output = run(graph, RunOptions::simulation(0, 4 * SECONDS)).unwrap();

    // Repeats every 400ms from 1s; the 3.0s alarm fires in the removal
    // cycle (the instance dies at cycle end), then nothing.
    let expected: Vec<(String, Time)> = [1_400u64, 1_800, 2_200, 2_600, 3_000]
        .iter()
        .map(|&ms| ("X".to_string(), ms * MILLIS))
        .collect();
    assert_eq!(keyed_echoes(&output), expected);
    assert_eq!(output.stats.engine.instances_removed, 1);
}

#[test]
fn spawning_a_live_key_is_a_noop() {
    let graph = keyed_graph(
        vec![(1 * SECONDS, "X"), (2 * SECONDS, "X")],
        vec![],
        100 * MILLIS,
        false,
    );
    let output = run(graph, RunOptions::simulation(0, 5 * SECONDS)).unwrap();

    assert_eq!(
        keyed_echoes(&output),
        vec![("X".to_string(), 1 * SECONDS + 100 * MILLIS)]
    );
    assert_eq!(output.stats.engine.instances_spawned, 1);
}

#[test]
fn removal_of_unknown_key_is_ignored() {
    let graph = keyed_graph(
        vec![(1 * SECONDS, "X")],
        vec![(2 * SECONDS, "Z")],
        100 * MILLIS,
        false,
    );
    let output = run(graph, RunOptions::simulation(0, 5 * SECONDS)).unwrap();
    assert_eq!(output.stats.engine.instances_removed, 0);
}
