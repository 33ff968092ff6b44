//! Run statistics collection and export.
//!
//! Every run produces a [`RunStats`] record: engine-level counters,
//! per-node fire counts and wall-clock timing, exportable as JSON or a CSV
//! summary for analysis.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::types::{NodeId, Rank, Time};

/// Aggregate statistics for one engine run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Run metadata
    pub metadata: RunMetadata,

    /// Engine-level counters
    pub engine: EngineCounters,

    /// Per-node counters, live nodes only
    pub nodes: Vec<NodeCounters>,

    /// Wall-clock timing
    pub timing: TimingStats,
}

/// Metadata about the run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Run name/description
    pub name: String,

    /// Execution mode ("simulation" or "realtime")
    pub mode: String,

    /// Wall-clock start (unix seconds)
    pub started: Option<u64>,

    /// Wall-clock end (unix seconds)
    pub finished: Option<u64>,
}

/// Engine-level counters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineCounters {
    /// Last engine time processed
    pub final_time: Time,

    /// Distinct engine times processed
    pub times_processed: u64,

    /// Cycles executed (a single time may span several cycles when
    /// feedback or zero-delay alarms defer work)
    pub cycles: u64,

    /// Scheduler events applied
    pub events: u64,

    /// Edge writes applied (rewrites included)
    pub writes: u64,

    /// Node fires
    pub fires: u64,

    /// Alarms delivered
    pub alarms_fired: u64,

    /// Alarms scheduled
    pub alarms_scheduled: u64,

    /// Alarms canceled before delivery
    pub alarms_canceled: u64,

    /// Late push ticks clamped to engine time
    pub late_clamped: u64,

    /// Late push ticks dropped
    pub late_dropped: u64,

    /// Sub-graph instances spawned
    pub instances_spawned: u64,

    /// Sub-graph instances torn down
    pub instances_removed: u64,

    /// Live nodes at run end
    pub node_count: usize,

    /// Live edges at run end
    pub edge_count: usize,
}

/// Counters for a single node.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeCounters {
    /// Node identifier
    pub id: NodeId,

    /// Node name
    pub name: String,

    /// Assigned rank
    pub rank: Rank,

    /// Times the node fired
    pub fires: u64,
}

/// Wall-clock timing statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingStats {
    /// Total wall-clock time in milliseconds
    pub total_wall_time_ms: f64,

    /// Engine nanoseconds advanced per wall-clock second
    pub engine_time_per_second: f64,

    /// Events applied per wall-clock second
    pub events_per_second: f64,

    /// Cycles executed per wall-clock second
    pub cycles_per_second: f64,
}

impl RunStats {
    /// Creates an empty statistics record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the run name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self
    }

    /// Records the wall-clock start time.
    pub fn record_start(&mut self) {
        self.metadata.started = Some(unix_now());
    }

    /// Records the wall-clock end time.
    pub fn record_end(&mut self) {
        self.metadata.finished = Some(unix_now());
    }

    /// Computes timing rates from a measured wall time.
    pub fn compute_timing(&mut self, wall_time_ms: f64) {
        self.timing.total_wall_time_ms = wall_time_ms;
        if wall_time_ms > 0.0 {
            let seconds = wall_time_ms / 1000.0;
            self.timing.engine_time_per_second = self.engine.final_time as f64 / seconds;
            self.timing.events_per_second = self.engine.events as f64 / seconds;
            self.timing.cycles_per_second = self.engine.cycles as f64 / seconds;
        }
    }

    /// Exports statistics to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports statistics to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Exports summary counters to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("metric,value\n");
        csv.push_str(&format!("final_time,{}\n", self.engine.final_time));
        csv.push_str(&format!("times_processed,{}\n", self.engine.times_processed));
        csv.push_str(&format!("cycles,{}\n", self.engine.cycles));
        csv.push_str(&format!("events,{}\n", self.engine.events));
        csv.push_str(&format!("writes,{}\n", self.engine.writes));
        csv.push_str(&format!("fires,{}\n", self.engine.fires));
        csv.push_str(&format!("alarms_fired,{}\n", self.engine.alarms_fired));
        csv.push_str(&format!("late_clamped,{}\n", self.engine.late_clamped));
        csv.push_str(&format!("late_dropped,{}\n", self.engine.late_dropped));
        csv.push_str(&format!("instances_spawned,{}\n", self.engine.instances_spawned));
        csv.push_str(&format!("instances_removed,{}\n", self.engine.instances_removed));
        csv.push_str(&format!("wall_time_ms,{:.2}\n", self.timing.total_wall_time_ms));
        csv.push_str(&format!("events_per_second,{:.2}\n", self.timing.events_per_second));
        csv
    }

    /// Exports the CSV summary to a file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// Writes a human-readable summary.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "=== Run Statistics ===")?;
        writeln!(w)?;
        if !self.metadata.name.is_empty() {
            writeln!(w, "Name: {}", self.metadata.name)?;
        }
        if !self.metadata.mode.is_empty() {
            writeln!(w, "Mode: {}", self.metadata.mode)?;
        }
        writeln!(w)?;
        writeln!(w, "--- Engine ---")?;
        writeln!(w, "Final engine time: {}", self.engine.final_time)?;
        writeln!(w, "Times processed: {}", self.engine.times_processed)?;
        writeln!(w, "Cycles: {}", self.engine.cycles)?;
        writeln!(w, "Events applied: {}", self.engine.events)?;
        writeln!(w, "Edge writes: {}", self.engine.writes)?;
        writeln!(w, "Node fires: {}", self.engine.fires)?;
        writeln!(
            w,
            "Alarms: {} scheduled, {} fired, {} canceled",
            self.engine.alarms_scheduled, self.engine.alarms_fired, self.engine.alarms_canceled
        )?;
        writeln!(
            w,
            "Late pushes: {} clamped, {} dropped",
            self.engine.late_clamped, self.engine.late_dropped
        )?;
        writeln!(
            w,
            "Sub-graphs: {} spawned, {} removed",
            self.engine.instances_spawned, self.engine.instances_removed
        )?;
        writeln!(w, "Nodes: {}, Edges: {}", self.engine.node_count, self.engine.edge_count)?;
        writeln!(w)?;
        writeln!(w, "--- Timing ---")?;
        writeln!(w, "Wall time: {:.2} ms", self.timing.total_wall_time_ms)?;
        writeln!(w, "Events/sec: {:.2}", self.timing.events_per_second)?;
        writeln!(w)?;
        writeln!(w, "--- Nodes ---")?;
        for node in &self.nodes {
            writeln!(
                w,
                "{} (id {}, rank {}): {} fires",
                node.name, node.id, node.rank, node.fires
            )?;
        }
        Ok(())
    }

    /// Returns the summary as a string.
    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        self.write_summary(&mut buf).expect("write to Vec cannot fail");
        String::from_utf8(buf).expect("summary is valid utf-8")
    }
}

/// A simple wall-clock timer.
#[derive(Debug)]
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

/// Current unix time in seconds.
fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_rates() {
        let mut stats = RunStats::new().with_name("bench");
        stats.engine.final_time = 1_000_000;
        stats.engine.events = 500;
        stats.engine.cycles = 100;
        stats.compute_timing(250.0);

        assert_eq!(stats.timing.total_wall_time_ms, 250.0);
        assert_eq!(stats.timing.events_per_second, 2000.0);
        assert_eq!(stats.timing.cycles_per_second, 400.0);
    }

    #[test]
    fn test_json_round_trip() {
        let mut stats = RunStats::new().with_name("rt");
        stats.engine.fires = 7;
        stats.nodes.push(NodeCounters {
            id: 2,
            name: "adder".to_string(),
            rank: 1,
            fires: 7,
        });
        let json = stats.to_json().unwrap();
        let back: RunStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metadata.name, "rt");
        assert_eq!(back.engine.fires, 7);
        assert_eq!(back.nodes[0].name, "adder");
    }

    #[test]
    fn test_csv_contains_counters() {
        let mut stats = RunStats::new();
        stats.engine.writes = 12;
        let csv = stats.to_csv();
        assert!(csv.starts_with("metric,value\n"));
        assert!(csv.contains("writes,12\n"));
    }

    #[test]
    fn test_summary_mentions_nodes() {
        let mut stats = RunStats::new().with_name("demo");
        stats.nodes.push(NodeCounters {
            id: 0,
            name: "heartbeat".to_string(),
            rank: 0,
            fires: 3,
        });
        let text = stats.summary();
        assert!(text.contains("demo"));
        assert!(text.contains("heartbeat"));
    }
}
