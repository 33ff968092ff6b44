//! Declarative run configuration.
//!
//! Graphs and run parameters can be described in YAML or JSON and
//! assembled against a [`NodeRegistry`]. Adapters stay programmatic: the
//! builder returned by [`SimulationConfig::build_graph`] exposes the
//! declared edges by name so callers can attach sources before finalizing.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! engine:
//!   name: adder-demo
//!   start: 0
//!   end: 1000000
//!   mode: simulation
//!
//! edges:
//!   - name: a
//!     type: int
//!   - name: b
//!     type: int
//!   - name: sum
//!     type: int
//!
//! nodes:
//!   - name: adder
//!     kind: Add
//!     attrs:
//!       require_all: "false"
//!     inputs:
//!       - edge: a
//!       - edge: b
//!         active: true
//!         history: 2
//!     outputs: [sum]
//!
//! taps: [sum]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::engine::{Mode, RunOptions};
use crate::error::BuildError;
use crate::graph::{GraphBuilder, InputOpts};
use crate::registry::NodeRegistry;
use crate::types::{EdgeId, Time, SECONDS};
use crate::value::ValueType;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("graph build error: {0}")]
    Build(#[from] BuildError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Engine-level run parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineParams {
    /// Run name, recorded in statistics
    #[serde(default)]
    pub name: String,

    /// First engine time
    #[serde(default)]
    pub start: Time,

    /// Last engine time (inclusive)
    #[serde(default = "default_end")]
    pub end: Time,

    /// Execution mode
    #[serde(default = "default_mode")]
    pub mode: Mode,

    /// Logging level hint for the embedding process
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_end() -> Time {
    SECONDS
}

fn default_mode() -> Mode {
    Mode::Simulation
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            start: 0,
            end: default_end(),
            mode: default_mode(),
            log_level: default_log_level(),
        }
    }
}

/// Configuration of one edge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Unique edge name
    pub name: String,

    /// Value type, e.g. `int`, `[float]`, `struct:Quote`
    #[serde(rename = "type")]
    pub ty: String,

    /// Deliveries deferred to the next cycle at the same time
    #[serde(default)]
    pub feedback: bool,
}

/// One input subscription of a node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputConfig {
    /// Subscribed edge name
    pub edge: String,

    /// Whether ticks on this input fire the node
    #[serde(default = "default_active")]
    pub active: bool,

    /// Readable history depth
    #[serde(default = "default_history")]
    pub history: usize,
}

fn default_active() -> bool {
    true
}

fn default_history() -> usize {
    1
}

/// Configuration of one node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node name
    pub name: String,

    /// Registered kind (see [`NodeRegistry`])
    pub kind: String,

    /// Factory attributes
    #[serde(default)]
    pub attrs: HashMap<String, String>,

    /// Input subscriptions, in slot order
    #[serde(default)]
    pub inputs: Vec<InputConfig>,

    /// Produced edges by name, in slot order
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Alarm payload types, in slot order
    #[serde(default)]
    pub alarms: Vec<String>,
}

/// A complete declarative run description.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Engine parameters
    #[serde(default)]
    pub engine: EngineParams,

    /// Edge declarations
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,

    /// Node declarations
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,

    /// Edges whose tick streams are recorded in the run output
    #[serde(default)]
    pub taps: Vec<String>,
}

impl SimulationConfig {
    /// Parses a YAML configuration string.
    pub fn from_yaml_str(s: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Parses a JSON configuration string.
    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Loads a configuration file, choosing the format by extension.
    pub fn load_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(ConfigError::UnknownFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Run options derived from the engine section.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            start: self.engine.start,
            end: self.engine.end,
            mode: self.engine.mode,
        }
    }

    /// Validates names, references and type strings.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.engine.end < self.engine.start {
            return Err(ConfigError::Validation(format!(
                "end {} precedes start {}",
                self.engine.end, self.engine.start
            )));
        }

        let mut edge_names = std::collections::HashSet::new();
        for edge in &self.edges {
            if !edge_names.insert(edge.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate edge name {}",
                    edge.name
                )));
            }
            parse_type(&edge.ty)?;
        }

        let mut node_names = std::collections::HashSet::new();
        for node in &self.nodes {
            if !node_names.insert(node.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate node name {}",
                    node.name
                )));
            }
            for input in &node.inputs {
                if !edge_names.contains(input.edge.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "node {} reads unknown edge {}",
                        node.name, input.edge
                    )));
                }
            }
            for output in &node.outputs {
                if !edge_names.contains(output.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "node {} writes unknown edge {}",
                        node.name, output
                    )));
                }
            }
            for alarm in &node.alarms {
                parse_type(alarm)?;
            }
            if node.inputs.is_empty() && node.alarms.is_empty() {
                warn!(node = %node.name, "node has neither inputs nor alarms and can only act at start");
            }
        }

        for tap in &self.taps {
            if !edge_names.contains(tap.as_str()) {
                return Err(ConfigError::Validation(format!("tap of unknown edge {}", tap)));
            }
        }
        Ok(())
    }

    /// Assembles a graph builder from this configuration.
    ///
    /// Returns the builder plus the declared edges by name, so adapters
    /// can be attached before [`GraphBuilder::finalize`].
    pub fn build_graph(
        &self,
        registry: &NodeRegistry,
    ) -> ConfigResult<(GraphBuilder, HashMap<String, EdgeId>)> {
        self.validate()?;

        let mut g = GraphBuilder::new();
        let mut edges = HashMap::new();
        let mut edge_types: HashMap<String, ValueType> = HashMap::new();
        for edge in &self.edges {
            let ty = parse_type(&edge.ty)?;
            let id = if edge.feedback {
                g.add_feedback_edge(ty.clone())
            } else {
                g.add_edge(ty.clone())
            };
            edges.insert(edge.name.clone(), id);
            edge_types.insert(edge.name.clone(), ty);
        }

        for node_cfg in &self.nodes {
            let imp = registry
                .create(&node_cfg.kind, &node_cfg.attrs)
                .ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "unknown node kind {} for node {}",
                        node_cfg.kind, node_cfg.name
                    ))
                })?;
            let node = g.add_node(&node_cfg.name, imp);
            for input in &node_cfg.inputs {
                let edge = edges[&input.edge];
                let opts = InputOpts {
                    active: input.active,
                    history: input.history,
                    expects: None,
                };
                g.bind_input(node, edge, opts)?;
            }
            for output in &node_cfg.outputs {
                let edge = edges[output.as_str()];
                g.bind_output(node, edge, edge_types[output.as_str()].clone())?;
            }
            for alarm in &node_cfg.alarms {
                g.add_alarm(node, parse_type(alarm)?)?;
            }
        }

        for tap in &self.taps {
            g.tap(edges[tap.as_str()], tap.clone())?;
        }

        Ok((g, edges))
    }
}

/// Parses a type string: scalars (`bool`, `int`, `float`, `time`, `span`,
/// `str`), arrays (`[T]`), structs (`struct:Name`), enums (`enum:Name`).
pub fn parse_type(s: &str) -> ConfigResult<ValueType> {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        return Ok(ValueType::Array(Box::new(parse_type(inner)?)));
    }
    if let Some(name) = s.strip_prefix("struct:") {
        return Ok(ValueType::Struct(name.trim().to_string()));
    }
    if let Some(name) = s.strip_prefix("enum:") {
        return Ok(ValueType::Enum(name.trim().to_string()));
    }
    match s {
        "bool" => Ok(ValueType::Bool),
        "int" => Ok(ValueType::Int),
        "float" => Ok(ValueType::Float),
        "time" => Ok(ValueType::Time),
        "span" => Ok(ValueType::Span),
        "str" => Ok(ValueType::Str),
        other => Err(ConfigError::Validation(format!("unknown type {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterDecl, SeriesPull};
    use crate::engine::{run, StopReason};
    use crate::registry::default_registry;
    use crate::value::Value;

    const ADDER_YAML: &str = r#"
engine:
  name: adder
  start: 0
  end: 100
  mode: simulation

edges:
  - name: a
    type: int
  - name: b
    type: int
  - name: sum
    type: int

nodes:
  - name: adder
    kind: Add
    inputs:
      - edge: a
      - edge: b
    outputs: [sum]

taps: [sum]
"#;

    #[test]
    fn test_parse_types() {
        assert_eq!(parse_type("int").unwrap(), ValueType::Int);
        assert_eq!(parse_type(" str ").unwrap(), ValueType::Str);
        assert_eq!(
            parse_type("[float]").unwrap(),
            ValueType::Array(Box::new(ValueType::Float))
        );
        assert_eq!(
            parse_type("struct:Quote").unwrap(),
            ValueType::Struct("Quote".to_string())
        );
        assert_eq!(
            parse_type("enum:Side").unwrap(),
            ValueType::Enum("Side".to_string())
        );
        assert!(parse_type("i128").is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = SimulationConfig::from_yaml_str(ADDER_YAML).unwrap();
        assert_eq!(config.engine.name, "adder");
        assert_eq!(config.engine.end, 100);
        assert_eq!(config.engine.mode, Mode::Simulation);
        assert_eq!(config.edges.len(), 3);
        assert_eq!(config.nodes[0].inputs.len(), 2);
        assert!(config.nodes[0].inputs[0].active);
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_unknown_edge() {
        let mut config = SimulationConfig::from_yaml_str(ADDER_YAML).unwrap();
        config.nodes[0].inputs[0].edge = "ghost".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_rejects_duplicates() {
        let mut config = SimulationConfig::from_yaml_str(ADDER_YAML).unwrap();
        config.edges[1].name = "a".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_unknown_kind() {
        let mut config = SimulationConfig::from_yaml_str(ADDER_YAML).unwrap();
        config.nodes[0].kind = "Mystery".to_string();
        let registry = default_registry();
        assert!(matches!(
            config.build_graph(&registry),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_config_driven_run() {
        let config = SimulationConfig::from_yaml_str(ADDER_YAML).unwrap();
        let registry = default_registry();
        let (mut g, edges) = config.build_graph(&registry).unwrap();
        g.add_adapter(AdapterDecl::pull(
            "a",
            Box::new(SeriesPull::new(vec![(10, Value::Int(1))])),
            edges["a"],
            ValueType::Int,
        ))
        .unwrap();
        g.add_adapter(AdapterDecl::pull(
            "b",
            Box::new(SeriesPull::new(vec![(20, Value::Int(2))])),
            edges["b"],
            ValueType::Int,
        ))
        .unwrap();

        let output = run(g.finalize().unwrap(), config.run_options()).unwrap();
        assert_eq!(output.reason, StopReason::EndOfData);
        assert_eq!(
            output.tap("sum"),
            &[(10, Value::Int(1)), (20, Value::Int(3))]
        );
    }

    #[test]
    fn test_json_config() {
        let json = r#"{
            "engine": {"start": 0, "end": 50, "mode": "realtime"},
            "edges": [{"name": "x", "type": "float"}],
            "taps": ["x"]
        }"#;
        let config = SimulationConfig::from_json_str(json).unwrap();
        assert_eq!(config.engine.mode, Mode::RealTime);
        let opts = config.run_options();
        assert_eq!(opts.end, 50);
        config.validate().unwrap();
    }
}
