// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Artifact flow graph
//!
//! Nodes are actions plus declared pipeline inputs; an edge runs from the
//! producer of an artifact to each of its consumers.

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use crate::errors::ShipflowError;
use crate::pipeline::{ArtifactOrigin, Pipeline};

/// A node in the artifact graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowNode {
    /// Artifact supplied from outside
    Input(String),
    /// Action inside a stage
    Action { stage: String, name: String },
}

impl FlowNode {
    pub fn label(&self) -> &str {
        match self {
            Self::Input(name) => name,
            Self::Action { name, .. } => name,
        }
    }
}

/// Graph of artifact flow between actions
pub struct ArtifactGraph {
    graph: DiGraph<FlowNode, String>,
    name_to_index: HashMap<String, NodeIndex>,
}

impl ArtifactGraph {
    /// Build the graph of a validated pipeline
    pub fn build(pipeline: &Pipeline) -> Self {
        let mut graph = DiGraph::new();
        let mut name_to_index = HashMap::new();

        for record in pipeline.artifacts().externals() {
            let node = graph.add_node(FlowNode::Input(record.name.clone()));
            name_to_index.insert(Self::input_key(&record.name), node);
        }

        for (stage, action) in pipeline.execution_order() {
            let node = graph.add_node(FlowNode::Action {
                stage: stage.name.clone(),
                name: action.name.clone(),
            });
            name_to_index.insert(action.name.clone(), node);
        }

        for record in pipeline.artifacts().iter() {
            let producer_key = match &record.origin {
                ArtifactOrigin::External => Self::input_key(&record.name),
                ArtifactOrigin::Produced { action, .. } => action.clone(),
            };
            let Some(&from) = name_to_index.get(&producer_key) else {
                continue;
            };
            for consumer in &record.consumers {
                if let Some(&to) = name_to_index.get(&consumer.action) {
                    graph.add_edge(from, to, record.name.clone());
                }
            }
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built artifact graph"
        );

        Self {
            graph,
            name_to_index,
        }
    }

    fn input_key(name: &str) -> String {
        format!("input:{}", name)
    }

    /// Node labels in a dependency-respecting order
    pub fn topological_order_names(&self) -> Result<Vec<String>, ShipflowError> {
        toposort(&self.graph, None)
            .map(|nodes| {
                nodes
                    .into_iter()
                    .map(|n| self.graph[n].label().to_string())
                    .collect()
            })
            .map_err(|cycle| ShipflowError::InvalidPipeline {
                reason: format!(
                    "artifact flow loops through '{}'",
                    self.graph[cycle.node_id()].label()
                ),
                help: None,
            })
    }

    /// Actions or inputs an action reads from, with the artifact carried
    pub fn dependencies(&self, action: &str) -> Option<Vec<(String, String)>> {
        self.neighbors(action, Direction::Incoming)
    }

    /// Actions reading from an action's outputs, with the artifact carried
    pub fn dependents(&self, action: &str) -> Option<Vec<(String, String)>> {
        self.neighbors(action, Direction::Outgoing)
    }

    fn neighbors(&self, action: &str, direction: Direction) -> Option<Vec<(String, String)>> {
        let node = self.name_to_index.get(action)?;
        let mut out: Vec<(String, String)> = self
            .graph
            .edges_directed(*node, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                (self.graph[other].label().to_string(), edge.weight().clone())
            })
            .collect();
        out.sort();
        Some(out)
    }

    /// Whether action `a` depends, directly or transitively, on action `b`
    pub fn depends_on(&self, a: &str, b: &str) -> bool {
        let (Some(&node_a), Some(&node_b)) = (self.name_to_index.get(a), self.name_to_index.get(b))
        else {
            return false;
        };
        node_a != node_b && has_path_connecting(&self.graph, node_b, node_a, None)
    }

    /// Node of an action, or of a declared input
    fn action_node(&self, name: &str) -> Option<NodeIndex> {
        self.name_to_index.get(name).copied()
    }

    fn input_node(&self, name: &str) -> Option<NodeIndex> {
        self.name_to_index.get(&Self::input_key(name)).copied()
    }

    /// Generate Mermaid diagram of the artifact flow
    pub fn to_mermaid(&self, pipeline: &Pipeline) -> String {
        let mut out = String::from("graph LR\n");

        for (i, stage) in pipeline.stages().iter().enumerate() {
            out.push_str(&format!("    subgraph s{}[\"{}\"]\n", i, stage.name));
            for action in stage.ordered_actions() {
                if let Some(node) = self.action_node(&action.name) {
                    out.push_str(&format!("        {}[\"{}\"]\n", node_id(node), action.name));
                }
            }
            out.push_str("    end\n");
        }

        for record in pipeline.artifacts().externals() {
            if let Some(node) = self.input_node(&record.name) {
                out.push_str(&format!("    {}((\"{}\"))\n", node_id(node), record.name));
            }
        }

        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    {} -->|{}| {}\n",
                node_id(edge.source()),
                edge.weight(),
                node_id(edge.target())
            ));
        }

        out
    }

    /// Generate DOT diagram of the artifact flow
    pub fn to_dot(&self, pipeline: &Pipeline) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for (i, stage) in pipeline.stages().iter().enumerate() {
            out.push_str(&format!("    subgraph cluster_{} {{\n", i));
            out.push_str(&format!("        label=\"{}\";\n", stage.name));
            for action in stage.ordered_actions() {
                if let Some(node) = self.action_node(&action.name) {
                    out.push_str(&format!("        {} [label=\"{}\"];\n", node_id(node), action.name));
                }
            }
            out.push_str("    }\n");
        }

        for record in pipeline.artifacts().externals() {
            if let Some(node) = self.input_node(&record.name) {
                out.push_str(&format!(
                    "    {} [label=\"{}\", shape=ellipse];\n",
                    node_id(node),
                    record.name
                ));
            }
        }

        for edge in self.graph.edge_references() {
            out.push_str(&format!(
                "    {} -> {} [label=\"{}\"];\n",
                node_id(edge.source()),
                node_id(edge.target()),
                edge.weight()
            ));
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of execution order
    pub fn to_text(&self, pipeline: &Pipeline) -> String {
        let mut out = String::new();

        if pipeline.is_empty() {
            out.push_str("(no stages)\n");
            return out;
        }

        for (i, stage) in pipeline.stages().iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, stage.name));

            for action in stage.ordered_actions() {
                out.push_str(&format!(
                    "   [{}] {} ({})",
                    action.effective_run_order(),
                    action.name,
                    action.kind()
                ));

                if !action.inputs.is_empty() {
                    out.push_str(&format!(" <- {}", action.inputs.join(", ")));
                }
                if !action.outputs.is_empty() {
                    out.push_str(&format!(" -> {}", action.outputs.join(", ")));
                }

                out.push('\n');
            }
        }

        out
    }
}

/// Diagram identifier; names only ever appear as labels
fn node_id(node: NodeIndex) -> String {
    format!("n{}", node.index())
}
