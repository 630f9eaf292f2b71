// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! The fixed pipeline graph
//!
//! Nodes are the entry point, the joins, the stages, the gates and the
//! terminal. Edges carry a port naming the slot they deliver into.

use petgraph::algo::{has_path_connecting, kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use std::fmt;

use crate::errors::GplError;
use crate::gate::GateKind;
use crate::join::JoinTarget;
use crate::stages::{PurpleSlot, ReportSlot, StageKind};

/// A node of the pipeline graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    Entry,
    Join(JoinTarget),
    Stage(StageKind),
    Gate(GateKind),
    Terminal,
}

impl Node {
    /// Identifier safe for DOT and Mermaid
    pub fn id(&self) -> String {
        match self {
            Self::Entry => "entry".into(),
            Self::Join(target) => format!("join_{}", target.name()),
            Self::Stage(stage) => format!("stage_{}", stage.name()),
            Self::Gate(gate) => format!("gate_{}", gate.name()),
            Self::Terminal => "terminal".into(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Join(target) => write!(f, "join({})", target),
            Self::Stage(stage) => write!(f, "{}", stage),
            Self::Gate(gate) => write!(f, "gate({})", gate),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}

/// What an edge delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// The full payload of the source node
    Forward,
    /// The four alignment fragments, interleaved
    Alignments,
    Purple(PurpleSlot),
    Report(ReportSlot),
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => Ok(()),
            Self::Alignments => write!(f, "tumour bam/bai, normal bam/bai"),
            Self::Purple(slot) => write!(f, "{}", slot),
            Self::Report(slot) => write!(f, "{}", slot),
        }
    }
}

/// Pipeline graph over petgraph
pub struct PipelineGraph {
    graph: DiGraph<Node, Port>,
    index: HashMap<Node, NodeIndex>,
}

impl PipelineGraph {
    /// Build the GRIDSS/PURPLE/LINX graph
    pub fn build() -> Result<Self, GplError> {
        use GateKind::*;
        use JoinTarget::*;
        use StageKind::*;

        let edges = [
            (Node::Entry, Node::Join(Alignments), Port::Alignments),
            (
                Node::Entry,
                Node::Join(PurpleInputs),
                Port::Purple(PurpleSlot::SmallVariants),
            ),
            (Node::Join(Alignments), Node::Stage(Amber), Port::Forward),
            (Node::Join(Alignments), Node::Stage(Cobalt), Port::Forward),
            (Node::Join(Alignments), Node::Stage(Gridss), Port::Forward),
            (Node::Stage(Gridss), Node::Stage(GridssAnnotate), Port::Forward),
            (Node::Stage(GridssAnnotate), Node::Stage(SvMerge), Port::Forward),
            (Node::Stage(SvMerge), Node::Stage(Gripss), Port::Forward),
            (Node::Stage(Gripss), Node::Gate(FilteredSv), Port::Forward),
            (
                Node::Gate(FilteredSv),
                Node::Join(PurpleInputs),
                Port::Purple(PurpleSlot::StructuralVariants),
            ),
            (
                Node::Stage(Amber),
                Node::Join(PurpleInputs),
                Port::Purple(PurpleSlot::Amber),
            ),
            (
                Node::Stage(Cobalt),
                Node::Join(PurpleInputs),
                Port::Purple(PurpleSlot::Cobalt),
            ),
            (Node::Join(PurpleInputs), Node::Stage(Purple), Port::Forward),
            (Node::Stage(Purple), Node::Gate(PurpleSv), Port::Forward),
            (Node::Gate(PurpleSv), Node::Stage(Linx), Port::Forward),
            (
                Node::Gate(PurpleSv),
                Node::Join(ReportInputs),
                Port::Report(ReportSlot::Purple),
            ),
            (Node::Stage(Linx), Node::Stage(LinxPlot), Port::Forward),
            (
                Node::Stage(Linx),
                Node::Join(ReportInputs),
                Port::Report(ReportSlot::Linx),
            ),
            (
                Node::Stage(LinxPlot),
                Node::Join(ReportInputs),
                Port::Report(ReportSlot::Plots),
            ),
            (Node::Join(ReportInputs), Node::Stage(Report), Port::Forward),
            (Node::Stage(Report), Node::Terminal, Port::Forward),
        ];

        Self::from_edges(&edges)
    }

    /// Build a graph from an edge list, rejecting cycles
    pub fn from_edges(edges: &[(Node, Node, Port)]) -> Result<Self, GplError> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for &(from, to, port) in edges {
            let a = *index.entry(from).or_insert_with(|| graph.add_node(from));
            let b = *index.entry(to).or_insert_with(|| graph.add_node(to));
            graph.add_edge(a, b, port);
        }

        let built = Self { graph, index };
        built.validate()?;
        Ok(built)
    }

    fn validate(&self) -> Result<(), GplError> {
        if toposort(&self.graph, None).is_ok() {
            return Ok(());
        }

        // Name the members of every non-trivial strongly connected component
        let mut nodes: Vec<String> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&n| self.graph.contains_edge(n, n))
            })
            .flatten()
            .map(|n| self.graph[n].to_string())
            .collect();
        nodes.sort();

        Err(GplError::CircularDependency { nodes })
    }

    /// Every node in a valid execution order
    pub fn topological_order(&self) -> Result<Vec<Node>, GplError> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|n| self.graph[n]).collect())
            .map_err(|cycle| GplError::CircularDependency {
                nodes: vec![self.graph[cycle.node_id()].to_string()],
            })
    }

    /// Stages in execution order
    pub fn stage_order(&self) -> Result<Vec<StageKind>, GplError> {
        Ok(self
            .topological_order()?
            .into_iter()
            .filter_map(|node| match node {
                Node::Stage(stage) => Some(stage),
                _ => None,
            })
            .collect())
    }

    /// Successors of `node` with the port each edge delivers into
    pub fn outgoing(&self, node: Node) -> Vec<(Node, Port)> {
        let Some(&idx) = self.index.get(&node) else {
            return Vec::new();
        };

        let mut targets: Vec<(Node, Port)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| (self.graph[edge.target()], *edge.weight()))
            .collect();
        targets.sort_by_key(|(node, _)| *node);
        targets
    }

    /// Direct predecessors of `node`
    pub fn dependencies(&self, node: Node) -> Vec<Node> {
        self.neighbors(node, Direction::Incoming)
    }

    /// Direct successors of `node`
    pub fn dependents(&self, node: Node) -> Vec<Node> {
        self.neighbors(node, Direction::Outgoing)
    }

    fn neighbors(&self, node: Node, direction: Direction) -> Vec<Node> {
        let Some(&idx) = self.index.get(&node) else {
            return Vec::new();
        };
        let mut nodes: Vec<Node> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n])
            .collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }

    /// Whether `node` transitively depends on `on`
    pub fn depends_on(&self, node: Node, on: Node) -> bool {
        match (self.index.get(&on), self.index.get(&node)) {
            (Some(&from), Some(&to)) => from != to && has_path_connecting(&self.graph, from, to, None),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Numbered execution order with each node's inputs
    pub fn to_text(&self) -> Result<String, GplError> {
        let mut text = String::new();

        for (i, node) in self.topological_order()?.into_iter().enumerate() {
            text.push_str(&format!("{:>2}. {}", i + 1, node));

            let inputs: Vec<String> = self
                .dependencies(node)
                .into_iter()
                .map(|dep| match self.port_between(dep, node) {
                    Some(Port::Forward) | None => dep.to_string(),
                    Some(port) => format!("{} ({})", dep, port),
                })
                .collect();
            if !inputs.is_empty() {
                text.push_str(&format!(" [from: {}]", inputs.join(", ")));
            }
            text.push('\n');
        }

        Ok(text)
    }

    /// Graphviz DOT rendering
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph gplflow {\n");
        dot.push_str("    rankdir=TB;\n");
        dot.push_str("    node [shape=box, style=rounded];\n\n");

        let mut nodes: Vec<Node> = self.index.keys().copied().collect();
        nodes.sort();
        for node in &nodes {
            let shape = match node {
                Node::Join(_) => ", shape=invtrapezium",
                Node::Gate(_) => ", shape=diamond",
                Node::Entry | Node::Terminal => ", shape=oval",
                Node::Stage(_) => "",
            };
            dot.push_str(&format!("    {} [label=\"{}\"{}];\n", node.id(), node, shape));
        }
        dot.push('\n');

        for node in &nodes {
            for (target, port) in self.outgoing(*node) {
                match port {
                    Port::Forward => dot.push_str(&format!("    {} -> {};\n", node.id(), target.id())),
                    port => dot.push_str(&format!(
                        "    {} -> {} [label=\"{}\"];\n",
                        node.id(),
                        target.id(),
                        port
                    )),
                }
            }
        }

        dot.push_str("}\n");
        dot
    }

    /// Mermaid flowchart rendering
    pub fn to_mermaid(&self) -> String {
        let mut mermaid = String::from("graph TD\n");

        let mut nodes: Vec<Node> = self.index.keys().copied().collect();
        nodes.sort();
        for node in &nodes {
            let shape = match node {
                Node::Gate(_) => format!("{}{{\"{}\"}}", node.id(), node),
                Node::Join(_) => format!("{}[/\"{}\"\\]", node.id(), node),
                _ => format!("{}[\"{}\"]", node.id(), node),
            };
            mermaid.push_str(&format!("    {}\n", shape));
        }

        for node in &nodes {
            for (target, port) in self.outgoing(*node) {
                match port {
                    Port::Forward => mermaid.push_str(&format!("    {} --> {}\n", node.id(), target.id())),
                    port => mermaid.push_str(&format!(
                        "    {} -->|{}| {}\n",
                        node.id(),
                        port,
                        target.id()
                    )),
                }
            }
        }

        mermaid
    }

    fn port_between(&self, from: Node, to: Node) -> Option<Port> {
        let (a, b) = (*self.index.get(&from)?, *self.index.get(&to)?);
        self.graph.find_edge(a, b).map(|e| self.graph[e])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[Node], node: Node) -> usize {
        order.iter().position(|n| *n == node).unwrap()
    }

    #[test]
    fn test_graph_shape() {
        let graph = PipelineGraph::build().unwrap();
        // entry, 3 joins, 10 stages, 2 gates, terminal
        assert_eq!(graph.node_count(), 17);
        assert_eq!(graph.edge_count(), 21);
    }

    #[test]
    fn test_topological_order() {
        let graph = PipelineGraph::build().unwrap();
        let order = graph.topological_order().unwrap();

        assert_eq!(order.first(), Some(&Node::Entry));
        assert_eq!(order.last(), Some(&Node::Terminal));
        assert!(
            position(&order, Node::Gate(GateKind::FilteredSv))
                < position(&order, Node::Stage(StageKind::Purple))
        );
        assert!(
            position(&order, Node::Stage(StageKind::LinxPlot))
                < position(&order, Node::Join(JoinTarget::ReportInputs))
        );

        let stages = graph.stage_order().unwrap();
        assert_eq!(stages.len(), StageKind::ALL.len());
    }

    #[test]
    fn test_ports() {
        let graph = PipelineGraph::build().unwrap();

        let from_gate = graph.outgoing(Node::Gate(GateKind::PurpleSv));
        assert_eq!(
            from_gate,
            vec![
                (Node::Join(JoinTarget::ReportInputs), Port::Report(ReportSlot::Purple)),
                (Node::Stage(StageKind::Linx), Port::Forward),
            ]
        );

        let into_purple = graph.dependencies(Node::Join(JoinTarget::PurpleInputs));
        assert_eq!(into_purple.len(), 4);
        assert!(into_purple.contains(&Node::Entry));

        let from_alignments = graph.dependents(Node::Join(JoinTarget::Alignments));
        assert_eq!(
            from_alignments,
            vec![
                Node::Stage(StageKind::Amber),
                Node::Stage(StageKind::Cobalt),
                Node::Stage(StageKind::Gridss),
            ]
        );
    }

    #[test]
    fn test_purple_depends_on_gate() {
        let graph = PipelineGraph::build().unwrap();
        assert!(graph.depends_on(
            Node::Stage(StageKind::Purple),
            Node::Gate(GateKind::FilteredSv)
        ));
        assert!(!graph.depends_on(
            Node::Stage(StageKind::Amber),
            Node::Stage(StageKind::Gridss)
        ));
    }

    #[test]
    fn test_cycle_detected() {
        let edges = [
            (Node::Stage(StageKind::Gridss), Node::Stage(StageKind::Gripss), Port::Forward),
            (Node::Stage(StageKind::Gripss), Node::Stage(StageKind::Gridss), Port::Forward),
            (Node::Entry, Node::Stage(StageKind::Gridss), Port::Forward),
        ];

        match PipelineGraph::from_edges(&edges) {
            Err(GplError::CircularDependency { nodes }) => {
                assert_eq!(nodes, vec!["gridss".to_string(), "gripss".to_string()]);
            }
            other => panic!("expected a cycle error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_renderings() {
        let graph = PipelineGraph::build().unwrap();

        let mermaid = graph.to_mermaid();
        assert!(mermaid.starts_with("graph TD"));
        assert!(mermaid.contains("stage_gridss --> stage_gridss_annotate"));
        assert!(mermaid.contains("stage_amber -->|amber| join_purple_inputs"));

        let dot = graph.to_dot();
        assert!(dot.contains("digraph gplflow {"));
        assert!(dot.contains("gate_filtered_sv [label=\"gate(filtered_sv)\", shape=diamond];"));

        let text = graph.to_text().unwrap();
        assert!(text.contains("purple [from: join(purple_inputs)]"));
        assert!(text.contains("join(report_inputs) [from:"));
    }
}
