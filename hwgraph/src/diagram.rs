//! Diagram Export
//!
//! Builds a component/net graph with petgraph and renders it as Mermaid.
//!
//! - one node per component, in BOM order
//! - a net owned by exactly two components becomes one labelled edge
//! - a net owned by more than two fans out from a synthetic net node
//! - nets with a single owner draw nothing
//!
//! Rendering walks nodes and edges in insertion order, so identical input
//! gives byte-identical output.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::bom::{to_bom, BomSource};
use crate::model::{PcbModel, ProjectModel, SchematicModel};
use crate::parser::netlist::{Net, Netlist, PinRef};

/// Anything with parts and a netlist over them.
pub trait DiagramSource: BomSource {
    fn netlist(&self) -> &Netlist;
}

impl DiagramSource for SchematicModel {
    fn netlist(&self) -> &Netlist {
        &self.netlist
    }
}

impl DiagramSource for PcbModel {
    fn netlist(&self) -> &Netlist {
        &self.netlist
    }
}

impl DiagramSource for ProjectModel {
    fn netlist(&self) -> &Netlist {
        &self.netlist
    }
}

/// Node type in the diagram graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagramNode {
    Component {
        reference: String,
        value: String,
        library: String,
    },
    /// Synthetic hub for a net with more than two owners
    Net { code: u32, name: String },
}

impl DiagramNode {
    pub fn is_component(&self) -> bool {
        matches!(self, DiagramNode::Component { .. })
    }

    pub fn is_net(&self) -> bool {
        matches!(self, DiagramNode::Net { .. })
    }
}

/// Edge type: the net carried and the source component's pins on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramEdge {
    pub net: String,
    pub pins: Vec<PinRef>,
}

#[derive(Debug, Clone, Default)]
pub struct Diagram {
    graph: DiGraph<DiagramNode, DiagramEdge>,
    component_indices: HashMap<String, NodeIndex>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_source(source: &impl DiagramSource) -> Self {
        let mut diagram = Self::new();

        let parts = source.bom_parts();
        let libraries: HashMap<&str, &str> = parts
            .iter()
            .rev()
            .map(|p| (p.reference.trim(), p.library))
            .collect();

        // Pass 1: components, in BOM order
        let bom = to_bom(source);
        for entry in &bom.entries {
            for reference in &entry.references {
                let library = libraries.get(reference.as_str()).copied().unwrap_or_default();
                diagram.add_component(reference, &entry.value, library);
            }
        }

        // Pass 2: nets, in netlist order
        for net in &source.netlist().nets {
            diagram.add_net(net);
        }

        diagram
    }

    /// Add a component node. A reference already present keeps its node.
    pub fn add_component(&mut self, reference: &str, value: &str, library: &str) -> NodeIndex {
        if let Some(&idx) = self.component_indices.get(reference) {
            return idx;
        }
        let idx = self.graph.add_node(DiagramNode::Component {
            reference: reference.to_string(),
            value: value.to_string(),
            library: library.to_string(),
        });
        self.component_indices.insert(reference.to_string(), idx);
        idx
    }

    /// Connect the owners of `net`. Pins of components not in the diagram
    /// (power symbols, excluded parts) are ignored.
    pub fn add_net(&mut self, net: &Net) {
        let mut owners: BTreeMap<NodeIndex, Vec<PinRef>> = BTreeMap::new();
        for pin in &net.pins {
            if let Some(&idx) = self.component_indices.get(&pin.reference) {
                owners.entry(idx).or_default().push(pin.clone());
            }
        }

        match owners.len() {
            0 | 1 => {}
            2 => {
                let mut iter = owners.into_iter();
                if let (Some((a, pins)), Some((b, _))) = (iter.next(), iter.next()) {
                    self.graph.add_edge(
                        a,
                        b,
                        DiagramEdge {
                            net: net.name.clone(),
                            pins,
                        },
                    );
                }
            }
            _ => {
                let hub = self.graph.add_node(DiagramNode::Net {
                    code: net.code,
                    name: net.name.clone(),
                });
                for (idx, pins) in owners {
                    self.graph.add_edge(
                        idx,
                        hub,
                        DiagramEdge {
                            net: net.name.clone(),
                            pins,
                        },
                    );
                }
            }
        }
    }

    pub fn graph(&self) -> &DiGraph<DiagramNode, DiagramEdge> {
        &self.graph
    }

    pub fn component_count(&self) -> usize {
        self.component_indices.len()
    }

    pub fn net_node_count(&self) -> usize {
        self.graph.node_weights().filter(|n| n.is_net()).count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// References directly connected to `reference`, through an edge or a
    /// shared net node.
    pub fn neighbors(&self, reference: &str) -> Vec<&str> {
        let Some(&idx) = self.component_indices.get(reference) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for n in self.graph.neighbors_undirected(idx) {
            let hop: Vec<NodeIndex> = match &self.graph[n] {
                DiagramNode::Net { .. } => self
                    .graph
                    .neighbors_directed(n, Direction::Incoming)
                    .filter(|&m| m != idx)
                    .collect(),
                DiagramNode::Component { .. } => vec![n],
            };
            for m in hop {
                if let DiagramNode::Component { reference, .. } = &self.graph[m] {
                    if seen.insert(m) {
                        out.push(reference.as_str());
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// Mermaid `flowchart TD`.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("flowchart TD\n");

        for idx in self.graph.node_indices() {
            if let DiagramNode::Component { reference, value, .. } = &self.graph[idx] {
                let _ = writeln!(
                    out,
                    "    {}[{}]",
                    node_id(reference),
                    text(&format!("{}: {}", reference, value))
                );
            }
        }

        let mut declared = HashSet::new();
        for edge in self.graph.edge_references() {
            let source = self.id_of(edge.source());
            match &self.graph[edge.target()] {
                DiagramNode::Net { code, name } => {
                    if declared.insert(edge.target()) {
                        let _ = writeln!(out, "    n{}(({}))", code, text(name));
                    }
                    let _ = writeln!(out, "    {} --> n{}", source, code);
                }
                DiagramNode::Component { .. } => {
                    let target = self.id_of(edge.target());
                    let _ = writeln!(
                        out,
                        "    {} -- {} --> {}",
                        source,
                        text(&edge.weight().net),
                        target
                    );
                }
            }
        }

        out
    }

    /// Mermaid `classDiagram`: one class per library id listing its
    /// components, linked where a net joins two libraries.
    pub fn to_class_diagram(&self) -> String {
        let mut classes: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
        for node in self.graph.node_weights() {
            if let DiagramNode::Component {
                reference,
                value,
                library,
            } = node
            {
                classes
                    .entry(library.as_str())
                    .or_default()
                    .push((reference.as_str(), value.as_str()));
            }
        }

        let mut out = String::from("classDiagram\n");
        for (library, members) in &classes {
            let _ = writeln!(out, "    class {} {{", class_id(library));
            for (reference, value) in members {
                let _ = writeln!(out, "        +{}", format!("{} {}", reference, value).trim_end());
            }
            out.push_str("    }\n");
        }

        let mut links: Vec<(String, String)> = Vec::new();
        for members in self.net_members() {
            let mut libs: Vec<&str> = members.iter().filter_map(|&idx| self.library_of(idx)).collect();
            libs.sort_unstable();
            libs.dedup();
            for pair in libs.windows(2) {
                let link = (class_id(pair[0]), class_id(pair[1]));
                if !links.contains(&link) {
                    links.push(link);
                }
            }
        }
        for (a, b) in links {
            let _ = writeln!(out, "    {} -- {}", a, b);
        }

        out
    }

    /// Component sets joined by each net, in edge order.
    fn net_members(&self) -> Vec<Vec<NodeIndex>> {
        let mut sets = Vec::new();
        let mut hubs = HashSet::new();
        for edge in self.graph.edge_references() {
            match &self.graph[edge.target()] {
                DiagramNode::Net { .. } => {
                    if hubs.insert(edge.target()) {
                        sets.push(
                            self.graph
                                .neighbors_directed(edge.target(), Direction::Incoming)
                                .collect(),
                        );
                    }
                }
                DiagramNode::Component { .. } => sets.push(vec![edge.source(), edge.target()]),
            }
        }
        sets
    }

    fn library_of(&self, idx: NodeIndex) -> Option<&str> {
        match &self.graph[idx] {
            DiagramNode::Component { library, .. } => Some(library.as_str()),
            DiagramNode::Net { .. } => None,
        }
    }

    fn id_of(&self, idx: NodeIndex) -> String {
        match &self.graph[idx] {
            DiagramNode::Component { reference, .. } => node_id(reference),
            DiagramNode::Net { code, .. } => format!("n{}", code),
        }
    }
}

/// Mermaid node ids allow word characters only.
fn node_id(reference: &str) -> String {
    reference
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn class_id(library: &str) -> String {
    if library.is_empty() {
        return "Unknown".to_string();
    }
    node_id(library)
}

/// Label text, quoted when it holds characters Mermaid would parse as
/// syntax.
fn text(label: &str) -> String {
    let plain = label
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '.' | '/' | '+' | ':'));
    if plain && !label.is_empty() {
        label.to_string()
    } else {
        format!("\"{}\"", label.replace('"', "#quot;"))
    }
}

/// Mermaid flowchart for `source`.
pub fn to_diagram(source: &impl DiagramSource) -> String {
    Diagram::from_source(source).to_mermaid()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(code: u32, name: &str, pins: &[(&str, &str)]) -> Net {
        Net {
            code,
            name: name.to_string(),
            source: crate::parser::netlist::NameSource::Declared,
            pins: pins.iter().map(|(r, p)| PinRef::new(*r, *p)).collect(),
        }
    }

    fn sample() -> Diagram {
        let mut d = Diagram::new();
        d.add_component("C1", "100n", "Device:C");
        d.add_component("R1", "10k", "Device:R");
        d.add_component("U1", "MCU", "MCU:STM32");
        d.add_net(&net(1, "GND", &[("C1", "2"), ("R1", "2"), ("U1", "4")]));
        d.add_net(&net(2, "MID", &[("R1", "1"), ("U1", "3")]));
        d.add_net(&net(3, "NC", &[("U1", "7")]));
        d.add_net(&net(4, "PWR", &[("#PWR01", "1"), ("C1", "1")]));
        d
    }

    #[test]
    fn test_edges_and_hubs() {
        let d = sample();
        assert_eq!(d.component_count(), 3);
        assert_eq!(d.net_node_count(), 1);
        assert_eq!(d.edge_count(), 4);
        assert_eq!(d.neighbors("R1"), vec!["C1", "U1"]);
        assert_eq!(d.neighbors("C1"), vec!["R1", "U1"]);
    }

    #[test]
    fn test_mermaid_flowchart() {
        let expected = "flowchart TD\n\
                        \x20   C1[C1: 100n]\n\
                        \x20   R1[R1: 10k]\n\
                        \x20   U1[U1: MCU]\n\
                        \x20   n1((GND))\n\
                        \x20   C1 --> n1\n\
                        \x20   R1 --> n1\n\
                        \x20   U1 --> n1\n\
                        \x20   R1 -- MID --> U1\n";
        assert_eq!(sample().to_mermaid(), expected);
    }

    #[test]
    fn test_labels_are_quoted_when_needed() {
        assert_eq!(text("VCC"), "VCC");
        assert_eq!(text("Net-(R1-1)"), "\"Net-(R1-1)\"");
        assert_eq!(text("say \"hi\""), "\"say #quot;hi#quot;\"");
        assert_eq!(node_id("#FLG01"), "_FLG01");
    }

    #[test]
    fn test_class_diagram() {
        let out = sample().to_class_diagram();
        assert!(out.starts_with("classDiagram\n"));
        assert!(out.contains("    class Device_R {\n        +R1 10k\n    }\n"));
        assert!(out.contains("    Device_C -- Device_R\n"));
        assert!(out.contains("    Device_R -- MCU_STM32\n"));
    }
}
