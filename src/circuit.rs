//! Circuit graph: nodes, elements, ground set, and the index maps the MNA
//! assembler (`mna.rs`) needs to turn a netlist into a linear system. Also
//! hosts the public Builder, Analysis, and Query APIs (`analysis.rs` adds the
//! Analysis API as a second `impl Circuit` block) since the distilled spec
//! treats both as the core's own surface, not an external front end.

use crate::element::{
    Capacitor, CurrentSource, Diode, DiodeKind, Element, Inductor, Resistor, Terminals,
    VoltageSourceAc, VoltageSourceDc,
};
use crate::error::{Error, Result};
use crate::history::NodeHistory;

/// A stable identity for a node, assigned once on creation and never reused.
/// Elements store `NodeId`s rather than references into the node store (see
/// SPEC_FULL.md §9: no raw pointers, no aliasing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub id: NodeId,
    pub is_ground: bool,
    pub voltage: f64,
    pub history: NodeHistory,
}

/// The circuit graph: the single source of truth between analysis
/// iterations. Node and element lookup by name is a linear scan; acceptable
/// at the circuit sizes this core targets (see spec.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    nodes: Vec<Node>,
    elements: Vec<Element>,
}

impl Circuit {
    pub fn new() -> Self {
        Circuit::default()
    }

    // ---- Builder API -----------------------------------------------------

    /// Create a new, non-ground node. Returns `Error::InvalidParameter` if a
    /// node with this name already exists (use `find_or_create_node` for
    /// idempotent lookup-or-create).
    pub fn add_node(&mut self, name: &str) -> Result<NodeId> {
        if self.node_by_name(name).is_some() {
            return Err(Error::InvalidParameter {
                reason: format!("node '{name}' already exists"),
            });
        }
        Ok(self.push_node(name))
    }

    /// Look up a node by name, creating it if it doesn't exist yet. This is
    /// the auto-creation convenience spec.md §4.1 grants element insertion.
    pub fn find_or_create_node(&mut self, name: &str) -> NodeId {
        if let Some(node) = self.node_by_name(name) {
            return node.id;
        }
        self.push_node(name)
    }

    fn push_node(&mut self, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            id,
            is_ground: false,
            voltage: 0.0,
            history: NodeHistory::default(),
        });
        id
    }

    /// Mark an existing (or auto-created) node as ground. Ground nodes are
    /// excluded from the MNA unknown vector; their voltage is definitionally
    /// zero.
    pub fn mark_ground(&mut self, name: &str) -> NodeId {
        let id = self.find_or_create_node(name);
        let node = self.node_mut(id);
        node.is_ground = true;
        node.voltage = 0.0;
        id
    }

    pub fn add_resistor(&mut self, name: &str, node1: &str, node2: &str, resistance: f64) -> Result<()> {
        if resistance <= 0.0 {
            return Err(Error::InvalidParameter {
                reason: format!("resistor '{name}' must have R > 0, got {resistance}"),
            });
        }
        self.reject_duplicate_name(name)?;
        let terminals = self.resolve_terminals(node1, node2);
        self.elements.push(Element::Resistor(Resistor {
            name: name.to_string(),
            terminals,
            resistance,
            solved_current: 0.0,
            current_history: Vec::new(),
        }));
        Ok(())
    }

    pub fn add_capacitor(&mut self, name: &str, node1: &str, node2: &str, capacitance: f64) -> Result<()> {
        if capacitance <= 0.0 {
            return Err(Error::InvalidParameter {
                reason: format!("capacitor '{name}' must have C > 0, got {capacitance}"),
            });
        }
        self.reject_duplicate_name(name)?;
        let terminals = self.resolve_terminals(node1, node2);
        self.elements.push(Element::Capacitor(Capacitor {
            name: name.to_string(),
            terminals,
            capacitance,
            prev_voltage: 0.0,
            solved_current: 0.0,
            current_history: Vec::new(),
        }));
        Ok(())
    }

    pub fn add_inductor(&mut self, name: &str, node1: &str, node2: &str, inductance: f64) -> Result<()> {
        if inductance <= 0.0 {
            return Err(Error::InvalidParameter {
                reason: format!("inductor '{name}' must have L > 0, got {inductance}"),
            });
        }
        self.reject_duplicate_name(name)?;
        let terminals = self.resolve_terminals(node1, node2);
        self.elements.push(Element::Inductor(Inductor {
            name: name.to_string(),
            terminals,
            inductance,
            prev_current: 0.0,
            branch_index: None,
            solved_current: 0.0,
            current_history: Vec::new(),
        }));
        Ok(())
    }

    pub fn add_voltage_source(&mut self, name: &str, node1: &str, node2: &str, voltage: f64) -> Result<()> {
        self.reject_duplicate_name(name)?;
        let terminals = self.resolve_terminals(node1, node2);
        self.elements.push(Element::VoltageSourceDc(VoltageSourceDc {
            name: name.to_string(),
            terminals,
            voltage,
            branch_index: None,
            solved_current: 0.0,
            current_history: Vec::new(),
        }));
        Ok(())
    }

    /// `phase` is in radians (see SPEC_FULL.md's resolution of the phase-unit
    /// Open Question). `frequency` is used only when this source is stamped
    /// as a time-varying source during a transient run.
    pub fn add_ac_voltage_source(
        &mut self,
        name: &str,
        node1: &str,
        node2: &str,
        magnitude: f64,
        phase: f64,
        frequency: f64,
    ) -> Result<()> {
        self.reject_duplicate_name(name)?;
        let terminals = self.resolve_terminals(node1, node2);
        self.elements.push(Element::VoltageSourceAc(VoltageSourceAc {
            name: name.to_string(),
            terminals,
            magnitude,
            phase,
            frequency,
            branch_index: None,
            solved_current: 0.0,
            current_history: Vec::new(),
        }));
        Ok(())
    }

    pub fn add_current_source(&mut self, name: &str, node1: &str, node2: &str, current: f64) -> Result<()> {
        self.reject_duplicate_name(name)?;
        let terminals = self.resolve_terminals(node1, node2);
        self.elements.push(Element::CurrentSource(CurrentSource {
            name: name.to_string(),
            terminals,
            current,
            solved_current: 0.0,
            current_history: Vec::new(),
        }));
        Ok(())
    }

    pub fn add_diode(
        &mut self,
        name: &str,
        node1: &str,
        node2: &str,
        forward_voltage: f64,
        zener_voltage: f64,
        kind: DiodeKind,
    ) -> Result<()> {
        self.reject_duplicate_name(name)?;
        let terminals = self.resolve_terminals(node1, node2);
        self.elements.push(Element::Diode(Diode::new(
            name.to_string(),
            terminals,
            forward_voltage,
            zener_voltage,
            kind,
        )));
        Ok(())
    }

    fn resolve_terminals(&mut self, node1: &str, node2: &str) -> Terminals {
        Terminals {
            node1: self.find_or_create_node(node1),
            node2: self.find_or_create_node(node2),
        }
    }

    fn reject_duplicate_name(&self, name: &str) -> Result<()> {
        if self.elements.iter().any(|e| e.name() == name) {
            return Err(Error::InvalidParameter {
                reason: format!("element name '{name}' is already in use"),
            });
        }
        Ok(())
    }

    // ---- Graph queries -----------------------------------------------------

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_by_name_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [Element] {
        &mut self.elements
    }

    pub fn element_by_name(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name() == name)
    }

    pub fn resistors(&self) -> impl Iterator<Item = &Resistor> {
        self.elements.iter().filter_map(|e| match e {
            Element::Resistor(r) => Some(r),
            _ => None,
        })
    }

    pub fn capacitors(&self) -> impl Iterator<Item = &Capacitor> {
        self.elements.iter().filter_map(|e| match e {
            Element::Capacitor(c) => Some(c),
            _ => None,
        })
    }

    pub fn capacitors_mut(&mut self) -> impl Iterator<Item = &mut Capacitor> {
        self.elements.iter_mut().filter_map(|e| match e {
            Element::Capacitor(c) => Some(c),
            _ => None,
        })
    }

    pub fn inductors(&self) -> impl Iterator<Item = &Inductor> {
        self.elements.iter().filter_map(|e| match e {
            Element::Inductor(l) => Some(l),
            _ => None,
        })
    }

    pub fn inductors_mut(&mut self) -> impl Iterator<Item = &mut Inductor> {
        self.elements.iter_mut().filter_map(|e| match e {
            Element::Inductor(l) => Some(l),
            _ => None,
        })
    }

    pub fn voltage_sources_dc(&self) -> impl Iterator<Item = &VoltageSourceDc> {
        self.elements.iter().filter_map(|e| match e {
            Element::VoltageSourceDc(v) => Some(v),
            _ => None,
        })
    }

    pub fn voltage_sources_ac(&self) -> impl Iterator<Item = &VoltageSourceAc> {
        self.elements.iter().filter_map(|e| match e {
            Element::VoltageSourceAc(v) => Some(v),
            _ => None,
        })
    }

    pub fn voltage_source_ac_mut(&mut self, name: &str) -> Option<&mut VoltageSourceAc> {
        self.elements.iter_mut().find_map(|e| match e {
            Element::VoltageSourceAc(v) if v.name == name => Some(v),
            _ => None,
        })
    }

    pub fn current_sources(&self) -> impl Iterator<Item = &CurrentSource> {
        self.elements.iter().filter_map(|e| match e {
            Element::CurrentSource(c) => Some(c),
            _ => None,
        })
    }

    pub fn diodes(&self) -> impl Iterator<Item = &Diode> {
        self.elements.iter().filter_map(|e| match e {
            Element::Diode(d) => Some(d),
            _ => None,
        })
    }

    pub fn diodes_mut(&mut self) -> impl Iterator<Item = &mut Diode> {
        self.elements.iter_mut().filter_map(|e| match e {
            Element::Diode(d) => Some(d),
            _ => None,
        })
    }

    /// The MNA row for a non-ground node, in graph-insertion order among
    /// non-ground nodes. `None` for ground nodes (the matrix-index
    /// sentinel).
    pub fn matrix_index(&self, id: NodeId) -> Option<usize> {
        let mut index = 0;
        for node in &self.nodes {
            if node.id == id {
                return if node.is_ground { None } else { Some(index) };
            }
            if !node.is_ground {
                index += 1;
            }
        }
        None
    }

    /// Number of non-ground nodes: the size of the node-voltage block of the
    /// unknown vector.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_ground).count()
    }

    /// dc_vs_count + ac_vs_count + inductor_count + active_diode_count, per
    /// spec.md §4.1. AC voltage sources always carry a branch-current
    /// unknown in this core (see DESIGN.md), so `ac_vs_count` is
    /// unconditional here.
    pub fn extra_variable_count(&self) -> usize {
        self.voltage_sources_dc().count()
            + self.voltage_sources_ac().count()
            + self.inductors().count()
            + self
                .diodes()
                .filter(|d| d.state != crate::element::DiodeState::Off)
                .count()
    }

    // ---- Query API (read-only after an analysis) ---------------------------

    pub fn node_voltage(&self, name: &str) -> Option<f64> {
        self.node_by_name(name).map(|n| n.voltage)
    }

    pub fn node_transient_history(&self, name: &str) -> Option<&[(f64, f64)]> {
        self.node_by_name(name).map(|n| n.history.transient.as_slice())
    }

    pub fn node_ac_history(&self, name: &str) -> Option<&[(f64, f64)]> {
        self.node_by_name(name).map(|n| n.history.ac_sweep.as_slice())
    }

    pub fn node_phase_history(&self, name: &str) -> Option<&[(f64, f64)]> {
        self.node_by_name(name).map(|n| n.history.phase_sweep.as_slice())
    }

    pub fn element_current_history(&self, name: &str) -> Option<&[(f64, f64)]> {
        self.element_by_name(name).map(|e| e.current_history())
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    pub fn voltage_source_names(&self) -> Vec<&str> {
        self.voltage_sources_dc()
            .map(|v| v.name.as_str())
            .chain(self.voltage_sources_ac().map(|v| v.name.as_str()))
            .collect()
    }

    pub fn element_names(&self) -> Vec<&str> {
        self.elements.iter().map(|e| e.name()).collect()
    }

    /// Clear every node's and element's history buffers. Called by the
    /// analysis driver at the start of each run (spec.md §3: "append-only
    /// within a single analysis run and cleared at the start of each new
    /// run").
    pub fn clear_history(&mut self) {
        for node in &mut self.nodes {
            node.history.clear();
        }
        for element in &mut self.elements {
            element.clear_current_history();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_creates_nodes_on_element_insertion() {
        let mut c = Circuit::new();
        assert!(c.node_by_name("in").is_none());
        c.add_resistor("R1", "in", "out", 1000.0).unwrap();
        assert!(c.node_by_name("in").is_some());
        assert!(c.node_by_name("out").is_some());
    }

    #[test]
    fn ground_excluded_from_matrix_index() {
        let mut c = Circuit::new();
        let gnd = c.mark_ground("0");
        let n1 = c.find_or_create_node("n1");
        assert_eq!(c.matrix_index(gnd), None);
        assert_eq!(c.matrix_index(n1), Some(0));
        assert_eq!(c.node_count(), 1);
    }

    #[test]
    fn duplicate_element_name_rejected() {
        let mut c = Circuit::new();
        c.mark_ground("0");
        c.add_resistor("R1", "in", "0", 1000.0).unwrap();
        let err = c.add_resistor("R1", "in", "0", 500.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn non_positive_resistance_rejected() {
        let mut c = Circuit::new();
        c.mark_ground("0");
        let err = c.add_resistor("R1", "in", "0", 0.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }
}
