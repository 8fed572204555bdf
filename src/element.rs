//! Element model: data for each circuit-element kind and their companion-model
//! per-step state. See `mna.rs` for how each kind is stamped into the MNA
//! system, and `analysis.rs` for the diode state-machine iteration.

use crate::circuit::NodeId;
use crate::history::Series;

/// A diode's piecewise-linear operating state (the only nonlinearity this
/// core models — see spec §4.4's "Diode iteration as a fixed-point loop").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiodeState {
    Off,
    FwdOn,
    RevOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiodeKind {
    Normal,
    Zener,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepType {
    Linear,
    Decade,
}

/// Common endpoints shared by every two-terminal element.
#[derive(Debug, Clone, Copy)]
pub struct Terminals {
    pub node1: NodeId,
    pub node2: NodeId,
}

#[derive(Debug, Clone)]
pub struct Resistor {
    pub name: String,
    pub terminals: Terminals,
    pub resistance: f64,
    /// Current through the element as of the last projected solve.
    pub solved_current: f64,
    /// `(t, I)` samples recorded during a transient run.
    pub current_history: Series,
}

impl Resistor {
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

#[derive(Debug, Clone)]
pub struct Capacitor {
    pub name: String,
    pub terminals: Terminals,
    pub capacitance: f64,
    /// Voltage across the capacitor at the end of the previous transient step.
    pub prev_voltage: f64,
    pub solved_current: f64,
    pub current_history: Series,
}

#[derive(Debug, Clone)]
pub struct Inductor {
    pub name: String,
    pub terminals: Terminals,
    pub inductance: f64,
    /// Current through the inductor at the end of the previous transient step.
    pub prev_current: f64,
    /// Assigned by the assembler each call; `None` before first assembly.
    pub branch_index: Option<usize>,
    pub solved_current: f64,
    pub current_history: Series,
}

#[derive(Debug, Clone)]
pub struct VoltageSourceDc {
    pub name: String,
    pub terminals: Terminals,
    pub voltage: f64,
    pub branch_index: Option<usize>,
    pub solved_current: f64,
    pub current_history: Series,
}

#[derive(Debug, Clone)]
pub struct VoltageSourceAc {
    pub name: String,
    pub terminals: Terminals,
    pub magnitude: f64,
    /// Radians. See SPEC_FULL.md's Open Question resolution.
    pub phase: f64,
    /// Used only when this source is stamped as a time-varying source during
    /// a transient run; AC/phase sweeps instead take frequency as an
    /// assembly-time parameter.
    pub frequency: f64,
    pub branch_index: Option<usize>,
    pub solved_current: f64,
    pub current_history: Series,
}

#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub name: String,
    pub terminals: Terminals,
    pub current: f64,
    pub solved_current: f64,
    pub current_history: Series,
}

#[derive(Debug, Clone)]
pub struct Diode {
    pub name: String,
    pub terminals: Terminals,
    pub forward_voltage: f64,
    pub zener_voltage: f64,
    pub kind: DiodeKind,
    pub state: DiodeState,
    pub branch_index: Option<usize>,
    pub solved_current: f64,
    pub current_history: Series,
}

impl Diode {
    pub fn new(
        name: String,
        terminals: Terminals,
        forward_voltage: f64,
        zener_voltage: f64,
        kind: DiodeKind,
    ) -> Self {
        Diode {
            name,
            terminals,
            forward_voltage,
            zener_voltage,
            kind,
            state: DiodeState::Off,
            branch_index: None,
            solved_current: 0.0,
            current_history: Series::new(),
        }
    }

    /// Re-evaluate this diode's state given the voltage across it (anode minus
    /// cathode) and its last-solved current, per spec's transition table.
    /// Returns whether the state changed.
    pub fn update_state(&mut self, v_across: f64, current: f64, eps_i: f64) -> bool {
        let old = self.state;
        let new_state = match (self.kind, self.state) {
            (_, DiodeState::Off) if v_across >= self.forward_voltage - eps_i => DiodeState::FwdOn,
            (DiodeKind::Zener, DiodeState::Off) if v_across <= -self.zener_voltage + eps_i => {
                DiodeState::RevOn
            }
            (_, DiodeState::FwdOn) if current < -eps_i => DiodeState::Off,
            (DiodeKind::Zener, DiodeState::RevOn) if current > eps_i => DiodeState::Off,
            (_, s) => s,
        };
        self.state = new_state;
        new_state != old
    }
}

/// A single circuit element as a tagged variant, per the §9 redesign note
/// preferring a sum type over inheritance + parallel vectors.
#[derive(Debug, Clone)]
pub enum Element {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSourceDc(VoltageSourceDc),
    VoltageSourceAc(VoltageSourceAc),
    CurrentSource(CurrentSource),
    Diode(Diode),
}

impl Element {
    pub fn name(&self) -> &str {
        match self {
            Element::Resistor(e) => &e.name,
            Element::Capacitor(e) => &e.name,
            Element::Inductor(e) => &e.name,
            Element::VoltageSourceDc(e) => &e.name,
            Element::VoltageSourceAc(e) => &e.name,
            Element::CurrentSource(e) => &e.name,
            Element::Diode(e) => &e.name,
        }
    }

    pub fn terminals(&self) -> Terminals {
        match self {
            Element::Resistor(e) => e.terminals,
            Element::Capacitor(e) => e.terminals,
            Element::Inductor(e) => e.terminals,
            Element::VoltageSourceDc(e) => e.terminals,
            Element::VoltageSourceAc(e) => e.terminals,
            Element::CurrentSource(e) => e.terminals,
            Element::Diode(e) => e.terminals,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Element::Resistor(_) => "resistor",
            Element::Capacitor(_) => "capacitor",
            Element::Inductor(_) => "inductor",
            Element::VoltageSourceDc(_) => "voltage source",
            Element::VoltageSourceAc(_) => "ac voltage source",
            Element::CurrentSource(_) => "current source",
            Element::Diode(_) => "diode",
        }
    }

    pub fn solved_current(&self) -> f64 {
        match self {
            Element::Resistor(e) => e.solved_current,
            Element::Capacitor(e) => e.solved_current,
            Element::Inductor(e) => e.solved_current,
            Element::VoltageSourceDc(e) => e.solved_current,
            Element::VoltageSourceAc(e) => e.solved_current,
            Element::CurrentSource(e) => e.solved_current,
            Element::Diode(e) => e.solved_current,
        }
    }

    pub fn current_history(&self) -> &[(f64, f64)] {
        match self {
            Element::Resistor(e) => &e.current_history,
            Element::Capacitor(e) => &e.current_history,
            Element::Inductor(e) => &e.current_history,
            Element::VoltageSourceDc(e) => &e.current_history,
            Element::VoltageSourceAc(e) => &e.current_history,
            Element::CurrentSource(e) => &e.current_history,
            Element::Diode(e) => &e.current_history,
        }
    }

    pub fn clear_current_history(&mut self) {
        match self {
            Element::Resistor(e) => e.current_history.clear(),
            Element::Capacitor(e) => e.current_history.clear(),
            Element::Inductor(e) => e.current_history.clear(),
            Element::VoltageSourceDc(e) => e.current_history.clear(),
            Element::VoltageSourceAc(e) => e.current_history.clear(),
            Element::CurrentSource(e) => e.current_history.clear(),
            Element::Diode(e) => e.current_history.clear(),
        }
    }

    pub fn push_current_sample(&mut self, t: f64, i: f64) {
        match self {
            Element::Resistor(e) => e.current_history.push((t, i)),
            Element::Capacitor(e) => e.current_history.push((t, i)),
            Element::Inductor(e) => e.current_history.push((t, i)),
            Element::VoltageSourceDc(e) => e.current_history.push((t, i)),
            Element::VoltageSourceAc(e) => e.current_history.push((t, i)),
            Element::CurrentSource(e) => e.current_history.push((t, i)),
            Element::Diode(e) => e.current_history.push((t, i)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminals() -> Terminals {
        Terminals {
            node1: NodeId(0),
            node2: NodeId(1),
        }
    }

    #[test]
    fn resistor_conductance_is_reciprocal() {
        let r = Resistor {
            name: "R1".into(),
            terminals: terminals(),
            resistance: 2000.0,
            solved_current: 0.0,
            current_history: Vec::new(),
        };
        assert_eq!(r.conductance(), 0.0005);
    }

    #[test]
    fn diode_turns_on_forward_and_off_on_reverse_current() {
        let mut d = Diode::new("D1".into(), terminals(), 0.7, 5.1, DiodeKind::Normal);
        assert_eq!(d.state, DiodeState::Off);

        let changed = d.update_state(0.7, 0.0, 1e-9);
        assert!(changed);
        assert_eq!(d.state, DiodeState::FwdOn);

        let changed = d.update_state(0.7, -1e-6, 1e-9);
        assert!(changed);
        assert_eq!(d.state, DiodeState::Off);
    }

    #[test]
    fn zener_enters_reverse_conduction_below_breakdown() {
        let mut d = Diode::new("DZ".into(), terminals(), 0.7, 5.1, DiodeKind::Zener);
        let changed = d.update_state(-5.1, 0.0, 1e-9);
        assert!(changed);
        assert_eq!(d.state, DiodeState::RevOn);

        let changed = d.update_state(-5.1, 1e-6, 1e-9);
        assert!(changed);
        assert_eq!(d.state, DiodeState::Off);
    }

    #[test]
    fn non_zener_diode_never_enters_reverse_conduction() {
        let mut d = Diode::new("D2".into(), terminals(), 0.7, 5.1, DiodeKind::Normal);
        let changed = d.update_state(-10.0, 0.0, 1e-9);
        assert!(!changed);
        assert_eq!(d.state, DiodeState::Off);
    }
}
