//! MNA assembler: builds the system matrix `A` and RHS vector `b` for a
//! given analysis kind, frequency, or time (spec.md §4.3). Every stamping
//! function below is grouped by the classical MNA block it would belong to
//! (`G`/`B`/`C`/`D`/`J`/`E` in `original_source/include/Circuit.h`'s block
//! decomposition) even though this core returns the assembled `(A, b)`
//! directly rather than exposing the blocks — see SPEC_FULL.md §4.3's
//! supplement note.
//!
//! Assembly reads the circuit but never mutates it (SPEC_FULL.md §9): matrix
//! index assignment, companion-model history, and diode state are all
//! snapshotted as of the call and returned fresh each time.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use std::f64::consts::TAU;

use crate::circuit::Circuit;
use crate::element::DiodeState;
use crate::error::{Error, Result};

/// Maps element-order positions onto extra-variable matrix rows/columns,
/// per spec.md §3's deterministic ordering: non-ground nodes, then DC
/// voltage sources, then AC voltage sources, then inductors, then active
/// diodes.
#[derive(Debug, Clone)]
pub struct BranchLayout {
    pub n: usize,
    pub size: usize,
    pub vs_dc: Vec<usize>,
    pub vs_ac: Vec<usize>,
    pub inductors: Vec<usize>,
    /// `None` for an `Off` diode (it contributes no branch equation).
    pub diodes: Vec<Option<usize>>,
}

impl BranchLayout {
    /// AC voltage sources always occupy a branch row in this core — they
    /// carry a current unknown in every analysis kind, with the RHS value
    /// depending on the kind (0 in plain DC, the time-varying formula in
    /// transient, the phasor in AC/phase sweeps). See DESIGN.md for why this
    /// core does not special-case "does this AC source currently
    /// contribute" per spec.md's `extra_variable_count` wording.
    pub fn compute(circuit: &Circuit) -> Self {
        let n = circuit.node_count();
        let mut next = n;

        let vs_dc: Vec<usize> = circuit
            .voltage_sources_dc()
            .map(|_| {
                let idx = next;
                next += 1;
                idx
            })
            .collect();

        let vs_ac: Vec<usize> = circuit
            .voltage_sources_ac()
            .map(|_| {
                let idx = next;
                next += 1;
                idx
            })
            .collect();

        let inductors: Vec<usize> = circuit
            .inductors()
            .map(|_| {
                let idx = next;
                next += 1;
                idx
            })
            .collect();

        let diodes: Vec<Option<usize>> = circuit
            .diodes()
            .map(|d| {
                if d.state == DiodeState::Off {
                    None
                } else {
                    let idx = next;
                    next += 1;
                    Some(idx)
                }
            })
            .collect();

        BranchLayout {
            n,
            size: next,
            vs_dc,
            vs_ac,
            inductors,
            diodes,
        }
    }
}

/// Which real-valued analysis to assemble for. `Dc`'s `ac_override` is an
/// internal hook used by the AC/phase-sweep driver to resolve diode state at
/// a quasi-static operating point before switching to the complex phasor
/// solve (see `analysis.rs`); ordinary `dc()` calls pass `None`.
#[derive(Debug, Clone)]
pub enum RealAnalysis {
    Dc { ac_override: Option<(String, f64)> },
    Transient { dt: f64, t: f64 },
}

fn add_real(a: &mut DMatrix<f64>, row: Option<usize>, col: Option<usize>, value: f64) {
    if let (Some(r), Some(c)) = (row, col) {
        a[(r, c)] += value;
    }
}

fn add_rhs_real(b: &mut DVector<f64>, index: Option<usize>, value: f64) {
    if let Some(i) = index {
        b[i] += value;
    }
}

/// Stamp block `G`: the conductance contributions of resistors and (in
/// transient) capacitor companion admittances.
fn stamp_conductance_real(a: &mut DMatrix<f64>, n1: Option<usize>, n2: Option<usize>, g: f64) {
    add_real(a, n1, n1, g);
    add_real(a, n2, n2, g);
    add_real(a, n1, n2, -g);
    add_real(a, n2, n1, -g);
}

/// Stamp blocks `B`/`C`/`D`: a branch row tying node voltages to a branch
/// current unknown, as every voltage source, inductor, and active diode
/// does.
fn stamp_branch_real(
    a: &mut DMatrix<f64>,
    n1: Option<usize>,
    n2: Option<usize>,
    branch: usize,
    diag: f64,
) {
    add_real(a, n1, Some(branch), 1.0);
    add_real(a, Some(branch), n1, 1.0);
    add_real(a, n2, Some(branch), -1.0);
    add_real(a, Some(branch), n2, -1.0);
    a[(branch, branch)] += diag;
}

/// Assemble a real-valued MNA system for DC operating point or transient
/// analysis. Returns `(A, b, layout)`.
pub fn assemble_real(
    circuit: &Circuit,
    analysis: &RealAnalysis,
) -> Result<(DMatrix<f64>, DVector<f64>, BranchLayout)> {
    let layout = BranchLayout::compute(circuit);
    if layout.size == 0 {
        return Err(Error::MalformedSystem {
            reason: "circuit has no non-ground nodes and no branch unknowns".to_string(),
        });
    }

    let mut a = DMatrix::zeros(layout.size, layout.size);
    let mut b = DVector::zeros(layout.size);

    for r in circuit.resistors() {
        let n1 = circuit.matrix_index(r.terminals.node1);
        let n2 = circuit.matrix_index(r.terminals.node2);
        stamp_conductance_real(&mut a, n1, n2, r.conductance());
    }

    if let RealAnalysis::Transient { dt, .. } = analysis {
        for c in circuit.capacitors() {
            let n1 = circuit.matrix_index(c.terminals.node1);
            let n2 = circuit.matrix_index(c.terminals.node2);
            let g_c = c.capacitance / dt;
            stamp_conductance_real(&mut a, n1, n2, g_c);
            let i_c = g_c * c.prev_voltage;
            add_rhs_real(&mut b, n1, i_c);
            add_rhs_real(&mut b, n2, -i_c);
        }
    }
    // DC: capacitors are open circuits — no stamp (SPEC_FULL.md's committed
    // resolution of the Open Question over the Δt->infinity alternative).

    for cs in circuit.current_sources() {
        let n1 = circuit.matrix_index(cs.terminals.node1);
        let n2 = circuit.matrix_index(cs.terminals.node2);
        add_rhs_real(&mut b, n1, cs.current);
        add_rhs_real(&mut b, n2, -cs.current);
    }

    for (vs, &branch) in circuit.voltage_sources_dc().zip(&layout.vs_dc) {
        let n1 = circuit.matrix_index(vs.terminals.node1);
        let n2 = circuit.matrix_index(vs.terminals.node2);
        stamp_branch_real(&mut a, n1, n2, branch, 0.0);
        b[branch] = vs.voltage;
    }

    for (vs, &branch) in circuit.voltage_sources_ac().zip(&layout.vs_ac) {
        let n1 = circuit.matrix_index(vs.terminals.node1);
        let n2 = circuit.matrix_index(vs.terminals.node2);
        stamp_branch_real(&mut a, n1, n2, branch, 0.0);
        b[branch] = match analysis {
            RealAnalysis::Dc { ac_override: Some((name, value)) } if *name == vs.name => *value,
            RealAnalysis::Dc { .. } => 0.0,
            RealAnalysis::Transient { t, .. } => {
                vs.magnitude * (TAU * vs.frequency * t + vs.phase).cos()
            }
        };
    }

    for (ind, &branch) in circuit.inductors().zip(&layout.inductors) {
        let n1 = circuit.matrix_index(ind.terminals.node1);
        let n2 = circuit.matrix_index(ind.terminals.node2);
        match analysis {
            RealAnalysis::Dc { .. } => {
                stamp_branch_real(&mut a, n1, n2, branch, 0.0);
                b[branch] = 0.0;
            }
            RealAnalysis::Transient { dt, .. } => {
                stamp_branch_real(&mut a, n1, n2, branch, -ind.inductance / dt);
                b[branch] = -(ind.inductance / dt) * ind.prev_current;
            }
        }
    }

    for (diode, maybe_branch) in circuit.diodes().zip(&layout.diodes) {
        let Some(branch) = maybe_branch else { continue };
        let n1 = circuit.matrix_index(diode.terminals.node1);
        let n2 = circuit.matrix_index(diode.terminals.node2);
        stamp_branch_real(&mut a, n1, n2, *branch, 0.0);
        b[*branch] = match diode.state {
            DiodeState::FwdOn => diode.forward_voltage,
            DiodeState::RevOn => -diode.zener_voltage,
            DiodeState::Off => unreachable!("Off diodes carry no branch index"),
        };
    }

    Ok((a, b, layout))
}

fn stamp_conductance_complex(
    a: &mut DMatrix<Complex64>,
    n1: Option<usize>,
    n2: Option<usize>,
    g: Complex64,
) {
    if let Some(i) = n1 {
        a[(i, i)] += g;
    }
    if let Some(j) = n2 {
        a[(j, j)] += g;
    }
    if let (Some(i), Some(j)) = (n1, n2) {
        a[(i, j)] -= g;
        a[(j, i)] -= g;
    }
}

fn stamp_branch_complex(
    a: &mut DMatrix<Complex64>,
    n1: Option<usize>,
    n2: Option<usize>,
    branch: usize,
    diag: Complex64,
) {
    let one = Complex64::new(1.0, 0.0);
    if let Some(i) = n1 {
        a[(i, branch)] += one;
        a[(branch, i)] += one;
    }
    if let Some(j) = n2 {
        a[(j, branch)] -= one;
        a[(branch, j)] -= one;
    }
    a[(branch, branch)] += diag;
}

/// Assemble the complex-valued small-signal system at angular frequency
/// `omega = 2*pi*f`, used by both AC sweep and phase sweep (spec.md §4.3/
/// §4.4). Every `VoltageSourceAc` is stamped from its own current
/// `magnitude`/`phase` fields — callers doing a phase sweep mutate the
/// swept source's `phase` between calls and restore it afterward.
pub fn assemble_complex(
    circuit: &Circuit,
    omega: f64,
) -> Result<(DMatrix<Complex64>, DVector<Complex64>, BranchLayout)> {
    let layout = BranchLayout::compute(circuit);
    if layout.size == 0 {
        return Err(Error::MalformedSystem {
            reason: "circuit has no non-ground nodes and no branch unknowns".to_string(),
        });
    }

    let zero = Complex64::new(0.0, 0.0);
    let mut a = DMatrix::from_element(layout.size, layout.size, zero);
    let mut b = DVector::from_element(layout.size, zero);

    for r in circuit.resistors() {
        let n1 = circuit.matrix_index(r.terminals.node1);
        let n2 = circuit.matrix_index(r.terminals.node2);
        stamp_conductance_complex(&mut a, n1, n2, Complex64::new(r.conductance(), 0.0));
    }

    for c in circuit.capacitors() {
        let n1 = circuit.matrix_index(c.terminals.node1);
        let n2 = circuit.matrix_index(c.terminals.node2);
        stamp_conductance_complex(&mut a, n1, n2, Complex64::new(0.0, omega * c.capacitance));
    }

    for cs in circuit.current_sources() {
        let n1 = circuit.matrix_index(cs.terminals.node1);
        let n2 = circuit.matrix_index(cs.terminals.node2);
        let i = Complex64::new(cs.current, 0.0);
        if let Some(idx) = n1 {
            b[idx] += i;
        }
        if let Some(idx) = n2 {
            b[idx] -= i;
        }
    }

    for (vs, &branch) in circuit.voltage_sources_dc().zip(&layout.vs_dc) {
        let n1 = circuit.matrix_index(vs.terminals.node1);
        let n2 = circuit.matrix_index(vs.terminals.node2);
        stamp_branch_complex(&mut a, n1, n2, branch, zero);
        b[branch] = Complex64::new(vs.voltage, 0.0);
    }

    for (vs, &branch) in circuit.voltage_sources_ac().zip(&layout.vs_ac) {
        let n1 = circuit.matrix_index(vs.terminals.node1);
        let n2 = circuit.matrix_index(vs.terminals.node2);
        stamp_branch_complex(&mut a, n1, n2, branch, zero);
        b[branch] = Complex64::new(vs.magnitude * vs.phase.cos(), vs.magnitude * vs.phase.sin());
    }

    for (ind, &branch) in circuit.inductors().zip(&layout.inductors) {
        let n1 = circuit.matrix_index(ind.terminals.node1);
        let n2 = circuit.matrix_index(ind.terminals.node2);
        stamp_branch_complex(&mut a, n1, n2, branch, Complex64::new(0.0, -omega * ind.inductance));
        b[branch] = zero;
    }

    for (diode, maybe_branch) in circuit.diodes().zip(&layout.diodes) {
        let Some(branch) = maybe_branch else { continue };
        let n1 = circuit.matrix_index(diode.terminals.node1);
        let n2 = circuit.matrix_index(diode.terminals.node2);
        stamp_branch_complex(&mut a, n1, n2, *branch, zero);
        b[*branch] = match diode.state {
            DiodeState::FwdOn => Complex64::new(diode.forward_voltage, 0.0),
            DiodeState::RevOn => Complex64::new(-diode.zener_voltage, 0.0),
            DiodeState::Off => unreachable!("Off diodes carry no branch index"),
        };
    }

    Ok((a, b, layout))
}
