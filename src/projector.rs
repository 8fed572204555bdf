//! Result projector: distributes a solved MNA vector back onto node
//! voltages and element currents (spec.md §4.5). Every projection here is
//! the mirror image of the corresponding stamp in `mna.rs` — a branch
//! unknown read back is exactly the branch unknown a stamp wrote an
//! equation for; an element with no branch row gets its current from Ohm's
//! law on the projected node voltages instead.

use nalgebra::DVector;
use num_complex::Complex64;

use crate::circuit::Circuit;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::mna::BranchLayout;

fn require_len(x_len: usize, layout: &BranchLayout) -> Result<()> {
    if x_len < layout.size {
        return Err(Error::MalformedSystem {
            reason: format!(
                "solved vector has length {x_len}, expected at least {}",
                layout.size
            ),
        });
    }
    Ok(())
}

/// Write node voltages and every element's solved current back onto the
/// circuit from a real-valued solve (DC or transient). Does not touch
/// history buffers or companion state — the analysis driver commits those
/// once it decides the step is final.
pub fn project_real(circuit: &mut Circuit, x: &DVector<f64>, layout: &BranchLayout) -> Result<()> {
    require_len(x.len(), layout)?;

    // Voltage per node, indexed by `NodeId.0`, computed before any mutable
    // borrow so the loop below doesn't need to re-query the circuit.
    let voltage_by_id: Vec<f64> = circuit
        .nodes()
        .iter()
        .map(|n| match circuit.matrix_index(n.id) {
            Some(i) => x[i],
            None => 0.0,
        })
        .collect();

    for node in circuit.nodes_mut() {
        node.voltage = voltage_by_id[node.id.0];
    }

    let mut vs_dc_idx = layout.vs_dc.iter();
    let mut vs_ac_idx = layout.vs_ac.iter();
    let mut inductor_idx = layout.inductors.iter();
    let mut diode_idx = layout.diodes.iter();

    for element in circuit.elements_mut() {
        let terminals = element.terminals();
        let v1 = voltage_by_id[terminals.node1.0];
        let v2 = voltage_by_id[terminals.node2.0];

        match element {
            Element::Resistor(r) => r.solved_current = r.conductance() * (v1 - v2),
            Element::Capacitor(c) => {
                // Correct for DC (open circuit, no current). The transient
                // driver overwrites this right after projecting, using
                // `capacitor_current` below — it needs `dt`, which isn't
                // available here.
                let _ = (v1, v2);
                c.solved_current = 0.0;
            }
            Element::VoltageSourceDc(vs) => {
                let branch = *vs_dc_idx.next().expect("vs_dc layout matches element count");
                vs.solved_current = x[branch];
            }
            Element::VoltageSourceAc(vs) => {
                let branch = *vs_ac_idx.next().expect("vs_ac layout matches element count");
                vs.solved_current = x[branch];
            }
            Element::Inductor(l) => {
                let branch = *inductor_idx
                    .next()
                    .expect("inductor layout matches element count");
                l.solved_current = x[branch];
            }
            Element::CurrentSource(cs) => cs.solved_current = cs.current,
            Element::Diode(d) => {
                let maybe_branch = diode_idx.next().expect("diode layout matches element count");
                d.branch_index = *maybe_branch;
                d.solved_current = match maybe_branch {
                    Some(branch) => x[*branch],
                    None => 0.0,
                };
            }
        }
    }

    Ok(())
}

/// Capacitor current at the just-solved step, from the companion-model
/// conductance and the voltage held over from the previous step:
/// `I = g_c*(v1 - v2) - g_c*v_prev`. Exposed separately because `project_real`
/// doesn't know the per-call `dt` (capacitors carry no branch row to read it
/// back from); the transient driver calls this once per capacitor per step
/// using the same `dt` it assembled with.
pub fn capacitor_current(capacitance: f64, dt: f64, v1: f64, v2: f64, prev_voltage: f64) -> f64 {
    let g_c = capacitance / dt;
    g_c * (v1 - v2) - g_c * prev_voltage
}

/// Project a solved complex phasor vector onto `(node name, |V|)` pairs, per
/// spec.md §4.4's "records `|V|`" wording for AC and phase sweeps.
pub fn project_complex_magnitudes(
    circuit: &Circuit,
    x: &DVector<Complex64>,
    layout: &BranchLayout,
) -> Result<Vec<(String, f64)>> {
    require_len(x.len(), layout)?;

    let mut out = Vec::with_capacity(circuit.nodes().len());
    for node in circuit.nodes() {
        let mag = match circuit.matrix_index(node.id) {
            Some(i) => x[i].norm(),
            None => 0.0,
        };
        out.push((node.name.clone(), mag));
    }
    Ok(out)
}
