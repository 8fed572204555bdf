//! Analysis driver: orchestrates the DC diode iteration, transient stepping,
//! and AC/phase sweeps (spec.md §4.4). This is a second `impl Circuit` block
//! — the distilled spec treats the Analysis API as the core's own surface
//! (see SPEC_FULL.md §0), so the driver lives as methods on `Circuit` rather
//! than a separate orchestrator type wrapping it, matching how the teacher
//! crate's `Simulator` owns the circuit it drives but inverted: here the
//! circuit *is* the thing you call `dc()`/`transient()` on.

use log::{debug, info, warn};

use crate::circuit::Circuit;
use crate::element::{DiodeState, SweepType};
use crate::error::{Error, Result};
use crate::mna::{self, RealAnalysis};
use crate::projector;
use crate::solver;

/// Tunables for the analysis driver, mirroring the teacher's
/// `SimulatorConfig`/`SolverConfig` pattern (see SPEC_FULL.md §0).
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    pub max_diode_iterations: usize,
    pub diode_current_epsilon: f64,
    pub pivot_epsilon: f64,
    /// Sanity cap on `t_stop / dt` for `transient()` (spec.md §6).
    pub max_transient_steps: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            max_diode_iterations: 100,
            diode_current_epsilon: 1e-9,
            pivot_epsilon: solver::DEFAULT_PIVOT_EPSILON,
            max_transient_steps: 1_000_000,
        }
    }
}

/// Outcome of a DC operating-point solve. `converged = false` is a warning,
/// not an error (spec.md §7): the last solution found stands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcOutcome {
    pub converged: bool,
    pub iterations: usize,
}

impl Circuit {
    /// Run a DC operating-point analysis using the driver's default
    /// tunables. See [`Circuit::dc_with_config`] to override them.
    pub fn dc(&mut self) -> Result<DcOutcome> {
        self.dc_with_config(&DriverConfig::default())
    }

    pub fn dc_with_config(&mut self, config: &DriverConfig) -> Result<DcOutcome> {
        self.clear_history();
        self.run_dc_iteration(None, config)
    }

    /// Shared DC diode-iteration loop, used both by plain `dc()` and, with
    /// `ac_override` set, by the AC/phase sweep driver to resolve a
    /// quasi-static diode operating point at the base frequency's source
    /// value before switching to the complex phasor solve (spec.md §4.4's
    /// sweep sections assume diode state is fixed for the whole sweep).
    fn run_dc_iteration(
        &mut self,
        ac_override: Option<(String, f64)>,
        config: &DriverConfig,
    ) -> Result<DcOutcome> {
        info!("starting DC operating point analysis");
        for diode in self.diodes_mut() {
            diode.state = DiodeState::Off;
        }

        let mut iterations = 0;
        let mut converged = false;

        while iterations < config.max_diode_iterations {
            iterations += 1;
            let states_before: Vec<DiodeState> = self.diodes().map(|d| d.state).collect();

            let analysis = RealAnalysis::Dc {
                ac_override: ac_override.clone(),
            };
            let (a, b, layout) = mna::assemble_real(self, &analysis)?;
            let x = solver::solve_real(a, b, config.pivot_epsilon)?;
            projector::project_real(self, &x, &layout)?;

            let mut any_changed = false;
            // Re-evaluate diode states from the freshly projected node
            // voltages and branch currents.
            let node_voltages: Vec<(crate::circuit::NodeId, f64)> = self
                .nodes()
                .iter()
                .map(|n| (n.id, n.voltage))
                .collect();
            let voltage_at = |id: crate::circuit::NodeId| {
                node_voltages
                    .iter()
                    .find(|(nid, _)| *nid == id)
                    .map(|(_, v)| *v)
                    .unwrap_or(0.0)
            };
            for diode in self.diodes_mut() {
                let v1 = voltage_at(diode.terminals.node1);
                let v2 = voltage_at(diode.terminals.node2);
                let changed =
                    diode.update_state(v1 - v2, diode.solved_current, config.diode_current_epsilon);
                any_changed |= changed;
            }

            debug!("DC iteration {iterations}: diode states changed = {any_changed}");

            let states_after: Vec<DiodeState> = self.diodes().map(|d| d.state).collect();
            if !any_changed && states_before == states_after {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                "DC diode iteration did not converge after {} iterations; last solution retained",
                iterations
            );
        } else {
            info!("DC operating point converged in {iterations} iteration(s)");
        }

        Ok(DcOutcome {
            converged,
            iterations,
        })
    }

    /// Run a time-domain transient analysis from `t=0` to `t_stop` in steps
    /// of `dt`, using the driver's default tunables.
    pub fn transient(&mut self, dt: f64, t_stop: f64) -> Result<()> {
        self.transient_with_config(dt, t_stop, &DriverConfig::default())
    }

    pub fn transient_with_config(
        &mut self,
        dt: f64,
        t_stop: f64,
        config: &DriverConfig,
    ) -> Result<()> {
        if dt <= 0.0 {
            return Err(Error::InvalidParameter {
                reason: format!("dt must be > 0, got {dt}"),
            });
        }
        if t_stop <= 0.0 {
            return Err(Error::InvalidParameter {
                reason: format!("t_stop must be > 0, got {t_stop}"),
            });
        }
        let n_steps = (t_stop / dt).round() as u64;
        if n_steps > config.max_transient_steps {
            return Err(Error::InvalidParameter {
                reason: format!(
                    "t_stop/dt = {n_steps} exceeds the sanity cap of {}",
                    config.max_transient_steps
                ),
            });
        }

        info!("starting transient analysis: dt={dt}, t_stop={t_stop}");

        // DC gives the initial condition at t=0. Non-convergence here is a
        // warning (captured in the returned DcOutcome, which this method
        // discards per spec.md's Result<(), Error> signature) but a genuine
        // solver Err still aborts transient.
        self.run_dc_iteration(None, config)?;

        let node_voltage_at = |circuit: &Circuit, id: crate::circuit::NodeId| circuit.node(id).voltage;

        // Seed companion state from the DC solution (spec.md §4.4 step 2).
        let cap_voltages: Vec<f64> = self
            .capacitors()
            .map(|c| node_voltage_at(self, c.terminals.node1) - node_voltage_at(self, c.terminals.node2))
            .collect();
        for (capacitor, v) in self.capacitors_mut().zip(cap_voltages) {
            capacitor.prev_voltage = v;
        }
        for inductor in self.inductors_mut() {
            inductor.prev_current = inductor.solved_current;
        }

        self.record_transient_sample(0.0);

        let mut t = 0.0;
        for step in 1..=n_steps {
            t = step as f64 * dt;
            let analysis = RealAnalysis::Transient { dt, t };
            let (a, b, layout) = match mna::assemble_real(self, &analysis) {
                Ok(v) => v,
                Err(e) => {
                    warn!("transient aborted at t={t}: {e}");
                    return Err(e);
                }
            };
            let x = match solver::solve_real(a, b, config.pivot_epsilon) {
                Ok(v) => v,
                Err(e) => {
                    warn!("transient aborted at t={t}: {e}");
                    return Err(e);
                }
            };
            projector::project_real(self, &x, &layout)?;

            // Capacitor current needs dt, which the generic projector does
            // not have access to (spec.md §4.5); compute it here before
            // advancing companion state.
            let cap_currents: Vec<f64> = self
                .capacitors()
                .map(|c| {
                    let v1 = node_voltage_at(self, c.terminals.node1);
                    let v2 = node_voltage_at(self, c.terminals.node2);
                    projector::capacitor_current(c.capacitance, dt, v1, v2, c.prev_voltage)
                })
                .collect();
            for (capacitor, i) in self.capacitors_mut().zip(cap_currents) {
                capacitor.solved_current = i;
            }

            self.record_transient_sample(t);

            let cap_voltages: Vec<f64> = self
                .capacitors()
                .map(|c| {
                    node_voltage_at(self, c.terminals.node1) - node_voltage_at(self, c.terminals.node2)
                })
                .collect();
            for (capacitor, v) in self.capacitors_mut().zip(cap_voltages) {
                capacitor.prev_voltage = v;
            }
            for inductor in self.inductors_mut() {
                inductor.prev_current = inductor.solved_current;
            }

            debug!("transient step {step}/{n_steps}: t={t:.6}s");
        }

        info!("transient analysis complete: {n_steps} steps, final t={t:.6}s");
        Ok(())
    }

    /// Append the current node voltages and element currents to every
    /// history buffer, for the transient sample at time `t`.
    fn record_transient_sample(&mut self, t: f64) {
        for node in self.nodes_mut() {
            if !node.is_ground {
                let v = node.voltage;
                node.history.transient.push((t, v));
            }
        }
        for element in self.elements_mut() {
            let current = element.solved_current();
            element.push_current_sample(t, current);
        }
    }

    /// Run an AC small-signal frequency sweep of the named AC voltage
    /// source. Returns the number of points successfully computed
    /// (spec.md §4.4).
    pub fn ac_sweep(
        &mut self,
        source_name: &str,
        f_start: f64,
        f_stop: f64,
        n_points: usize,
        sweep_type: SweepType,
    ) -> Result<usize> {
        if self.voltage_source_ac_mut(source_name).is_none() {
            return Err(Error::UnknownSource {
                name: source_name.to_string(),
            });
        }
        if n_points < 1 {
            return Err(Error::InvalidParameter {
                reason: "n_points must be >= 1".to_string(),
            });
        }

        self.clear_history();
        info!("starting AC sweep: {source_name} from {f_start}Hz to {f_stop}Hz, {n_points} points");

        // Any diode in the circuit is linearized around the DC operating
        // point the swept source settles to at its own fixed phase — the
        // same point every frequency in this sweep shares, since only the
        // source's phase (not its frequency) sets that bias (mna.rs's
        // `RealAnalysis::Dc::ac_override` hook).
        let quasi_static_bias = self
            .voltage_source_ac_mut(source_name)
            .map(|vs| vs.magnitude * vs.phase.cos());
        if let Some(bias) = quasi_static_bias {
            self.run_dc_iteration(
                Some((source_name.to_string(), bias)),
                &DriverConfig::default(),
            )?;
        }

        let frequencies = sweep_frequencies(f_start, f_stop, n_points, sweep_type);
        let mut computed = 0;

        for f in frequencies {
            if f <= 0.0 {
                debug!("skipping non-positive frequency {f}Hz");
                continue;
            }
            let omega = std::f64::consts::TAU * f;
            let (a, b, layout) = mna::assemble_complex(self, omega)?;
            let x = solver::solve_complex(a, b, solver::DEFAULT_PIVOT_EPSILON)?;
            let magnitudes = projector::project_complex_magnitudes(self, &x, &layout)?;
            for (name, mag) in magnitudes {
                if let Some(node) = self.node_by_name_mut(&name) {
                    node.history.ac_sweep.push((f, mag));
                }
            }
            computed += 1;
        }

        info!("AC sweep complete: {computed}/{n_points} points computed");
        Ok(computed)
    }

    /// Run a phase sweep of the named AC voltage source at a fixed
    /// frequency, varying its phase linearly from `phi_start` to
    /// `phi_stop` across `n_points` values. Restores the source's original
    /// phase on every return path (spec.md §4.4).
    pub fn phase_sweep(
        &mut self,
        source_name: &str,
        base_freq: f64,
        phi_start: f64,
        phi_stop: f64,
        n_points: usize,
    ) -> Result<usize> {
        if n_points < 1 {
            return Err(Error::InvalidParameter {
                reason: "n_points must be >= 1".to_string(),
            });
        }
        let original_phase = match self.voltage_source_ac_mut(source_name) {
            Some(vs) => vs.phase,
            None => {
                return Err(Error::UnknownSource {
                    name: source_name.to_string(),
                })
            }
        };

        let result = self.phase_sweep_inner(source_name, base_freq, phi_start, phi_stop, n_points);

        // Restore regardless of success or failure.
        if let Some(vs) = self.voltage_source_ac_mut(source_name) {
            vs.phase = original_phase;
        }

        result
    }

    fn phase_sweep_inner(
        &mut self,
        source_name: &str,
        base_freq: f64,
        phi_start: f64,
        phi_stop: f64,
        n_points: usize,
    ) -> Result<usize> {
        self.clear_history();
        info!(
            "starting phase sweep: {source_name} at {base_freq}Hz, {phi_start}..{phi_stop} rad, {n_points} points"
        );

        if base_freq <= 0.0 {
            return Err(Error::InvalidParameter {
                reason: format!("base_freq must be > 0, got {base_freq}"),
            });
        }
        let omega = std::f64::consts::TAU * base_freq;
        let mut computed = 0;

        for i in 0..n_points {
            let phi = if n_points == 1 {
                phi_start
            } else {
                phi_start + (i as f64) * (phi_stop - phi_start) / ((n_points - 1) as f64)
            };

            let bias = {
                let vs = self
                    .voltage_source_ac_mut(source_name)
                    .ok_or_else(|| Error::UnknownSource {
                        name: source_name.to_string(),
                    })?;
                vs.phase = phi;
                vs.magnitude * phi.cos()
            };

            // Re-resolve the diode quasi-static operating point at this
            // phase's instantaneous bias before the complex solve, same
            // reasoning as `ac_sweep`.
            self.run_dc_iteration(
                Some((source_name.to_string(), bias)),
                &DriverConfig::default(),
            )?;

            let (a, b, layout) = mna::assemble_complex(self, omega)?;
            let x = solver::solve_complex(a, b, solver::DEFAULT_PIVOT_EPSILON)?;
            let magnitudes = projector::project_complex_magnitudes(self, &x, &layout)?;
            for (name, mag) in magnitudes {
                if let Some(node) = self.node_by_name_mut(&name) {
                    node.history.phase_sweep.push((phi, mag));
                }
            }
            computed += 1;
        }

        info!("phase sweep complete: {computed}/{n_points} points computed");
        Ok(computed)
    }
}

/// The three frequency-progression formulas of spec.md §4.4.
fn sweep_frequencies(f_start: f64, f_stop: f64, n_points: usize, sweep_type: SweepType) -> Vec<f64> {
    if n_points == 1 {
        return vec![f_start];
    }
    let steps = (n_points - 1) as f64;
    match sweep_type {
        SweepType::Linear => (0..n_points)
            .map(|i| f_start + (i as f64) * (f_stop - f_start) / steps)
            .collect(),
        SweepType::Decade => {
            let decades = (f_stop / f_start).log10();
            (0..n_points)
                .map(|i| f_start * 10f64.powf((i as f64) / steps * decades))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::DiodeKind;
    use approx::assert_relative_eq;

    fn divider_circuit() -> Circuit {
        let mut c = Circuit::new();
        c.mark_ground("0");
        c.add_voltage_source("V1", "in", "0", 10.0).unwrap();
        c.add_resistor("R1", "in", "0", 1000.0).unwrap();
        c
    }

    #[test]
    fn single_resistor_and_source() {
        let mut c = divider_circuit();
        let outcome = c.dc().unwrap();
        assert!(outcome.converged);
        assert_relative_eq!(c.node_voltage("in").unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(
            c.element_by_name("V1").unwrap().solved_current(),
            -0.01,
            epsilon = 1e-9
        );
    }

    #[test]
    fn resistor_divider_matches_spec_scenario() {
        let mut c = Circuit::new();
        c.mark_ground("0");
        c.add_voltage_source("V1", "a", "0", 12.0).unwrap();
        c.add_resistor("R1", "a", "b", 2000.0).unwrap();
        c.add_resistor("R2", "b", "0", 2000.0).unwrap();

        c.dc().unwrap();
        assert_relative_eq!(c.node_voltage("a").unwrap(), 12.0, epsilon = 1e-9);
        assert_relative_eq!(c.node_voltage("b").unwrap(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn kcl_holds_at_every_non_ground_node() {
        let mut c = Circuit::new();
        c.mark_ground("0");
        c.add_voltage_source("V1", "a", "0", 9.0).unwrap();
        c.add_resistor("R1", "a", "b", 1000.0).unwrap();
        c.add_resistor("R2", "b", "0", 3000.0).unwrap();
        c.add_resistor("R3", "b", "0", 6000.0).unwrap();
        c.dc().unwrap();

        let v_a = c.node_voltage("a").unwrap();
        let v_b = c.node_voltage("b").unwrap();
        let i_r1 = (v_a - v_b) / 1000.0;
        let i_r2 = v_b / 3000.0;
        let i_r3 = v_b / 6000.0;
        assert_relative_eq!(i_r1 - i_r2 - i_r3, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn linearity_scales_voltages_and_currents() {
        let mut c1 = divider_circuit();
        c1.dc().unwrap();
        let v1 = c1.node_voltage("in").unwrap();

        let mut c2 = Circuit::new();
        c2.mark_ground("0");
        c2.add_voltage_source("V1", "in", "0", 30.0).unwrap();
        c2.add_resistor("R1", "in", "0", 1000.0).unwrap();
        c2.dc().unwrap();
        let v2 = c2.node_voltage("in").unwrap();

        assert_relative_eq!(v2, 3.0 * v1, epsilon = 1e-9);
    }

    #[test]
    fn rc_charging_matches_spec_scenario() {
        let mut c = Circuit::new();
        c.mark_ground("0");
        c.add_voltage_source("V1", "src", "0", 5.0).unwrap();
        c.add_resistor("R1", "src", "n", 1000.0).unwrap();
        c.add_capacitor("C1", "n", "0", 1e-6).unwrap();

        c.transient(10e-6, 10e-3).unwrap();

        let history = c.node_transient_history("n").unwrap();
        let sample = history
            .iter()
            .find(|(t, _)| (*t - 1e-3).abs() < 1e-9)
            .expect("1ms sample recorded");
        assert_relative_eq!(sample.1, 3.161, epsilon = 0.01);
    }

    #[test]
    fn rl_settling_matches_spec_scenario() {
        let mut c = Circuit::new();
        c.mark_ground("0");
        c.add_voltage_source("V1", "src", "0", 5.0).unwrap();
        c.add_resistor("R1", "src", "n", 100.0).unwrap();
        c.add_inductor("L1", "n", "0", 10e-3).unwrap();

        c.transient(10e-6, 10e-3).unwrap();

        let history = c.element_current_history("L1").unwrap();
        let sample = history
            .iter()
            .find(|(t, _)| (*t - 0.2e-3).abs() < 1e-9)
            .expect("0.2ms sample recorded");
        assert_relative_eq!(sample.1, 0.04324, epsilon = 0.0005);
    }

    #[test]
    fn transient_initial_condition_matches_dc() {
        let mut c = divider_circuit();
        c.dc().unwrap();
        let dc_voltage = c.node_voltage("in").unwrap();

        c.transient(1e-6, 1e-3).unwrap();
        let history = c.node_transient_history("in").unwrap();
        assert_relative_eq!(history[0].0, 0.0, epsilon = 1e-12);
        assert_relative_eq!(history[0].1, dc_voltage, epsilon = 1e-9);
    }

    #[test]
    fn ac_low_pass_matches_spec_scenario() {
        let mut c = Circuit::new();
        c.mark_ground("0");
        c.add_ac_voltage_source("V1", "in", "0", 1.0, 0.0, 1000.0).unwrap();
        c.add_resistor("R1", "in", "out", 1000.0).unwrap();
        c.add_capacitor("C1", "out", "0", 159.15e-9).unwrap();

        let computed = c.ac_sweep("V1", 1.0, 100_000.0, 26, SweepType::Decade).unwrap();
        assert_eq!(computed, 26);

        let history = c.node_ac_history("out").unwrap();
        let sample = history
            .iter()
            .min_by(|a, b| (a.0 - 1000.0).abs().partial_cmp(&(b.0 - 1000.0).abs()).unwrap())
            .unwrap();
        assert_relative_eq!(sample.1, 0.7071, epsilon = 0.005);
    }

    #[test]
    fn zener_clamp_matches_spec_scenario() {
        // V1(10V) -> R1(1k) -> x; DZ anode at ground, cathode at x, so a
        // large positive bias reverse-biases the Zener into breakdown and
        // clamps V(anode) - V(cathode) = -V_z, i.e. V(x) = +V_z.
        let mut c = Circuit::new();
        c.mark_ground("0");
        c.add_voltage_source("V1", "in", "0", 10.0).unwrap();
        c.add_resistor("R1", "in", "x", 1000.0).unwrap();
        c.add_diode("DZ", "0", "x", 0.7, 5.1, DiodeKind::Zener).unwrap();

        let outcome = c.dc().unwrap();
        assert!(outcome.converged);
        assert_relative_eq!(c.node_voltage("x").unwrap(), 5.1, epsilon = 1e-6);
    }

    #[test]
    fn zener_clamp_stays_bounded_across_phase_sweep() {
        let mut c = Circuit::new();
        c.mark_ground("0");
        c.add_ac_voltage_source("V1", "src", "0", 1.0, 0.0, 60.0).unwrap();
        c.add_resistor("R1", "src", "x", 1000.0).unwrap();
        c.add_diode("DZ", "x", "0", 0.7, 5.1, DiodeKind::Zener).unwrap();

        let computed = c
            .phase_sweep("V1", 60.0, 0.0, std::f64::consts::TAU, 36)
            .unwrap();
        assert_eq!(computed, 36);

        let history = c.node_phase_history("x").unwrap();
        assert_eq!(history.len(), 36);
        for (_, mag) in history {
            assert!(
                *mag >= 0.7 - 1e-6 && *mag <= 5.1 + 1e-6,
                "|V(x)| = {mag} out of [0.7, 5.1]"
            );
        }
    }

    #[test]
    fn phase_sweep_restores_source_phase_on_success() {
        let mut c = Circuit::new();
        c.mark_ground("0");
        c.add_ac_voltage_source("V1", "x", "0", 1.0, 0.3, 60.0).unwrap();
        c.add_resistor("R1", "x", "0", 1000.0).unwrap();

        c.phase_sweep("V1", 60.0, 0.0, std::f64::consts::TAU, 36)
            .unwrap();
        assert_relative_eq!(
            c.voltage_sources_ac().next().unwrap().phase,
            0.3,
            epsilon = 1e-12
        );
    }

    #[test]
    fn ac_sweep_unknown_source_is_reported() {
        let mut c = Circuit::new();
        c.mark_ground("0");
        c.add_resistor("R1", "x", "0", 1000.0).unwrap();
        let err = c
            .ac_sweep("NOPE", 1.0, 1000.0, 5, SweepType::Linear)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSource { .. }));
    }

    #[test]
    fn invalid_transient_parameters_rejected() {
        let mut c = divider_circuit();
        assert!(matches!(
            c.transient(0.0, 1e-3).unwrap_err(),
            Error::InvalidParameter { .. }
        ));
        assert!(matches!(
            c.transient(1e-6, 0.0).unwrap_err(),
            Error::InvalidParameter { .. }
        ));
    }
}
