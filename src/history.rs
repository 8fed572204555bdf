//! History store: the append-only time/frequency/phase series recorded by
//! the analysis driver during a run. A series is a flat `Vec` of samples —
//! at the circuit sizes this core targets, linear scans for by-name lookup
//! (already accepted for the graph itself, see `circuit.rs`) are cheap
//! enough that no indexing structure is needed here either.

/// One `(x, y)` sample in a time, frequency, or phase series.
pub type Sample = (f64, f64);
pub type Series = Vec<Sample>;

/// The three history buffers spec.md §3 attaches to every node.
#[derive(Debug, Clone, Default)]
pub struct NodeHistory {
    /// `(t, V)` pairs recorded during a transient run.
    pub transient: Series,
    /// `(f, |V|)` pairs recorded during an AC sweep.
    pub ac_sweep: Series,
    /// `(phi, |V|)` pairs recorded during a phase sweep.
    pub phase_sweep: Series,
}

impl NodeHistory {
    pub fn clear(&mut self) {
        self.transient.clear();
        self.ac_sweep.clear();
        self.phase_sweep.clear();
    }
}
