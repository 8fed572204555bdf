//! Modified Nodal Analysis core for a lumped-element circuit simulator.
//!
//! This crate is the numerical core only (see `SPEC_FULL.md` §0): the
//! circuit graph, element models, MNA assembler, dense linear solver,
//! analysis driver, result projector, and history store. Netlist-text
//! parsing, persistence, FFI, and a CLI are external collaborators that
//! consume this crate's Builder/Analysis/Query API — they are not part of
//! it.

pub mod analysis;
pub mod circuit;
pub mod element;
pub mod error;
pub mod history;
pub mod mna;
pub mod projector;
pub mod solver;

pub use analysis::{DcOutcome, DriverConfig};
pub use circuit::{Circuit, Node, NodeId};
pub use element::{DiodeKind, DiodeState, Element, SweepType};
pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
