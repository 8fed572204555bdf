use thiserror::Error;

/// The error taxonomy surfaced by every fallible operation in this crate.
///
/// `DidNotConverge` is deliberately absent: spec treats DC non-convergence as
/// a warning with a defined last solution, not a failure, so it is carried on
/// [`crate::analysis::DcOutcome`] instead of here.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("singular system: pivot magnitude below tolerance at row {row} (topology likely has a floating node or a redundant voltage-source loop)")]
    SingularSystem { row: usize },

    #[error("malformed system: {reason}")]
    MalformedSystem { reason: String },

    #[error("unknown source: no AC voltage source named '{name}'")]
    UnknownSource { name: String },

    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
