//! Typed errors of the epistasis engine.

/// Maximal number of SNPs in a single SNP set.
pub const MAX_SNP_SET_SIZE: usize = 10;

/// Maximal number of distinct edge labels per interaction network.
pub const MAX_EDGE_LABELS: usize = 64;

/// Error type for the core data structures and algorithms.
///
/// Loader, registry, and model errors are fatal and unwind through the
/// command driver; `SolverFailure` is caught at the affected cluster so the
/// run can continue.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// Malformed loader input, unknown enum string, duplicate SNP name,
    /// column mismatch.
    #[error("invalid input: {0}")]
    BadInput(String),
    /// A SNP or edge was required but absent from graph or registry.
    #[error("not found: {0}")]
    NotFound(String),
    /// A SNP set would exceed the hard size cap.
    #[error("SNP set of size {0} exceeds the maximum of {MAX_SNP_SET_SIZE}")]
    SetTooLarge(usize),
    /// More than [`MAX_EDGE_LABELS`] distinct edge labels were requested.
    #[error(
        "cannot register edge label {0:?}: at most {MAX_EDGE_LABELS} distinct labels per network"
    )]
    LabelCapacity(String),
    /// A model feature is not available for this phenotype kind.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// The QUBO backend failed; the affected cluster yields no candidates.
    #[error("QUBO solver failed: {0}")]
    SolverFailure(String),
}

/// Result type over [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;
