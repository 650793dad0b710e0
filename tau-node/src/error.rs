use thiserror::Error;

/// Result type alias for precision-node operations
pub type Result<T> = std::result::Result<T, PrecisionError>;

/// Errors raised while building or updating a precision node
#[derive(Debug, Error)]
pub enum PrecisionError {
    /// A grid disagrees with the node's `(N, D)` or with its collaborators
    #[error("shape mismatch in {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// A Gamma shape or rate that is not strictly positive and finite
    #[error("invalid gamma parameter {what}[{index}] = {value}")]
    InvalidParameter {
        what: String,
        index: usize,
        value: f64,
    },

    /// A broadcast grid whose redundant lanes are not identical
    #[error("{what} is not shared along {axis}: lane {lane} differs from lane 0")]
    NotShared {
        what: String,
        axis: &'static str,
        lane: usize,
    },

    /// The Markov blanket lacks a required node
    #[error("Markov blanket is missing collaborator \"{0}\"")]
    MissingCollaborator(String),

    #[error("failed to sample: {0}")]
    Sampling(String),
}

impl PrecisionError {
    pub(crate) fn shape(what: impl Into<String>, expected: &[usize], found: &[usize]) -> Self {
        PrecisionError::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}
