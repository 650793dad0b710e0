use crate::error::Result;
use crate::gamma::GammaVector;
use crate::precision::{PrecisionNode, SharingAxis};

/// Hyper parameters of a uniform Gamma prior on the noise precision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecisionPrior {
    /// shape a0
    pub a0: f64,
    /// rate b0
    pub b0: f64,
}

impl Default for PrecisionPrior {
    /// A weak prior, E[τ] = 1 with a large variance
    fn default() -> Self {
        Self { a0: 1e-3, b0: 1e-3 }
    }
}

impl PrecisionPrior {
    pub fn new(a0: f64, b0: f64) -> Self {
        Self { a0, b0 }
    }

    /// A node with this prior, whose posterior starts at the prior
    pub fn build(&self, axis: SharingAxis, dim: (usize, usize)) -> Result<PrecisionNode> {
        let len = axis.canonical_len(dim);
        let prior = GammaVector::from_elem(len, self.a0, self.b0)?;
        PrecisionNode::new(axis, dim, prior.clone(), prior, None)
    }
}
