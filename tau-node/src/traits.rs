use crate::blanket::{MarkovBlanket, MaskedMatrix, Moments};
use crate::error::Result;

/// The observed data node `"Y"`
pub trait ObservationNode {
    /// `N x D` data with its missing-value mask
    fn observations(&self) -> &MaskedMatrix;
}

/// A factor node (`"Z"`, `"W"` or a spike-and-slab variant)
/// that exposes its first and second moments
pub trait FactorNode {
    /// `E[X]` and `E[X²]`, each of shape `(rows, K)`
    fn expectations(&self) -> &Moments;
}

/// A latent node updated by coordinate ascent variational inference
pub trait VariationalNode {
    type Expectations;

    /// One closed-form update of the variational posterior, holding
    /// the rest of the Markov blanket at its current expectations
    fn update_parameters(&mut self, blanket: &MarkovBlanket<'_>) -> Result<()>;

    /// This node's contribution to the evidence lower bound:
    /// E_q[ln p(x)] - E_q[ln q(x)]
    fn calculate_elbo(&self) -> f64;

    fn get_expectations(&self) -> &Self::Expectations;
}
