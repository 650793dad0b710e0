//! Variational updates of the noise precision in a Bayesian matrix
//! factorization.
//!
//! The data `Y` (`N x D`, possibly with missing entries) is modeled
//! as `Z Wᵀ` plus Gaussian noise whose precision τ is either shared per
//! feature or per sample. Given the moments of `Z` and `W`, each
//! [`precision::PrecisionNode`] performs the conjugate coordinate
//! ascent update of q(τ), reports its ELBO term, and draws τ from the
//! prior for simulation.

/// Markov blanket: observations, factor moments, node registry
pub mod blanket;

/// Uniform prior configuration
pub mod config;

/// Error type
pub mod error;

/// Gamma parameters and their expectations
pub mod gamma;

/// Precision nodes shared per feature or per sample
pub mod precision;

/// Expected squared residuals under the factor model
pub mod residual;

/// Simulated factor-model data
pub mod simulate;

/// Collaborator and node interfaces
pub mod traits;

pub use blanket::{FactorPair, FactorVariant, MarkovBlanket, MaskedMatrix, Moments, NodeRegistry};
pub use config::PrecisionPrior;
pub use error::{PrecisionError, Result};
pub use gamma::{GammaExpectations, GammaVector};
pub use precision::{Distrib, PrecisionNode, SharingAxis};
pub use traits::{FactorNode, ObservationNode, VariationalNode};
