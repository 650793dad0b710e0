//! Collaborators of a precision node and the Markov blanket wiring
//! them together.
//!
//! The blanket only borrows its nodes. Their lifetimes belong to
//! whoever assembles the model, and the blanket is handed to
//! `update_parameters` on each call, so the borrow checker keeps any
//! collaborator from changing while it is being read.

use crate::error::{PrecisionError, Result};
use crate::traits::{FactorNode, ObservationNode};
use matrix_util::traits::MaskOps;
use ndarray::prelude::*;
use std::collections::HashMap;

/// Dense `N x D` data with a missing-value mask (`true` = missing)
///
/// Values under the mask are placeholders and never read.
#[derive(Debug, Clone)]
pub struct MaskedMatrix {
    data: Array2<f64>,
    mask: Array2<bool>,
}

impl MaskedMatrix {
    pub fn new(data: Array2<f64>, mask: Array2<bool>) -> Result<Self> {
        if data.dim() != mask.dim() {
            return Err(PrecisionError::shape("missing mask", data.shape(), mask.shape()));
        }
        Ok(Self { data, mask })
    }

    /// No missing entries
    pub fn fully_observed(data: Array2<f64>) -> Self {
        let mask = Array2::from_elem(data.dim(), false);
        Self { data, mask }
    }

    /// Treat every `NaN` as missing
    pub fn from_nan(data: Array2<f64>) -> Self {
        let mask = data.mapv(f64::is_nan);
        Self { data, mask }
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn num_observed(&self) -> usize {
        self.mask.count_observed()
    }
}

impl ObservationNode for MaskedMatrix {
    fn observations(&self) -> &MaskedMatrix {
        self
    }
}

/// First and second moments of a factor matrix
#[derive(Debug, Clone)]
pub struct Moments {
    e: Array2<f64>,
    e2: Array2<f64>,
}

impl Moments {
    /// # Arguments
    /// * `e` - E[X]
    /// * `e2` - E[X²], elementwise
    pub fn new(e: Array2<f64>, e2: Array2<f64>) -> Result<Self> {
        if e.dim() != e2.dim() {
            return Err(PrecisionError::shape("second moment", e.shape(), e2.shape()));
        }
        Ok(Self { e, e2 })
    }

    /// A point mass: E[X²] = E[X]²
    pub fn point_mass(e: Array2<f64>) -> Self {
        let e2 = e.mapv(|x| x * x);
        Self { e, e2 }
    }

    pub fn e(&self) -> &Array2<f64> {
        &self.e
    }

    pub fn e2(&self) -> &Array2<f64> {
        &self.e2
    }

    pub fn dim(&self) -> (usize, usize) {
        self.e.dim()
    }

    /// number of latent factors
    pub fn rank(&self) -> usize {
        self.e.ncols()
    }
}

impl FactorNode for Moments {
    fn expectations(&self) -> &Moments {
        self
    }
}

/// Which factor nodes sit in the blanket.
///
/// Spike-and-slab sparsity is placed on either the loadings or the
/// scores, never both, and the choice is fixed once the model is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorVariant {
    /// loadings `"SW"` with scores `"Z"`
    SpikeSlabLoadings,
    /// loadings `"W"` with scores `"SZ"`
    SpikeSlabScores,
}

impl FactorVariant {
    /// registry names of (loadings, scores)
    pub fn keys(&self) -> (&'static str, &'static str) {
        match self {
            FactorVariant::SpikeSlabLoadings => ("SW", "Z"),
            FactorVariant::SpikeSlabScores => ("W", "SZ"),
        }
    }
}

/// The resolved factor pair
#[derive(Clone, Copy)]
pub enum FactorPair<'a> {
    SpikeSlabLoadings {
        sw: &'a dyn FactorNode,
        z: &'a dyn FactorNode,
    },
    SpikeSlabScores {
        w: &'a dyn FactorNode,
        sz: &'a dyn FactorNode,
    },
}

impl<'a> FactorPair<'a> {
    /// `D x K` loadings
    pub fn loadings(&self) -> &'a dyn FactorNode {
        match *self {
            FactorPair::SpikeSlabLoadings { sw, .. } => sw,
            FactorPair::SpikeSlabScores { w, .. } => w,
        }
    }

    /// `N x K` scores
    pub fn scores(&self) -> &'a dyn FactorNode {
        match *self {
            FactorPair::SpikeSlabLoadings { z, .. } => z,
            FactorPair::SpikeSlabScores { sz, .. } => sz,
        }
    }

    pub fn variant(&self) -> FactorVariant {
        match self {
            FactorPair::SpikeSlabLoadings { .. } => FactorVariant::SpikeSlabLoadings,
            FactorPair::SpikeSlabScores { .. } => FactorVariant::SpikeSlabScores,
        }
    }
}

/// Read-only view of the nodes a precision node depends on
#[derive(Clone, Copy)]
pub struct MarkovBlanket<'a> {
    y: &'a dyn ObservationNode,
    factors: FactorPair<'a>,
}

impl<'a> MarkovBlanket<'a> {
    pub fn new(y: &'a dyn ObservationNode, factors: FactorPair<'a>) -> Self {
        Self { y, factors }
    }

    pub fn observations(&self) -> &'a MaskedMatrix {
        self.y.observations()
    }

    pub fn loadings(&self) -> &'a Moments {
        self.factors.loadings().expectations()
    }

    pub fn scores(&self) -> &'a Moments {
        self.factors.scores().expectations()
    }

    pub fn factors(&self) -> &FactorPair<'a> {
        &self.factors
    }
}

/// Named lookup of model nodes, filled while the model is assembled
///
/// ```
/// use ndarray::array;
/// use tau_node::blanket::{FactorVariant, MaskedMatrix, Moments, NodeRegistry};
///
/// let y = MaskedMatrix::fully_observed(array![[1.0, 2.0]]);
/// let z = Moments::point_mass(array![[1.0]]);
/// let w = Moments::point_mass(array![[1.0], [2.0]]);
///
/// let mut registry = NodeRegistry::new();
/// registry.add_observation("Y", &y);
/// registry.add_factor("SW", &w).add_factor("Z", &z);
///
/// let blanket = registry.markov_blanket(FactorVariant::SpikeSlabLoadings).unwrap();
/// assert_eq!(blanket.loadings().dim(), (2, 1));
/// ```
#[derive(Default)]
pub struct NodeRegistry<'a> {
    observations: HashMap<String, &'a dyn ObservationNode>,
    factors: HashMap<String, &'a dyn FactorNode>,
}

impl<'a> NodeRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observation(&mut self, name: &str, node: &'a dyn ObservationNode) -> &mut Self {
        self.observations.insert(name.to_string(), node);
        self
    }

    pub fn add_factor(&mut self, name: &str, node: &'a dyn FactorNode) -> &mut Self {
        self.factors.insert(name.to_string(), node);
        self
    }

    fn factor(&self, name: &str) -> Result<&'a dyn FactorNode> {
        self.factors
            .get(name)
            .copied()
            .ok_or_else(|| PrecisionError::MissingCollaborator(name.to_string()))
    }

    /// Resolve `"Y"` and the factor pair of `variant`
    pub fn markov_blanket(&self, variant: FactorVariant) -> Result<MarkovBlanket<'a>> {
        let y = self
            .observations
            .get("Y")
            .copied()
            .ok_or_else(|| PrecisionError::MissingCollaborator("Y".to_string()))?;

        let (loadings, scores) = variant.keys();
        let factors = match variant {
            FactorVariant::SpikeSlabLoadings => FactorPair::SpikeSlabLoadings {
                sw: self.factor(loadings)?,
                z: self.factor(scores)?,
            },
            FactorVariant::SpikeSlabScores => FactorPair::SpikeSlabScores {
                w: self.factor(loadings)?,
                sz: self.factor(scores)?,
            },
        };

        Ok(MarkovBlanket::new(y, factors))
    }
}
