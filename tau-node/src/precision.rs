//! Gamma-distributed noise precision of a Gaussian factor model
//!
//! ```text
//! y[i,j] ~ N(Σ_k z[i,k] w[j,k], 1/τ)
//! τ ~ Gamma(a0, b0)
//! ```
//!
//! τ is shared along one axis of the data: one per feature (column),
//! shared by all samples, or one per sample (row), shared by all
//! features. Parameters are kept at that canonical length and only
//! broadcast to `N x D` on request.

use crate::blanket::MarkovBlanket;
use crate::error::{PrecisionError, Result};
use crate::gamma::{GammaExpectations, GammaVector};
use crate::residual::expected_squared_residuals;
use crate::traits::VariationalNode;
use log::{debug, trace, warn};
use matrix_util::traits::BroadcastOps;
use ndarray::prelude::*;
use rand::Rng;

/// Along which axis of the `N x D` data a precision is shared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingAxis {
    /// one τ per feature (column); all samples share it
    Feature,
    /// one τ per sample (row); all features share it
    Sample,
}

impl SharingAxis {
    /// The axis summed over in the update; in a broadcast grid, the
    /// axis along which all lanes are identical
    pub fn reduce_axis(&self) -> Axis {
        match self {
            SharingAxis::Feature => Axis(0),
            SharingAxis::Sample => Axis(1),
        }
    }

    /// number of distinct precisions
    pub fn canonical_len(&self, dim: (usize, usize)) -> usize {
        match self {
            SharingAxis::Feature => dim.1,
            SharingAxis::Sample => dim.0,
        }
    }

    /// number of redundant copies in a broadcast grid
    pub fn broadcast_len(&self, dim: (usize, usize)) -> usize {
        match self {
            SharingAxis::Feature => dim.0,
            SharingAxis::Sample => dim.1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SharingAxis::Feature => "samples",
            SharingAxis::Sample => "features",
        }
    }
}

/// Which distribution of a node to draw from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distrib {
    /// P, the prior
    Prior,
    /// Q, the current variational posterior
    Posterior,
}

/// A precision node updated by CAVI
///
/// Build a per-feature node with [`PrecisionNode::feature`] and a
/// per-sample node with [`PrecisionNode::sample_wise`].
#[derive(Debug, Clone)]
pub struct PrecisionNode {
    axis: SharingAxis,
    dim: (usize, usize),
    prior: GammaVector,
    posterior: GammaVector,
    expectations: GammaExpectations,
    broadcast_len: usize,
    lbconst: f64,
    samp: Option<Array1<f64>>,
}

impl PrecisionNode {
    /// # Arguments
    /// * `axis` - sharing scheme
    /// * `dim` - `(N, D)` of the data
    /// * `prior` - P at canonical length
    /// * `posterior` - initial Q at canonical length
    /// * `q_e` - optional initial E[τ] in place of a/b
    ///
    pub fn new(
        axis: SharingAxis,
        dim: (usize, usize),
        prior: GammaVector,
        posterior: GammaVector,
        q_e: Option<Array1<f64>>,
    ) -> Result<Self> {
        let len = axis.canonical_len(dim);

        if prior.len() != len {
            return Err(PrecisionError::shape("prior", &[len], &[prior.len()]));
        }
        if posterior.len() != len {
            return Err(PrecisionError::shape("posterior", &[len], &[posterior.len()]));
        }

        let mut expectations = GammaExpectations::calibrate(&posterior);

        if let Some(q_e) = q_e {
            if q_e.len() != len {
                return Err(PrecisionError::shape("initial E[τ]", &[len], &[q_e.len()]));
            }
            if let Some(index) = q_e.iter().position(|&x| !(x.is_finite() && x > 0.0)) {
                return Err(PrecisionError::InvalidParameter {
                    what: "initial E[τ]".to_string(),
                    index,
                    value: q_e[index],
                });
            }
            expectations.e = q_e;
        }

        let mut node = Self {
            axis,
            dim,
            prior,
            posterior,
            expectations,
            broadcast_len: 0,
            lbconst: 0.0,
            samp: None,
        };
        node.precompute();
        Ok(node)
    }

    /// One precision per feature
    pub fn feature(dim: (usize, usize), prior: GammaVector, posterior: GammaVector) -> Result<Self> {
        Self::new(SharingAxis::Feature, dim, prior, posterior, None)
    }

    /// One precision per sample
    pub fn sample_wise(
        dim: (usize, usize),
        prior: GammaVector,
        posterior: GammaVector,
    ) -> Result<Self> {
        Self::new(SharingAxis::Sample, dim, prior, posterior, None)
    }

    /// Build from full `N x D` grids, whose lanes must be identical
    /// along the shared axis
    pub fn from_grids(
        axis: SharingAxis,
        dim: (usize, usize),
        pa: &Array2<f64>,
        pb: &Array2<f64>,
        qa: &Array2<f64>,
        qb: &Array2<f64>,
        q_e: Option<&Array2<f64>>,
    ) -> Result<Self> {
        let lane = |grid: &Array2<f64>, what: &str| -> Result<Array1<f64>> {
            canonical_lane(axis, dim, grid, what)
        };

        let prior = GammaVector::new(lane(pa, "prior a")?, lane(pb, "prior b")?, "prior")?;
        let posterior =
            GammaVector::new(lane(qa, "posterior a")?, lane(qb, "posterior b")?, "posterior")?;
        let q_e = q_e.map(|x| lane(x, "initial E[τ]")).transpose()?;

        Self::new(axis, dim, prior, posterior, q_e)
    }

    /// Cache the broadcast length and the prior's log normalizer,
    /// neither of which changes after construction
    fn precompute(&mut self) {
        self.broadcast_len = self.axis.broadcast_len(self.dim);
        self.lbconst = self.prior.log_normalizer();
    }

    pub fn axis(&self) -> SharingAxis {
        self.axis
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn prior(&self) -> &GammaVector {
        &self.prior
    }

    pub fn posterior(&self) -> &GammaVector {
        &self.posterior
    }

    pub fn lbconst(&self) -> f64 {
        self.lbconst
    }

    pub fn broadcast_len(&self) -> usize {
        self.broadcast_len
    }

    /// E[τ] at canonical length
    pub fn get_expectation(&self) -> &Array1<f64> {
        &self.expectations.e
    }

    /// Broadcast a canonical vector to `N x D`
    pub fn expand(&self, v: &Array1<f64>) -> Array2<f64> {
        match self.axis {
            SharingAxis::Feature => Array2::<f64>::repeat_rows(v, self.broadcast_len),
            SharingAxis::Sample => Array2::<f64>::repeat_columns(v, self.broadcast_len),
        }
    }

    /// (E[τ], E[ln τ]) as `N x D` grids aligned with the data
    pub fn expanded_expectations(&self) -> (Array2<f64>, Array2<f64>) {
        (
            self.expand(&self.expectations.e),
            self.expand(&self.expectations.ln_e),
        )
    }

    /// (a, b) of Q as `N x D` grids
    pub fn expanded_posterior(&self) -> (Array2<f64>, Array2<f64>) {
        (self.expand(self.posterior.a()), self.expand(self.posterior.b()))
    }

    /// Replace Q and refresh the expectations
    pub fn set_posterior(&mut self, posterior: GammaVector) -> Result<()> {
        let len = self.axis.canonical_len(self.dim);
        if posterior.len() != len {
            return Err(PrecisionError::shape("posterior", &[len], &[posterior.len()]));
        }
        self.expectations = GammaExpectations::calibrate(&posterior);
        self.posterior = posterior;
        Ok(())
    }

    /// Draw τ from P or Q at canonical length and keep it
    pub fn sample<R: Rng + ?Sized>(&mut self, distrib: Distrib, rng: &mut R) -> Result<Array1<f64>> {
        let param = match distrib {
            Distrib::Prior => &self.prior,
            Distrib::Posterior => &self.posterior,
        };
        let samp = param.sample(rng)?;
        self.samp = Some(samp.clone());
        Ok(samp)
    }

    /// The most recent draw of [`PrecisionNode::sample`]
    pub fn last_sample(&self) -> Option<&Array1<f64>> {
        self.samp.as_ref()
    }
}

impl VariationalNode for PrecisionNode {
    type Expectations = GammaExpectations;

    /// Conjugate update
    ///
    /// ```text
    /// a[j] = a0[j] + n_obs[j] / 2
    /// b[j] = b0[j] + E[Σ (y - z·w)²][j] / 2
    /// ```
    ///
    /// where `j` runs over features (or samples) and the sums over the
    /// other axis only visit observed entries.
    fn update_parameters(&mut self, blanket: &MarkovBlanket<'_>) -> Result<()> {
        let y = blanket.observations();

        if y.dim() != self.dim {
            return Err(PrecisionError::shape(
                "observations",
                &[self.dim.0, self.dim.1],
                &[y.dim().0, y.dim().1],
            ));
        }

        let stats = expected_squared_residuals(y, blanket.loadings(), blanket.scores(), self.axis)?;

        if let Some(min_res) = stats.residual.iter().copied().reduce(f64::min) {
            if min_res < 0.0 {
                warn!(
                    "negative expected residual {:.3e} across {}; relying on the prior rate",
                    min_res,
                    self.axis.name()
                );
            }
        }

        let qa = self.prior.a() + &stats.num_observed.mapv(|n| n as f64 * 0.5);
        let qb = self.prior.b() + &(&stats.residual * 0.5);

        let posterior = GammaVector::new(qa, qb, "posterior")?;

        debug!(
            "tau over {}: {} precisions, {} observed entries, residual sum {:.4}",
            self.axis.name(),
            posterior.len(),
            stats.num_observed.sum(),
            stats.residual.sum()
        );

        self.set_posterior(posterior)
    }

    /// E[ln p(τ)] - E[ln q(τ)] on the canonical vectors
    fn calculate_elbo(&self) -> f64 {
        let lb_p = self.lbconst + self.prior.expected_log_kernel(&self.expectations);
        let lb_q = self.posterior.log_normalizer()
            + self.posterior.expected_log_kernel(&self.expectations);

        trace!("tau elbo: lb_p = {:.6}, lb_q = {:.6}", lb_p, lb_q);

        lb_p - lb_q
    }

    fn get_expectations(&self) -> &GammaExpectations {
        &self.expectations
    }
}

fn canonical_lane(
    axis: SharingAxis,
    dim: (usize, usize),
    grid: &Array2<f64>,
    what: &str,
) -> Result<Array1<f64>> {
    if grid.dim() != dim {
        return Err(PrecisionError::shape(what, &[dim.0, dim.1], grid.shape()));
    }

    let ax = axis.reduce_axis();
    if !grid.is_constant_along(ax) {
        let first = grid.index_axis(ax, 0);
        let lane = grid
            .axis_iter(ax)
            .position(|x| x != first)
            .unwrap_or_default();
        return Err(PrecisionError::NotShared {
            what: what.to_string(),
            axis: axis.name(),
            lane,
        });
    }

    if grid.len_of(ax) == 0 {
        return Ok(Array1::zeros(grid.len_of(Axis(1 - ax.index()))));
    }

    Ok(grid.index_axis(ax, 0).to_owned())
}
