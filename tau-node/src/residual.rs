use crate::blanket::{MaskedMatrix, Moments};
use crate::error::{PrecisionError, Result};
use crate::precision::SharingAxis;
use matrix_util::traits::{MaskOps, MaskedOps};
use ndarray::prelude::*;

/// Sufficient statistics of the Gaussian likelihood for one
/// precision per lane (column or row) of the data matrix
#[derive(Debug, Clone)]
pub struct ResidualStats {
    /// E[Σ (y - z·w)²] over observed entries of each lane
    pub residual: Array1<f64>,
    /// number of observed entries of each lane
    pub num_observed: Array1<usize>,
}

/// Expected sum of squared residuals per lane
///
/// With `Ŷ = E[Z] E[W]ᵀ`, each lane of the reduction is
///
/// ```text
/// Σ y²                                  (term1)
/// - 2 Σ y ŷ                             (term2)
/// + Σ E[Z²] E[W²]ᵀ                      (term3, k = k')
/// + Σ ŷ² - Σ E[Z]² (E[W]²)ᵀ             (term4, k ≠ k')
/// ```
///
/// Every sum runs over the same observed entries, so
/// `term3 + term4 = E[(Σ_k z_k w_k)²]` on exactly those entries.
///
/// # Arguments
/// * `y` - `N x D` observations
/// * `w` - `D x K` loading moments
/// * `z` - `N x K` score moments
/// * `axis` - which precision is being updated
///
pub fn expected_squared_residuals(
    y: &MaskedMatrix,
    w: &Moments,
    z: &Moments,
    axis: SharingAxis,
) -> Result<ResidualStats> {
    let (nn, dd) = y.dim();
    let kk = z.rank();

    if z.dim().0 != nn {
        return Err(PrecisionError::shape("scores", &[nn, kk], &[z.dim().0, kk]));
    }
    if w.dim() != (dd, kk) {
        return Err(PrecisionError::shape(
            "loadings",
            &[dd, kk],
            &[w.dim().0, w.dim().1],
        ));
    }

    let mask = y.mask();
    let ax = axis.reduce_axis();

    let y0 = y.data().zero_fill_masked(mask);
    let y_hat = z.e().dot(&w.e().t());

    let term1 = y0.masked_sum_squares_axis(mask, ax);
    let term2 = (&y0 * &y_hat).masked_sum_axis(mask, ax) * 2.0;
    let term3 = z.e2().dot(&w.e2().t()).masked_sum_axis(mask, ax);

    let sq_diag = z.e().mapv(|x| x * x).dot(&w.e().mapv(|x| x * x).t());
    let term4 = y_hat.masked_sum_squares_axis(mask, ax) - sq_diag.masked_sum_axis(mask, ax);

    Ok(ResidualStats {
        residual: term1 - term2 + term3 + term4,
        num_observed: mask.count_observed_axis(ax),
    })
}
