use ndarray::Axis;
use rand::Rng;

/// Operations on a dense matrix paired with a missing-value mask.
/// A mask entry `true` marks a missing observation.
pub trait MaskedOps {
    type Mat;
    type DVec;
    type Mask;

    /// Copy of `self` where every masked entry is replaced by zero
    fn zero_fill_masked(&self, mask: &Self::Mask) -> Self::Mat;

    /// Sum along `axis`, skipping masked entries
    ///
    /// Masked values are never touched, so `NaN` or `inf` placeholders
    /// under the mask do not leak into the sums.
    fn masked_sum_axis(&self, mask: &Self::Mask, axis: Axis) -> Self::DVec;

    /// Sum of squares along `axis`, skipping masked entries
    fn masked_sum_squares_axis(&self, mask: &Self::Mask, axis: Axis) -> Self::DVec;
}

/// Counting observed (non-masked) entries
pub trait MaskOps {
    /// Number of non-masked entries along `axis`
    fn count_observed_axis(&self, axis: Axis) -> ndarray::Array1<usize>;

    /// Total number of non-masked entries
    fn count_observed(&self) -> usize;
}

/// Broadcast a vector into a matrix and check the reverse
pub trait BroadcastOps {
    type Mat;
    type DVec;

    /// `nrows x v.len()` matrix whose rows are all `v`
    fn repeat_rows(v: &Self::DVec, nrows: usize) -> Self::Mat;

    /// `v.len() x ncols` matrix whose columns are all `v`
    fn repeat_columns(v: &Self::DVec, ncols: usize) -> Self::Mat;

    /// Whether every lane along `axis` is identical, i.e., with
    /// `Axis(0)` all rows are the same, with `Axis(1)` all columns
    fn is_constant_along(&self, axis: Axis) -> bool;
}

/// Operations to sample random matrices with an injected random
/// number generator, so that simulations can be reproduced by seed
pub trait SampleOps {
    type Mat;

    /// Sample a matrix from a normal distribution `N(0,1)`
    fn rnorm<R: Rng + ?Sized>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat;

    /// Sample a matrix from a uniform distribution `U(0,1)`
    fn runif<R: Rng + ?Sized>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat;
}
