pub use ndarray::prelude::*;
pub use rand::Rng;
pub use rand_distr::{Distribution, Gamma, StandardNormal, Uniform};

use crate::traits::*;
use ndarray::Zip;
use num_traits::{Float, FromPrimitive};

impl<T> MaskedOps for Array2<T>
where
    T: Float,
{
    type Mat = Array2<T>;
    type DVec = Array1<T>;
    type Mask = Array2<bool>;

    fn zero_fill_masked(&self, mask: &Self::Mask) -> Self::Mat {
        Zip::from(self)
            .and(mask)
            .map_collect(|&x, &missing| if missing { T::zero() } else { x })
    }

    fn masked_sum_axis(&self, mask: &Self::Mask, axis: Axis) -> Self::DVec {
        self.zero_fill_masked(mask).sum_axis(axis)
    }

    fn masked_sum_squares_axis(&self, mask: &Self::Mask, axis: Axis) -> Self::DVec {
        Zip::from(self)
            .and(mask)
            .map_collect(|&x, &missing| if missing { T::zero() } else { x * x })
            .sum_axis(axis)
    }
}

impl MaskOps for Array2<bool> {
    fn count_observed_axis(&self, axis: Axis) -> Array1<usize> {
        self.mapv(|missing| usize::from(!missing)).sum_axis(axis)
    }

    fn count_observed(&self) -> usize {
        self.iter().filter(|&&missing| !missing).count()
    }
}

impl<T> BroadcastOps for Array2<T>
where
    T: Clone + PartialEq,
{
    type Mat = Array2<T>;
    type DVec = Array1<T>;

    fn repeat_rows(v: &Self::DVec, nrows: usize) -> Self::Mat {
        let ncols = v.len();
        Array2::from_shape_fn((nrows, ncols), |(_, j)| v[j].clone())
    }

    fn repeat_columns(v: &Self::DVec, ncols: usize) -> Self::Mat {
        let nrows = v.len();
        Array2::from_shape_fn((nrows, ncols), |(i, _)| v[i].clone())
    }

    fn is_constant_along(&self, axis: Axis) -> bool {
        if self.len_of(axis) == 0 {
            return true;
        }
        let first = self.index_axis(axis, 0);
        self.axis_iter(axis).all(|lane| lane == first)
    }
}

impl<T> SampleOps for Array2<T>
where
    T: Float + FromPrimitive,
{
    type Mat = Self;

    fn rnorm<R: Rng + ?Sized>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat {
        Array2::from_shape_simple_fn((dd, nn), || {
            let x: f64 = rng.sample(StandardNormal);
            T::from_f64(x).expect("failed to type")
        })
    }

    fn runif<R: Rng + ?Sized>(dd: usize, nn: usize, rng: &mut R) -> Self::Mat {
        let u01 = Uniform::new(0_f64, 1_f64).expect("valid unit interval");
        Array2::from_shape_simple_fn((dd, nn), || {
            T::from_f64(rng.sample(&u01)).expect("failed to type")
        })
    }
}

/// Draw `x[i] ~ Gamma(shape[i], rate[i])` independently
///
/// `rand_distr` parameterizes by scale, so `scale = 1/rate`.
///
/// # Arguments
/// * `shape` - shape parameters (α)
/// * `rate` - rate parameters (β)
/// * `rng` - random number generator
pub fn rgamma_rate<R: Rng + ?Sized>(
    shape: &Array1<f64>,
    rate: &Array1<f64>,
    rng: &mut R,
) -> anyhow::Result<Array1<f64>> {
    if shape.len() != rate.len() {
        anyhow::bail!(
            "shape and rate lengths differ: {} vs. {}",
            shape.len(),
            rate.len()
        );
    }

    shape
        .iter()
        .zip(rate.iter())
        .map(|(&a, &b)| -> anyhow::Result<f64> {
            let pdf = Gamma::new(a, 1.0 / b)?;
            Ok(pdf.sample(rng))
        })
        .collect::<anyhow::Result<Vec<f64>>>()
        .map(Array1::from_vec)
}
