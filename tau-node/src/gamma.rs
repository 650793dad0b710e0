extern crate special;

use crate::error::{PrecisionError, Result};
use ndarray::prelude::*;
use rand::Rng;

/// Independent Gamma distributions in the shape/rate parameterization
///
/// x[i] ~ Gamma(a[i], b[i]), with density
/// b^a / Γ(a) x^(a-1) exp(-b x)
///
#[derive(Debug, Clone, PartialEq)]
pub struct GammaVector {
    a: Array1<f64>,
    b: Array1<f64>,
}

/// Cached moments of a `GammaVector`
#[derive(Debug, Clone, PartialEq)]
pub struct GammaExpectations {
    /// E[x] = a / b
    pub e: Array1<f64>,
    /// E[ln x] = ψ(a) - ln(b)
    pub ln_e: Array1<f64>,
}

impl GammaVector {
    /// Gamma parameters after checking they are strictly positive
    ///
    /// # Arguments
    /// * `a` - shape parameters
    /// * `b` - rate parameters
    /// * `what` - name used in error messages
    ///
    pub fn new(a: Array1<f64>, b: Array1<f64>, what: &str) -> Result<Self> {
        if a.len() != b.len() {
            return Err(PrecisionError::shape(
                format!("{} rate", what),
                &[a.len()],
                &[b.len()],
            ));
        }
        check_positive(&a, &format!("{}.a", what))?;
        check_positive(&b, &format!("{}.b", what))?;
        Ok(Self { a, b })
    }

    /// `len` copies of `Gamma(a0, b0)`
    pub fn from_elem(len: usize, a0: f64, b0: f64) -> Result<Self> {
        Self::new(
            Array1::from_elem(len, a0),
            Array1::from_elem(len, b0),
            "gamma",
        )
    }

    pub fn a(&self) -> &Array1<f64> {
        &self.a
    }

    pub fn b(&self) -> &Array1<f64> {
        &self.b
    }

    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    /// Log normalizer summed over entries: Σ a ln(b) - ln Γ(a)
    pub fn log_normalizer(&self) -> f64 {
        use special::Gamma;
        self.a
            .iter()
            .zip(self.b.iter())
            .map(|(&a, &b)| a * b.ln() - Gamma::ln_gamma(a).0)
            .sum()
    }

    /// Σ (a - 1) E[ln x] - Σ b E[x] under some other distribution's
    /// expectations, i.e., the kernel of E[ln p(x)]
    pub fn expected_log_kernel(&self, ex: &GammaExpectations) -> f64 {
        let log_term: f64 = self
            .a
            .iter()
            .zip(ex.ln_e.iter())
            .map(|(&a, &ln_e)| (a - 1.0) * ln_e)
            .sum();
        let lin_term: f64 = self.b.iter().zip(ex.e.iter()).map(|(&b, &e)| b * e).sum();
        log_term - lin_term
    }

    /// One independent draw per entry
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Array1<f64>> {
        matrix_util::ndarray_util::rgamma_rate(&self.a, &self.b, rng)
            .map_err(|e| PrecisionError::Sampling(e.to_string()))
    }
}

impl GammaExpectations {
    /// Recompute E[x] and E[ln x] from the parameters
    pub fn calibrate(param: &GammaVector) -> Self {
        Self {
            e: Self::calibrate_mean(param),
            ln_e: Self::calibrate_log_mean(param),
        }
    }

    fn calibrate_mean(param: &GammaVector) -> Array1<f64> {
        &param.a / &param.b
    }

    fn calibrate_log_mean(param: &GammaVector) -> Array1<f64> {
        use special::Gamma;
        &param.a.mapv(|a| Gamma::digamma(a)) - &param.b.mapv(f64::ln)
    }

    pub fn len(&self) -> usize {
        self.e.len()
    }

    pub fn is_empty(&self) -> bool {
        self.e.is_empty()
    }
}

fn check_positive(x: &Array1<f64>, what: &str) -> Result<()> {
    match x.iter().position(|&v| !(v.is_finite() && v > 0.0)) {
        Some(index) => Err(PrecisionError::InvalidParameter {
            what: what.to_string(),
            index,
            value: x[index],
        }),
        None => Ok(()),
    }
}
