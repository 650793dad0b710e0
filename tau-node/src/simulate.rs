use crate::blanket::{MaskedMatrix, Moments};
use crate::precision::SharingAxis;
use log::info;
use matrix_util::ndarray_util::rgamma_rate;
use matrix_util::traits::SampleOps;
use ndarray::prelude::*;
use rand::SeedableRng;

pub struct SimArgs {
    pub rows: usize,
    pub cols: usize,
    pub factors: usize,
    pub axis: SharingAxis,
    pub missing_rate: f64,
    /// shape of the true precision distribution
    pub tau_shape: f64,
    /// rate of the true precision distribution
    pub tau_rate: f64,
    /// posterior variance added to the second moments of the factors
    pub factor_var: f64,
    pub rseed: u64,
}

pub struct SimOut {
    pub y: MaskedMatrix,
    pub z: Moments,
    pub w: Moments,
    /// true precision at canonical length
    pub tau: Array1<f64>,
}

/// Simulate a Gaussian factor model with heteroscedastic noise
///
/// ```text
/// z[i,k] ~ N(0,1), w[j,k] ~ N(0,1)
/// τ ~ Gamma(shape, rate), one per feature or per sample
/// y[i,j] ~ N(Σ_k z[i,k] w[j,k], 1/τ)
/// ```
///
/// A `missing_rate` fraction of entries is masked at random.
pub fn simulate_factor_data(args: &SimArgs) -> anyhow::Result<SimOut> {
    let nn = args.rows;
    let dd = args.cols;
    let kk = args.factors;

    if !(0.0..1.0).contains(&args.missing_rate) {
        anyhow::bail!("missing rate must be in [0, 1): {}", args.missing_rate);
    }
    if args.factor_var < 0.0 {
        anyhow::bail!("factor variance must be non-negative: {}", args.factor_var);
    }

    info!(
        "Simulating {} x {} data with {} factors, noise shared across {}",
        nn,
        dd,
        kk,
        args.axis.name()
    );

    let mut rng = rand::rngs::StdRng::seed_from_u64(args.rseed);

    let z_nk = Array2::<f64>::rnorm(nn, kk, &mut rng);
    let w_dk = Array2::<f64>::rnorm(dd, kk, &mut rng);

    let len = args.axis.canonical_len((nn, dd));
    let tau = rgamma_rate(
        &Array1::from_elem(len, args.tau_shape),
        &Array1::from_elem(len, args.tau_rate),
        &mut rng,
    )?;

    let eps_nd = Array2::<f64>::rnorm(nn, dd, &mut rng);
    let sd = tau.mapv(|t| 1.0 / t.sqrt());

    let mut y_nd = z_nk.dot(&w_dk.t());
    for ((i, j), y_ij) in y_nd.indexed_iter_mut() {
        let lane = match args.axis {
            SharingAxis::Feature => j,
            SharingAxis::Sample => i,
        };
        *y_ij += sd[lane] * eps_nd[(i, j)];
    }

    let u_nd = Array2::<f64>::runif(nn, dd, &mut rng);
    let mask = u_nd.mapv(|u| u < args.missing_rate);
    y_nd.zip_mut_with(&mask, |y, &missing| {
        if missing {
            *y = f64::NAN;
        }
    });

    let y = MaskedMatrix::new(y_nd, mask)?;
    info!("{} of {} entries observed", y.num_observed(), nn * dd);

    let z = Moments::new(z_nk.clone(), z_nk.mapv(|x| x * x + args.factor_var))?;
    let w = Moments::new(w_dk.clone(), w_dk.mapv(|x| x * x + args.factor_var))?;

    Ok(SimOut { y, z, w, tau })
}
