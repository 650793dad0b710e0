use clap::{Args, ValueEnum};
use log::info;
use rand::SeedableRng;
use std::io::Write;

use tau_node::blanket::{FactorVariant, NodeRegistry};
use tau_node::config::PrecisionPrior;
use tau_node::precision::{Distrib, SharingAxis};
use tau_node::simulate::{simulate_factor_data, SimArgs};
use tau_node::traits::VariationalNode;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisArg {
    /// one precision per feature (column)
    Feature,
    /// one precision per sample (row)
    Sample,
}

impl From<AxisArg> for SharingAxis {
    fn from(axis: AxisArg) -> Self {
        match axis {
            AxisArg::Feature => SharingAxis::Feature,
            AxisArg::Sample => SharingAxis::Sample,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SparsityArg {
    /// spike-and-slab loadings "SW" with scores "Z"
    Loadings,
    /// loadings "W" with spike-and-slab scores "SZ"
    Scores,
}

impl From<SparsityArg> for FactorVariant {
    fn from(arg: SparsityArg) -> Self {
        match arg {
            SparsityArg::Loadings => FactorVariant::SpikeSlabLoadings,
            SparsityArg::Scores => FactorVariant::SpikeSlabScores,
        }
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[arg(long, short = 'n', default_value_t = 500, help = "Number of samples (N)")]
    rows: usize,

    #[arg(long, short = 'd', default_value_t = 20, help = "Number of features (D)")]
    cols: usize,

    #[arg(long, short = 'k', default_value_t = 3, help = "Number of factors (K)")]
    factors: usize,

    #[arg(long, value_enum, default_value = "feature")]
    axis: AxisArg,

    #[arg(long, value_enum, default_value = "loadings")]
    sparsity: SparsityArg,

    #[arg(long, default_value_t = 0.1, help = "Fraction of missing entries")]
    missing_rate: f64,

    #[arg(long, default_value_t = 4.0, help = "Shape of the true precision")]
    tau_shape: f64,

    #[arg(long, default_value_t = 2.0, help = "Rate of the true precision")]
    tau_rate: f64,

    #[arg(long, default_value_t = 0.0, help = "Posterior variance of the factors")]
    factor_var: f64,

    #[arg(long, default_value_t = 1e-3, help = "Prior shape a0")]
    prior_a: f64,

    #[arg(long, default_value_t = 1e-3, help = "Prior rate b0")]
    prior_b: f64,

    #[arg(long, default_value_t = 10, help = "Maximum number of updates")]
    iterations: usize,

    #[arg(long, default_value_t = 1e-6, help = "ELBO convergence tolerance")]
    tol: f64,

    #[arg(long, default_value_t = 42, help = "Random seed")]
    seed: u64,
}

/// Simulate data, run the precision updates with the true factors in
/// the blanket, and write `index, true τ, E[τ], a, b, prior draw` as
/// TSV to stdout
pub fn run_simulate(args: &SimulateArgs) -> anyhow::Result<()> {
    let axis: SharingAxis = args.axis.into();
    let variant: FactorVariant = args.sparsity.into();

    let sim = simulate_factor_data(&SimArgs {
        rows: args.rows,
        cols: args.cols,
        factors: args.factors,
        axis,
        missing_rate: args.missing_rate,
        tau_shape: args.tau_shape,
        tau_rate: args.tau_rate,
        factor_var: args.factor_var,
        rseed: args.seed,
    })?;

    let mut tau = PrecisionPrior::new(args.prior_a, args.prior_b).build(axis, sim.y.dim())?;

    let (loadings, scores) = variant.keys();
    let mut registry = NodeRegistry::new();
    registry
        .add_observation("Y", &sim.y)
        .add_factor(loadings, &sim.w)
        .add_factor(scores, &sim.z);
    let blanket = registry.markov_blanket(variant)?;

    let mut elbo_prev = tau.calculate_elbo();
    info!("initial elbo: {:.6}", elbo_prev);

    for iter in 0..args.iterations {
        tau.update_parameters(&blanket)?;
        let elbo = tau.calculate_elbo();
        info!("[{}] elbo: {:.6}", iter + 1, elbo);

        if (elbo - elbo_prev).abs() < args.tol {
            info!("converged after {} updates", iter + 1);
            break;
        }
        elbo_prev = elbo;
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(args.seed.wrapping_add(1));
    let prior_draw = tau.sample(Distrib::Prior, &mut rng)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "index\ttrue_tau\tmean_tau\tpost_a\tpost_b\tprior_draw")?;

    let estimate = tau.get_expectations();
    let post = tau.posterior();
    for j in 0..sim.tau.len() {
        writeln!(
            out,
            "{}\t{:.6}\t{:.6}\t{:.4}\t{:.4}\t{:.6}",
            j,
            sim.tau[j],
            estimate.e[j],
            post.a()[j],
            post.b()[j],
            prior_draw[j]
        )?;
    }

    let rel_err = (&estimate.e - &sim.tau)
        .iter()
        .zip(sim.tau.iter())
        .map(|(d, t)| (d / t).abs())
        .sum::<f64>()
        / sim.tau.len().max(1) as f64;
    info!("mean relative error of E[tau]: {:.4}", rel_err);

    Ok(())
}
