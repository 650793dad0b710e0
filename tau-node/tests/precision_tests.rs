use approx::assert_abs_diff_eq;
use matrix_util::traits::{BroadcastOps, MaskOps, SampleOps};
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use tau_node::blanket::{FactorPair, FactorVariant, MarkovBlanket, MaskedMatrix, Moments, NodeRegistry};
use tau_node::config::PrecisionPrior;
use tau_node::error::PrecisionError;
use tau_node::gamma::GammaVector;
use tau_node::precision::{Distrib, PrecisionNode, SharingAxis};
use tau_node::traits::VariationalNode;

fn node(axis: SharingAxis, dim: (usize, usize), a0: f64, b0: f64) -> anyhow::Result<PrecisionNode> {
    Ok(PrecisionPrior::new(a0, b0).build(axis, dim)?)
}

/// random factors with some posterior variance
fn random_factors(nn: usize, dd: usize, kk: usize, seed: u64) -> anyhow::Result<(Moments, Moments)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let z = Array2::<f64>::rnorm(nn, kk, &mut rng);
    let w = Array2::<f64>::rnorm(dd, kk, &mut rng);
    let z = Moments::new(z.clone(), z.mapv(|x| x * x + 0.1))?;
    let w = Moments::new(w.clone(), w.mapv(|x| x * x + 0.2))?;
    Ok((z, w))
}

#[test]
fn end_to_end_exact_reconstruction() -> anyhow::Result<()> {
    let y = MaskedMatrix::fully_observed(array![[1.0, 2.0], [1.0, 2.0]]);
    let z = Moments::point_mass(array![[1.0], [1.0]]);
    let w = Moments::point_mass(array![[1.0], [2.0]]);

    let mut registry = NodeRegistry::new();
    registry
        .add_observation("Y", &y)
        .add_factor("SW", &w)
        .add_factor("Z", &z);
    let blanket = registry.markov_blanket(FactorVariant::SpikeSlabLoadings)?;

    for axis in [SharingAxis::Feature, SharingAxis::Sample] {
        let mut tau = node(axis, (2, 2), 1.0, 1.0)?;
        tau.update_parameters(&blanket)?;

        assert_eq!(tau.posterior().b(), tau.prior().b());
        assert_eq!(tau.posterior().a(), &array![2.0, 2.0]);
    }
    Ok(())
}

#[test]
fn all_missing_lane_keeps_the_prior() -> anyhow::Result<()> {
    let (nn, dd) = (4, 3);
    let (z, w) = random_factors(nn, dd, 2, 1)?;

    let mut rng = StdRng::seed_from_u64(2);
    let data = Array2::<f64>::rnorm(nn, dd, &mut rng);

    // feature 1 never observed
    let mut mask = Array2::from_elem((nn, dd), false);
    mask.column_mut(1).fill(true);
    mask[(0, 2)] = true;
    let mut y_data = data.clone();
    y_data.column_mut(1).fill(f64::NAN);
    let y = MaskedMatrix::new(y_data, mask)?;

    let blanket = MarkovBlanket::new(&y, FactorPair::SpikeSlabLoadings { sw: &w, z: &z });
    let mut tau_d = node(SharingAxis::Feature, (nn, dd), 2.0, 3.0)?;
    tau_d.update_parameters(&blanket)?;

    assert_eq!(tau_d.posterior().a()[1], 2.0);
    assert_eq!(tau_d.posterior().b()[1], 3.0);
    assert!(tau_d.posterior().b()[0] > 3.0);

    // sample 3 never observed
    let mut mask = Array2::from_elem((nn, dd), false);
    mask.row_mut(3).fill(true);
    let mut y_data = data;
    y_data.row_mut(3).fill(f64::INFINITY);
    let y = MaskedMatrix::new(y_data, mask)?;

    let blanket = MarkovBlanket::new(&y, FactorPair::SpikeSlabScores { w: &w, sz: &z });
    let mut tau_n = node(SharingAxis::Sample, (nn, dd), 2.0, 3.0)?;
    tau_n.update_parameters(&blanket)?;

    assert_eq!(tau_n.posterior().a()[3], 2.0);
    assert_eq!(tau_n.posterior().b()[3], 3.0);
    assert!(tau_n.posterior().b().iter().all(|b| b.is_finite()));
    Ok(())
}

#[test]
fn shape_increment_counts_observed_entries() -> anyhow::Result<()> {
    let (nn, dd) = (6, 5);
    let (z, w) = random_factors(nn, dd, 3, 3)?;
    let mut rng = StdRng::seed_from_u64(4);
    let data = Array2::<f64>::rnorm(nn, dd, &mut rng);

    for missing_rate in [0.0, 0.3, 0.7, 1.0] {
        let u = Array2::<f64>::runif(nn, dd, &mut rng);
        let mask = u.mapv(|u| u < missing_rate);
        let y = MaskedMatrix::new(data.clone(), mask.clone())?;
        let blanket = MarkovBlanket::new(&y, FactorPair::SpikeSlabLoadings { sw: &w, z: &z });

        for axis in [SharingAxis::Feature, SharingAxis::Sample] {
            let mut tau = node(axis, (nn, dd), 1e-3, 1e-3)?;
            tau.update_parameters(&blanket)?;

            let counts = mask.count_observed_axis(axis.reduce_axis()).mapv(|n| n as f64);
            let increment = (tau.posterior().a() - tau.prior().a()) * 2.0;
            assert_abs_diff_eq!(increment, counts, epsilon = 1e-9);
        }
    }
    Ok(())
}

#[test]
fn elbo_vanishes_when_posterior_is_prior() -> anyhow::Result<()> {
    let prior = GammaVector::new(array![0.5, 2.0, 7.0], array![1.5, 0.1, 3.0], "prior")?;

    let tau_d = PrecisionNode::feature((4, 3), prior.clone(), prior.clone())?;
    assert_abs_diff_eq!(tau_d.calculate_elbo(), 0.0, epsilon = 1e-12);

    let tau_n = PrecisionNode::sample_wise((3, 8), prior.clone(), prior)?;
    assert_abs_diff_eq!(tau_n.calculate_elbo(), 0.0, epsilon = 1e-12);
    Ok(())
}

#[test]
fn elbo_is_a_negative_divergence_after_update() -> anyhow::Result<()> {
    let (nn, dd) = (10, 4);
    let (z, w) = random_factors(nn, dd, 2, 5)?;
    let mut rng = StdRng::seed_from_u64(6);
    let y = MaskedMatrix::fully_observed(Array2::<f64>::rnorm(nn, dd, &mut rng));
    let blanket = MarkovBlanket::new(&y, FactorPair::SpikeSlabLoadings { sw: &w, z: &z });

    for axis in [SharingAxis::Feature, SharingAxis::Sample] {
        let mut tau = node(axis, (nn, dd), 1.0, 1.0)?;
        tau.update_parameters(&blanket)?;
        let elbo = tau.calculate_elbo();
        assert!(elbo.is_finite());
        assert!(elbo < 0.0, "elbo = {}", elbo);
    }
    Ok(())
}

#[test]
fn broadcast_lanes_stay_identical() -> anyhow::Result<()> {
    let (nn, dd) = (7, 4);
    let (z, w) = random_factors(nn, dd, 2, 8)?;
    let mut rng = StdRng::seed_from_u64(9);
    let u = Array2::<f64>::runif(nn, dd, &mut rng);
    let y = MaskedMatrix::new(Array2::<f64>::rnorm(nn, dd, &mut rng), u.mapv(|u| u < 0.25))?;
    let blanket = MarkovBlanket::new(&y, FactorPair::SpikeSlabScores { w: &w, sz: &z });

    for axis in [SharingAxis::Feature, SharingAxis::Sample] {
        let mut tau = node(axis, (nn, dd), 1.0, 1.0)?;
        tau.update_parameters(&blanket)?;

        let (qa, qb) = tau.expanded_posterior();
        assert_eq!(qa.dim(), (nn, dd));
        assert!(qa.is_constant_along(axis.reduce_axis()));
        assert!(qb.is_constant_along(axis.reduce_axis()));

        let (e, ln_e) = tau.expanded_expectations();
        assert!(e.is_constant_along(axis.reduce_axis()));
        assert!(ln_e.is_constant_along(axis.reduce_axis()));
        assert_eq!(e.index_axis(axis.reduce_axis(), 0), tau.get_expectation().view());
    }
    Ok(())
}

#[test]
fn grid_construction_matches_canonical() -> anyhow::Result<()> {
    let (nn, dd) = (5, 3);
    let (z, w) = random_factors(nn, dd, 2, 10)?;
    let mut rng = StdRng::seed_from_u64(11);
    let y = MaskedMatrix::fully_observed(Array2::<f64>::rnorm(nn, dd, &mut rng));
    let blanket = MarkovBlanket::new(&y, FactorPair::SpikeSlabLoadings { sw: &w, z: &z });

    let a_d = array![1.0, 2.0, 3.0];
    let b_d = array![0.5, 0.5, 4.0];
    let pa = Array2::<f64>::repeat_rows(&a_d, nn);
    let pb = Array2::<f64>::repeat_rows(&b_d, nn);

    let mut from_grid =
        PrecisionNode::from_grids(SharingAxis::Feature, (nn, dd), &pa, &pb, &pa, &pb, None)?;
    let prior = GammaVector::new(a_d, b_d, "prior")?;
    let mut canonical = PrecisionNode::feature((nn, dd), prior.clone(), prior)?;

    from_grid.update_parameters(&blanket)?;
    canonical.update_parameters(&blanket)?;

    assert_eq!(from_grid.posterior(), canonical.posterior());
    assert_abs_diff_eq!(from_grid.calculate_elbo(), canonical.calculate_elbo(), epsilon = 1e-12);
    Ok(())
}

#[test]
fn invalid_moments_leave_the_posterior_untouched() -> anyhow::Result<()> {
    let y = MaskedMatrix::fully_observed(array![[1.0, 2.0], [1.0, 2.0]]);
    // E[Z²] < E[Z]², so the expected residual goes negative
    let z = Moments::new(array![[1.0], [1.0]], Array2::zeros((2, 1)))?;
    let w = Moments::point_mass(array![[1.0], [2.0]]);
    let blanket = MarkovBlanket::new(&y, FactorPair::SpikeSlabLoadings { sw: &w, z: &z });

    for axis in [SharingAxis::Feature, SharingAxis::Sample] {
        let mut tau = node(axis, (2, 2), 1.0, 1.0)?;
        let before = tau.posterior().clone();
        let e_before = tau.get_expectation().clone();

        let out = tau.update_parameters(&blanket);
        assert!(matches!(out, Err(PrecisionError::InvalidParameter { .. })));
        assert_eq!(tau.posterior(), &before);
        assert_eq!(tau.get_expectation(), &e_before);
    }
    Ok(())
}

#[test]
fn repeated_updates_are_stable() -> anyhow::Result<()> {
    let (nn, dd) = (8, 3);
    let (z, w) = random_factors(nn, dd, 2, 12)?;
    let mut rng = StdRng::seed_from_u64(13);
    let y = MaskedMatrix::fully_observed(Array2::<f64>::rnorm(nn, dd, &mut rng));
    let blanket = MarkovBlanket::new(&y, FactorPair::SpikeSlabLoadings { sw: &w, z: &z });

    let mut tau = node(SharingAxis::Sample, (nn, dd), 1.0, 1.0)?;
    tau.update_parameters(&blanket)?;
    let first = tau.posterior().clone();
    tau.update_parameters(&blanket)?;
    assert_eq!(&first, tau.posterior());
    Ok(())
}

#[test]
fn prior_samples_are_positive_with_the_right_mean() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(2024);

    let mut tau_d = node(SharingAxis::Feature, (2, 5), 3.0, 2.0)?;
    let mut tau_n = node(SharingAxis::Sample, (4, 2), 3.0, 2.0)?;

    let mut total = 0.0;
    let mut count = 0;
    for _ in 0..2000 {
        let x = tau_d.sample(Distrib::Prior, &mut rng)?;
        assert_eq!(x.len(), 5);
        assert!(x.iter().all(|&v| v > 0.0));
        total += x.sum();
        count += x.len();

        let x = tau_n.sample(Distrib::Prior, &mut rng)?;
        assert_eq!(x.len(), 4);
        assert!(x.iter().all(|&v| v > 0.0));
        total += x.sum();
        count += x.len();
    }

    // E[τ] = 1.5, sd of this average ~ 0.005
    let mean = total / count as f64;
    assert!((mean - 1.5).abs() < 0.03, "mean = {}", mean);

    assert_eq!(tau_n.last_sample().map(|x| x.len()), Some(4));
    Ok(())
}

#[test]
fn posterior_samples_follow_the_update() -> anyhow::Result<()> {
    let y = MaskedMatrix::fully_observed(array![[1.0, 2.0], [1.0, 2.0]]);
    let z = Moments::point_mass(array![[1.0], [1.0]]);
    let w = Moments::point_mass(array![[1.0], [2.0]]);
    let blanket = MarkovBlanket::new(&y, FactorPair::SpikeSlabLoadings { sw: &w, z: &z });

    let mut tau = node(SharingAxis::Feature, (2, 2), 1.0, 1.0)?;
    tau.update_parameters(&blanket)?;

    // q(τ) = Gamma(2, 1)
    let mut rng = StdRng::seed_from_u64(77);
    let mut total = 0.0;
    let ndraw = 5000;
    for _ in 0..ndraw {
        total += tau.sample(Distrib::Posterior, &mut rng)?.sum();
    }
    let mean = total / (2 * ndraw) as f64;
    assert!((mean - 2.0).abs() < 0.1, "mean = {}", mean);
    Ok(())
}
