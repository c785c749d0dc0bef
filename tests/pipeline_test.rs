use ndarray::Axis;
use posterior_pipeline::core::{run, RunConfig};
use posterior_pipeline::dataset::Dataset;
use posterior_pipeline::distributions::normal_lpdf;
use posterior_pipeline::error::{Error, InsufficientDataError, KeyMismatchError};
use posterior_pipeline::model::{
    DataDecl, Domain, GeneratedQuantity, LogDensity, ModelSpec, ParamDecl, Params, Shape,
};
use posterior_pipeline::models::batting;
use posterior_pipeline::stats::{diagnose, Statistic};
use posterior_pipeline::summary::{summarize, summarize_with, GeneratingValues};

/// `mu ~ normal(0, 10)`, `y ~ normal(mu, 1)`, with a constant generated
/// quantity.
struct Location;

impl LogDensity for Location {
    fn parameters(&self) -> &[&str] {
        &["mu"]
    }
    fn data_fields(&self) -> &[&str] {
        &["y"]
    }
    fn log_density(&self, params: &Params<'_>, data: &Dataset) -> f64 {
        let mu = params.scalar("mu");
        normal_lpdf(mu, 0.0, 10.0)
            + data
                .reals("y")
                .iter()
                .map(|y| normal_lpdf(*y, mu, 1.0))
                .sum::<f64>()
    }
}

fn location_spec() -> ModelSpec {
    ModelSpec::builder("location")
        .data(DataDecl::int("N", Shape::Scalar))
        .data(DataDecl::real("y", Shape::vector("N")))
        .param(ParamDecl::scalar("mu", Domain::Real))
        .generated(GeneratedQuantity::new("one", Shape::Scalar, |_, _, out| {
            out[0] = 1.0
        }))
        .density(Location)
        .build()
        .unwrap()
}

fn location_data() -> Dataset {
    Dataset::new()
        .with_int("N", 4)
        .with_reals("y", vec![0.3, -0.2, 0.5, 0.1])
}

#[test]
fn whole_number_json_feeds_real_fields() {
    let spec = location_spec();
    let from_json: Dataset = serde_json::from_str(r#"{"N": 3, "y": [5, 6, 7]}"#).unwrap();
    let explicit = Dataset::new()
        .with_int("N", 3)
        .with_reals("y", vec![5.0, 6.0, 7.0]);
    spec.validate(&from_json).unwrap();

    let layout = spec.layout(&from_json).unwrap();
    let at = |mu: f64, data: &Dataset| spec.log_density(&layout, &[mu], data);
    assert_eq!(at(1.0, &from_json), at(1.0, &explicit));
    // The likelihood is in play: the density peaks near mean(y), not at the
    // prior mode.
    assert!(at(6.0, &from_json) > at(0.0, &from_json) + 10.0);

    let config = RunConfig {
        num_iterations: 1_000,
        num_warmup: 500,
        ..Default::default()
    };
    let result = run(&spec, &from_json, &config).unwrap();
    let mu = summarize(&result, None).unwrap().get("mu").unwrap().mean;
    assert!((mu - 6.0).abs() < 0.3, "posterior mean of mu: {mu}");
}

fn batting_config() -> RunConfig {
    RunConfig {
        num_chains: 4,
        num_iterations: 600,
        num_warmup: 300,
        seed: 2024,
        ..Default::default()
    }
}

#[test]
fn identical_inputs_give_identical_draws() {
    let spec = batting::spec().unwrap();
    let data = batting::efron_morris();
    let a = run(&spec, &data, &batting_config()).unwrap();
    let b = run(&spec, &data, &batting_config()).unwrap();
    assert_eq!(a.chains(), b.chains());

    let other = run(
        &spec,
        &data,
        &RunConfig {
            seed: 2025,
            ..batting_config()
        },
    )
    .unwrap();
    // Seeds are consecutive, so chain 1 of `a` is chain 0 of `other`.
    assert_eq!(
        a.chains()[1].samples(false),
        other.chains()[0].samples(false)
    );
    assert_ne!(a.chains()[0].samples(false), other.chains()[0].samples(false));
}

#[test]
fn chains_are_uncorrelated() {
    let config = RunConfig {
        num_chains: 2,
        num_iterations: 5_000,
        num_warmup: 500,
        seed: 77,
        ..Default::default()
    };
    let result = run(&location_spec(), &location_data(), &config).unwrap();
    let a = result.chains()[0].samples(true).index_axis(Axis(1), 0).to_owned();
    let b = result.chains()[1].samples(true).index_axis(Axis(1), 0).to_owned();
    assert_ne!(a, b);

    let (ma, mb) = (a.mean().unwrap(), b.mean().unwrap());
    let cov = ((&a - ma) * (&b - mb)).mean().unwrap();
    let r = cov / (a.std(0.0) * b.std(0.0));
    assert!(r.abs() < 0.15, "correlation between chains: {r}");
}

#[test]
fn diagnose_is_idempotent_and_covers_generated_quantities() {
    let result = run(&batting::spec().unwrap(), &batting::efron_morris(), &batting_config()).unwrap();
    let first = diagnose(&result, true).unwrap();
    let second = diagnose(&result, true).unwrap();
    assert_eq!(first, second);

    assert_eq!(first.num_chains, 4);
    assert_eq!(first.draws_per_chain, 300);
    assert!(first.get("theta[17]").is_some());
    assert!(first.get("rank[0]").is_some());
    assert!(first.get("some_ability_gt_350").is_some());
    assert!(first.get("phi").unwrap().rhat.is_applicable());

    let with_warmup = diagnose(&result, false).unwrap();
    assert_eq!(with_warmup.draws_per_chain, 600);
}

#[test]
fn constant_quantity_has_no_rhat() {
    let config = RunConfig {
        num_iterations: 400,
        num_warmup: 200,
        ..Default::default()
    };
    let result = run(&location_spec(), &location_data(), &config).unwrap();
    let report = diagnose(&result, true).unwrap();
    let one = report.get("one").unwrap();
    assert_eq!(one.rhat, Statistic::NotApplicable);
    assert_eq!(one.ess, Statistic::NotApplicable);
    assert!(one.converged());

    let mu = report.get("mu").unwrap();
    assert!(mu.rhat.value().unwrap() < 1.1);
    assert!(report.non_converged().is_empty());
    assert!(report.to_table().contains("n/a"));
}

#[test]
fn diagnostics_need_two_chains() {
    let config = RunConfig {
        num_chains: 1,
        num_iterations: 100,
        num_warmup: 50,
        ..Default::default()
    };
    let result = run(&location_spec(), &location_data(), &config).unwrap();
    assert_eq!(
        diagnose(&result, true).unwrap_err(),
        InsufficientDataError::TooFewChains(1)
    );

    let config = RunConfig {
        num_chains: 2,
        num_iterations: 51,
        num_warmup: 50,
        ..Default::default()
    };
    let result = run(&location_spec(), &location_data(), &config).unwrap();
    assert_eq!(
        diagnose(&result, true).unwrap_err(),
        InsufficientDataError::TooFewDraws { chain: 0, found: 1 }
    );
    assert!(diagnose(&result, false).is_ok());

    let err = Error::from(diagnose(&result, true).unwrap_err());
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn summary_pools_post_warmup_draws() {
    let config = RunConfig {
        num_iterations: 2_000,
        num_warmup: 500,
        ..Default::default()
    };
    let result = run(&location_spec(), &location_data(), &config).unwrap();
    let report = summarize(&result, None).unwrap();
    assert_eq!(report.num_draws, 4 * 1_500);

    // Posterior of mu is close to normal(mean(y), 1 / sqrt(4)).
    let mu = report.get("mu").unwrap();
    assert!((mu.mean - 0.175).abs() < 0.05, "mean {}", mu.mean);
    assert!((mu.sd - 0.5).abs() < 0.05, "sd {}", mu.sd);
    assert!(mu.lower < mu.median && mu.median < mu.upper);
    assert!(mu.recovery.is_none());

    let one = report.get("one").unwrap();
    assert_eq!((one.mean, one.sd, one.lower, one.upper), (1.0, 0.0, 1.0, 1.0));

    let narrow = summarize_with(&result, None, 0.5).unwrap();
    let narrow_mu = narrow.get("mu").unwrap();
    assert!(narrow_mu.lower > mu.lower && narrow_mu.upper < mu.upper);

    for bad in [1.5, f64::NAN] {
        let err = summarize_with(&result, None, bad).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{bad}: {err}");
        assert_eq!(err.exit_code(), 1);
    }
}

#[test]
fn generating_values_must_match_the_run() {
    let result = run(&batting::spec().unwrap(), &batting::efron_morris(), &batting_config()).unwrap();
    let truth = GeneratingValues::new()
        .with_scalar("phi", 0.27)
        .with_scalar("kappa", 50.0)
        .with("theta", vec![0.27; 18]);
    let report = summarize(&result, Some(&truth)).unwrap();
    let phi = report.get("phi").unwrap().recovery.unwrap();
    assert_eq!(phi.generating, 0.27);
    assert_eq!(report.coverage("theta").1, 18);

    let missing = GeneratingValues::new()
        .with_scalar("phi", 0.27)
        .with("theta", vec![0.27; 18]);
    assert_eq!(
        summarize(&result, Some(&missing)).unwrap_err(),
        KeyMismatchError::Missing("kappa".into())
    );

    let unknown = truth.clone().with_scalar("sigma", 1.0);
    assert_eq!(
        summarize(&result, Some(&unknown)).unwrap_err(),
        KeyMismatchError::Unknown("sigma".into())
    );

    let short = truth.clone().with("theta", vec![0.27; 17]);
    assert_eq!(
        summarize(&result, Some(&short)).unwrap_err(),
        KeyMismatchError::Shape {
            name: "theta".into(),
            expected: 18,
            found: 17
        }
    );

    // Generated quantities may be compared too.
    let with_gq = truth.with_scalar("some_ability_gt_350", 1.0);
    let report = summarize(&result, Some(&with_gq)).unwrap();
    assert!(report.get("some_ability_gt_350").unwrap().recovery.is_some());
}

#[test]
fn efron_morris_shrinks_towards_the_mean() {
    let config = RunConfig {
        num_iterations: 2_000,
        num_warmup: 1_000,
        seed: 5,
        ..Default::default()
    };
    let result = run(&batting::spec().unwrap(), &batting::efron_morris(), &config).unwrap();
    let report = summarize(&result, None).unwrap();

    // 215 hits in 810 at-bats.
    let phi = report.get("phi").unwrap();
    assert!((phi.mean - 0.265).abs() < 0.03, "phi {}", phi.mean);

    // Clemente (18/45 = 0.400) is pulled down, Alvis (7/45 = 0.156) up.
    let clemente = report.get("theta[0]").unwrap().mean;
    let alvis = report.get("theta[17]").unwrap().mean;
    assert!(clemente < 0.4 && clemente > phi.mean, "Clemente {clemente}");
    assert!(alvis > 0.156 && alvis < phi.mean, "Alvis {alvis}");

    let rank = report.get("rank[0]").unwrap().mean;
    assert!(rank < report.get("rank[17]").unwrap().mean);
}
