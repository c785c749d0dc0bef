use posterior_pipeline::core::{run, RunConfig};
use posterior_pipeline::dataset::Dataset;
use posterior_pipeline::error::{Error, SamplingError, ValidationError};
use posterior_pipeline::models::batting;
use proptest::prelude::*;

fn batting_data(at_bats: &[i64], hits: &[i64]) -> Dataset {
    Dataset::new()
        .with_int("N", hits.len() as i64)
        .with_ints("K", at_bats.to_vec())
        .with_ints("y", hits.to_vec())
}

/// Up to 30 players with 1..=60 at-bats each, and hits that fit.
fn valid_players() -> impl Strategy<Value = (Vec<i64>, Vec<i64>)> {
    prop::collection::vec(1i64..=60, 1..30).prop_flat_map(|at_bats| {
        let hits: Vec<_> = at_bats.iter().map(|k| 0..=*k).collect();
        (Just(at_bats), hits)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn hits_within_at_bats_validate((at_bats, hits) in valid_players()) {
        let spec = batting::spec().unwrap();
        prop_assert!(spec.validate(&batting_data(&at_bats, &hits)).is_ok());
    }

    #[test]
    fn excess_hits_name_the_player(
        (at_bats, mut hits) in valid_players(),
        pick in any::<prop::sample::Index>(),
        excess in 1i64..10,
    ) {
        let player = pick.index(hits.len());
        hits[player] = at_bats[player] + excess;
        let data = batting_data(&at_bats, &hits);
        let spec = batting::spec().unwrap();

        let expected = ValidationError::ConstraintViolated {
            field: "y".into(),
            bound_field: "K".into(),
            index: player,
            value: (at_bats[player] + excess) as f64,
            bound: at_bats[player] as f64,
        };
        prop_assert_eq!(spec.validate(&data).unwrap_err(), expected.clone());

        // Nothing is sampled from invalid data.
        let config = RunConfig { num_iterations: 10, num_warmup: 5, ..Default::default() };
        prop_assert_eq!(
            run(&spec, &data, &config).unwrap_err(),
            SamplingError::InvalidData(expected)
        );
    }
}

#[test]
fn invalid_data_maps_to_its_exit_code() {
    let data = batting_data(&[45, 45], &[12, 46]);
    let err = Error::from(run(&batting::spec().unwrap(), &data, &RunConfig::default()).unwrap_err());
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("`y`[1] = 46"), "{err}");
}

#[test]
fn extents_must_match_declarations() {
    let spec = batting::spec().unwrap();
    let data = Dataset::new()
        .with_int("N", 3)
        .with_ints("K", vec![45, 45, 45])
        .with_ints("y", vec![1, 2]);
    assert!(matches!(
        spec.validate(&data),
        Err(ValidationError::ShapeMismatch { .. })
    ));

    let data = Dataset::new()
        .with_int("N", 2)
        .with_ints("K", vec![45, 45])
        .with_ints("y", vec![1, -2]);
    assert!(matches!(
        spec.validate(&data),
        Err(ValidationError::BelowLower { index: 1, .. })
    ));

    let data = Dataset::new().with_int("N", 2).with_ints("K", vec![45, 45]);
    assert_eq!(
        spec.validate(&data),
        Err(ValidationError::MissingField("y".into()))
    );
}
