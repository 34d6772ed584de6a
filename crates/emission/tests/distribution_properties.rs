//! Conservation and composition properties of the distribution engine.
//!
//! Random inputs are drawn from a seeded ChaCha generator so failures are
//! reproducible.
//!
//! Run: cargo test -p emission --test distribution_properties

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use emission::{
    AreaSource, AreaSourceConfig, DateRange, EmissionError, EmissionFactors, EmissionProvider,
    GridShape, Phase, PointPollutant, PointSource, PointSourceConfig, Source, SourceGroup,
    SpatialWeight, SpeciationTable, SpeciesKeys, TemporalProfile, TimePlan, WeekProfile,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn random_profile(rng: &mut ChaCha8Rng) -> TemporalProfile {
    let raw: Vec<f64> = (0..24).map(|_| rng.gen_range(0.0..1.0)).collect();
    let sum: f64 = raw.iter().sum();
    TemporalProfile::new(raw.into_iter().map(|v| v / sum).collect()).unwrap()
}

fn random_weights(rng: &mut ChaCha8Rng, grid: GridShape) -> SpatialWeight {
    let raw: Vec<f64> = (0..grid.cells()).map(|_| rng.gen_range(0.0..10.0)).collect();
    SpatialWeight::new(grid, raw).unwrap()
}

fn area_config(
    name: &str,
    grid: GridShape,
    spatial: SpatialWeight,
    profile: TemporalProfile,
) -> AreaSourceConfig {
    let keys = SpeciesKeys::default();
    AreaSourceConfig {
        name: name.to_string(),
        number: 1_000_000.0,
        use_intensity: 36.97,
        factors: EmissionFactors::new(
            [
                ("CO", 0.173, 28.0),
                ("NO", 0.1, 30.0),
                ("VOC", 0.012, 100.0),
                ("PM", 0.001, 1.0),
            ],
            &keys,
        )
        .unwrap(),
        grid,
        spatial,
        profile,
        voc_species: SpeciationTable::new([("ETH", 0.282625), ("HC3", 0.358306), ("OL2", 0.2)])
            .unwrap(),
        pm_species: SpeciationTable::new([("PM25I", 0.4), ("PM25J", 0.5), ("PM10", 0.1)]).unwrap(),
        keys,
    }
}

fn rel_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

// ---------------------------------------------------------------------------
// Mass conservation
// ---------------------------------------------------------------------------

#[test]
fn test_mass_conservation_random_inputs() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for _ in 0..20 {
        let grid = GridShape::new(rng.gen_range(1..12), rng.gen_range(1..12));
        let spatial = random_weights(&mut rng, grid);
        let profile = random_profile(&mut rng);
        let src = AreaSource::new(area_config("cars", grid, spatial, profile)).unwrap();
        let tensor = src.emission_tensor(&TimePlan::typical_day()).unwrap();

        for (pol, mw) in [("CO", 28.0), ("NO", 30.0)] {
            let expected = src.total_emission(pol).unwrap() / mw;
            assert!(
                rel_close(tensor.total(pol), expected),
                "{pol}: got {} expected {expected}",
                tensor.total(pol)
            );
        }

        let voc = src.total_emission("VOC").unwrap() / 100.0;
        let voc_species = tensor.total("ETH") + tensor.total("HC3") + tensor.total("OL2");
        assert!(rel_close(voc_species, voc * (0.282625 + 0.358306 + 0.2)));

        let pm = src.total_emission("PM").unwrap();
        let pm_species = tensor.total("PM25I") + tensor.total("PM25J") + tensor.total("PM10");
        assert!(rel_close(pm_species, pm));

        for (_, var) in tensor.iter() {
            assert!(var.data.iter().all(|v| *v >= 0.0));
        }
    }
}

#[test]
fn test_generation_is_idempotent() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let grid = GridShape::new(5, 4);
    let src = AreaSource::new(area_config(
        "cars",
        grid,
        random_weights(&mut rng, grid),
        random_profile(&mut rng),
    ))
    .unwrap();
    let plan = TimePlan::typical_day();
    assert_eq!(
        src.emission_tensor(&plan).unwrap(),
        src.emission_tensor(&plan).unwrap()
    );
}

#[test]
fn test_every_variable_has_grid_shape() {
    let grid = GridShape::new(3, 7);
    let src =
        AreaSource::new(area_config("cars", grid, SpatialWeight::uniform(grid).unwrap(), TemporalProfile::flat()))
            .unwrap();
    let range = DateRange::parse("2024-03-01", "2024-03-03").unwrap();
    let tensor = src
        .emission_tensor(&TimePlan::for_range(&range, Some(&WeekProfile::uniform())))
        .unwrap();
    assert_eq!(tensor.shape().time_steps, 72);
    assert_eq!(tensor.shape().grid, grid);
    for (name, var) in tensor.iter() {
        assert_eq!(var.data.len(), 72 * 21, "variable {name}");
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[test]
fn test_group_is_additive() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let grid = GridShape::new(6, 6);
    let a = AreaSource::new(area_config(
        "cars",
        grid,
        random_weights(&mut rng, grid),
        random_profile(&mut rng),
    ))
    .unwrap();
    let b = AreaSource::new(area_config(
        "motorcycles",
        grid,
        random_weights(&mut rng, grid),
        random_profile(&mut rng),
    ))
    .unwrap();
    let plan = TimePlan::typical_day();
    let ta = a.emission_tensor(&plan).unwrap();
    let tb = b.emission_tensor(&plan).unwrap();

    let group = SourceGroup::new("vehicles", vec![a.into(), b.into()]);
    let sum = group.emission_tensor(&plan).unwrap();
    assert_eq!(sum.names().collect::<Vec<_>>(), ta.names().collect::<Vec<_>>());
    for name in ta.names() {
        let (va, vb, vs) = (ta.get(name).unwrap(), tb.get(name).unwrap(), sum.get(name).unwrap());
        for i in 0..vs.data.len() {
            assert!(rel_close(vs.data[i], va.data[i] + vb.data[i]), "{name}[{i}]");
        }
    }
}

#[test]
fn test_group_mixes_area_and_point_sources() {
    let grid = GridShape::new(2, 2);
    let area: Source = AreaSource::new(area_config(
        "cars",
        grid,
        SpatialWeight::uniform(grid).unwrap(),
        TemporalProfile::flat(),
    ))
    .unwrap()
    .into();
    let point: Source = PointSource::new(PointSourceConfig {
        name: "stacks".to_string(),
        grid,
        pollutants: vec![
            PointPollutant {
                name: "SO2".to_string(),
                molecular_weight: 64.0,
                daily_cells: vec![0.0, 64.0, 0.0, 0.0],
            },
            PointPollutant {
                name: "VOC".to_string(),
                molecular_weight: 100.0,
                daily_cells: vec![0.0; 4],
            },
            PointPollutant {
                name: "PM".to_string(),
                molecular_weight: 1.0,
                daily_cells: vec![0.0; 4],
            },
        ],
        profile: TemporalProfile::flat(),
        voc_species: SpeciationTable::empty(),
        pm_species: SpeciationTable::empty(),
        keys: SpeciesKeys::default(),
    })
    .unwrap()
    .into();

    let group = SourceGroup::new("all", vec![area, point]);
    let t = group.emission_tensor(&TimePlan::typical_day()).unwrap();
    assert!(rel_close(t.total("SO2"), 1.0));
    assert_eq!(t.cell_totals("SO2")[0], 0.0);
    assert!(t.total("CO") > 0.0);
    assert_eq!(t.get("PM25I").unwrap().phase, Phase::Aerosol);
    assert_eq!(group.names(), vec!["cars", "stacks"]);
}

// ---------------------------------------------------------------------------
// Week profile and validation
// ---------------------------------------------------------------------------

#[test]
fn test_saturday_week_factor() {
    let grid = GridShape::new(2, 2);
    let src = AreaSource::new(area_config(
        "cars",
        grid,
        SpatialWeight::uniform(grid).unwrap(),
        TemporalProfile::flat(),
    ))
    .unwrap();
    // Friday 2024-03-01 through Sunday 2024-03-03.
    let range = DateRange::parse("2024-03-01", "2024-03-03").unwrap();
    let week = WeekProfile::new(&[1.0, 1.0, 1.0, 1.0, 1.0, 0.5, 1.0]).unwrap();
    let t = src
        .emission_tensor(&TimePlan::for_range(&range, Some(&week)))
        .unwrap();
    let friday_noon = t.step("CO", 12).unwrap()[0];
    let saturday_noon = t.step("CO", 24 + 12).unwrap()[0];
    let sunday_noon = t.step("CO", 48 + 12).unwrap()[0];
    assert!(rel_close(saturday_noon, friday_noon * 0.5));
    assert!(rel_close(sunday_noon, friday_noon));
}

#[test]
fn test_missing_pm_key_rejected_at_construction() {
    let keys = SpeciesKeys::default();
    let err = EmissionFactors::new([("CO", 0.173, 28.0), ("VOC", 0.012, 100.0)], &keys)
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err, EmissionError::MissingKeys(ref k) if k == &vec!["PM".to_string()]));
}

#[test]
fn test_transposed_proxy_rejected() {
    let declared = GridShape::new(14, 24);
    let spatial = SpatialWeight::uniform(GridShape::new(24, 14)).unwrap();
    let err = AreaSource::new(area_config("cars", declared, spatial, TemporalProfile::flat()))
        .unwrap_err();
    assert!(err.is_configuration(), "got: {err}");
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[test]
fn test_co_scenario_two_by_two() {
    let grid = GridShape::new(2, 2);
    let src = AreaSource::new(area_config(
        "cars",
        grid,
        SpatialWeight::uniform(grid).unwrap(),
        TemporalProfile::flat(),
    ))
    .unwrap();
    let t = src.emission_tensor(&TimePlan::typical_day()).unwrap();
    // 1e6 vehicles x 36.97 km x 0.173 g/km / 28 g/mol, a quarter per cell, 1/24 per hour.
    let expected = 1_000_000.0 * 36.97 * 0.173 / 28.0 / 4.0 / 24.0;
    for h in 0..24 {
        for v in t.step("CO", h).unwrap() {
            assert!(rel_close(*v, expected), "hour {h}: got {v}, expected {expected}");
        }
    }
}
