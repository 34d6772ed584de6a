//! End-to-end wrfchemi and CMAQ output from sources and source groups.
//!
//! Run: cargo test -p gridfile --test model_output

use std::path::PathBuf;

use emission::{
    AreaSource, AreaSourceConfig, CmaqConfig, EmissionError, EmissionFactors, GridGeometry,
    GridShape, KeyOverride, PointPollutant, PointSource, PointSourceConfig, RunConfig, SourceGroup,
    SpatialWeight, SpeciationTable, SpeciesKeys, TemporalProfile, WeekProfile,
};
use gridfile::{read_grid_file, GridDesc, GridFileError, ModelOutputExt, NamedGridFile};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const GRIDDESC: &str = "' '
'LAM_SP'
  2  -20.0  -25.0  -47.0  -47.0  -23.0
' '
'SP_SMALL'
'LAM_SP'  -4500.0  -3000.0  3000.0  3000.0  3  2  1
' '
";

fn grid() -> GridShape {
    GridShape::new(6, 7)
}

fn geometry() -> GridGeometry {
    // 3 km cells: 9 km² each.
    GridGeometry::regular(grid(), (-23.8, -46.9), 0.03, 3000.0)
}

/// 28 000 g of CO a day (1000 mol), spread evenly over the grid.
fn cars() -> AreaSource {
    let keys = SpeciesKeys::default();
    AreaSource::new(AreaSourceConfig {
        name: "cars".to_string(),
        number: 1000.0,
        use_intensity: 10.0,
        factors: EmissionFactors::new(
            [("CO", 2.8, 28.0), ("VOC", 1.0, 100.0), ("PM", 0.5, 1.0)],
            &keys,
        )
        .unwrap(),
        grid: grid(),
        spatial: SpatialWeight::uniform(grid()).unwrap(),
        profile: TemporalProfile::flat(),
        voc_species: SpeciationTable::new([("ETH", 0.5)]).unwrap(),
        pm_species: SpeciationTable::new([("PM25I", 1.0)]).unwrap(),
        keys,
    })
    .unwrap()
}

/// 280 g of CO a day (10 mol) in one interior cell.
fn stack() -> PointSource {
    let cells = grid().cells();
    let mut co = vec![0.0; cells];
    co[grid().index(2, 3)] = 280.0;
    PointSource::new(PointSourceConfig {
        name: "refinery".to_string(),
        grid: grid(),
        pollutants: vec![
            PointPollutant {
                name: "CO".to_string(),
                molecular_weight: 28.0,
                daily_cells: co,
            },
            PointPollutant {
                name: "VOC".to_string(),
                molecular_weight: 100.0,
                daily_cells: vec![0.0; cells],
            },
            PointPollutant {
                name: "PM".to_string(),
                molecular_weight: 1.0,
                daily_cells: vec![0.0; cells],
            },
        ],
        profile: TemporalProfile::flat(),
        voc_species: SpeciationTable::empty(),
        pm_species: SpeciationTable::empty(),
        keys: SpeciesKeys::default(),
    })
    .unwrap()
}

fn out_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gridfile_model_output_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn values<'a>(file: &'a NamedGridFile, var: &str) -> &'a [f32] {
    file.file
        .variable(var)
        .unwrap_or_else(|| panic!("{} has no {var}", file.name))
        .data
        .as_f32()
        .unwrap()
}

fn text_attr<'a>(file: &'a NamedGridFile, name: &str) -> Option<&'a str> {
    file.file.attr(name).and_then(|a| a.as_text())
}

fn sum(values: &[f32]) -> f64 {
    values.iter().map(|v| *v as f64).sum()
}

fn rel_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-4 * a.abs().max(b.abs()).max(1.0)
}

// ---------------------------------------------------------------------------
// wrfchemi
// ---------------------------------------------------------------------------

#[test]
fn test_wrfchemi_typical_day_split() {
    let config = RunConfig::new("2024-03-01", "2024-03-01").in_memory();
    let files = cars().to_wrfchemi(&geometry(), &config).unwrap();

    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["wrfchemi_00z_d01", "wrfchemi_12z_d01"]);
    for f in &files {
        assert_eq!(f.file.dimension("Time").unwrap().len, 12);
    }
    let times = files[1].file.variable("Times").unwrap().data.as_chars().unwrap();
    assert_eq!(&times[..19], b"2024-03-01_12:00:00");
    // START_DATE follows the run dates, not the geometry.
    assert_eq!(text_attr(&files[0], "START_DATE"), Some("2024-03-01_00:00:00"));
    assert_eq!(text_attr(&files[1], "START_DATE"), Some("2024-03-01_12:00:00"));

    // mol km⁻² h⁻¹ summed over both halves times the cell area is the daily total.
    let co = sum(values(&files[0], "E_CO")) + sum(values(&files[1], "E_CO"));
    assert!(rel_close(co * 9.0, 1000.0), "got: {co}");
    // Lumped totals are not emitted.
    assert!(files[0].file.variable("E_VOC").is_none());
    assert!(files[0].file.variable("E_PM").is_none());
    assert!(files[0].file.variable("E_ETH").is_some());
}

#[test]
fn test_wrfchemi_week_profile_single_file() {
    let week = WeekProfile::new(&[1.0, 1.0, 1.0, 1.0, 1.0, 0.5, 0.25]).unwrap();
    let config = RunConfig::new("2024-03-01", "2024-03-03")
        .with_week_profile(week)
        .in_memory();
    let files = cars().to_wrfchemi(&geometry(), &config).unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "wrfchemi_d01_2024-03-01_00:00:00");
    assert_eq!(files[0].file.dimension("Time").unwrap().len, 72);

    // Friday, Saturday (x0.5), Sunday (x0.25).
    let co = values(&files[0], "E_CO");
    let cells = grid().cells();
    let day_total = |d: usize| sum(&co[d * 24 * cells..(d + 1) * 24 * cells]) * 9.0;
    assert!(rel_close(day_total(0), 1000.0), "got: {}", day_total(0));
    assert!(rel_close(day_total(1), 500.0), "got: {}", day_total(1));
    assert!(rel_close(day_total(2), 250.0), "got: {}", day_total(2));
}

#[test]
fn test_wrfchemi_one_day_week_profile_split() {
    let config = RunConfig::new("2024-03-02", "2024-03-02")
        .with_week_profile(WeekProfile::new(&[1.0, 1.0, 1.0, 1.0, 1.0, 0.5, 0.25]).unwrap())
        .in_memory();
    let files = cars().to_wrfchemi(&geometry(), &config).unwrap();

    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["wrfchemi_00z_d01", "wrfchemi_12z_d01"]);
    for f in &files {
        assert_eq!(f.file.dimension("Time").unwrap().len, 12);
    }
    let times = files[1].file.variable("Times").unwrap().data.as_chars().unwrap();
    assert_eq!(&times[..19], b"2024-03-02_12:00:00");
    // Saturday carries the 0.5 multiplier.
    let co = sum(values(&files[0], "E_CO")) + sum(values(&files[1], "E_CO"));
    assert!(rel_close(co * 9.0, 500.0), "got: {co}");
}

#[test]
fn test_wrfchemi_run_key_override() {
    let mut config = RunConfig::new("2024-03-01", "2024-03-01").in_memory();
    config.keys.voc_name = Some("CO".to_string());
    let files = cars().to_wrfchemi(&geometry(), &config).unwrap();

    // CO is speciated into ETH (half of 1000 mol); VOC is emitted as itself.
    assert!(files[0].file.variable("E_CO").is_none());
    assert!(files[0].file.variable("E_VOC").is_some());
    let eth = sum(values(&files[0], "E_ETH")) + sum(values(&files[1], "E_ETH"));
    assert!(rel_close(eth * 9.0, 500.0), "got: {eth}");

    let config = config.with_keys(KeyOverride::new("NMHC", "PM"));
    let err = cars().to_wrfchemi(&geometry(), &config).unwrap_err();
    assert!(
        matches!(err, GridFileError::Emission(EmissionError::MissingKeys(_))),
        "got: {err}"
    );
}

#[test]
fn test_wrfchemi_writes_files() {
    let dir = out_dir("wrfchemi_writes");
    let config = RunConfig::new("2024-03-01", "2024-03-01").with_output_dir(&dir);
    let files = cars().to_wrfchemi(&geometry(), &config).unwrap();
    for f in &files {
        assert_eq!(read_grid_file(&dir.join(&f.name)).unwrap(), f.file);
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_in_memory_touches_no_storage() {
    let dir = out_dir("in_memory");
    let config = RunConfig::new("2024-03-01", "2024-03-01")
        .with_output_dir(&dir)
        .in_memory();
    cars().to_wrfchemi(&geometry(), &config).unwrap();
    assert!(!dir.exists());
}

#[test]
fn test_geometry_mismatch_fails_before_writing() {
    let dir = out_dir("geometry_mismatch");
    let config = RunConfig::new("2024-03-01", "2024-03-01").with_output_dir(&dir);
    let transposed = GridGeometry::regular(GridShape::new(7, 6), (-23.8, -46.9), 0.03, 3000.0);
    let err = cars().to_wrfchemi(&transposed, &config).unwrap_err();
    assert!(err.is_configuration(), "got: {err}");
    assert!(!dir.exists());
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[test]
fn test_group_output_sums_members() {
    let config = RunConfig::new("2024-03-01", "2024-03-01").in_memory();
    let group = SourceGroup::new("sao_paulo", vec![cars().into(), stack().into()]);
    let files = group.to_wrfchemi(&geometry(), &config).unwrap();
    let co = sum(values(&files[0], "E_CO")) + sum(values(&files[1], "E_CO"));
    assert!(rel_close(co * 9.0, 1010.0), "got: {co}");

    let alone = stack().to_wrfchemi(&geometry(), &config).unwrap();
    assert!(alone[0].file.variable("E_ETH").is_none());
    assert!(group
        .to_wrfchemi(&geometry(), &config)
        .unwrap()
        .iter()
        .zip(&files)
        .all(|(a, b)| a == b));
}

#[test]
fn test_empty_group_is_configuration_error() {
    let config = RunConfig::new("2024-03-01", "2024-03-01").in_memory();
    let group = SourceGroup::new("nothing", Vec::new());
    let geometry = GridGeometry::regular(GridShape::new(0, 0), (0.0, 0.0), 0.1, 1000.0);
    let err = group.to_wrfchemi(&geometry, &config).unwrap_err();
    assert!(err.is_configuration(), "got: {err}");
}

// ---------------------------------------------------------------------------
// CMAQ
// ---------------------------------------------------------------------------

#[test]
fn test_cmaq_one_file_per_day() {
    let grid = GridDesc::parse(GRIDDESC).unwrap().grid("SP_SMALL").unwrap();
    let config = RunConfig::new("2024-03-01", "2024-03-03")
        .with_week_profile(WeekProfile::uniform())
        .in_memory();
    let files = cars().to_cmaq_with(&geometry(), &config, &grid, 1).unwrap();

    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "cmaq_emissions_20240301.grd",
            "cmaq_emissions_20240302.grd",
            "cmaq_emissions_20240303.grd",
        ]
    );
    for f in &files {
        assert_eq!(f.file.dimension("TSTEP").unwrap().len, 25);
        assert_eq!(f.file.dimension("ROW").unwrap().len, 2);
        assert_eq!(f.file.dimension("COL").unwrap().len, 3);
    }
    assert_eq!(files[1].file.attr("SDATE").unwrap().as_int(), Some(2024062));

    // 6 of 42 cells survive the trim; moles/s times 3600 over 24 hours.
    let co = values(&files[0], "CO");
    let day = sum(&co[..24 * 6]) * 3600.0;
    assert!(rel_close(day, 1000.0 * 6.0 / 42.0), "got: {day}");
}

#[test]
fn test_cmaq_run_key_override() {
    let grid = GridDesc::parse(GRIDDESC).unwrap().grid("SP_SMALL").unwrap();
    let config = RunConfig::new("2024-03-01", "2024-03-01")
        .with_week_profile(WeekProfile::uniform())
        .with_keys(KeyOverride {
            voc_name: Some("CO".to_string()),
            pm_name: None,
        })
        .in_memory();
    let files = cars().to_cmaq_with(&geometry(), &config, &grid, 1).unwrap();
    assert!(files[0].file.variable("CO").is_none());
    assert!(files[0].file.variable("VOC").is_some());
    assert!(files[0].file.variable("ETH").is_some());
}

#[test]
fn test_cmaq_requires_week_profile() {
    let grid = GridDesc::parse(GRIDDESC).unwrap().grid("SP_SMALL").unwrap();
    let config = RunConfig::new("2024-03-01", "2024-03-01").in_memory();
    let err = cars().to_cmaq_with(&geometry(), &config, &grid, 1).unwrap_err();
    assert!(
        matches!(err, GridFileError::Emission(EmissionError::MissingWeekProfile)),
        "got: {err}"
    );
}

#[test]
fn test_cmaq_from_griddesc_file() {
    let dir = out_dir("cmaq_griddesc");
    std::fs::create_dir_all(&dir).unwrap();
    let griddesc_path = dir.join("GRIDDESC");
    std::fs::write(&griddesc_path, GRIDDESC).unwrap();
    let results = dir.join("results");
    let config = RunConfig::new("2024-03-04", "2024-03-04")
        .with_week_profile(WeekProfile::uniform())
        .with_output_dir(&results);

    let cmaq = CmaqConfig {
        griddesc_path,
        grid_name: "SP_SMALL".to_string(),
        btrim: 1,
    };
    let files = cars().to_cmaq(&geometry(), &config, &cmaq).unwrap();
    let written = read_grid_file(&results.join("cmaq_emissions_20240304.grd")).unwrap();
    assert_eq!(written, files[0].file);

    // btrim 0 leaves 4x5, which is not the GRIDDESC grid.
    let wrong = CmaqConfig { btrim: 0, ..cmaq };
    let err = cars().to_cmaq(&geometry(), &config, &wrong).unwrap_err();
    assert!(err.is_configuration(), "got: {err}");
    let _ = std::fs::remove_dir_all(&dir);
}
