//! Area and point emission sources.
//!
//! A source is validated once at construction and is immutable afterwards;
//! [`EmissionProvider::emission_tensor`] is a pure function of its state.

use std::borrow::Cow;
use std::fmt;

use crate::distribution::{build_tensor, DailyField, Speciation};
use crate::error::{check_non_negative, EmissionError};
use crate::grid::{GridShape, SpatialWeight};
use crate::pollutant::{
    check_molecular_weight, check_name, EmissionFactors, KeyOverride, SpeciationTable, SpeciesKeys,
};
use crate::profile::{TemporalProfile, TimePlan};
use crate::report::EmissionReport;
use crate::tensor::EmissionTensor;
use crate::units::{daily_to_ktn_year, ktn_year_to_g_day};

/// Anything that can produce an emission tensor on a grid: a single source
/// or a group of them.
pub trait EmissionProvider {
    fn name(&self) -> &str;

    fn grid(&self) -> GridShape;

    /// Per-cell hourly emissions for every step of `plan`.
    fn emission_tensor(&self, plan: &TimePlan) -> Result<EmissionTensor, EmissionError> {
        self.emission_tensor_with(plan, &KeyOverride::default())
    }

    /// Like [`EmissionProvider::emission_tensor`], with the lumped pollutant
    /// names taken from `keys` where set.
    fn emission_tensor_with(
        &self,
        plan: &TimePlan,
        keys: &KeyOverride,
    ) -> Result<EmissionTensor, EmissionError>;

    /// Annual totals per pollutant, in kTn year⁻¹.
    fn report(&self) -> EmissionReport;
}

/// Source keys with `overrides` applied, revalidated against the pollutants
/// the source carries when they changed.
fn resolve_keys<'a>(
    own: &'a SpeciesKeys,
    overrides: &KeyOverride,
    names: impl Iterator<Item = &'a str> + Clone,
    molecular_weight: impl Fn(&str) -> Option<f64>,
) -> Result<Cow<'a, SpeciesKeys>, EmissionError> {
    let keys = overrides.apply(own);
    if &keys == own {
        return Ok(Cow::Borrowed(own));
    }
    keys.check_present(names)?;
    if let Some(mw) = molecular_weight(&keys.pm_name) {
        check_molecular_weight(&keys.pm_name, mw, &keys)?;
    }
    Ok(Cow::Owned(keys))
}

// ---------------------------------------------------------------------------
// AreaSource
// ---------------------------------------------------------------------------

/// Inputs of an [`AreaSource`].
#[derive(Debug, Clone)]
pub struct AreaSourceConfig {
    pub name: String,
    /// Number of emitting units, e.g. vehicles.
    pub number: f64,
    /// Activity per unit per day, e.g. km driven.
    pub use_intensity: f64,
    pub factors: EmissionFactors,
    /// Declared grid the spatial weights must cover.
    pub grid: GridShape,
    pub spatial: SpatialWeight,
    pub profile: TemporalProfile,
    pub voc_species: SpeciationTable,
    pub pm_species: SpeciationTable,
    pub keys: SpeciesKeys,
}

/// Emission distributed over the grid by a spatial proxy.
///
/// Daily total per pollutant: `number * use_intensity * factor`.
#[derive(Debug, Clone)]
pub struct AreaSource {
    name: String,
    number: f64,
    use_intensity: f64,
    factors: EmissionFactors,
    spatial: SpatialWeight,
    profile: TemporalProfile,
    voc_species: SpeciationTable,
    pm_species: SpeciationTable,
    keys: SpeciesKeys,
}

impl AreaSource {
    pub fn new(config: AreaSourceConfig) -> Result<Self, EmissionError> {
        config
            .grid
            .ensure_matches(config.spatial.shape(), "spatial weight")?;
        let number = check_non_negative(format!("number of {}", config.name), config.number)?;
        let use_intensity = check_non_negative(
            format!("use intensity of {}", config.name),
            config.use_intensity,
        )?;
        // Factors may have been validated under different keys.
        config.keys.check_present(config.factors.names().into_iter())?;
        if let Some(pm) = config.factors.get(&config.keys.pm_name) {
            check_molecular_weight(&pm.name, pm.molecular_weight, &config.keys)?;
        }
        Ok(Self {
            name: config.name,
            number,
            use_intensity,
            factors: config.factors,
            spatial: config.spatial,
            profile: config.profile,
            voc_species: config.voc_species,
            pm_species: config.pm_species,
            keys: config.keys,
        })
    }

    pub fn number(&self) -> f64 {
        self.number
    }

    pub fn use_intensity(&self) -> f64 {
        self.use_intensity
    }

    pub fn factors(&self) -> &EmissionFactors {
        &self.factors
    }

    pub fn spatial(&self) -> &SpatialWeight {
        &self.spatial
    }

    pub fn profile(&self) -> &TemporalProfile {
        &self.profile
    }

    pub fn keys(&self) -> &SpeciesKeys {
        &self.keys
    }

    /// Daily total of a pollutant (`number * use_intensity * factor`), or
    /// `None` if the source does not emit it.
    pub fn total_emission(&self, pollutant: &str) -> Option<f64> {
        self.factors
            .get(pollutant)
            .map(|p| self.number * self.use_intensity * p.factor)
    }

    pub fn total_emission_ktn_year(&self, pollutant: &str) -> Option<f64> {
        self.total_emission(pollutant).map(daily_to_ktn_year)
    }

    fn daily_fields(&self) -> Vec<DailyField<'_>> {
        self.factors
            .iter()
            .map(|p| DailyField {
                name: &p.name,
                molecular_weight: p.molecular_weight,
                cells: Cow::Owned(
                    self.spatial
                        .distribute(self.number * self.use_intensity * p.factor),
                ),
            })
            .collect()
    }
}

impl EmissionProvider for AreaSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn grid(&self) -> GridShape {
        self.spatial.shape()
    }

    fn emission_tensor_with(
        &self,
        plan: &TimePlan,
        keys: &KeyOverride,
    ) -> Result<EmissionTensor, EmissionError> {
        let keys = resolve_keys(&self.keys, keys, self.factors.names().into_iter(), |name| {
            self.factors.get(name).map(|p| p.molecular_weight)
        })?;
        build_tensor(
            self.grid(),
            &self.daily_fields(),
            &self.profile,
            plan,
            Speciation {
                keys: &keys,
                voc: &self.voc_species,
                pm: &self.pm_species,
            },
        )
    }

    fn report(&self) -> EmissionReport {
        let mut report = EmissionReport::default();
        for p in self.factors.iter() {
            report.push(
                &self.name,
                &p.name,
                daily_to_ktn_year(self.number * self.use_intensity * p.factor),
            );
        }
        report
    }
}

impl fmt::Display for AreaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Source name: {}", self.name)?;
        writeln!(f, "Number: {}", self.number)?;
        writeln!(f, "Pollutants: {:?}", self.factors.names())?;
        writeln!(f, "Number VOC species: {}", self.voc_species.len())?;
        writeln!(f, "Number PM species: {}", self.pm_species.len())
    }
}

// ---------------------------------------------------------------------------
// PointSource
// ---------------------------------------------------------------------------

/// Daily per-cell totals of one pollutant from aggregated point sources.
#[derive(Debug, Clone, PartialEq)]
pub struct PointPollutant {
    pub name: String,
    pub molecular_weight: f64,
    /// g day⁻¹ per cell, row-major.
    pub daily_cells: Vec<f64>,
}

/// Inputs of a [`PointSource`].
#[derive(Debug, Clone)]
pub struct PointSourceConfig {
    pub name: String,
    pub grid: GridShape,
    pub pollutants: Vec<PointPollutant>,
    pub profile: TemporalProfile,
    pub voc_species: SpeciationTable,
    pub pm_species: SpeciationTable,
    pub keys: SpeciesKeys,
}

/// Emissions already resident in grid cells (pre-aggregated point sources).
#[derive(Debug, Clone)]
pub struct PointSource {
    name: String,
    grid: GridShape,
    pollutants: Vec<PointPollutant>,
    profile: TemporalProfile,
    voc_species: SpeciationTable,
    pm_species: SpeciationTable,
    keys: SpeciesKeys,
}

impl PointSource {
    pub fn new(config: PointSourceConfig) -> Result<Self, EmissionError> {
        config
            .keys
            .check_present(config.pollutants.iter().map(|p| p.name.as_str()))?;
        let mut seen = Vec::with_capacity(config.pollutants.len());
        for p in &config.pollutants {
            check_name(&p.name, &mut seen)?;
            check_molecular_weight(&p.name, p.molecular_weight, &config.keys)?;
            if p.daily_cells.len() != config.grid.cells() {
                return Err(EmissionError::Configuration(format!(
                    "{} has {} cell totals, grid {}x{} has {} cells",
                    p.name,
                    p.daily_cells.len(),
                    config.grid.nrow,
                    config.grid.ncol,
                    config.grid.cells()
                )));
            }
            for (i, &v) in p.daily_cells.iter().enumerate() {
                check_non_negative(format!("{} emission in cell {i}", p.name), v)?;
            }
        }
        Ok(Self {
            name: config.name,
            grid: config.grid,
            pollutants: config.pollutants,
            profile: config.profile,
            voc_species: config.voc_species,
            pm_species: config.pm_species,
            keys: config.keys,
        })
    }

    /// Like [`PointSource::new`] but with cell totals in kTn year⁻¹.
    pub fn from_annual_ktn(mut config: PointSourceConfig) -> Result<Self, EmissionError> {
        for p in &mut config.pollutants {
            for v in &mut p.daily_cells {
                *v = ktn_year_to_g_day(*v);
            }
        }
        Self::new(config)
    }

    pub fn pollutants(&self) -> &[PointPollutant] {
        &self.pollutants
    }

    pub fn profile(&self) -> &TemporalProfile {
        &self.profile
    }

    pub fn keys(&self) -> &SpeciesKeys {
        &self.keys
    }

    /// Daily total over the grid (g day⁻¹), or `None` if not emitted.
    pub fn total_emission(&self, pollutant: &str) -> Option<f64> {
        self.pollutants
            .iter()
            .find(|p| p.name == pollutant)
            .map(|p| p.daily_cells.iter().sum())
    }

    pub fn total_emission_ktn_year(&self, pollutant: &str) -> Option<f64> {
        self.total_emission(pollutant).map(daily_to_ktn_year)
    }
}

impl EmissionProvider for PointSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn grid(&self) -> GridShape {
        self.grid
    }

    fn emission_tensor_with(
        &self,
        plan: &TimePlan,
        keys: &KeyOverride,
    ) -> Result<EmissionTensor, EmissionError> {
        let keys = resolve_keys(
            &self.keys,
            keys,
            self.pollutants.iter().map(|p| p.name.as_str()),
            |name| {
                self.pollutants
                    .iter()
                    .find(|p| p.name == name)
                    .map(|p| p.molecular_weight)
            },
        )?;
        let fields: Vec<DailyField<'_>> = self
            .pollutants
            .iter()
            .map(|p| DailyField {
                name: &p.name,
                molecular_weight: p.molecular_weight,
                cells: Cow::Borrowed(&p.daily_cells),
            })
            .collect();
        build_tensor(
            self.grid,
            &fields,
            &self.profile,
            plan,
            Speciation {
                keys: &keys,
                voc: &self.voc_species,
                pm: &self.pm_species,
            },
        )
    }

    fn report(&self) -> EmissionReport {
        let mut report = EmissionReport::default();
        for p in &self.pollutants {
            report.push(
                &self.name,
                &p.name,
                daily_to_ktn_year(p.daily_cells.iter().sum()),
            );
        }
        report
    }
}

impl fmt::Display for PointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.pollutants.iter().map(|p| p.name.as_str()).collect();
        writeln!(f, "Source name: {}", self.name)?;
        writeln!(f, "Pollutants: {names:?}")?;
        writeln!(f, "Number VOC species: {}", self.voc_species.len())?;
        writeln!(f, "Number PM species: {}", self.pm_species.len())
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Source {
    Area(AreaSource),
    Point(PointSource),
}

impl Source {
    pub fn total_emission(&self, pollutant: &str) -> Option<f64> {
        match self {
            Source::Area(s) => s.total_emission(pollutant),
            Source::Point(s) => s.total_emission(pollutant),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Source::Area(_) => "area",
            Source::Point(_) => "point",
        }
    }
}

impl EmissionProvider for Source {
    fn name(&self) -> &str {
        match self {
            Source::Area(s) => s.name(),
            Source::Point(s) => s.name(),
        }
    }

    fn grid(&self) -> GridShape {
        match self {
            Source::Area(s) => s.grid(),
            Source::Point(s) => s.grid(),
        }
    }

    fn emission_tensor_with(
        &self,
        plan: &TimePlan,
        keys: &KeyOverride,
    ) -> Result<EmissionTensor, EmissionError> {
        match self {
            Source::Area(s) => s.emission_tensor_with(plan, keys),
            Source::Point(s) => s.emission_tensor_with(plan, keys),
        }
    }

    fn report(&self) -> EmissionReport {
        match self {
            Source::Area(s) => s.report(),
            Source::Point(s) => s.report(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Area(s) => fmt::Display::fmt(s, f),
            Source::Point(s) => fmt::Display::fmt(s, f),
        }
    }
}

impl From<AreaSource> for Source {
    fn from(s: AreaSource) -> Self {
        Source::Area(s)
    }
}

impl From<PointSource> for Source {
    fn from(s: PointSource) -> Self {
        Source::Point(s)
    }
}
