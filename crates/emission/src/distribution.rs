//! Distribution engine shared by area and point sources.
//!
//! Daily per-cell masses are spread over the time plan, converted to moles
//! (gas) and split into model species (VOC, PM):
//!
//! 1. `hourly[t,c] = daily[c] * profile.weight(step.hour) * step.factor`
//! 2. direct pollutants: `hourly / molecular_weight` (mol h⁻¹)
//! 3. VOC species: `hourly_voc / mw_voc * fraction` (mol h⁻¹)
//! 4. PM species: `hourly_pm * fraction` (g h⁻¹)

use std::borrow::Cow;

use tracing::debug;

use crate::error::EmissionError;
use crate::grid::GridShape;
use crate::pollutant::{SpeciationTable, SpeciesKeys};
use crate::profile::{TemporalProfile, TimePlan};
use crate::tensor::{EmissionTensor, Phase, TensorShape};

/// Daily mass of one pollutant in every grid cell.
#[derive(Debug, Clone)]
pub struct DailyField<'a> {
    pub name: &'a str,
    pub molecular_weight: f64,
    pub cells: Cow<'a, [f64]>,
}

/// Speciation applied to the lumped pollutants.
#[derive(Debug, Clone, Copy)]
pub struct Speciation<'a> {
    pub keys: &'a SpeciesKeys,
    pub voc: &'a SpeciationTable,
    pub pm: &'a SpeciationTable,
}

/// `out[t * cells + c] = cells[c] * step_weights[t]`.
pub fn spread_over_time(cells: &[f64], step_weights: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(cells.len() * step_weights.len());
    for &w in step_weights {
        out.extend(cells.iter().map(|c| c * w));
    }
    out
}

fn scaled(values: &[f64], factor: f64) -> Vec<f64> {
    values.iter().map(|v| v * factor).collect()
}

/// Builds the emission tensor of one source.
pub fn build_tensor(
    grid: GridShape,
    fields: &[DailyField<'_>],
    profile: &TemporalProfile,
    plan: &TimePlan,
    speciation: Speciation<'_>,
) -> Result<EmissionTensor, EmissionError> {
    let shape = TensorShape::new(plan.len(), grid);
    let mut tensor = EmissionTensor::new(shape);
    let step_weights = plan.weights(profile);

    for field in fields {
        if field.cells.len() != grid.cells() {
            return Err(EmissionError::Configuration(format!(
                "{} has {} cell totals, grid has {} cells",
                field.name,
                field.cells.len(),
                grid.cells()
            )));
        }
        let hourly = spread_over_time(&field.cells, &step_weights);

        if field.name == speciation.keys.voc_name {
            let to_mol = 1.0 / field.molecular_weight;
            for (species, fraction) in speciation.voc.iter() {
                tensor.accumulate(species, Phase::Gas, &scaled(&hourly, to_mol * fraction))?;
            }
        } else if field.name == speciation.keys.pm_name {
            for (species, fraction) in speciation.pm.iter() {
                tensor.accumulate(species, Phase::Aerosol, &scaled(&hourly, fraction))?;
            }
        } else {
            tensor.accumulate(
                field.name,
                Phase::Gas,
                &scaled(&hourly, 1.0 / field.molecular_weight),
            )?;
        }
    }

    debug!(
        "Distributed {} pollutants into {} variables over {} steps on a {}x{} grid",
        fields.len(),
        tensor.len(),
        shape.time_steps,
        grid.nrow,
        grid.ncol
    );
    Ok(tensor)
}
