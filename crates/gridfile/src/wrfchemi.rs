//! WRF-Chem `wrfchemi` emission files.
//!
//! Variables are `E_<species>` on `(Time, emissions_zdim, south_north,
//! west_east)`. Gas species are written in mol km⁻² h⁻¹ and aerosol species
//! in µg m⁻² s⁻¹.
//!
//! A 24-hour output (a representative day, or a one-day range) is written as
//! two 12-hour files (`wrfchemi_00z_dNN`, `wrfchemi_12z_dNN`). Any other
//! length goes into a single `wrfchemi_dNN_<start>` file.

use chrono::NaiveDate;
use tracing::info;

use emission::calendar::wrf_timestamp;
use emission::profile::HOURS_PER_DAY;
use emission::{
    EmissionError, EmissionProvider, EmissionTensor, GeometryAttr, GridGeometry, Phase, RunConfig,
};

use crate::container::{AttrValue, GridFile, GridVariable, VarData};
use crate::error::GridFileError;
use crate::output::{write_all, NamedGridFile};

pub const TITLE: &str = " OUTPUT FROM EMISSION PREPROCESSOR";
pub const GAS_UNITS: &str = "mol km^-2 hr^-1";
pub const AEROSOL_UNITS: &str = "ug m^-2 s^-1";

const DATE_STR_LEN: usize = 19;
const HALF_DAY: usize = HOURS_PER_DAY / 2;

/// Per-cell hourly amount to wrfchemi flux units.
fn to_wrf_units(value: f64, phase: Phase, cell_area_km2: f64) -> f32 {
    match phase {
        // mol h⁻¹ / km²
        Phase::Gas => (value / cell_area_km2) as f32,
        // g h⁻¹ / km² -> µg s⁻¹ / m² (the 1e6 factors cancel)
        Phase::Aerosol => (value / cell_area_km2 / 3600.0) as f32,
    }
}

fn geometry_attrs(
    file: &mut GridFile,
    geometry: &GridGeometry,
    start_date: &str,
) -> Result<(), GridFileError> {
    file.set_attr("TITLE", TITLE);
    file.set_attr("START_DATE", start_date);
    file.set_attr("WEST-EAST_GRID_DIMENSION", geometry.ncol as i32 + 1);
    file.set_attr("SOUTH-NORTH_GRID_DIMENSION", geometry.nrow as i32 + 1);
    file.set_attr("DX", geometry.dx);
    file.set_attr("DY", geometry.dy);
    file.set_attr("GRID_ID", geometry.grid_id as i32);
    file.set_attr("MAP_PROJ", geometry.map_proj);
    file.set_attr("TRUELAT1", geometry.truelat1);
    file.set_attr("TRUELAT2", geometry.truelat2);
    file.set_attr("STAND_LON", geometry.stand_lon);
    file.set_attr("CEN_LAT", geometry.cen_lat);
    file.set_attr("CEN_LON", geometry.cen_lon);
    for (name, value) in &geometry.extra_attrs {
        let value = match value {
            GeometryAttr::Int(v) => AttrValue::Int(i32::try_from(*v).map_err(|_| {
                EmissionError::Configuration(format!(
                    "global attribute {name} = {v} does not fit a 32-bit integer"
                ))
            })?),
            GeometryAttr::Float(v) => AttrValue::Float(*v),
            GeometryAttr::Text(v) => AttrValue::Text(v.clone()),
        };
        file.set_attr(name, value);
    }
    Ok(())
}

fn coordinate(values: &[f64], cells: usize, description: &str, units: &str, name: &str) -> GridVariable {
    let data = if values.is_empty() {
        vec![0.0; cells]
    } else {
        values.iter().map(|v| *v as f32).collect()
    };
    GridVariable::new(name, &["south_north", "west_east"], VarData::F32(data))
        .with_attr("FieldType", 104)
        .with_attr("MemoryOrder", "XY ")
        .with_attr("description", description)
        .with_attr("units", units)
        .with_attr("stagger", "")
}

/// Builds one wrfchemi dataset from a tensor whose first step is midnight
/// of `start`.
pub fn build_wrfchemi(
    tensor: &EmissionTensor,
    geometry: &GridGeometry,
    start: NaiveDate,
) -> Result<GridFile, GridFileError> {
    let shape = tensor.shape();
    geometry.ensure_shape(shape.grid)?;
    let cells = shape.grid.cells();
    let area = geometry.cell_area_km2();

    let mut file = GridFile::new();
    file.add_dimension("Time", shape.time_steps, true)?;
    file.add_dimension("DateStrLen", DATE_STR_LEN, false)?;
    file.add_dimension("emissions_zdim", 1, false)?;
    file.add_dimension("south_north", shape.grid.nrow, false)?;
    file.add_dimension("west_east", shape.grid.ncol, false)?;

    let times: Vec<u8> = (0..shape.time_steps)
        .flat_map(|t| wrf_timestamp(start, t).into_bytes())
        .collect();
    file.add_variable(GridVariable::new("Times", &["Time", "DateStrLen"], VarData::Char(times)))?;
    file.add_variable(coordinate(
        &geometry.xlat,
        cells,
        "LATITUDE, SOUTH IS NEGATIVE",
        "degree_north",
        "XLAT",
    ))?;
    file.add_variable(coordinate(
        &geometry.xlong,
        cells,
        "LONGITUDE, WEST IS NEGATIVE",
        "degree_east",
        "XLONG",
    ))?;

    for (name, var) in tensor.iter() {
        let data = var
            .data
            .iter()
            .map(|v| to_wrf_units(*v, var.phase, area))
            .collect();
        let units = match var.phase {
            Phase::Gas => GAS_UNITS,
            Phase::Aerosol => AEROSOL_UNITS,
        };
        file.add_variable(
            GridVariable::new(
                &format!("E_{name}"),
                &["Time", "emissions_zdim", "south_north", "west_east"],
                VarData::F32(data),
            )
            .with_attr("FieldType", 104)
            .with_attr("MemoryOrder", "XYZ")
            .with_attr("description", "EMISSIONS")
            .with_attr("units", units)
            .with_attr("stagger", "")
            .with_attr("coordinates", "XLONG XLAT"),
        )?;
    }

    geometry_attrs(&mut file, geometry, &wrf_timestamp(start, 0))?;
    Ok(file)
}

/// Builds (and, when `config.write_files`, writes) the wrfchemi files of
/// `provider`.
pub fn wrfchemi_files<P: EmissionProvider + ?Sized>(
    provider: &P,
    geometry: &GridGeometry,
    config: &RunConfig,
) -> Result<Vec<NamedGridFile>, GridFileError> {
    geometry.ensure_shape(provider.grid())?;
    let range = config.date_range()?;
    let plan = config.time_plan()?;
    let tensor = provider.emission_tensor_with(&plan, &config.keys)?;
    let file = build_wrfchemi(&tensor, geometry, range.start())?;

    let files = if plan.len() == HOURS_PER_DAY {
        let mut noon = file.slice_records(HALF_DAY, HOURS_PER_DAY)?;
        noon.set_attr("START_DATE", wrf_timestamp(range.start(), HALF_DAY));
        vec![
            NamedGridFile {
                name: format!("wrfchemi_00z_d{:02}", geometry.grid_id),
                file: file.slice_records(0, HALF_DAY)?,
            },
            NamedGridFile {
                name: format!("wrfchemi_12z_d{:02}", geometry.grid_id),
                file: noon,
            },
        ]
    } else {
        vec![NamedGridFile {
            name: format!(
                "wrfchemi_d{:02}_{}",
                geometry.grid_id,
                wrf_timestamp(range.start(), 0)
            ),
            file,
        }]
    };

    if config.write_files {
        write_all(&files, &config.output_dir, config.compress)?;
    }
    info!(
        "Built {} wrfchemi file(s) for {} ({} steps)",
        files.len(),
        provider.name(),
        plan.len()
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use emission::{GridShape, TensorShape};

    fn geometry() -> GridGeometry {
        GridGeometry::regular(GridShape::new(2, 3), (-23.5, -46.7), 0.03, 2000.0)
    }

    fn tensor(steps: usize) -> EmissionTensor {
        let shape = TensorShape::new(steps, GridShape::new(2, 3));
        let mut t = EmissionTensor::new(shape);
        t.accumulate("CO", Phase::Gas, &vec![8.0; shape.len()]).unwrap();
        t.accumulate("PM25I", Phase::Aerosol, &vec![3600.0; shape.len()])
            .unwrap();
        t
    }

    #[test]
    fn test_unit_conversion() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let f = build_wrfchemi(&tensor(24), &geometry(), start).unwrap();
        // 8 mol/h over a 4 km² cell.
        let co = f.variable("E_CO").unwrap();
        assert_eq!(co.data.as_f32().unwrap()[0], 2.0);
        assert_eq!(co.attr("units").unwrap().as_text(), Some(GAS_UNITS));
        // 3600 g/h over 4 km² = 0.25 µg m⁻² s⁻¹.
        let pm = f.variable("E_PM25I").unwrap();
        assert_eq!(pm.data.as_f32().unwrap()[5], 0.25);
        assert_eq!(pm.attr("units").unwrap().as_text(), Some(AEROSOL_UNITS));
        assert_eq!(pm.dims, vec!["Time", "emissions_zdim", "south_north", "west_east"]);
    }

    #[test]
    fn test_times_and_attributes() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let f = build_wrfchemi(&tensor(26), &geometry(), start).unwrap();
        let times = f.variable("Times").unwrap().data.as_chars().unwrap();
        assert_eq!(&times[..19], b"2024-03-01_00:00:00");
        assert_eq!(&times[25 * 19..], b"2024-03-02_01:00:00");
        assert_eq!(f.attr("TITLE").unwrap().as_text(), Some(TITLE));
        assert_eq!(f.attr("GRID_ID").unwrap().as_int(), Some(1));
        assert_eq!(f.attr("DX").unwrap().as_float(), Some(2000.0));
        assert_eq!(f.attr("WEST-EAST_GRID_DIMENSION").unwrap().as_int(), Some(4));
        let xlat = f.variable("XLAT").unwrap().data.as_f32().unwrap();
        assert_eq!(xlat[0], -23.5_f32);
    }

    #[test]
    fn test_geometry_shape_mismatch() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let geometry = GridGeometry::regular(GridShape::new(3, 2), (0.0, 0.0), 0.1, 1000.0);
        let err = build_wrfchemi(&tensor(24), &geometry, start).unwrap_err();
        assert!(err.is_configuration(), "got: {err}");
    }

    #[test]
    fn test_extra_attrs_copied_and_checked() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut geometry = geometry();
        geometry
            .extra_attrs
            .push(("NUM_LAND_CAT".to_string(), GeometryAttr::Int(21)));
        let f = build_wrfchemi(&tensor(24), &geometry, start).unwrap();
        assert_eq!(f.attr("NUM_LAND_CAT").unwrap().as_int(), Some(21));
        assert_eq!(f.attr("START_DATE").unwrap().as_text(), Some("2024-03-01_00:00:00"));

        geometry
            .extra_attrs
            .push(("ISWATER".to_string(), GeometryAttr::Int(1 << 40)));
        let err = build_wrfchemi(&tensor(24), &geometry, start).unwrap_err();
        assert!(err.is_configuration(), "got: {err}");
    }
}
