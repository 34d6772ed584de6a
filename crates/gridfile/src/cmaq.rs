//! CMAQ (I/O-API layout) daily emission files.
//!
//! One file per day, 25 hourly steps (the last one is midnight of the next
//! day), variables on `(TSTEP, LAY, ROW, COL)` in moles/s for gas species
//! and g/s for aerosol species. The WRF domain is trimmed by `btrim + 1`
//! cells on every edge to match the MCIP grid named in GRIDDESC.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use tracing::{debug, info};

use emission::calendar::julian;
use emission::profile::HOURS_PER_DAY;
use emission::units::SECONDS_PER_HOUR;
use emission::{
    EmissionProvider, EmissionTensor, GridGeometry, GridShape, Phase, RunConfig, TensorShape,
    TimePlan,
};

use crate::container::{GridFile, GridVariable, VarData};
use crate::error::GridFileError;
use crate::griddesc::GridDescription;
use crate::output::{padded, write_all, NamedGridFile};

pub const STEPS_PER_FILE: usize = HOURS_PER_DAY + 1;
pub const GAS_UNITS: &str = "moles/s";
pub const AEROSOL_UNITS: &str = "g/s";

const NAME_WIDTH: usize = 16;
const DESC_WIDTH: usize = 80;
const IOAPI_VERSION: &str = "ioapi-3.2: $Id: init3.F90 98 2018-04-05 14:35:07Z coats $";
const FILE_DESCRIPTION: &str = "Merged emissions output file from Mrggrid";
const UPDATE_NAME: &str = "EMISSION";

/// Grid left after removing `btrim + 1` cells from every edge of `shape`.
///
/// Fails when nothing is left or when the result is not the GRIDDESC grid.
pub fn trimmed_shape(
    shape: GridShape,
    grid: &GridDescription,
    btrim: usize,
) -> Result<GridShape, GridFileError> {
    let margin = btrim + 1;
    if shape.nrow <= 2 * margin || shape.ncol <= 2 * margin {
        return Err(GridFileError::GridDesc(format!(
            "btrim {btrim} leaves no cells of a {}x{} grid",
            shape.nrow, shape.ncol
        )));
    }
    let trimmed = GridShape::new(shape.nrow - 2 * margin, shape.ncol - 2 * margin);
    if trimmed != GridShape::new(grid.grid.nrows, grid.grid.ncols) {
        return Err(GridFileError::GridDesc(format!(
            "trimmed grid is {} rows x {} cols, GRIDDESC grid {} has {} x {}",
            trimmed.nrow, trimmed.ncol, grid.grid.name, grid.grid.nrows, grid.grid.ncols
        )));
    }
    Ok(trimmed)
}

/// Drops `margin` cells from every edge of every variable.
fn trim(tensor: &EmissionTensor, margin: usize) -> Result<EmissionTensor, GridFileError> {
    let shape = tensor.shape();
    let grid = GridShape::new(shape.grid.nrow - 2 * margin, shape.grid.ncol - 2 * margin);
    let mut out = EmissionTensor::new(TensorShape::new(shape.time_steps, grid));
    for (name, var) in tensor.iter() {
        let mut data = Vec::with_capacity(shape.time_steps * grid.cells());
        for t in 0..shape.time_steps {
            for row in margin..shape.grid.nrow - margin {
                let start = shape.index(t, row, margin);
                data.extend_from_slice(&var.data[start..start + grid.ncol]);
            }
        }
        out.accumulate(name, var.phase, &data)?;
    }
    Ok(out)
}

/// I/O-API `HHMMSS`.
fn hhmmss(time: &NaiveDateTime) -> i32 {
    (time.hour() * 10000 + time.minute() * 100 + time.second()) as i32
}

/// `(YYYYDDD, HHMMSS)` of every step of `day`, repeated for each variable.
fn tflag(day: NaiveDate, nvars: usize) -> Vec<i32> {
    let next = day + Duration::days(1);
    (0..STEPS_PER_FILE)
        .flat_map(|h| {
            let stamp = if h < HOURS_PER_DAY {
                [julian(day), (h * 10000) as i32]
            } else {
                [julian(next), 0]
            };
            std::iter::repeat(stamp).take(nvars).flatten()
        })
        .collect()
}

fn global_attrs(
    file: &mut GridFile,
    grid: &GridDescription,
    day: NaiveDate,
    names: &[&str],
    created: NaiveDateTime,
) {
    let shape = (grid.grid.ncols, grid.grid.nrows);
    file.set_attr("IOAPI_VERSION", padded(IOAPI_VERSION, DESC_WIDTH));
    file.set_attr("EXEC_ID", padded(&"?".repeat(NAME_WIDTH), DESC_WIDTH));
    file.set_attr("FTYPE", 1);
    file.set_attr("CDATE", julian(created.date()));
    file.set_attr("CTIME", hhmmss(&created));
    file.set_attr("WDATE", julian(created.date()));
    file.set_attr("WTIME", hhmmss(&created));
    file.set_attr("SDATE", julian(day));
    file.set_attr("STIME", 0);
    file.set_attr("TSTEP", 10000);
    file.set_attr("NTHIK", grid.grid.nthik);
    file.set_attr("NCOLS", shape.0 as i32);
    file.set_attr("NROWS", shape.1 as i32);
    file.set_attr("NLAYS", 1);
    file.set_attr("NVARS", names.len() as i32);
    file.set_attr("GDTYP", grid.coord.gdtyp);
    file.set_attr("P_ALP", grid.coord.p_alp);
    file.set_attr("P_BET", grid.coord.p_bet);
    file.set_attr("P_GAM", grid.coord.p_gam);
    file.set_attr("XCENT", grid.coord.xcent);
    file.set_attr("YCENT", grid.coord.ycent);
    file.set_attr("XORIG", grid.grid.xorig);
    file.set_attr("YORIG", grid.grid.yorig);
    file.set_attr("XCELL", grid.grid.xcell);
    file.set_attr("YCELL", grid.grid.ycell);
    file.set_attr("VGTYP", grid.vgtyp);
    file.set_attr("VGTOP", grid.vgtop);
    file.set_attr("VGLVLS", grid.vglvls.clone());
    file.set_attr("GDNAM", padded(&grid.grid.name, NAME_WIDTH));
    file.set_attr("UPNAM", padded(UPDATE_NAME, NAME_WIDTH));
    let var_list: String = names.iter().map(|n| padded(n, NAME_WIDTH)).collect();
    file.set_attr("VAR-LIST", var_list);
    file.set_attr("FILEDESC", padded(FILE_DESCRIPTION, DESC_WIDTH));
    file.set_attr("HISTORY", "");
}

/// Builds the file of `day` from a trimmed 25-step tensor of per-cell hourly
/// amounts.
pub fn build_cmaq(
    tensor: &EmissionTensor,
    grid: &GridDescription,
    day: NaiveDate,
    created: NaiveDateTime,
) -> Result<GridFile, GridFileError> {
    let shape = tensor.shape();
    if shape.time_steps != STEPS_PER_FILE {
        return Err(GridFileError::Encode(format!(
            "CMAQ day needs {STEPS_PER_FILE} steps, tensor has {}",
            shape.time_steps
        )));
    }
    let expected = GridShape::new(grid.grid.nrows, grid.grid.ncols);
    if shape.grid != expected {
        return Err(GridFileError::GridDesc(format!(
            "tensor grid is {}x{}, GRIDDESC grid {} is {}x{}",
            shape.grid.nrow, shape.grid.ncol, grid.grid.name, expected.nrow, expected.ncol
        )));
    }
    let names: Vec<&str> = tensor.names().collect();

    let mut file = GridFile::new();
    file.add_dimension("TSTEP", STEPS_PER_FILE, true)?;
    file.add_dimension("DATE-TIME", 2, false)?;
    file.add_dimension("LAY", 1, false)?;
    file.add_dimension("VAR", names.len(), false)?;
    file.add_dimension("ROW", shape.grid.nrow, false)?;
    file.add_dimension("COL", shape.grid.ncol, false)?;

    file.add_variable(
        GridVariable::new(
            "TFLAG",
            &["TSTEP", "VAR", "DATE-TIME"],
            VarData::I32(tflag(day, names.len())),
        )
        .with_attr("units", "<YYYYDDD,HHMMSS>")
        .with_attr("long_name", padded("TFLAG", NAME_WIDTH))
        .with_attr(
            "var_desc",
            padded("Timestep-valid flags:  (1) YYYYDDD or (2) HHMMSS", DESC_WIDTH),
        ),
    )?;

    for (name, var) in tensor.iter() {
        let units = match var.phase {
            Phase::Gas => GAS_UNITS,
            Phase::Aerosol => AEROSOL_UNITS,
        };
        // mol h⁻¹ -> mol s⁻¹, g h⁻¹ -> g s⁻¹
        let data = var
            .data
            .iter()
            .map(|v| (v / SECONDS_PER_HOUR) as f32)
            .collect();
        file.add_variable(
            GridVariable::new(name, &["TSTEP", "LAY", "ROW", "COL"], VarData::F32(data))
                .with_attr("long_name", padded(name, NAME_WIDTH))
                .with_attr("units", units)
                .with_attr("var_desc", padded(&format!("Model species {name}"), DESC_WIDTH)),
        )?;
    }

    global_attrs(&mut file, grid, day, &names, created);
    Ok(file)
}

pub fn cmaq_file_name(day: NaiveDate) -> String {
    format!("cmaq_emissions_{}.grd", day.format("%Y%m%d"))
}

/// Builds (and, when `config.write_files`, writes) one CMAQ file per day of
/// the run. Requires a week profile.
pub fn cmaq_files<P: EmissionProvider + ?Sized>(
    provider: &P,
    geometry: &GridGeometry,
    config: &RunConfig,
    grid: &GridDescription,
    btrim: usize,
) -> Result<Vec<NamedGridFile>, GridFileError> {
    cmaq_files_at(provider, geometry, config, grid, btrim, Local::now().naive_local())
}

pub(crate) fn cmaq_files_at<P: EmissionProvider + ?Sized>(
    provider: &P,
    geometry: &GridGeometry,
    config: &RunConfig,
    grid: &GridDescription,
    btrim: usize,
    created: NaiveDateTime,
) -> Result<Vec<NamedGridFile>, GridFileError> {
    geometry.ensure_shape(provider.grid())?;
    let week = config.require_week_profile()?;
    let range = config.date_range()?;
    trimmed_shape(provider.grid(), grid, btrim)?;

    let mut files = Vec::with_capacity(range.num_days());
    for day in range.days() {
        let plan = TimePlan::cmaq_day(week.factor_for(day));
        let tensor = trim(&provider.emission_tensor_with(&plan, &config.keys)?, btrim + 1)?;
        debug!("CMAQ day {day}: {} variables", tensor.len());
        files.push(NamedGridFile {
            name: cmaq_file_name(day),
            file: build_cmaq(&tensor, grid, day, created)?,
        });
    }

    if config.write_files {
        write_all(&files, &config.output_dir, config.compress)?;
    }
    info!(
        "Built {} CMAQ file(s) for {} on grid {}",
        files.len(),
        provider.name(),
        grid.grid.name
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::griddesc::GridDesc;

    const GRIDDESC: &str = "' '
'LAM'
  2  -20.0  -25.0  -47.0  -47.0  -23.0
' '
'SMALL'
'LAM'  -3000.0  -2000.0  1000.0  1000.0  3  2  1
' '
";

    fn grid() -> GridDescription {
        GridDesc::parse(GRIDDESC).unwrap().grid("SMALL").unwrap()
    }

    fn created() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap()
    }

    /// 25 steps on a 6x7 grid (btrim 1 leaves 2x3), value = step + 1 inside
    /// the kept area and 1000 on the border.
    fn tensor() -> EmissionTensor {
        let shape = TensorShape::new(STEPS_PER_FILE, GridShape::new(6, 7));
        let mut data = vec![1000.0; shape.len()];
        for t in 0..STEPS_PER_FILE {
            for row in 2..4 {
                for col in 2..5 {
                    data[shape.index(t, row, col)] = 3600.0 * (t + 1) as f64;
                }
            }
        }
        let mut t = EmissionTensor::new(shape);
        t.accumulate("NO", Phase::Gas, &data).unwrap();
        t.accumulate("PMFINE", Phase::Aerosol, &data).unwrap();
        t
    }

    #[test]
    fn test_trimmed_shape() {
        assert_eq!(
            trimmed_shape(GridShape::new(6, 7), &grid(), 1).unwrap(),
            GridShape::new(2, 3)
        );
        let err = trimmed_shape(GridShape::new(6, 7), &grid(), 0).unwrap_err();
        assert!(err.is_configuration(), "got: {err}");
        assert!(trimmed_shape(GridShape::new(4, 4), &grid(), 1).is_err());
    }

    #[test]
    fn test_trim_keeps_interior() {
        let trimmed = trim(&tensor(), 2).unwrap();
        assert_eq!(trimmed.shape().grid, GridShape::new(2, 3));
        assert!(trimmed.get("NO").unwrap().data[..6]
            .iter()
            .all(|v| *v == 3600.0));
        assert!(trimmed.get("NO").unwrap().data.iter().all(|v| *v != 1000.0));
    }

    #[test]
    fn test_units_and_variable_attrs() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let f = build_cmaq(&trim(&tensor(), 2).unwrap(), &grid(), day, created()).unwrap();
        let no = f.variable("NO").unwrap();
        let data = no.data.as_f32().unwrap();
        assert_eq!(data[0], 1.0);
        assert_eq!(data[24 * 6], 25.0);
        assert_eq!(no.attr("units").unwrap().as_text(), Some(GAS_UNITS));
        assert_eq!(no.attr("long_name").unwrap().as_text().unwrap().len(), 16);
        let pm = f.variable("PMFINE").unwrap();
        assert_eq!(pm.attr("units").unwrap().as_text(), Some(AEROSOL_UNITS));
        let desc = pm.attr("var_desc").unwrap().as_text().unwrap();
        assert!(desc.starts_with("Model species PMFINE") && desc.len() == 80, "got: {desc:?}");
    }

    #[test]
    fn test_tflag() {
        let day = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let f = build_cmaq(&trim(&tensor(), 2).unwrap(), &grid(), day, created()).unwrap();
        let tflag = f.variable("TFLAG").unwrap();
        assert_eq!(tflag.dims, vec!["TSTEP", "VAR", "DATE-TIME"]);
        let v = tflag.data.as_i32().unwrap();
        assert_eq!(v.len(), 25 * 2 * 2);
        assert_eq!(&v[..4], &[2024366, 0, 2024366, 0]);
        // Step 13, second variable.
        assert_eq!(&v[13 * 4 + 2..13 * 4 + 4], &[2024366, 130000]);
        assert_eq!(&v[24 * 4..24 * 4 + 2], &[2025001, 0]);
    }

    #[test]
    fn test_global_attrs() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let f = build_cmaq(&trim(&tensor(), 2).unwrap(), &grid(), day, created()).unwrap();
        assert_eq!(f.attr("SDATE").unwrap().as_int(), Some(2024061));
        assert_eq!(f.attr("CDATE").unwrap().as_int(), Some(2024123));
        assert_eq!(f.attr("CTIME").unwrap().as_int(), Some(90507));
        assert_eq!(f.attr("NCOLS").unwrap().as_int(), Some(3));
        assert_eq!(f.attr("NROWS").unwrap().as_int(), Some(2));
        assert_eq!(f.attr("NVARS").unwrap().as_int(), Some(2));
        assert_eq!(f.attr("GDTYP").unwrap().as_int(), Some(2));
        assert_eq!(f.attr("XORIG").unwrap().as_float(), Some(-3000.0));
        assert_eq!(f.attr("VGTYP").unwrap().as_int(), Some(-9999));
        let var_list = f.attr("VAR-LIST").unwrap().as_text().unwrap();
        assert_eq!(var_list, format!("{:<16}{:<16}", "NO", "PMFINE"));
        assert_eq!(f.attr("FILEDESC").unwrap().as_text().unwrap().len(), 80);
        assert_eq!(f.attr("GDNAM").unwrap().as_text(), Some("SMALL           "));
    }

    #[test]
    fn test_wrong_step_count() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let short = EmissionTensor::new(TensorShape::new(24, GridShape::new(2, 3)));
        assert!(build_cmaq(&short, &grid(), day, created()).is_err());
    }

    #[test]
    fn test_file_name() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(cmaq_file_name(day), "cmaq_emissions_20240309.grd");
    }
}
