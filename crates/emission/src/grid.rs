//! Grid shape, normalized spatial weights and the external grid geometry.
//!
//! Every 2D field in the crate is a flat `Vec<f64>` indexed by
//! `row * ncol + col`, rows running south to north and columns west to east.

use serde::{Deserialize, Serialize};

use crate::error::{check_non_negative, EmissionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    /// Number of rows (south_north).
    pub nrow: usize,
    /// Number of columns (west_east).
    pub ncol: usize,
}

impl GridShape {
    pub fn new(nrow: usize, ncol: usize) -> Self {
        Self { nrow, ncol }
    }

    pub fn cells(&self) -> usize {
        self.nrow * self.ncol
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.ncol + col
    }

    pub(crate) fn dims(&self) -> (usize, usize) {
        (self.nrow, self.ncol)
    }

    /// Fails with a configuration error unless `other` is the same shape.
    pub fn ensure_matches(&self, other: GridShape, what: &str) -> Result<(), EmissionError> {
        if *self == other {
            Ok(())
        } else {
            Err(EmissionError::ShapeMismatch {
                what: what.to_string(),
                expected: self.dims(),
                found: other.dims(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// SpatialWeight
// ---------------------------------------------------------------------------

/// Non-negative weights over the grid, normalized to sum 1.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialWeight {
    shape: GridShape,
    weights: Vec<f64>,
}

impl SpatialWeight {
    /// Builds a weight grid from row-major raw values and normalizes it.
    ///
    /// `values.len()` must equal `shape.cells()`. Raw values only need to be
    /// non-negative with a positive sum.
    pub fn new(shape: GridShape, values: Vec<f64>) -> Result<Self, EmissionError> {
        if values.len() != shape.cells() {
            return Err(EmissionError::Configuration(format!(
                "spatial weight has {} cells, grid {}x{} needs {}",
                values.len(),
                shape.nrow,
                shape.ncol,
                shape.cells()
            )));
        }
        for (i, &v) in values.iter().enumerate() {
            check_non_negative(
                format!("spatial weight at row {} col {}", i / shape.ncol, i % shape.ncol),
                v,
            )?;
        }
        let total: f64 = values.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(EmissionError::ZeroWeightSum);
        }
        let weights = values.into_iter().map(|v| v / total).collect();
        Ok(Self { shape, weights })
    }

    /// Builds a weight grid from nested rows (`rows[r][c]`).
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, EmissionError> {
        let nrow = rows.len();
        let ncol = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != ncol) {
            return Err(EmissionError::Configuration(format!(
                "ragged spatial weight rows ({} and {} columns)",
                ncol,
                bad.len()
            )));
        }
        Self::new(GridShape::new(nrow, ncol), rows.concat())
    }

    /// Equal weight in every cell.
    pub fn uniform(shape: GridShape) -> Result<Self, EmissionError> {
        Self::new(shape, vec![1.0; shape.cells()])
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.weights[self.shape.index(row, col)]
    }

    /// Distributes `total` over the cells.
    pub fn distribute(&self, total: f64) -> Vec<f64> {
        self.weights.iter().map(|w| w * total).collect()
    }
}

// ---------------------------------------------------------------------------
// GridGeometry
// ---------------------------------------------------------------------------

/// A global attribute copied from the meteorological grid into output files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeometryAttr {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Grid geometry of the meteorological domain the emissions are built for.
///
/// This is the information normally read from a WRF `wrfinput` file; the
/// reader itself is external, callers hand the values in (or load them from
/// JSON with [`GridGeometry::from_json_str`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub nrow: usize,
    pub ncol: usize,
    /// Cell size in metres along west_east.
    pub dx: f64,
    /// Cell size in metres along south_north.
    pub dy: f64,
    #[serde(default = "default_grid_id")]
    pub grid_id: u32,
    #[serde(default)]
    pub map_proj: i32,
    #[serde(default)]
    pub truelat1: f64,
    #[serde(default)]
    pub truelat2: f64,
    #[serde(default)]
    pub stand_lon: f64,
    #[serde(default)]
    pub cen_lat: f64,
    #[serde(default)]
    pub cen_lon: f64,
    /// Cell-centre latitudes, row-major.
    #[serde(default)]
    pub xlat: Vec<f64>,
    /// Cell-centre longitudes, row-major.
    #[serde(default)]
    pub xlong: Vec<f64>,
    /// Any further global attributes to carry into output files.
    #[serde(default)]
    pub extra_attrs: Vec<(String, GeometryAttr)>,
}

fn default_grid_id() -> u32 {
    1
}

impl GridGeometry {
    /// Regular lat/lon geometry, mainly for tests and synthetic domains.
    ///
    /// `origin` is the centre of cell (0, 0); `step` is in degrees, `dx` in metres.
    pub fn regular(shape: GridShape, origin: (f64, f64), step: f64, dx: f64) -> Self {
        let mut xlat = Vec::with_capacity(shape.cells());
        let mut xlong = Vec::with_capacity(shape.cells());
        for row in 0..shape.nrow {
            for col in 0..shape.ncol {
                xlat.push(origin.0 + row as f64 * step);
                xlong.push(origin.1 + col as f64 * step);
            }
        }
        Self {
            nrow: shape.nrow,
            ncol: shape.ncol,
            dx,
            dy: dx,
            grid_id: 1,
            map_proj: 0,
            truelat1: 0.0,
            truelat2: 0.0,
            stand_lon: 0.0,
            cen_lat: origin.0,
            cen_lon: origin.1,
            xlat,
            xlong,
            extra_attrs: Vec::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, EmissionError> {
        let geometry: GridGeometry = serde_json::from_str(json)
            .map_err(|e| EmissionError::Configuration(format!("grid geometry: {e}")))?;
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn shape(&self) -> GridShape {
        GridShape::new(self.nrow, self.ncol)
    }

    /// Cell area in km².
    pub fn cell_area_km2(&self) -> f64 {
        (self.dx / 1000.0) * (self.dy / 1000.0)
    }

    /// Checks cell size and coordinate array lengths.
    pub fn validate(&self) -> Result<(), EmissionError> {
        if !(self.dx > 0.0 && self.dy > 0.0) {
            return Err(EmissionError::Configuration(format!(
                "grid cell size must be positive, got dx={} dy={}",
                self.dx, self.dy
            )));
        }
        let cells = self.shape().cells();
        for (name, coords) in [("XLAT", &self.xlat), ("XLONG", &self.xlong)] {
            if !coords.is_empty() && coords.len() != cells {
                return Err(EmissionError::Configuration(format!(
                    "{name} has {} values, grid has {cells} cells",
                    coords.len()
                )));
            }
        }
        for (name, value) in &self.extra_attrs {
            if let GeometryAttr::Int(v) = value {
                if i32::try_from(*v).is_err() {
                    return Err(EmissionError::Configuration(format!(
                        "global attribute {name} = {v} does not fit a 32-bit integer"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Fails unless the geometry covers exactly `shape`.
    pub fn ensure_shape(&self, shape: GridShape) -> Result<(), EmissionError> {
        self.validate()?;
        self.shape().ensure_matches(shape, "emission grid")
    }

    /// Index of the cell whose centre is nearest to (lat, lon), if the point
    /// lies within one cell diagonal of that centre.
    pub fn nearest_cell(&self, lat: f64, lon: f64) -> Option<usize> {
        if self.xlat.is_empty() || self.xlat.len() != self.xlong.len() {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;
        for (i, (&clat, &clon)) in self.xlat.iter().zip(&self.xlong).enumerate() {
            let d2 = (clat - lat).powi(2) + (clon - lon).powi(2);
            if best.map_or(true, |(_, b)| d2 < b) {
                best = Some((i, d2));
            }
        }
        let (idx, d2) = best?;
        (d2 <= self.max_snap_distance_sq(idx)).then_some(idx)
    }

    /// Squared diagonal of the cell at `idx`, in degrees, estimated from its
    /// neighbours.
    fn max_snap_distance_sq(&self, idx: usize) -> f64 {
        let row = idx / self.ncol;
        let col = idx % self.ncol;
        let step = |a: usize, b: usize| {
            ((self.xlat[a] - self.xlat[b]).powi(2) + (self.xlong[a] - self.xlong[b]).powi(2)).sqrt()
        };
        let ds_col = if self.ncol > 1 {
            let other = if col + 1 < self.ncol { idx + 1 } else { idx - 1 };
            step(idx, other)
        } else {
            0.0
        };
        let ds_row = if self.nrow > 1 {
            let other = if row + 1 < self.nrow {
                idx + self.ncol
            } else {
                idx - self.ncol
            };
            step(idx, other)
        } else {
            0.0
        };
        let ds = ds_col.max(ds_row);
        if ds == 0.0 {
            f64::INFINITY
        } else {
            // Half a cell each way, times a diagonal.
            (ds * std::f64::consts::SQRT_2 / 2.0).powi(2)
        }
    }
}
