//! Readers for delimited input tables: spatial proxies and point sources.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::EmissionError;
use crate::grid::{GridGeometry, GridShape, SpatialWeight};
use crate::source::PointPollutant;
use crate::units::ktn_year_to_g_day;

/// Column separator of a delimited table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Separator {
    /// Any run of spaces or tabs.
    Whitespace,
    Char(char),
}

impl Separator {
    fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Separator::Whitespace => line.split_whitespace().collect(),
            Separator::Char(c) => line.split(*c).map(str::trim).collect(),
        }
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, EmissionError> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }
    Ok(lines)
}

fn parse_number(field: Option<&&str>, line: usize, column: &str) -> Result<f64, EmissionError> {
    let field = field.ok_or_else(|| EmissionError::Parse {
        line,
        msg: format!("missing column {column}"),
    })?;
    field.parse::<f64>().map_err(|e| EmissionError::Parse {
        line,
        msg: format!("column {column}: '{field}': {e}"),
    })
}

// ---------------------------------------------------------------------------
// Spatial proxy
// ---------------------------------------------------------------------------

/// Column layout of a header-less spatial proxy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyLayout {
    pub columns: Vec<String>,
    /// Column holding the weight.
    pub weight_column: String,
    pub separator: Separator,
}

impl Default for ProxyLayout {
    fn default() -> Self {
        Self {
            columns: ["id", "x", "y", "urban"].map(String::from).to_vec(),
            weight_column: "urban".to_string(),
            separator: Separator::Whitespace,
        }
    }
}

impl ProxyLayout {
    fn weight_index(&self) -> Result<usize, EmissionError> {
        self.columns
            .iter()
            .position(|c| *c == self.weight_column)
            .ok_or_else(|| {
                EmissionError::Configuration(format!(
                    "weight column '{}' is not one of {:?}",
                    self.weight_column, self.columns
                ))
            })
    }
}

/// Parses proxy rows (one per grid cell, row-major, south-west first) into
/// normalized spatial weights.
pub fn parse_spatial_proxy(
    text: &str,
    shape: GridShape,
    layout: &ProxyLayout,
) -> Result<SpatialWeight, EmissionError> {
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    spatial_proxy_from_lines(&lines, shape, layout)
}

pub fn read_spatial_proxy(
    path: &Path,
    shape: GridShape,
    layout: &ProxyLayout,
) -> Result<SpatialWeight, EmissionError> {
    let weight = spatial_proxy_from_lines(&read_lines(path)?, shape, layout)?;
    info!("Read spatial proxy {} ({}x{})", path.display(), shape.nrow, shape.ncol);
    Ok(weight)
}

fn spatial_proxy_from_lines(
    lines: &[String],
    shape: GridShape,
    layout: &ProxyLayout,
) -> Result<SpatialWeight, EmissionError> {
    let col = layout.weight_index()?;
    let mut values = Vec::with_capacity(shape.cells());
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = layout.separator.split(line);
        values.push(parse_number(fields.get(col), i + 1, &layout.weight_column)?);
    }
    if values.len() != shape.cells() {
        return Err(EmissionError::Configuration(format!(
            "spatial proxy has {} rows, grid {}x{} needs {}",
            values.len(),
            shape.nrow,
            shape.ncol,
            shape.cells()
        )));
    }
    SpatialWeight::new(shape, values)
}

// ---------------------------------------------------------------------------
// Point sources
// ---------------------------------------------------------------------------

/// Layout of a point-source table (header line required).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointTableLayout {
    pub separator: Separator,
    pub lat_name: String,
    pub lon_name: String,
}

impl Default for PointTableLayout {
    fn default() -> Self {
        Self {
            separator: Separator::Char('\t'),
            lat_name: "LAT".to_string(),
            lon_name: "LON".to_string(),
        }
    }
}

/// Point emissions aggregated into grid cells, kTn year⁻¹ per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedPoints {
    pub grid: GridShape,
    /// Pollutant name and per-cell annual totals, in table column order.
    pub pollutants: Vec<(String, Vec<f64>)>,
    /// Points that fell outside the domain.
    pub dropped: usize,
}

impl GriddedPoints {
    pub fn names(&self) -> Vec<&str> {
        self.pollutants.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Annual total of one pollutant over the domain.
    pub fn total(&self, pollutant: &str) -> Option<f64> {
        self.pollutants
            .iter()
            .find(|(n, _)| n == pollutant)
            .map(|(_, cells)| cells.iter().sum())
    }

    /// Converts to daily grams per cell, attaching molecular weights.
    pub fn into_pollutants(
        self,
        molecular_weights: &BTreeMap<String, f64>,
    ) -> Result<Vec<PointPollutant>, EmissionError> {
        self.pollutants
            .into_iter()
            .map(|(name, cells)| {
                let molecular_weight = *molecular_weights.get(&name).ok_or_else(|| {
                    EmissionError::Configuration(format!("no molecular weight for {name}"))
                })?;
                Ok(PointPollutant {
                    daily_cells: cells.into_iter().map(ktn_year_to_g_day).collect(),
                    name,
                    molecular_weight,
                })
            })
            .collect()
    }
}

pub fn parse_point_table(
    text: &str,
    geometry: &GridGeometry,
    layout: &PointTableLayout,
) -> Result<GriddedPoints, EmissionError> {
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    points_from_lines(&lines, geometry, layout)
}

pub fn read_point_table(
    path: &Path,
    geometry: &GridGeometry,
    layout: &PointTableLayout,
) -> Result<GriddedPoints, EmissionError> {
    let points = points_from_lines(&read_lines(path)?, geometry, layout)?;
    info!(
        "Read {} point-source pollutants from {}",
        points.pollutants.len(),
        path.display()
    );
    Ok(points)
}

fn points_from_lines(
    lines: &[String],
    geometry: &GridGeometry,
    layout: &PointTableLayout,
) -> Result<GriddedPoints, EmissionError> {
    geometry.validate()?;
    if geometry.xlat.is_empty() {
        return Err(EmissionError::Configuration(
            "grid geometry has no cell coordinates to place point sources".to_string(),
        ));
    }
    let mut rows = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());
    let Some((_, header)) = rows.next() else {
        return Err(EmissionError::Parse {
            line: 1,
            msg: "point-source table is empty".to_string(),
        });
    };
    let header = layout.separator.split(header);
    let find = |name: &str| {
        header.iter().position(|h| *h == name).ok_or_else(|| {
            EmissionError::Configuration(format!("point-source table has no column {name}"))
        })
    };
    let lat_col = find(&layout.lat_name)?;
    let lon_col = find(&layout.lon_name)?;
    let pollutant_cols: Vec<(usize, &str)> = header
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != lat_col && *i != lon_col)
        .map(|(i, h)| (i, *h))
        .collect();

    let grid = geometry.shape();
    let mut sums = vec![vec![0.0; grid.cells()]; pollutant_cols.len()];
    let mut dropped = 0;
    for (i, line) in rows {
        let fields = layout.separator.split(line);
        let lat = parse_number(fields.get(lat_col), i + 1, &layout.lat_name)?;
        let lon = parse_number(fields.get(lon_col), i + 1, &layout.lon_name)?;
        let Some(cell) = geometry.nearest_cell(lat, lon) else {
            warn!("Point source at ({lat}, {lon}) on line {} is outside the domain", i + 1);
            dropped += 1;
            continue;
        };
        for (sum, &(col, name)) in sums.iter_mut().zip(&pollutant_cols) {
            let v = parse_number(fields.get(col), i + 1, name)?;
            if !(v.is_finite() && v >= 0.0) {
                return Err(EmissionError::InvalidValue {
                    what: format!("{name} on line {}", i + 1),
                    value: v,
                });
            }
            sum[cell] += v;
        }
    }
    if dropped > 0 {
        warn!("Dropped {dropped} point sources outside the domain");
    }
    Ok(GriddedPoints {
        grid,
        pollutants: pollutant_cols
            .into_iter()
            .map(|(_, n)| n.to_string())
            .zip(sums)
            .collect(),
        dropped,
    })
}
