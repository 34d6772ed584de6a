//! Emission tensors: one (time, row, col) field per emitted variable.

use std::collections::BTreeMap;

use crate::error::EmissionError;
use crate::grid::GridShape;

/// Whether a variable is counted in moles (gas) or grams (aerosol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// mol h⁻¹ per cell.
    Gas,
    /// g h⁻¹ per cell.
    Aerosol,
}

/// Dimensions shared by all variables of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorShape {
    pub time_steps: usize,
    pub grid: GridShape,
}

impl TensorShape {
    pub fn new(time_steps: usize, grid: GridShape) -> Self {
        Self { time_steps, grid }
    }

    pub fn len(&self) -> usize {
        self.time_steps * self.grid.cells()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self, t: usize, row: usize, col: usize) -> usize {
        t * self.grid.cells() + self.grid.index(row, col)
    }

    fn dims(&self) -> (usize, usize, usize) {
        (self.time_steps, self.grid.nrow, self.grid.ncol)
    }
}

/// One emitted variable, laid out `[t][row][col]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub phase: Phase,
    pub data: Vec<f64>,
}

impl Variable {
    pub fn total(&self) -> f64 {
        self.data.iter().sum()
    }
}

/// Per-cell hourly emissions for every emitted variable, keyed by name.
///
/// Gas-phase variables are in mol h⁻¹ per cell and aerosol variables in
/// g h⁻¹ per cell; format adapters convert to flux units on write.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionTensor {
    shape: TensorShape,
    variables: BTreeMap<String, Variable>,
}

impl EmissionTensor {
    pub fn new(shape: TensorShape) -> Self {
        Self {
            shape,
            variables: BTreeMap::new(),
        }
    }

    pub fn shape(&self) -> TensorShape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Adds `data` into variable `name`, creating it when absent.
    pub fn accumulate(&mut self, name: &str, phase: Phase, data: &[f64]) -> Result<(), EmissionError> {
        if data.len() != self.shape.len() {
            return Err(EmissionError::Configuration(format!(
                "variable {name} has {} values, tensor needs {}",
                data.len(),
                self.shape.len()
            )));
        }
        match self.variables.get_mut(name) {
            Some(var) => {
                if var.phase != phase {
                    return Err(EmissionError::PhaseConflict(name.to_string()));
                }
                for (acc, v) in var.data.iter_mut().zip(data) {
                    *acc += v;
                }
            }
            None => {
                self.variables.insert(
                    name.to_string(),
                    Variable {
                        phase,
                        data: data.to_vec(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Elementwise sum of `other` into `self`; variables missing on either
    /// side count as zero.
    pub fn add(&mut self, other: &EmissionTensor) -> Result<(), EmissionError> {
        self.ensure_same_shape(other)?;
        for (name, var) in &other.variables {
            self.accumulate(name, var.phase, &var.data)?;
        }
        Ok(())
    }

    pub fn ensure_same_shape(&self, other: &EmissionTensor) -> Result<(), EmissionError> {
        if self.shape == other.shape {
            Ok(())
        } else {
            Err(EmissionError::TensorShapeMismatch {
                expected: self.shape.dims(),
                found: other.shape.dims(),
            })
        }
    }

    /// Sum over space and time of one variable (0 when absent).
    pub fn total(&self, name: &str) -> f64 {
        self.variables.get(name).map_or(0.0, Variable::total)
    }

    /// The 2D field of `name` at step `t`.
    pub fn step(&self, name: &str, t: usize) -> Option<&[f64]> {
        let cells = self.shape.grid.cells();
        self.variables
            .get(name)
            .map(|v| &v.data[t * cells..(t + 1) * cells])
    }

    /// Sum over time of one variable, per cell.
    pub fn cell_totals(&self, name: &str) -> Vec<f64> {
        let cells = self.shape.grid.cells();
        let mut out = vec![0.0; cells];
        if let Some(var) = self.variables.get(name) {
            for chunk in var.data.chunks(cells) {
                for (o, v) in out.iter_mut().zip(chunk) {
                    *o += v;
                }
            }
        }
        out
    }
}
