//! Self-describing gridded dataset: named dimensions, typed variables and
//! attributes, the in-memory form of every file the adapters produce.

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::GridFileError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
    /// Record dimension (time) that files may be concatenated along.
    pub unlimited: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum AttrValue {
    Text(String),
    Int(i32),
    Float(f64),
    Floats(Vec<f64>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        AttrValue::Floats(v)
    }
}

/// Ordered name/value attribute list.
pub type Attributes = Vec<(String, AttrValue)>;

fn find_attr<'a>(attrs: &'a Attributes, name: &str) -> Option<&'a AttrValue> {
    attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

fn set_attr(attrs: &mut Attributes, name: &str, value: AttrValue) {
    match attrs.iter_mut().find(|(n, _)| n == name) {
        Some((_, v)) => *v = value,
        None => attrs.push((name.to_string(), value)),
    }
}

/// Flat, row-major variable data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum VarData {
    F32(Vec<f32>),
    I32(Vec<i32>),
    /// Fixed-width character arrays, one byte per element.
    Char(Vec<u8>),
}

impl VarData {
    pub fn len(&self) -> usize {
        match self {
            VarData::F32(v) => v.len(),
            VarData::I32(v) => v.len(),
            VarData::Char(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            VarData::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            VarData::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_chars(&self) -> Option<&[u8]> {
        match self {
            VarData::Char(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct GridVariable {
    pub name: String,
    /// Dimension names, slowest varying first.
    pub dims: Vec<String>,
    pub data: VarData,
    pub attributes: Attributes,
}

impl GridVariable {
    pub fn new(name: &str, dims: &[&str], data: VarData) -> Self {
        Self {
            name: name.to_string(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data,
            attributes: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        set_attr(&mut self.attributes, name, value.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        find_attr(&self.attributes, name)
    }
}

/// A gridded dataset ready to be encoded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct GridFile {
    pub dimensions: Vec<Dimension>,
    pub variables: Vec<GridVariable>,
    pub attributes: Attributes,
}

impl GridFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a dimension; redeclaring with a different length fails.
    pub fn add_dimension(&mut self, name: &str, len: usize, unlimited: bool) -> Result<(), GridFileError> {
        if let Some(existing) = self.dimension(name) {
            if existing.len != len {
                return Err(GridFileError::Encode(format!(
                    "dimension {name} redeclared with length {len} (was {})",
                    existing.len
                )));
            }
            return Ok(());
        }
        self.dimensions.push(Dimension {
            name: name.to_string(),
            len,
            unlimited,
        });
        Ok(())
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Adds a variable after checking its data length against its dimensions.
    pub fn add_variable(&mut self, variable: GridVariable) -> Result<(), GridFileError> {
        if self.variable(&variable.name).is_some() {
            return Err(GridFileError::Encode(format!(
                "variable {} declared twice",
                variable.name
            )));
        }
        self.check_variable(&variable)
            .map_err(GridFileError::Encode)?;
        self.variables.push(variable);
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Option<&GridVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<AttrValue>) {
        set_attr(&mut self.attributes, name, value.into());
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        find_attr(&self.attributes, name)
    }

    /// Product of the named dimension lengths.
    pub fn shape_len(&self, dims: &[String]) -> Result<usize, String> {
        dims.iter().try_fold(1usize, |acc, d| {
            self.dimension(d)
                .map(|dim| acc * dim.len)
                .ok_or_else(|| format!("unknown dimension {d}"))
        })
    }

    fn check_variable(&self, variable: &GridVariable) -> Result<(), String> {
        let expected = self
            .shape_len(&variable.dims)
            .map_err(|e| format!("variable {}: {e}", variable.name))?;
        if variable.data.len() != expected {
            return Err(format!(
                "variable {} has {} values, dimensions {:?} need {expected}",
                variable.name,
                variable.data.len(),
                variable.dims
            ));
        }
        Ok(())
    }

    /// Checks every variable against the declared dimensions.
    pub fn validate(&self) -> Result<(), String> {
        self.variables
            .iter()
            .try_for_each(|v| self.check_variable(v))
    }

    /// Copy holding only records `start..end` of the unlimited dimension.
    pub fn slice_records(&self, start: usize, end: usize) -> Result<GridFile, GridFileError> {
        let record = self
            .dimensions
            .iter()
            .find(|d| d.unlimited)
            .ok_or_else(|| GridFileError::Encode("no record dimension to slice".to_string()))?;
        if start > end || end > record.len {
            return Err(GridFileError::Encode(format!(
                "record range {start}..{end} outside 0..{}",
                record.len
            )));
        }
        let record_name = record.name.clone();

        let mut out = GridFile {
            dimensions: self.dimensions.clone(),
            variables: Vec::with_capacity(self.variables.len()),
            attributes: self.attributes.clone(),
        };
        for d in &mut out.dimensions {
            if d.name == record_name {
                d.len = end - start;
            }
        }
        for v in &self.variables {
            if v.dims.first() != Some(&record_name) {
                out.variables.push(v.clone());
                continue;
            }
            let per_record = self
                .shape_len(&v.dims[1..])
                .map_err(GridFileError::Encode)?;
            let range = start * per_record..end * per_record;
            let data = match &v.data {
                VarData::F32(d) => VarData::F32(d[range].to_vec()),
                VarData::I32(d) => VarData::I32(d[range].to_vec()),
                VarData::Char(d) => VarData::Char(d[range].to_vec()),
            };
            out.variables.push(GridVariable {
                name: v.name.clone(),
                dims: v.dims.clone(),
                data,
                attributes: v.attributes.clone(),
            });
        }
        Ok(out)
    }
}
