//! Ordered collections of sources summed into one tensor set.

use std::fmt;

use tracing::debug;

use crate::error::EmissionError;
use crate::grid::GridShape;
use crate::pollutant::KeyOverride;
use crate::profile::TimePlan;
use crate::report::EmissionReport;
use crate::source::{EmissionProvider, Source};
use crate::tensor::EmissionTensor;

/// Sources combined additively. Repeated names are kept and summed.
#[derive(Debug, Clone, Default)]
pub struct SourceGroup {
    name: String,
    sources: Vec<Source>,
}

impl SourceGroup {
    pub fn new(name: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            name: name.into(),
            sources,
        }
    }

    pub fn push(&mut self, source: impl Into<Source>) {
        self.sources.push(source.into());
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Source names in order.
    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Sum of `total_emission` over the sources that emit `pollutant`.
    pub fn total_emission(&self, pollutant: &str) -> Option<f64> {
        self.sources
            .iter()
            .filter_map(|s| s.total_emission(pollutant))
            .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
    }

    fn ensure_common_grid(&self) -> Result<GridShape, EmissionError> {
        let first = self.sources.first().ok_or_else(|| {
            EmissionError::Configuration(format!("source group {} is empty", self.name))
        })?;
        let grid = first.grid();
        for s in &self.sources[1..] {
            grid.ensure_matches(s.grid(), &format!("grid of source {}", s.name()))?;
        }
        Ok(grid)
    }
}

impl EmissionProvider for SourceGroup {
    fn name(&self) -> &str {
        &self.name
    }

    /// Grid of the first source; (0, 0) for an empty group.
    fn grid(&self) -> GridShape {
        self.sources
            .first()
            .map_or(GridShape::new(0, 0), |s| s.grid())
    }

    fn emission_tensor_with(
        &self,
        plan: &TimePlan,
        keys: &KeyOverride,
    ) -> Result<EmissionTensor, EmissionError> {
        self.ensure_common_grid()?;
        let tensors = self
            .sources
            .iter()
            .map(|s| s.emission_tensor_with(plan, keys))
            .collect::<Result<Vec<_>, _>>()?;

        let mut iter = tensors.into_iter();
        let Some(mut total) = iter.next() else {
            return Err(EmissionError::Configuration(format!(
                "source group {} is empty",
                self.name
            )));
        };
        let rest: Vec<EmissionTensor> = iter.collect();
        for t in &rest {
            total.ensure_same_shape(t)?;
        }
        for t in &rest {
            total.add(t)?;
        }
        debug!(
            "Summed {} sources of group {} into {} variables",
            self.sources.len(),
            self.name,
            total.len()
        );
        Ok(total)
    }

    fn report(&self) -> EmissionReport {
        let mut report = EmissionReport::default();
        for s in &self.sources {
            report.extend(s.report());
        }
        report
    }
}

impl fmt::Display for SourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Group name: {}", self.name)?;
        writeln!(f, "Sources: {:?}", self.names())
    }
}
