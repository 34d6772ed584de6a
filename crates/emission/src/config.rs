//! Run configuration shared by the output adapters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::calendar::DateRange;
use crate::error::EmissionError;
use crate::pollutant::KeyOverride;
use crate::profile::{TimePlan, WeekProfile};

pub const DEFAULT_OUTPUT_DIR: &str = "results";

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

/// Dates, profiles and output options of one emission run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// First day, `YYYY-MM-DD`.
    pub start_date: String,
    /// Last day (inclusive), `YYYY-MM-DD`.
    pub end_date: String,
    /// Monday-first day multipliers. Absent means a representative day.
    #[serde(default)]
    pub week_profile: Option<WeekProfile>,
    /// `voc_name` / `pm_name` replacing every source's lumped keys.
    #[serde(flatten)]
    pub keys: KeyOverride,
    /// Write files to `output_dir`; otherwise only return them.
    #[serde(default = "default_true")]
    pub write_files: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// LZ4-compress the grid file payload.
    #[serde(default = "default_true")]
    pub compress: bool,
}

impl RunConfig {
    pub fn new(start_date: &str, end_date: &str) -> Self {
        Self {
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            week_profile: None,
            keys: KeyOverride::default(),
            write_files: true,
            output_dir: default_output_dir(),
            compress: true,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, EmissionError> {
        let config: RunConfig = serde_json::from_str(json)
            .map_err(|e| EmissionError::Configuration(format!("run config: {e}")))?;
        config.date_range()?;
        Ok(config)
    }

    pub fn with_week_profile(mut self, week: WeekProfile) -> Self {
        self.week_profile = Some(week);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.write_files = false;
        self
    }

    pub fn date_range(&self) -> Result<DateRange, EmissionError> {
        DateRange::parse(&self.start_date, &self.end_date)
    }

    pub fn with_keys(mut self, keys: KeyOverride) -> Self {
        self.keys = keys;
        self
    }

    /// The week profile, for formats that cannot do without one.
    pub fn require_week_profile(&self) -> Result<&WeekProfile, EmissionError> {
        self.week_profile
            .as_ref()
            .ok_or(EmissionError::MissingWeekProfile)
    }

    /// Time steps covered by the run.
    pub fn time_plan(&self) -> Result<TimePlan, EmissionError> {
        Ok(TimePlan::for_range(
            &self.date_range()?,
            self.week_profile.as_ref(),
        ))
    }
}

/// CMAQ-specific inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmaqConfig {
    pub griddesc_path: PathBuf,
    /// Grid section of the GRIDDESC file to use.
    pub grid_name: String,
    /// MCIP boundary trim; `btrim + 1` cells are removed on every edge.
    pub btrim: usize,
}
