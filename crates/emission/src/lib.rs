pub mod calendar;
pub mod config;
mod distribution;
pub mod error;
pub mod grid;
mod group;
pub mod input;
pub mod pollutant;
pub mod profile;
mod report;
mod source;
pub mod tensor;
pub mod units;

pub use calendar::DateRange;
pub use config::{CmaqConfig, RunConfig};
pub use distribution::spread_over_time;
pub use error::{EmissionError, ErrorCategory};
pub use grid::{GeometryAttr, GridGeometry, GridShape, SpatialWeight};
pub use group::SourceGroup;
pub use pollutant::{EmissionFactors, KeyOverride, Pollutant, SpeciationTable, SpeciesKeys};
pub use profile::{TemporalProfile, TimePlan, TimeStep, WeekProfile};
pub use report::{EmissionReport, ReportRow};
pub use source::{
    AreaSource, AreaSourceConfig, EmissionProvider, PointPollutant, PointSource,
    PointSourceConfig, Source,
};
pub use tensor::{EmissionTensor, Phase, TensorShape, Variable};
