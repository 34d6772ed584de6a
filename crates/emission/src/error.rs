// ---------------------------------------------------------------------------
// EmissionError: validation and I/O failures of the emission engine
// ---------------------------------------------------------------------------

use std::fmt;

/// Broad class of an [`EmissionError`].
///
/// Every error is fatal; the category only tells the caller whether the
/// inputs are inconsistent with each other (`Configuration`), carry invalid
/// values (`DataQuality`) or the storage failed (`Io`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    DataQuality,
    Io,
}

/// Errors raised while building sources or generating emission tensors.
#[derive(Debug)]
pub enum EmissionError {
    /// A 2D field does not have the shape of the target grid.
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Two tensors that must be summed have different (time, row, col) shapes.
    TensorShapeMismatch {
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },
    /// Required pollutant keys are absent (all of them are listed).
    MissingKeys(Vec<String>),
    /// A temporal profile has fewer entries than required.
    ProfileTooShort {
        profile: &'static str,
        required: usize,
        found: usize,
    },
    /// A week profile must have exactly seven entries.
    WeekProfileLength(usize),
    /// The target format needs a week profile and none was supplied.
    MissingWeekProfile,
    /// Start/end dates are malformed or out of order.
    InvalidDateRange(String),
    /// PM is a mass species; its molecular weight must be 1.
    PmMolecularWeight(f64),
    /// A species name appears twice in a speciation table.
    DuplicateSpecies(String),
    /// A variable is gas phase in one source and aerosol in another.
    PhaseConflict(String),
    /// Any other inconsistent configuration.
    Configuration(String),
    /// A negative or non-finite value where a non-negative number is needed.
    InvalidValue { what: String, value: f64 },
    /// Spatial weights sum to zero, so they cannot be normalized.
    ZeroWeightSum,
    /// A delimited input table could not be parsed.
    Parse { line: usize, msg: String },
    /// I/O error while reading an input table.
    Io(std::io::Error),
}

impl EmissionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EmissionError::InvalidValue { .. }
            | EmissionError::ZeroWeightSum
            | EmissionError::Parse { .. } => ErrorCategory::DataQuality,
            EmissionError::Io(_) => ErrorCategory::Io,
            _ => ErrorCategory::Configuration,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_data_quality(&self) -> bool {
        self.category() == ErrorCategory::DataQuality
    }
}

impl fmt::Display for EmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmissionError::ShapeMismatch {
                what,
                expected,
                found,
            } => write!(
                f,
                "Configuration error: {what} has shape {}x{}, expected {}x{} (rows x cols)",
                found.0, found.1, expected.0, expected.1
            ),
            EmissionError::TensorShapeMismatch { expected, found } => write!(
                f,
                "Configuration error: tensor shape {found:?} does not match {expected:?} \
                 (time steps, rows, cols)"
            ),
            EmissionError::MissingKeys(keys) => write!(
                f,
                "Configuration error: missing required pollutant keys: {}",
                keys.join(", ")
            ),
            EmissionError::ProfileTooShort {
                profile,
                required,
                found,
            } => write!(
                f,
                "Configuration error: {profile} profile has {found} entries, needs at least {required}"
            ),
            EmissionError::WeekProfileLength(n) => write!(
                f,
                "Configuration error: week profile has {n} entries, needs exactly 7"
            ),
            EmissionError::MissingWeekProfile => write!(
                f,
                "Configuration error: a 7-day week profile is required for this output"
            ),
            EmissionError::InvalidDateRange(msg) => {
                write!(f, "Configuration error: invalid date range: {msg}")
            }
            EmissionError::PmMolecularWeight(mw) => write!(
                f,
                "Configuration error: PM molecular weight must be 1, got {mw}"
            ),
            EmissionError::DuplicateSpecies(name) => {
                write!(f, "Configuration error: duplicate species '{name}'")
            }
            EmissionError::PhaseConflict(name) => write!(
                f,
                "Configuration error: '{name}' is gas phase in one source and aerosol in another"
            ),
            EmissionError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            EmissionError::InvalidValue { what, value } => write!(
                f,
                "Data quality error: {what} must be a non-negative finite number, got {value}"
            ),
            EmissionError::ZeroWeightSum => write!(
                f,
                "Data quality error: spatial weights do not sum to a positive total"
            ),
            EmissionError::Parse { line, msg } => {
                write!(f, "Data quality error: line {line}: {msg}")
            }
            EmissionError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for EmissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EmissionError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EmissionError {
    fn from(e: std::io::Error) -> Self {
        EmissionError::Io(e)
    }
}

/// Rejects negative, NaN and infinite values.
pub(crate) fn check_non_negative(what: impl Into<String>, value: f64) -> Result<f64, EmissionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(EmissionError::InvalidValue {
            what: what.into(),
            value,
        })
    }
}
