use std::fmt::Display;

/// Raised by a calculator asked to pick regression peptides from a pool that
/// does not hold enough of its known standards.
#[derive(Debug, Clone, PartialEq)]
pub struct IncompleteStandardsError {
    pub calculator: String,
    pub found: usize,
    pub required: usize,
}

impl Display for IncompleteStandardsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Calculator '{}' found {} of the {} standard peptides required for a regression",
            self.calculator, self.found, self.required
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvalidRegressionError {
    /// Exactly one of slope/intercept was supplied.
    MismatchedConversion {
        slope: Option<f64>,
        intercept: Option<f64>,
    },
    NonFiniteConversion {
        slope: f64,
        intercept: f64,
    },
    NonPositiveTimeWindow(f64),
}

impl Display for InvalidRegressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MismatchedConversion { slope, intercept } => write!(
                f,
                "Slope and intercept must both be set or both be missing (slope: {:?}, intercept: {:?})",
                slope, intercept
            ),
            Self::NonFiniteConversion { slope, intercept } => write!(
                f,
                "Regression conversion must be finite (slope: {}, intercept: {})",
                slope, intercept
            ),
            Self::NonPositiveTimeWindow(window) => {
                write!(f, "Time window must be greater than zero, got {}", window)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RtCalibError {
    IncompleteStandards(IncompleteStandardsError),
    InvalidMeasurement {
        sequence: String,
        retention_time: f64,
        reason: &'static str,
    },
    InvalidRegression(InvalidRegressionError),
}

impl Display for RtCalibError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncompleteStandards(e) => write!(f, "{}", e),
            Self::InvalidMeasurement {
                sequence,
                retention_time,
                reason,
            } => write!(
                f,
                "Invalid measured retention time {} for '{}': {}",
                retention_time, sequence, reason
            ),
            Self::InvalidRegression(e) => write!(f, "Invalid regression: {}", e),
        }
    }
}

impl std::error::Error for RtCalibError {}

pub type Result<T> = std::result::Result<T, RtCalibError>;

impl From<IncompleteStandardsError> for RtCalibError {
    fn from(x: IncompleteStandardsError) -> Self {
        Self::IncompleteStandards(x)
    }
}

impl From<InvalidRegressionError> for RtCalibError {
    fn from(x: InvalidRegressionError) -> Self {
        Self::InvalidRegression(x)
    }
}
