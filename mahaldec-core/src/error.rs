//! Error types for decoding.
//!
//! Every failure aborts the whole decoding call; no partial result is
//! returned once a fold's template or covariance is invalid.

use std::fmt;
use thiserror::Error;

/// Position of a unit of work inside the cross-validation sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FoldLocation {
    /// Angular-space offset (always 0 for nominal decoding)
    pub offset: usize,
    /// Repetition index
    pub repetition: usize,
    /// Fold index within the repetition
    pub fold: usize,
    /// Training time point, when the failure is tied to one
    pub time: Option<usize>,
}

impl FoldLocation {
    pub fn new(offset: usize, repetition: usize, fold: usize) -> Self {
        Self {
            offset,
            repetition,
            fold,
            time: None,
        }
    }

    pub fn at_time(self, time: usize) -> Self {
        Self {
            time: Some(time),
            ..self
        }
    }
}

impl fmt::Display for FoldLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "offset {}, repetition {}, fold {}",
            self.offset, self.repetition, self.fold
        )?;
        if let Some(t) = self.time {
            write!(f, ", time point {t}")?;
        }
        Ok(())
    }
}

fn describe(location: &Option<FoldLocation>) -> String {
    match location {
        Some(loc) => format!(" at {loc}"),
        None => String::new(),
    }
}

/// Decoding error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodingError {
    /// Observation, label or training tensors have incompatible shapes
    #[error("Invalid shape: {reason}")]
    InvalidShape {
        /// What did not match
        reason: String,
    },

    /// A class or bin has no training trials in some fold
    #[error("Class {class} has no training trials at {location}")]
    DegenerateClass {
        /// Class or bin index
        class: usize,
        /// Where the empty class was found
        location: FoldLocation,
    },

    /// The shrunk covariance could not be inverted
    #[error("Singular covariance matrix{}", describe(.location))]
    SingularCovariance {
        /// Where the covariance was estimated, if known
        location: Option<FoldLocation>,
    },

    /// Mutually inconsistent or out-of-range options
    #[error("Invalid configuration for {parameter}: {reason}")]
    Configuration {
        /// Option name
        parameter: &'static str,
        /// Reason
        reason: String,
    },

    /// The caller requested cancellation
    #[error("Decoding cancelled at {location}")]
    Cancelled {
        /// Last unit of work that was started
        location: FoldLocation,
    },
}

impl DecodingError {
    /// Attach a location to errors raised below the fold loop.
    pub fn located(self, at: FoldLocation) -> Self {
        match self {
            DecodingError::SingularCovariance { location: None } => {
                DecodingError::SingularCovariance { location: Some(at) }
            }
            other => other,
        }
    }
}

/// Result type for decoding operations
pub type DecodingResult<T> = Result<T, DecodingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_location() {
        let err = DecodingError::DegenerateClass {
            class: 3,
            location: FoldLocation::new(1, 2, 4),
        };
        assert_eq!(
            err.to_string(),
            "Class 3 has no training trials at offset 1, repetition 2, fold 4"
        );

        let err = DecodingError::SingularCovariance { location: None }
            .located(FoldLocation::new(0, 0, 1).at_time(5));
        assert_eq!(
            err.to_string(),
            "Singular covariance matrix at offset 0, repetition 0, fold 1, time point 5"
        );
    }
}
