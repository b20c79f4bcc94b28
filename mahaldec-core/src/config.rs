//! Decoding configuration.
//!
//! Defaults follow the reference decoder: 8 folds, 10 repetitions,
//! balanced training bins, covariance from all training trials,
//! whitened Mahalanobis distance.

use crate::circular::default_angspace;
use crate::error::{DecodingError, DecodingResult};
use crate::metric::{DistanceMetric, MahalanobisPath};
use crate::training::{CovarianceSource, TemplateOptions};

/// Options shared by all decoders.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodeConfig {
    /// Folds per repetition
    pub n_folds: usize,
    /// Number of repetitions with independent fold shuffles
    pub n_reps: usize,
    /// Subsample every class to the minority count before averaging
    pub balanced_train_bins: bool,
    /// Estimate the covariance from the balanced subset only
    pub balanced_cov: bool,
    /// Estimate the covariance from template-subtracted residuals
    /// (requires `balanced_cov`)
    pub residual_cov: bool,
    /// Distance metric
    pub dist_metric: DistanceMetric,
    /// Mahalanobis evaluation strategy
    pub mahalanobis_path: MahalanobisPath,
    /// Seed for fold shuffling and subsampling; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            n_folds: 8,
            n_reps: 10,
            balanced_train_bins: true,
            balanced_cov: false,
            residual_cov: false,
            dist_metric: DistanceMetric::Mahalanobis,
            mahalanobis_path: MahalanobisPath::Whitened,
            seed: None,
        }
    }
}

impl DecodeConfig {
    /// Reject out-of-range or mutually inconsistent options.
    pub fn validate(&self) -> DecodingResult<()> {
        if self.n_folds < 2 {
            return Err(DecodingError::Configuration {
                parameter: "n_folds",
                reason: format!("need at least 2 folds, got {}", self.n_folds),
            });
        }
        if self.n_reps == 0 {
            return Err(DecodingError::Configuration {
                parameter: "n_reps",
                reason: "need at least one repetition".to_string(),
            });
        }
        if self.balanced_cov && !self.balanced_train_bins {
            return Err(DecodingError::Configuration {
                parameter: "balanced_cov",
                reason: "a balanced covariance subset requires balanced_train_bins".to_string(),
            });
        }
        if self.residual_cov && !self.balanced_cov {
            return Err(DecodingError::Configuration {
                parameter: "residual_cov",
                reason: "residual covariance is only defined on balanced covariance data"
                    .to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn template_options(&self) -> TemplateOptions {
        let covariance = match (self.balanced_cov, self.residual_cov) {
            (false, _) => CovarianceSource::AllTrials,
            (true, false) => CovarianceSource::Balanced,
            (true, true) => CovarianceSource::BalancedResidual,
        };
        TemplateOptions {
            balanced: self.balanced_train_bins,
            covariance,
        }
    }
}

/// Bin centers of the angular space.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AngularSpace {
    /// 16 evenly spaced bins over [−π, π)
    #[default]
    Default,
    /// Caller-supplied, strictly increasing bin centers. The spacing of the
    /// first two sets the offset step for `ang_steps`.
    Custom(Vec<f64>),
}

impl AngularSpace {
    /// Resolve to bin centers.
    pub fn centers(&self) -> DecodingResult<Vec<f64>> {
        match self {
            AngularSpace::Default => Ok(default_angspace()),
            AngularSpace::Custom(centers) => {
                if centers.len() < 2 {
                    return Err(DecodingError::Configuration {
                        parameter: "angspace",
                        reason: format!("need at least 2 bins, got {}", centers.len()),
                    });
                }
                if centers.iter().any(|c| !c.is_finite())
                    || centers.windows(2).any(|w| w[1] <= w[0])
                {
                    return Err(DecodingError::Configuration {
                        parameter: "angspace",
                        reason: "bin centers must be finite and strictly increasing".to_string(),
                    });
                }
                Ok(centers.clone())
            }
        }
    }
}

/// Options for circular decoding.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CircularConfig {
    /// Shared options
    pub base: DecodeConfig,
    /// Smooth bin templates with the raised-cosine basis
    pub basis_set: bool,
    /// Kernel exponent for basis smoothing; `None` uses `n_bins - 1`
    pub basis_smoothness: Option<f64>,
    /// Bin centers
    pub angspace: AngularSpace,
    /// Number of rotated copies of the angular space
    pub ang_steps: usize,
}

impl Default for CircularConfig {
    fn default() -> Self {
        Self {
            base: DecodeConfig::default(),
            basis_set: true,
            basis_smoothness: None,
            angspace: AngularSpace::Default,
            ang_steps: 4,
        }
    }
}

impl CircularConfig {
    pub fn validate(&self) -> DecodingResult<()> {
        self.base.validate()?;
        if self.ang_steps == 0 {
            return Err(DecodingError::Configuration {
                parameter: "ang_steps",
                reason: "need at least one angular-space offset".to_string(),
            });
        }
        if let Some(s) = self.basis_smoothness {
            if !(s.is_finite() && s >= 0.0) {
                return Err(DecodingError::Configuration {
                    parameter: "basis_smoothness",
                    reason: format!("exponent must be finite and non-negative, got {s}"),
                });
            }
        }
        self.angspace.centers().map(|_| ())
    }
}

/// Options for nominal decoding.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NominalConfig {
    /// Shared options
    pub base: DecodeConfig,
}

impl NominalConfig {
    pub fn validate(&self) -> DecodingResult<()> {
        self.base.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DecodeConfig::default().validate().is_ok());
        assert!(CircularConfig::default().validate().is_ok());
        assert!(NominalConfig::default().validate().is_ok());
        let c = CircularConfig::default();
        assert_eq!((c.base.n_folds, c.base.n_reps, c.ang_steps), (8, 10, 4));
        assert!(c.basis_set && c.base.balanced_train_bins && !c.base.balanced_cov);
    }

    #[test]
    fn test_residual_requires_balanced_cov() {
        let config = DecodeConfig {
            residual_cov: true,
            ..DecodeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DecodingError::Configuration {
                parameter: "residual_cov",
                ..
            })
        ));
    }

    #[test]
    fn test_balanced_cov_requires_balanced_bins() {
        let config = DecodeConfig {
            balanced_train_bins: false,
            balanced_cov: true,
            ..DecodeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_template_options_mapping() {
        let config = DecodeConfig {
            balanced_cov: true,
            residual_cov: true,
            ..DecodeConfig::default()
        };
        assert_eq!(
            config.template_options().covariance,
            CovarianceSource::BalancedResidual
        );
        assert_eq!(
            DecodeConfig::default().template_options().covariance,
            CovarianceSource::AllTrials
        );
    }

    #[test]
    fn test_custom_angspace_checks() {
        assert!(AngularSpace::Custom(vec![0.0]).centers().is_err());
        assert!(AngularSpace::Custom(vec![0.0, -1.0]).centers().is_err());
        assert!(AngularSpace::Custom(vec![0.0, f64::NAN]).centers().is_err());
        assert_eq!(
            AngularSpace::Custom(vec![0.0, 1.0]).centers().unwrap(),
            vec![0.0, 1.0]
        );
    }
}
