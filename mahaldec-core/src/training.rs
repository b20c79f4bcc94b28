//! Per-fold template and covariance-data preparation.
//!
//! Training trials of one fold are bucketed by class, optionally balanced
//! by subsampling every class down to the minority count, and averaged
//! into class templates. The same step selects which trials feed the
//! covariance estimate.

use crate::error::{DecodingError, DecodingResult, FoldLocation};
use crate::folds::TrialSampler;
use crate::matrix::Tensor3;

/// Which training trials the covariance is estimated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CovarianceSource {
    /// Every training trial of the fold
    AllTrials,
    /// The balanced subset used for the templates
    Balanced,
    /// The balanced subset with each trial's class template subtracted
    BalancedResidual,
}

/// Options for building fold templates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Subsample every class to the minority class count before averaging
    pub balanced: bool,
    /// Trials used for the covariance estimate
    pub covariance: CovarianceSource,
}

/// Templates and covariance data for one fold.
#[derive(Clone, Debug)]
pub struct FoldTemplates {
    /// Class templates, classes × channels × time
    pub templates: Tensor3,
    /// Trials feeding the covariance estimate, trials × channels × time
    pub cov_data: Tensor3,
    /// Number of trials averaged into each template
    pub trials_per_class: Vec<usize>,
}

/// Build class templates for one fold.
///
/// # Arguments
/// * `train` - Training trials × channels × time
/// * `classes` - Class index per training trial
/// * `n_classes` - Number of classes; templates keep this order
/// * `options` - Balancing and covariance-source options
/// * `sampler` - Randomness for minority subsampling
/// * `location` - Fold position, used in error reports
pub fn fit_fold_templates(
    train: &Tensor3,
    classes: &[usize],
    n_classes: usize,
    options: TemplateOptions,
    sampler: &mut dyn TrialSampler,
    location: FoldLocation,
) -> DecodingResult<FoldTemplates> {
    let [n_train, n_chans, n_times] = train.dims();
    if classes.len() != n_train {
        return Err(DecodingError::InvalidShape {
            reason: format!(
                "{} class labels for {n_train} training trials",
                classes.len()
            ),
        });
    }
    if options.covariance != CovarianceSource::AllTrials && !options.balanced {
        return Err(DecodingError::Configuration {
            parameter: "balanced_cov",
            reason: "a balanced covariance subset requires balanced training bins".to_string(),
        });
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (trial, &c) in classes.iter().enumerate() {
        members[c].push(trial);
    }
    if let Some(empty) = members.iter().position(Vec::is_empty) {
        return Err(DecodingError::DegenerateClass {
            class: empty,
            location,
        });
    }

    if options.balanced {
        let count_min = members.iter().map(Vec::len).min().unwrap_or(0);
        for class_members in &mut members {
            let picks = sampler.choose(class_members.len(), count_min);
            *class_members = picks.into_iter().map(|p| class_members[p]).collect();
        }
    }

    let mut templates = Tensor3::zeros([n_classes, n_chans, n_times]);
    for (c, class_members) in members.iter().enumerate() {
        let k = class_members.len() as f64;
        for t in 0..n_times {
            for ch in 0..n_chans {
                let sum: f64 = class_members.iter().map(|&i| train[(i, ch, t)]).sum();
                templates[(c, ch, t)] = sum / k;
            }
        }
    }

    let cov_data = match options.covariance {
        CovarianceSource::AllTrials => train.clone(),
        CovarianceSource::Balanced => {
            let order: Vec<usize> = members.iter().flatten().copied().collect();
            train.select_first(&order)
        }
        CovarianceSource::BalancedResidual => {
            let order: Vec<usize> = members.iter().flatten().copied().collect();
            let owner: Vec<usize> = members
                .iter()
                .enumerate()
                .flat_map(|(c, m)| std::iter::repeat(c).take(m.len()))
                .collect();
            let mut residual = train.select_first(&order);
            for t in 0..n_times {
                for ch in 0..n_chans {
                    for (row, &c) in owner.iter().enumerate() {
                        residual[(row, ch, t)] -= templates[(c, ch, t)];
                    }
                }
            }
            residual
        }
    };

    Ok(FoldTemplates {
        templates,
        cov_data,
        trials_per_class: members.iter().map(Vec::len).collect(),
    })
}
