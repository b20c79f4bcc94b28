//! Decoding of nominal (categorical) variables.

use super::{check_inputs, squeeze_columns, DecodeInput, ProgressCounter, Sweep, TimeMode};
use crate::config::NominalConfig;
use crate::error::{DecodingError, DecodingResult};
use crate::folds::SeededSampler;
use crate::matrix::{FdMatrix, Tensor3, Tensor4};
use std::cmp::Ordering;
use tracing::debug;

/// Same-time nominal decoding output.
#[derive(Clone, Debug)]
pub struct NominalDecoding<L> {
    /// Sorted distinct labels; class index `c` refers to `classes[c]`
    pub classes: Vec<L>,
    /// Centered distances, classes × trials × time
    pub distances: Tensor3,
    /// Mean distance to the other classes minus distance to the own class,
    /// trials × time
    pub distance_difference: FdMatrix,
    predicted: Vec<usize>,
    correct: Vec<bool>,
    n_trials: usize,
}

impl<L> NominalDecoding<L> {
    /// Index of the closest class.
    pub fn predicted(&self, trial: usize, time: usize) -> usize {
        self.predicted[trial + self.n_trials * time]
    }

    /// Label of the closest class.
    pub fn predicted_label(&self, trial: usize, time: usize) -> &L {
        &self.classes[self.predicted(trial, time)]
    }

    pub fn is_correct(&self, trial: usize, time: usize) -> bool {
        self.correct[trial + self.n_trials * time]
    }

    /// Fraction of correctly classified trials per time point.
    pub fn accuracy(&self) -> Vec<f64> {
        self.correct.chunks(self.n_trials).map(fraction_true).collect()
    }
}

/// Cross-temporal nominal decoding output; time axes are
/// (training time, test time).
#[derive(Clone, Debug)]
pub struct NominalCrossTemporalDecoding<L> {
    pub classes: Vec<L>,
    /// classes × trials × training time × test time
    pub distances: Tensor4,
    /// trials × training time × test time
    pub distance_difference: Tensor3,
    predicted: Vec<usize>,
    correct: Vec<bool>,
    n_trials: usize,
    n_train: usize,
}

impl<L> NominalCrossTemporalDecoding<L> {
    fn slot(&self, trial: usize, train_time: usize, test_time: usize) -> usize {
        trial + self.n_trials * (train_time + self.n_train * test_time)
    }

    pub fn predicted(&self, trial: usize, train_time: usize, test_time: usize) -> usize {
        self.predicted[self.slot(trial, train_time, test_time)]
    }

    pub fn predicted_label(&self, trial: usize, train_time: usize, test_time: usize) -> &L {
        &self.classes[self.predicted(trial, train_time, test_time)]
    }

    pub fn is_correct(&self, trial: usize, train_time: usize, test_time: usize) -> bool {
        self.correct[self.slot(trial, train_time, test_time)]
    }

    /// Fraction correct, training time × test time.
    pub fn accuracy(&self) -> FdMatrix {
        let values: Vec<f64> = self.correct.chunks(self.n_trials).map(fraction_true).collect();
        let n_test = values.len() / self.n_train.max(1);
        FdMatrix::from_fn(self.n_train, n_test, |i, j| values[i + self.n_train * j])
    }
}

fn fraction_true(flags: &[bool]) -> f64 {
    flags.iter().filter(|&&b| b).count() as f64 / flags.len() as f64
}

struct NominalParts<L> {
    classes: Vec<L>,
    distances: Tensor4,
    distance_difference: Vec<f64>,
    predicted: Vec<usize>,
    correct: Vec<bool>,
}

/// Decode a nominal variable at matching time points.
///
/// # Arguments
/// * `input` - Observations (trials × channels × time) and one label per
///   trial. Labels only need a partial order, so float condition codes
///   work; a label that is not comparable with itself (NaN) is rejected.
/// * `config` - Decoding options
///
/// # Returns
/// Distances, predictions and distance differences
pub fn decode_nominal<L: PartialOrd + Clone>(
    input: DecodeInput<'_, L>,
    config: &NominalConfig,
) -> DecodingResult<NominalDecoding<L>> {
    let parts = run(&input, config, TimeMode::SameTime)?;
    let [_, n_trials, n_times, _] = parts.distances.dims();

    Ok(NominalDecoding {
        classes: parts.classes,
        distances: squeeze_columns(parts.distances)?,
        distance_difference: FdMatrix::from_column_major(
            parts.distance_difference,
            n_trials,
            n_times,
        )?,
        predicted: parts.predicted,
        correct: parts.correct,
        n_trials,
    })
}

/// Decode a nominal variable for every pair of training and test time
/// points. `input.data_trn` may have a different number of time points.
pub fn decode_nominal_cross_temporal<L: PartialOrd + Clone>(
    input: DecodeInput<'_, L>,
    config: &NominalConfig,
) -> DecodingResult<NominalCrossTemporalDecoding<L>> {
    let parts = run(&input, config, TimeMode::CrossTemporal)?;
    let [_, n_trials, n_train, n_test] = parts.distances.dims();

    Ok(NominalCrossTemporalDecoding {
        classes: parts.classes,
        distance_difference: Tensor3::from_column_major(
            parts.distance_difference,
            [n_trials, n_train, n_test],
        )?,
        distances: parts.distances,
        predicted: parts.predicted,
        correct: parts.correct,
        n_trials,
        n_train,
    })
}

fn run<L: PartialOrd + Clone>(
    input: &DecodeInput<'_, L>,
    config: &NominalConfig,
    mode: TimeMode,
) -> DecodingResult<NominalParts<L>> {
    config.validate()?;
    let shapes = check_inputs(input, mode)?;

    if let Some(i) = input
        .labels
        .iter()
        .position(|label| label.partial_cmp(label).is_none())
    {
        return Err(DecodingError::InvalidShape {
            reason: format!("label of trial {i} is not comparable (NaN)"),
        });
    }
    let mut classes = input.labels.to_vec();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    classes.dedup();
    let n_classes = classes.len();
    if n_classes < 2 {
        return Err(DecodingError::InvalidShape {
            reason: format!("need at least two distinct labels, got {n_classes}"),
        });
    }
    let y: Vec<usize> = input
        .labels
        .iter()
        .map(|label| {
            classes
                .binary_search_by(|c| c.partial_cmp(label).unwrap_or(Ordering::Equal))
                .unwrap_or_default()
        })
        .collect();

    debug!(
        n_trials = shapes.n_trials,
        n_classes,
        n_train_times = shapes.n_train_times,
        n_test_times = shapes.n_test_times,
        ?mode,
        metric = ?config.base.dist_metric,
        "starting nominal decoding"
    );

    let sweep = Sweep::new(input, shapes, mode, &config.base);
    let mut counter = ProgressCounter::new(sweep.units());
    let mut sampler = SeededSampler::new(config.base.seed);
    let distances = sweep.distances(&y, n_classes, 0, None, &mut sampler, &mut counter)?;

    let n_trials = shapes.n_trials;
    let d = distances.as_slice();
    let n_slices = d.len() / n_classes;
    let mut predicted = Vec::with_capacity(n_slices);
    let mut correct = Vec::with_capacity(n_slices);
    let mut distance_difference = Vec::with_capacity(n_slices);
    for (slice, block) in d.chunks(n_classes).enumerate() {
        let own = y[slice % n_trials];
        let best = block
            .iter()
            .enumerate()
            .fold(0, |best, (c, &v)| if v < block[best] { c } else { best });
        let others = (block.iter().sum::<f64>() - block[own]) / (n_classes - 1) as f64;
        predicted.push(best);
        correct.push(best == own);
        distance_difference.push(others - block[own]);
    }

    debug!(
        accuracy = fraction_true(&correct),
        "nominal decoding finished"
    );

    Ok(NominalParts {
        classes,
        distances,
        distance_difference,
        predicted,
        correct,
    })
}
