//! Cross-validated decoding pipelines.
//!
//! Four entry points share one sweep: for every fold partition, training
//! trials are averaged into class templates, a shrinkage covariance is
//! estimated per training time point, and held-out trials are scored
//! against every template. Distances are averaged over repetitions (folds
//! within a repetition cover disjoint test trials) and centered across the
//! class axis before the task-specific statistics are derived.
//!
//! Distances are accumulated in a class × trial × train-time × test-column
//! tensor. In same-time decoding there is a single test column holding the
//! test data at the training time point; in cross-temporal decoding there
//! is one column per test time point.

pub mod circular;
pub mod nominal;

pub use circular::{
    decode_circular, decode_circular_cross_temporal, AngularGrid, CircularCrossTemporalDecoding,
    CircularDecoding,
};
pub use nominal::{
    decode_nominal, decode_nominal_cross_temporal, NominalCrossTemporalDecoding, NominalDecoding,
};

use crate::basis::smooth_templates;
use crate::config::DecodeConfig;
use crate::error::{DecodingError, DecodingResult, FoldLocation};
use crate::folds::{RepeatedStratifiedKFold, TrialSampler};
use crate::iter_maybe_parallel;
use crate::matrix::{FdMatrix, Tensor3, Tensor4};
use crate::metric::{class_distances, stack_time_points};
use crate::progress::Monitor;
use crate::training::fit_fold_templates;
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use tracing::{trace, warn};

/// Borrowed inputs of a decoding call.
#[derive(Clone, Copy, Debug)]
pub struct DecodeInput<'a, L> {
    /// Test observations, trials × channels × time
    pub data: &'a Tensor3,
    /// One label per trial
    pub labels: &'a [L],
    /// Separate training observations for the same trials; `data` is used
    /// when absent
    pub data_trn: Option<&'a Tensor3>,
    /// Progress and cancellation side channels
    pub monitor: Monitor<'a>,
}

impl<'a, L> DecodeInput<'a, L> {
    pub fn new(data: &'a Tensor3, labels: &'a [L]) -> Self {
        Self {
            data,
            labels,
            data_trn: None,
            monitor: Monitor::default(),
        }
    }

    pub fn with_training_data(mut self, data_trn: &'a Tensor3) -> Self {
        self.data_trn = Some(data_trn);
        self
    }

    pub fn with_monitor(mut self, monitor: Monitor<'a>) -> Self {
        self.monitor = monitor;
        self
    }

    fn train(&self) -> &'a Tensor3 {
        self.data_trn.unwrap_or(self.data)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimeMode {
    SameTime,
    CrossTemporal,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Shapes {
    pub n_trials: usize,
    pub n_train_times: usize,
    pub n_test_times: usize,
}

impl Shapes {
    /// Columns of the accumulator's last axis.
    pub fn n_columns(&self, mode: TimeMode) -> usize {
        match mode {
            TimeMode::SameTime => 1,
            TimeMode::CrossTemporal => self.n_test_times,
        }
    }
}

pub(crate) fn check_inputs<L>(input: &DecodeInput<'_, L>, mode: TimeMode) -> DecodingResult<Shapes> {
    let [n_trials, n_chans, n_test_times] = input.data.dims();
    let [n_trn_trials, n_trn_chans, n_train_times] = input.train().dims();

    if n_trials == 0 || n_chans == 0 || n_test_times == 0 {
        return Err(DecodingError::InvalidShape {
            reason: format!(
                "observations must be non-empty, got {:?}",
                input.data.dims()
            ),
        });
    }
    if input.labels.len() != n_trials {
        return Err(DecodingError::InvalidShape {
            reason: format!(
                "{} labels for {n_trials} trials",
                input.labels.len()
            ),
        });
    }
    if n_trn_trials != n_trials {
        return Err(DecodingError::InvalidShape {
            reason: format!(
                "training data has {n_trn_trials} trials, test data has {n_trials}"
            ),
        });
    }
    if n_trn_chans != n_chans {
        return Err(DecodingError::InvalidShape {
            reason: format!(
                "training data has {n_trn_chans} channels, test data has {n_chans}"
            ),
        });
    }
    if n_train_times == 0 {
        return Err(DecodingError::InvalidShape {
            reason: "training data has no time points".to_string(),
        });
    }
    check_finite(input.data, "test")?;
    if let Some(data_trn) = input.data_trn {
        check_finite(data_trn, "training")?;
    }
    if mode == TimeMode::SameTime && n_train_times != n_test_times {
        return Err(DecodingError::InvalidShape {
            reason: format!(
                "same-time decoding needs equal time axes, got {n_train_times} training and {n_test_times} test time points"
            ),
        });
    }

    Ok(Shapes {
        n_trials,
        n_train_times,
        n_test_times,
    })
}

/// Reject NaN or infinite observations, naming the first offending entry.
fn check_finite(x: &Tensor3, which: &str) -> DecodingResult<()> {
    if let Some(pos) = x.as_slice().iter().position(|v| !v.is_finite()) {
        let [n_trials, n_chans, _] = x.dims();
        return Err(DecodingError::InvalidShape {
            reason: format!(
                "{which} value at trial {}, channel {}, time point {} is not finite",
                pos % n_trials,
                (pos / n_trials) % n_chans,
                pos / (n_trials * n_chans)
            ),
        });
    }
    Ok(())
}

/// Basis smoothing applied to fold templates.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Smoothing<'a> {
    pub centers: &'a [f64],
    pub smoothness: Option<f64>,
}

/// Everything one cross-validated sweep needs besides the class labels.
pub(crate) struct Sweep<'a> {
    pub test: &'a Tensor3,
    pub train: &'a Tensor3,
    pub shapes: Shapes,
    pub mode: TimeMode,
    pub config: &'a DecodeConfig,
    pub monitor: Monitor<'a>,
}

/// Running count of finished (time point × offset × repetition × fold) units.
pub(crate) struct ProgressCounter {
    completed: usize,
    total: usize,
}

impl ProgressCounter {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    fn tick(&mut self, monitor: &Monitor<'_>) {
        self.completed += 1;
        monitor.report(self.completed, self.total);
    }
}

impl<'a> Sweep<'a> {
    pub fn new<L>(input: &DecodeInput<'a, L>, shapes: Shapes, mode: TimeMode, config: &'a DecodeConfig) -> Self {
        Self {
            test: input.data,
            train: input.train(),
            shapes,
            mode,
            config,
            monitor: input.monitor,
        }
    }

    /// Units of work per class assignment.
    pub fn units(&self) -> usize {
        self.shapes.n_train_times * self.config.n_folds * self.config.n_reps
    }

    /// Cross-validated, repetition-averaged, class-centered distances.
    ///
    /// # Arguments
    /// * `classes` - Class index per trial
    /// * `n_classes` - Number of classes (template order)
    /// * `offset` - Angular-space offset, for error locations
    /// * `smoothing` - Optional basis smoothing of templates
    ///
    /// # Returns
    /// classes × trials × train-time × test-column tensor
    pub fn distances(
        &self,
        classes: &[usize],
        n_classes: usize,
        offset: usize,
        smoothing: Option<Smoothing<'_>>,
        sampler: &mut dyn TrialSampler,
        counter: &mut ProgressCounter,
    ) -> DecodingResult<Tensor4> {
        let Shapes {
            n_trials,
            n_train_times,
            ..
        } = self.shapes;
        let n_cols = self.shapes.n_columns(self.mode);
        let config = self.config;

        let mut class_counts = vec![0usize; n_classes];
        for &c in classes {
            class_counts[c] += 1;
        }
        if let Some(&fewest) = class_counts.iter().min() {
            if fewest < config.n_folds {
                warn!(
                    fewest,
                    n_folds = config.n_folds,
                    offset,
                    "least populated class has fewer trials than folds"
                );
            }
        }

        let splits =
            RepeatedStratifiedKFold::new(config.n_folds, config.n_reps).split(classes, sampler)?;
        let options = config.template_options();

        let mut acc = Tensor4::zeros([n_classes, n_trials, n_train_times, n_cols]);
        for split in &splits {
            let location = FoldLocation::new(offset, split.repetition, split.fold);
            if self.monitor.is_cancelled() {
                return Err(DecodingError::Cancelled { location });
            }
            trace!(
                offset,
                repetition = split.repetition,
                fold = split.fold,
                n_train = split.train.len(),
                n_test = split.test.len(),
                "fitting fold"
            );

            let train = self.train.select_first(&split.train);
            let train_classes: Vec<usize> = split.train.iter().map(|&i| classes[i]).collect();
            let fit =
                fit_fold_templates(&train, &train_classes, n_classes, options, sampler, location)?;
            let templates = match smoothing {
                Some(s) => smooth_templates(&fit.templates, s.centers, s.smoothness),
                None => fit.templates,
            };

            let test = self.test.select_first(&split.test);
            let stacked = match self.mode {
                TimeMode::SameTime => None,
                TimeMode::CrossTemporal => Some(stack_time_points(&test)),
            };

            let per_time: Vec<FdMatrix> = iter_maybe_parallel!(0..n_train_times)
                .map(|t| {
                    let same_time;
                    let rows = match &stacked {
                        Some(all_times) => all_times,
                        None => {
                            same_time = test.slice_last(t);
                            &same_time
                        }
                    };
                    class_distances(
                        &templates.slice_last(t),
                        rows,
                        &fit.cov_data.slice_last(t),
                        config.dist_metric,
                        config.mahalanobis_path,
                    )
                    .map_err(|e| e.located(location.at_time(t)))
                })
                .collect::<DecodingResult<Vec<_>>>()?;

            let n_test = split.test.len();
            for (t, dists) in per_time.iter().enumerate() {
                for s in 0..n_cols {
                    for (k, &trial) in split.test.iter().enumerate() {
                        let col = k + n_test * s;
                        for c in 0..n_classes {
                            acc[(c, trial, t, s)] += dists[(c, col)];
                        }
                    }
                }
                counter.tick(&self.monitor);
            }
        }

        let scale = 1.0 / config.n_reps as f64;
        let mut averaged = acc.into_vec();
        averaged.iter_mut().for_each(|v| *v *= scale);
        center_classes(&mut averaged, n_classes);
        Tensor4::from_column_major(averaged, [n_classes, n_trials, n_train_times, n_cols])
    }
}

/// Subtract the class mean from every class-leading column-major block.
pub(crate) fn center_classes(data: &mut [f64], n_classes: usize) {
    for block in data.chunks_mut(n_classes) {
        let mean = block.iter().sum::<f64>() / n_classes as f64;
        block.iter_mut().for_each(|v| *v -= mean);
    }
}

/// Drop the singleton test-column axis of a same-time accumulator.
pub(crate) fn squeeze_columns(t: Tensor4) -> DecodingResult<Tensor3> {
    let [a, b, c, d] = t.dims();
    debug_assert_eq!(d, 1);
    Tensor3::from_column_major(t.into_vec(), [a, b, c * d])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folds::SeededSampler;
    use crate::metric::DistanceMetric;

    fn two_class_data() -> (Tensor3, Vec<usize>) {
        let classes: Vec<usize> = (0..12).map(|i| i % 2).collect();
        let data = Tensor3::from_fn([12, 2, 3], |i, ch, t| {
            let signal = if classes[i] == ch { 3.0 } else { 0.0 };
            signal + 0.01 * ((i * 7 + ch * 3 + t) % 5) as f64
        });
        (data, classes)
    }

    #[test]
    fn test_center_classes() {
        let mut v = vec![1.0, 3.0, 10.0, 20.0];
        center_classes(&mut v, 2);
        assert_eq!(v, vec![-1.0, 1.0, -5.0, 5.0]);
    }

    #[test]
    fn test_input_checks() {
        let (data, classes) = two_class_data();
        let short = &classes[..5];
        let input = DecodeInput::new(&data, short);
        assert!(check_inputs(&input, TimeMode::SameTime).is_err());

        let other = Tensor3::zeros([12, 2, 4]);
        let input = DecodeInput::new(&data, &classes).with_training_data(&other);
        assert!(check_inputs(&input, TimeMode::SameTime).is_err());
        let shapes = check_inputs(&input, TimeMode::CrossTemporal).unwrap();
        assert_eq!((shapes.n_train_times, shapes.n_test_times), (4, 3));

        let wrong_chans = Tensor3::zeros([12, 3, 3]);
        let input = DecodeInput::new(&data, &classes).with_training_data(&wrong_chans);
        assert!(check_inputs(&input, TimeMode::CrossTemporal).is_err());
    }

    #[test]
    fn test_non_finite_observation_is_located() {
        let (mut data, classes) = two_class_data();
        data[(5, 1, 2)] = f64::INFINITY;
        let input = DecodeInput::new(&data, &classes);
        match check_inputs(&input, TimeMode::SameTime) {
            Err(DecodingError::InvalidShape { reason }) => {
                assert!(reason.contains("trial 5, channel 1, time point 2"), "{reason}");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let (clean, _) = two_class_data();
        let input = DecodeInput::new(&clean, &classes).with_training_data(&data);
        assert!(check_inputs(&input, TimeMode::CrossTemporal).is_err());
    }

    #[test]
    fn test_sweep_shapes_and_centering() {
        let (data, classes) = two_class_data();
        let config = DecodeConfig {
            n_folds: 3,
            n_reps: 2,
            dist_metric: DistanceMetric::Euclidean,
            seed: Some(1),
            ..DecodeConfig::default()
        };
        let input = DecodeInput::new(&data, &classes);
        for mode in [TimeMode::SameTime, TimeMode::CrossTemporal] {
            let shapes = check_inputs(&input, mode).unwrap();
            let sweep = Sweep::new(&input, shapes, mode, &config);
            let mut counter = ProgressCounter::new(sweep.units());
            let mut sampler = SeededSampler::new(config.seed);
            let d = sweep
                .distances(&classes, 2, 0, None, &mut sampler, &mut counter)
                .unwrap();
            let cols = if mode == TimeMode::SameTime { 1 } else { 3 };
            assert_eq!(d.dims(), [2, 12, 3, cols]);
            assert_eq!(counter.completed, 3 * 3 * 2);
            for pair in d.as_slice().chunks(2) {
                assert!((pair[0] + pair[1]).abs() < 1e-12);
            }
            // every trial is closer to its own class
            for trial in 0..12 {
                let own = classes[trial];
                assert!(d[(own, trial, 0, 0)] < d[(1 - own, trial, 0, 0)]);
            }
        }
    }

    #[test]
    fn test_cancellation_aborts() {
        let (data, classes) = two_class_data();
        let config = DecodeConfig {
            n_folds: 3,
            n_reps: 1,
            seed: Some(2),
            ..DecodeConfig::default()
        };
        let flag = std::sync::atomic::AtomicBool::new(true);
        let input =
            DecodeInput::new(&data, &classes).with_monitor(Monitor::new().with_cancel_flag(&flag));
        let shapes = check_inputs(&input, TimeMode::SameTime).unwrap();
        let sweep = Sweep::new(&input, shapes, TimeMode::SameTime, &config);
        let mut counter = ProgressCounter::new(sweep.units());
        let mut sampler = SeededSampler::new(config.seed);
        let err = sweep
            .distances(&classes, 2, 0, None, &mut sampler, &mut counter)
            .unwrap_err();
        assert!(matches!(err, DecodingError::Cancelled { .. }));
    }
}
