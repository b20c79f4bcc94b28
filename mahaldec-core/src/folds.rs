//! Repeated stratified k-fold partitioning and seedable trial sampling.
//!
//! All randomness in a decoding call (fold shuffling and minority-class
//! subsampling) is drawn through [`TrialSampler`], so a single seed fixes
//! every result bit for bit.

use crate::error::{DecodingError, DecodingResult};
use rand::prelude::*;
use rand::seq::index;

/// Source of randomness for fold shuffling and balanced subsampling.
pub trait TrialSampler {
    /// Shuffle indices in place.
    fn shuffle(&mut self, indices: &mut [usize]);

    /// Draw `amount` distinct positions from `0..population`, without
    /// replacement.
    fn choose(&mut self, population: usize, amount: usize) -> Vec<usize>;
}

/// [`TrialSampler`] backed by a seeded standard RNG.
#[derive(Clone, Debug)]
pub struct SeededSampler {
    rng: StdRng,
}

impl SeededSampler {
    /// Seeded sampler; `None` seeds from system entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl TrialSampler for SeededSampler {
    fn shuffle(&mut self, indices: &mut [usize]) {
        indices.shuffle(&mut self.rng);
    }

    fn choose(&mut self, population: usize, amount: usize) -> Vec<usize> {
        let mut picked = index::sample(&mut self.rng, population, amount).into_vec();
        picked.sort_unstable();
        picked
    }
}

/// One train/test partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoldSplit {
    /// Repetition index
    pub repetition: usize,
    /// Fold index within the repetition
    pub fold: usize,
    /// Training trial indices, ascending
    pub train: Vec<usize>,
    /// Held-out trial indices, ascending
    pub test: Vec<usize>,
}

/// Repeated stratified k-fold splitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepeatedStratifiedKFold {
    pub n_folds: usize,
    pub n_reps: usize,
}

impl RepeatedStratifiedKFold {
    pub fn new(n_folds: usize, n_reps: usize) -> Self {
        Self { n_folds, n_reps }
    }

    /// Generate `n_folds × n_reps` stratified partitions.
    ///
    /// Within each repetition, the trials of every class are shuffled and
    /// dealt round-robin across folds, continuing the deal where the
    /// previous class stopped so fold sizes differ by at most one. The
    /// folds of one repetition therefore hold every trial exactly once as
    /// test, and each fold's class proportions match the full set up to
    /// rounding. Repetitions reshuffle independently.
    ///
    /// # Arguments
    /// * `classes` - Class index per trial
    /// * `sampler` - Randomness source
    pub fn split(
        &self,
        classes: &[usize],
        sampler: &mut dyn TrialSampler,
    ) -> DecodingResult<Vec<FoldSplit>> {
        let n = classes.len();
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
        if self.n_folds > n {
            return Err(DecodingError::Configuration {
                parameter: "n_folds",
                reason: format!("{} folds requested for only {n} trials", self.n_folds),
            });
        }

        let n_classes = classes.iter().copied().max().map_or(0, |m| m + 1);
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (trial, &c) in classes.iter().enumerate() {
            members[c].push(trial);
        }

        let mut splits = Vec::with_capacity(self.n_folds * self.n_reps);
        for repetition in 0..self.n_reps {
            let mut fold_of = vec![0usize; n];
            let mut dealt = 0usize;
            for class_members in &members {
                let mut order = class_members.clone();
                sampler.shuffle(&mut order);
                for trial in order {
                    fold_of[trial] = dealt % self.n_folds;
                    dealt += 1;
                }
            }

            for fold in 0..self.n_folds {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..n).partition(|&trial| fold_of[trial] == fold);
                splits.push(FoldSplit {
                    repetition,
                    fold,
                    train,
                    test,
                });
            }
        }
        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(per_class: &[usize]) -> Vec<usize> {
        per_class
            .iter()
            .enumerate()
            .flat_map(|(c, &k)| std::iter::repeat(c).take(k))
            .collect()
    }

    #[test]
    fn test_every_trial_tested_once_per_repetition() {
        let classes = labels(&[10, 7, 13]);
        let mut sampler = SeededSampler::new(Some(3));
        let splits = RepeatedStratifiedKFold::new(4, 5)
            .split(&classes, &mut sampler)
            .unwrap();
        assert_eq!(splits.len(), 20);

        let mut times_tested = vec![0usize; classes.len()];
        for rep in 0..5 {
            let mut seen = vec![0usize; classes.len()];
            for s in splits.iter().filter(|s| s.repetition == rep) {
                for &t in &s.test {
                    seen[t] += 1;
                    times_tested[t] += 1;
                }
                // train and test are disjoint and cover everything
                assert_eq!(s.train.len() + s.test.len(), classes.len());
                assert!(s.test.iter().all(|t| s.train.binary_search(t).is_err()));
            }
            assert!(seen.iter().all(|&k| k == 1));
        }
        assert!(times_tested.iter().all(|&k| k == 5));
    }

    #[test]
    fn test_folds_are_stratified() {
        let classes = labels(&[16, 8]);
        let mut sampler = SeededSampler::new(Some(9));
        let splits = RepeatedStratifiedKFold::new(4, 1)
            .split(&classes, &mut sampler)
            .unwrap();
        for s in &splits {
            let n0 = s.test.iter().filter(|&&t| classes[t] == 0).count();
            let n1 = s.test.len() - n0;
            assert_eq!((n0, n1), (4, 2));
        }
    }

    #[test]
    fn test_repetitions_differ_and_seed_reproduces() {
        let classes = labels(&[12, 12]);
        let kf = RepeatedStratifiedKFold::new(3, 2);
        let a = kf.split(&classes, &mut SeededSampler::new(Some(1))).unwrap();
        let b = kf.split(&classes, &mut SeededSampler::new(Some(1))).unwrap();
        assert_eq!(a, b);
        assert_ne!(a[0].test, a[3].test);
    }

    #[test]
    fn test_invalid_fold_counts() {
        let classes = labels(&[3, 3]);
        let mut sampler = SeededSampler::new(Some(0));
        assert!(RepeatedStratifiedKFold::new(1, 1).split(&classes, &mut sampler).is_err());
        assert!(RepeatedStratifiedKFold::new(7, 1).split(&classes, &mut sampler).is_err());
        assert!(RepeatedStratifiedKFold::new(2, 0).split(&classes, &mut sampler).is_err());
    }

    #[test]
    fn test_choose_draws_distinct_indices() {
        let mut sampler = SeededSampler::new(Some(5));
        let picked = sampler.choose(20, 7);
        assert_eq!(picked.len(), 7);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        assert!(picked.iter().all(|&i| i < 20));
    }
}
