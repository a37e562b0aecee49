//! The reconstruction loop.
//!
//! Moduli are taken from the schedule one at a time. After each oracle answer
//! the value is rebuilt from every sample so far; the run stops as soon as two
//! consecutive reconstructions agree, or fails softly once the schedule runs
//! out.
//!
//! Agreement of two consecutive values is a heuristic: nothing checks that
//! the modulus product really exceeds the true count. The rule is kept as is
//! because callers compare against runs that used it.

use std::fmt;

use num_bigint::BigUint;
use serde::Serialize;

use crate::crt::{AccumulatedSet, ResultSample};
use crate::error::{Error, Result};
use crate::oracle::Oracle;
use crate::schedule::Schedule;

/// What the loop knows after one oracle answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// 1-based position of the modulus in the schedule.
    pub index: usize,
    /// Modulus that was just queried.
    pub modulus: u64,
    /// All remainders collected so far.
    pub remainders: Vec<u64>,
    /// All moduli collected so far.
    pub moduli: Vec<u64>,
    /// Reconstruction from every sample so far.
    #[serde(serialize_with = "crate::report::decimal")]
    pub value: BigUint,
}

/// Console rendering: collected remainders and moduli, the step line, then
/// a 40-dash separator. Every line ends with a newline.
impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "results: {:?}", self.remainders)?;
        writeln!(f, "mods: {:?}", self.moduli)?;
        writeln!(
            f,
            "step: {}, mod: {}, result: {}",
            self.index, self.modulus, self.value
        )?;
        writeln!(f, "{}", "-".repeat(40))
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Two consecutive reconstructions agreed.
    Converged {
        /// The agreed value.
        value: BigUint,
        /// Oracle queries spent.
        queries: usize,
    },
    /// The schedule ran out first.
    Exhausted {
        /// Last reconstruction, if any query ran.
        last: Option<BigUint>,
        /// Oracle queries spent.
        queries: usize,
    },
}

impl RunOutcome {
    /// The converged value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&BigUint> {
        match self {
            RunOutcome::Converged { value, .. } => Some(value),
            RunOutcome::Exhausted { .. } => None,
        }
    }

    /// Number of oracle queries the run used.
    #[must_use]
    pub fn queries(&self) -> usize {
        match self {
            RunOutcome::Converged { queries, .. } | RunOutcome::Exhausted { queries, .. } => {
                *queries
            }
        }
    }
}

/// Samples plus the previous reconstruction, owned by one run.
#[derive(Debug, Default)]
pub struct Accumulator {
    set: AccumulatedSet,
    previous: Option<BigUint>,
}

impl Accumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The samples collected so far.
    #[must_use]
    pub fn samples(&self) -> &AccumulatedSet {
        &self.set
    }

    /// Adds a sample and reconstructs. Returns the new value and whether it
    /// equals the value from the previous sample.
    ///
    /// The first sample never converges since there is nothing to compare it
    /// against.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedOutput`] for a remainder that is not below
    /// its modulus, [`Error::DuplicateModulus`] for a repeated modulus and
    /// [`Error::NotCoprime`] if the moduli are not pairwise coprime.
    pub fn absorb(&mut self, sample: ResultSample) -> Result<(BigUint, bool)> {
        self.set.push(sample)?;
        let value = self.set.reconstruct()?;
        let converged = self.previous.as_ref() == Some(&value);
        self.previous = Some(value.clone());
        Ok((value, converged))
    }

    /// The most recent reconstruction.
    #[must_use]
    pub fn last_value(&self) -> Option<&BigUint> {
        self.previous.as_ref()
    }
}

/// Drives oracle queries over a modulus schedule until convergence.
#[derive(Debug, Clone)]
pub struct ReconstructionLoop {
    moduli: Vec<u64>,
}

impl ReconstructionLoop {
    /// Uses the given moduli in order. They must be pairwise coprime.
    pub fn new(moduli: impl IntoIterator<Item = u64>) -> Self {
        Self {
            moduli: moduli.into_iter().collect(),
        }
    }

    /// Uses a registered schedule.
    #[must_use]
    pub fn from_schedule(schedule: Schedule) -> Self {
        Self::new(schedule)
    }

    /// The moduli this loop will try, in order.
    #[must_use]
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Runs to completion, calling `on_step` after every oracle answer.
    ///
    /// At most one query per modulus is made. Any oracle error aborts the run
    /// immediately; a failed modulus is never retried or skipped.
    ///
    /// # Errors
    ///
    /// Propagates every oracle error, returns [`Error::ModulusMismatch`] if
    /// the oracle answers for a modulus other than the one asked, and the
    /// errors of [`Accumulator::absorb`].
    pub fn run<O, F>(&self, oracle: &mut O, mut on_step: F) -> Result<RunOutcome>
    where
        O: Oracle + ?Sized,
        F: FnMut(&Step),
    {
        let mut acc = Accumulator::new();

        for (i, &modulus) in self.moduli.iter().enumerate() {
            let sample = oracle.query(modulus)?;
            if sample.modulus != modulus {
                log::warn!("sample for modulus {} returned for query {modulus}", sample.modulus);
                return Err(Error::ModulusMismatch {
                    requested: modulus,
                    used: sample.modulus,
                });
            }

            let (value, converged) = acc.absorb(sample)?;
            let step = Step {
                index: i + 1,
                modulus,
                remainders: acc.samples().remainders(),
                moduli: acc.samples().moduli(),
                value,
            };
            log::info!("step {}: mod {modulus}, value {}", step.index, step.value);
            on_step(&step);

            if converged {
                log::info!("converged after {} queries", step.index);
                return Ok(RunOutcome::Converged {
                    value: step.value,
                    queries: step.index,
                });
            }
        }

        log::info!("schedule of {} moduli exhausted without convergence", self.moduli.len());
        Ok(RunOutcome::Exhausted {
            last: acc.last_value().cloned(),
            queries: acc.samples().len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Answers with `truth mod m`, counting calls.
    struct Truth {
        value: u64,
        calls: Vec<u64>,
    }

    impl Truth {
        fn new(value: u64) -> Self {
            Self {
                value,
                calls: Vec::new(),
            }
        }
    }

    impl Oracle for Truth {
        fn query(&mut self, modulus: u64) -> Result<ResultSample> {
            self.calls.push(modulus);
            ResultSample::new(self.value % modulus, modulus)
        }
    }

    fn run(moduli: &[u64], oracle: &mut impl Oracle) -> (Result<RunOutcome>, Vec<Step>) {
        let mut steps = Vec::new();
        let outcome = ReconstructionLoop::new(moduli.iter().copied())
            .run(oracle, |s| steps.push(s.clone()));
        (outcome, steps)
    }

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn seven_five_three_exhausts_at_52() {
        let mut oracle = Truth::new(52);
        let (outcome, steps) = run(&[7, 5, 3], &mut oracle);

        let values: Vec<BigUint> = steps.iter().map(|s| s.value.clone()).collect();
        assert_eq!(values, vec![big(3), big(17), big(52)]);
        assert_eq!(steps[2].remainders, vec![3, 2, 1]);
        assert_eq!(steps[2].moduli, vec![7, 5, 3]);
        assert_eq!(
            outcome.ok(),
            Some(RunOutcome::Exhausted {
                last: Some(big(52)),
                queries: 3
            })
        );
        assert_eq!(oracle.calls, vec![7, 5, 3]);
    }

    #[test]
    fn converges_when_two_values_agree() {
        // 17 < 35, so the third modulus leaves the value unchanged.
        let mut oracle = Truth::new(17);
        let (outcome, steps) = run(&[7, 5, 3, 2], &mut oracle);
        assert_eq!(
            outcome.ok(),
            Some(RunOutcome::Converged {
                value: big(17),
                queries: 3
            })
        );
        assert_eq!(steps.len(), 3);
        assert_eq!(oracle.calls, vec![7, 5, 3]);
    }

    #[test]
    fn single_sample_never_converges() {
        for truth in [0, 1, 6] {
            let mut oracle = Truth::new(truth);
            let (outcome, _) = run(&[7], &mut oracle);
            assert!(matches!(outcome, Ok(RunOutcome::Exhausted { queries: 1, .. })));
        }
    }

    #[test]
    fn zero_converges_on_second_sample() {
        let mut oracle = Truth::new(0);
        let (outcome, _) = run(&[7, 5, 3], &mut oracle);
        assert_eq!(
            outcome.ok(),
            Some(RunOutcome::Converged {
                value: big(0),
                queries: 2
            })
        );
    }

    #[test]
    fn empty_schedule_exhausts_immediately() {
        let mut oracle = Truth::new(5);
        let (outcome, steps) = run(&[], &mut oracle);
        assert_eq!(
            outcome.ok(),
            Some(RunOutcome::Exhausted {
                last: None,
                queries: 0
            })
        );
        assert!(steps.is_empty());
    }

    struct WrongModulus {
        calls: usize,
    }

    impl Oracle for WrongModulus {
        fn query(&mut self, modulus: u64) -> Result<ResultSample> {
            self.calls += 1;
            Ok(ResultSample {
                remainder: 0,
                modulus: modulus + 1,
            })
        }
    }

    #[test]
    fn mismatch_aborts_without_further_queries() {
        let mut oracle = WrongModulus { calls: 0 };
        let (outcome, steps) = run(&[7, 5, 3], &mut oracle);
        assert!(matches!(
            outcome,
            Err(Error::ModulusMismatch { requested: 7, used: 8 })
        ));
        assert_eq!(oracle.calls, 1);
        assert!(steps.is_empty());
    }

    struct FailsOn {
        modulus: u64,
        calls: Vec<u64>,
    }

    impl Oracle for FailsOn {
        fn query(&mut self, modulus: u64) -> Result<ResultSample> {
            self.calls.push(modulus);
            if modulus == self.modulus {
                return Err(Error::OracleSilent(modulus));
            }
            ResultSample::new(52 % modulus, modulus)
        }
    }

    #[test]
    fn oracle_error_is_fatal() {
        let mut oracle = FailsOn {
            modulus: 5,
            calls: Vec::new(),
        };
        let (outcome, steps) = run(&[7, 5, 3], &mut oracle);
        assert!(matches!(outcome, Err(Error::OracleSilent(5))));
        assert_eq!(oracle.calls, vec![7, 5]);
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn repeated_modulus_is_a_protocol_violation() {
        let mut oracle = Truth::new(52);
        let (outcome, _) = run(&[7, 7], &mut oracle);
        assert!(matches!(outcome, Err(Error::DuplicateModulus(7))));
    }

    struct Oversized {
        calls: usize,
    }

    impl Oracle for Oversized {
        fn query(&mut self, modulus: u64) -> Result<ResultSample> {
            self.calls += 1;
            Ok(ResultSample {
                remainder: modulus + 3,
                modulus,
            })
        }
    }

    #[test]
    fn non_canonical_remainder_aborts_the_run() {
        let mut oracle = Oversized { calls: 0 };
        let (outcome, steps) = run(&[7, 5], &mut oracle);
        assert!(matches!(outcome, Err(Error::MalformedOutput { .. })));
        assert_eq!(oracle.calls, 1);
        assert!(steps.is_empty());
    }

    #[test]
    fn step_renders_for_the_console() {
        let step = Step {
            index: 2,
            modulus: 5,
            remainders: vec![3, 2],
            moduli: vec![7, 5],
            value: big(17),
        };
        let dashes = "-".repeat(40);
        assert_eq!(
            step.to_string(),
            format!("results: [3, 2]\nmods: [7, 5]\nstep: 2, mod: 5, result: 17\n{dashes}\n")
        );
    }

    #[test]
    fn accumulator_compares_with_previous_only() {
        let mut acc = Accumulator::new();
        let first = acc.absorb(ResultSample { remainder: 3, modulus: 7 }).ok();
        assert_eq!(first, Some((big(3), false)));
        let second = acc.absorb(ResultSample { remainder: 3, modulus: 5 }).ok();
        assert_eq!(second, Some((big(3), true)));
        assert_eq!(acc.last_value(), Some(&big(3)));
    }
}
