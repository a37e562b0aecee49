//! Run report: every step of a run plus its outcome, serializable to JSON.

use num_bigint::BigUint;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::driver::{RunOutcome, Step};
use crate::error::Result;
use crate::problem::Problem;

/// Serializes a big value as a decimal string.
pub(crate) fn decimal<S: Serializer>(
    value: &BigUint,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

impl Serialize for RunOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RunOutcome", 3)?;
        match self {
            RunOutcome::Converged { value, queries } => {
                state.serialize_field("status", "converged")?;
                state.serialize_field("value", &value.to_string())?;
                state.serialize_field("queries", queries)?;
            }
            RunOutcome::Exhausted { last, queries } => {
                state.serialize_field("status", "exhausted")?;
                state.serialize_field("value", &last.as_ref().map(ToString::to_string))?;
                state.serialize_field("queries", queries)?;
            }
        }
        state.end()
    }
}

/// Aggregated record of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Problem the oracle was built for, when known.
    pub problem: Option<Problem>,
    /// Every completed step in order.
    pub steps: Vec<Step>,
    /// Terminal state, once the run has finished.
    pub outcome: Option<RunOutcome>,
}

impl RunReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(problem: Option<Problem>) -> Self {
        Self {
            problem,
            steps: Vec::new(),
            outcome: None,
        }
    }

    /// Records a step.
    pub fn push(&mut self, step: &Step) {
        self.steps.push(step.clone());
    }

    /// Records the outcome.
    pub fn finish(&mut self, outcome: RunOutcome) {
        self.outcome = Some(outcome);
    }

    /// The converged value, if the run converged.
    #[must_use]
    pub fn value(&self) -> Option<&BigUint> {
        self.outcome.as_ref().and_then(RunOutcome::value)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Report`](crate::Error::Report) if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::EnumerationMode;
    use crate::schedule::WordWidth;

    #[test]
    fn json_carries_values_as_strings() {
        let problem = Problem::new(5, WordWidth::W8, 2, EnumerationMode::Cycles).ok();
        let mut report = RunReport::new(problem);
        let value = BigUint::from(u128::MAX) * BigUint::from(10u8);
        report.push(&Step {
            index: 1,
            modulus: 251,
            remainders: vec![3],
            moduli: vec![251],
            value: value.clone(),
        });
        report.finish(RunOutcome::Converged {
            value: value.clone(),
            queries: 1,
        });

        let encoded = report.to_json().unwrap_or_default();
        let json: serde_json::Value = serde_json::from_str(&encoded).unwrap_or_default();
        let text = value.to_string();
        assert_eq!(json["problem"]["n"], 5);
        assert_eq!(json["problem"]["width"], 8);
        assert_eq!(json["problem"]["mode"], "cycles");
        assert_eq!(json["steps"][0]["value"], text.as_str());
        assert_eq!(json["outcome"]["status"], "converged");
        assert_eq!(json["outcome"]["value"], text.as_str());
        assert_eq!(report.value(), Some(&value));
    }

    #[test]
    fn exhausted_outcome_has_no_final_value() {
        let mut report = RunReport::new(None);
        report.finish(RunOutcome::Exhausted {
            last: Some(BigUint::from(52u8)),
            queries: 3,
        });
        assert_eq!(report.value(), None);
        let json = report.to_json().unwrap_or_default();
        assert!(json.contains("\"exhausted\""));
        assert!(json.contains("\"52\""));
    }
}
