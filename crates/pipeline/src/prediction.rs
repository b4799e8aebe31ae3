//! Turning classifier logits into a label and confidence

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary authenticity label. Class 0 is FAKE, class 1 is REAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Fake,
    Real,
}

impl Label {
    /// Label for a class index, `None` outside the two known classes
    #[must_use]
    pub fn from_class_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Label::Fake),
            1 => Some(Label::Real),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Fake => "FAKE",
            Label::Real => "REAL",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub class_index: usize,
    pub label: Label,
    /// Probability of the winning class, in percent (0-100)
    pub confidence_percent: f64,
    pub probabilities: [f64; 2],
}

/// Numerically stable softmax (max-subtracted).
///
/// NaN logits count as `-inf`. Infinite maxima split the mass evenly between
/// themselves, and an input with no finite or `+inf` logit is uniform, so the
/// output is always a distribution.
#[must_use]
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let values: Vec<f64> = logits
        .iter()
        .map(|&l| f64::from(l))
        .map(|v| if v.is_nan() { f64::NEG_INFINITY } else { v })
        .collect();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max == f64::NEG_INFINITY {
        let share = 1.0 / values.len() as f64;
        return vec![share; values.len()];
    }
    if max == f64::INFINITY {
        let winners = values.iter().filter(|&&v| v == f64::INFINITY).count() as f64;
        return values
            .iter()
            .map(|&v| if v == f64::INFINITY { 1.0 / winners } else { 0.0 })
            .collect();
    }

    let exps: Vec<f64> = values.iter().map(|&v| (v - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Index of the largest value; ties resolve to the lowest index, NaN never wins
#[must_use]
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Softmax, argmax and label for a pair of class logits
#[must_use]
pub fn predict(logits: [f32; 2]) -> PredictionResult {
    let probs = softmax(&logits);
    let probabilities = [probs[0], probs[1]];

    let class_index = argmax(&probabilities).unwrap_or(0);
    let label = Label::from_class_index(class_index).unwrap_or(Label::Fake);

    PredictionResult {
        class_index,
        label,
        confidence_percent: probabilities[class_index] * 100.0,
        probabilities,
    }
}

/// Round to two decimal places for reporting
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
