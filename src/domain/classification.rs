use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, StanceError};

/// Labels the UKP argument model was trained with, in logit order.
pub const DEFAULT_LABELS: [&str; 3] = ["NoArgument", "Argument_against", "Argument_for"];

/// One (topic, sentence) pair to classify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationInput {
    pub topic:    String,
    pub sentence: String,
}

impl ClassificationInput {
    pub fn new(topic: impl Into<String>, sentence: impl Into<String>) -> Self {
        Self { topic: topic.into(), sentence: sentence.into() }
    }
}

/// The classifier's verdict for one input pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub topic:           String,
    pub sentence:        String,
    pub predicted_label: String,
}

impl std::fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ClassificationResult(")?;
        writeln!(f, "|   topic: {}", self.topic)?;
        writeln!(f, "|   \"{}\"", self.sentence)?;
        write!(f, "|   predicted label: {})", self.predicted_label)
    }
}

// ─── LabelSet ─────────────────────────────────────────────────────────────────
/// Closed label vocabulary, fixed when the classifier is built.
/// Position i names the i-th score the engine returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(StanceError::config("label set must not be empty"));
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(StanceError::config(format!("duplicate label '{label}'")));
            }
        }
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Index of the highest score. Ties go to the lowest index; NaN never wins.
    /// None when `scores` is empty or entirely NaN.
    pub fn argmax(scores: &[f32]) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &s) in scores.iter().enumerate() {
            if s.is_nan() {
                continue;
            }
            match best {
                Some((_, b)) if s <= b => {}
                _ => best = Some((i, s)),
            }
        }
        best.map(|(i, _)| i)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self { labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect() }
    }
}

impl TryFrom<Vec<String>> for LabelSet {
    type Error = StanceError;

    fn try_from(labels: Vec<String>) -> Result<Self> {
        LabelSet::new(labels)
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(set: LabelSet) -> Self {
        set.labels
    }
}
