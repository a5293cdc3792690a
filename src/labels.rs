use serde::{Deserialize, Serialize};

/// Labels sent when a deployment does not configure its own.
pub const DEFAULT_LABELS: [&str; 10] = [
    "red", "orange", "yellow", "green", "blue", "purple", "pink", "brown", "black", "white",
];

/// Fixed, ordered candidate labels submitted with every image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the first label that is blank or repeated, if any.
    pub fn find_invalid(&self) -> Option<&str> {
        self.0.iter().enumerate().find_map(|(i, label)| {
            let repeated = self.0[..i].contains(label);
            (label.trim().is_empty() || repeated).then_some(label.as_str())
        })
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS)
    }
}
