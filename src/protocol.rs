//! Wire types for the similarity service and the validated result built from them.
//!
//! Probabilities travel on a percentage scale (0–100) and are rendered as
//! received, one decimal place followed by `%`.

use crate::error::AnalysisError;
use crate::labels::LabelSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the multipart field carrying the image.
pub const FILE_FIELD: &str = "file";
/// Name of the multipart field carrying the JSON encoded [`TextInput`].
pub const TEXT_INPUT_FIELD: &str = "text_input";

/// JSON payload of the `text_input` field.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TextInput {
    pub text_list: Vec<String>,
}

impl From<&LabelSet> for TextInput {
    fn from(labels: &LabelSet) -> Self {
        Self {
            text_list: labels.as_slice().to_vec(),
        }
    }
}

/// JSON body returned by the similarity service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimilarityResponse {
    pub labels: Vec<String>,
    pub probabilities: Vec<f64>,
}

impl SimilarityResponse {
    /// Parses a response body. Missing fields are a malformed response.
    pub fn from_json(body: &str) -> Result<Self, AnalysisError> {
        serde_json::from_str(body).map_err(|e| AnalysisError::Malformed(e.to_string()))
    }
}

/// Index aligned labels and probabilities of a successful analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    labels: Vec<String>,
    probabilities: Vec<f64>,
}

impl AnalysisResult {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Fails unless there is exactly one probability per submitted label.
    pub fn check_label_count(&self, submitted: &LabelSet) -> Result<(), AnalysisError> {
        if self.len() != submitted.len() {
            return Err(AnalysisError::LabelCountMismatch {
                submitted: submitted.len(),
                returned: self.len(),
            });
        }
        Ok(())
    }

    /// Rows in the order the service returned them.
    pub fn rows(&self) -> Vec<ResultRow> {
        self.labels
            .iter()
            .zip(&self.probabilities)
            .map(|(label, &probability)| ResultRow {
                label: label.clone(),
                probability,
            })
            .collect()
    }
}

impl TryFrom<SimilarityResponse> for AnalysisResult {
    type Error = AnalysisError;

    fn try_from(response: SimilarityResponse) -> Result<Self, Self::Error> {
        if response.labels.len() != response.probabilities.len() {
            return Err(AnalysisError::LengthMismatch {
                labels: response.labels.len(),
                probabilities: response.probabilities.len(),
            });
        }
        Ok(Self {
            labels: response.labels,
            probabilities: response.probabilities,
        })
    }
}

/// One rendered line of the result chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub label: String,
    pub probability: f64,
}

impl ResultRow {
    /// Probability with one decimal place, without the percent sign.
    pub fn percent_text(&self) -> String {
        format!("{:.1}", self.probability)
    }

    /// Text bar of at most `width` cells proportional to the percentage.
    pub fn bar(&self, width: usize) -> String {
        let fraction = if self.probability.is_finite() {
            self.probability.clamp(0.0, 100.0) / 100.0
        } else {
            0.0
        };
        let cells = (fraction * width as f64).round() as usize;
        "█".repeat(cells.min(width))
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}%", self.label, self.percent_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_input_serializes_as_text_list() {
        let input = TextInput::from(&LabelSet::new(["red", "blue"]));
        assert_eq!(
            serde_json::to_string(&input).unwrap(),
            r#"{"text_list":["red","blue"]}"#
        );
    }

    #[test]
    fn rows_pair_labels_with_probabilities_in_order() {
        let response =
            SimilarityResponse::from_json(r#"{"labels": ["green","blue"], "probabilities": [90, 80]}"#)
                .unwrap();
        let result = AnalysisResult::try_from(response).unwrap();
        let rows = result.rows();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "green");
        assert_eq!(rows[0].percent_text(), "90.0");
        assert_eq!(rows[1].label, "blue");
        assert_eq!(rows[1].percent_text(), "80.0");
        assert_eq!(rows[0].to_string(), "green 90.0%");
    }

    #[test]
    fn percent_text_rounds_to_one_decimal() {
        let row = ResultRow {
            label: "red".into(),
            probability: 33.333,
        };
        assert_eq!(row.percent_text(), "33.3");
    }

    #[test]
    fn missing_fields_are_malformed() {
        let err = SimilarityResponse::from_json(r#"{"labels": ["red"]}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::Malformed(_)));

        let err = SimilarityResponse::from_json(r#"{"probabilities": [1.0]}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::Malformed(_)));

        let err = SimilarityResponse::from_json("not json").unwrap_err();
        assert!(matches!(err, AnalysisError::Malformed(_)));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let response = SimilarityResponse {
            labels: vec!["red".into(), "blue".into()],
            probabilities: vec![100.0],
        };
        assert!(matches!(
            AnalysisResult::try_from(response),
            Err(AnalysisError::LengthMismatch {
                labels: 2,
                probabilities: 1
            })
        ));
    }

    #[test]
    fn result_must_cover_every_submitted_label() {
        let result = AnalysisResult::try_from(SimilarityResponse {
            labels: vec!["red".into()],
            probabilities: vec![100.0],
        })
        .unwrap();

        assert!(result.check_label_count(&LabelSet::new(["red"])).is_ok());
        assert!(matches!(
            result.check_label_count(&LabelSet::new(["red", "blue", "green"])),
            Err(AnalysisError::LabelCountMismatch {
                submitted: 3,
                returned: 1
            })
        ));
    }

    #[test]
    fn bar_scales_and_clamps() {
        let row = |probability| ResultRow {
            label: "x".into(),
            probability,
        };
        assert_eq!(row(50.0).bar(10).chars().count(), 5);
        assert_eq!(row(250.0).bar(10).chars().count(), 10);
        assert_eq!(row(-3.0).bar(10), "");
        assert_eq!(row(f64::NAN).bar(10), "");
    }
}
