use crate::config::ClientConfig;
use crate::error::AnalysisError;
use crate::file::SelectedFile;
use crate::labels::LabelSet;
use crate::protocol::{
    AnalysisResult, FILE_FIELD, SimilarityResponse, TEXT_INPUT_FIELD, TextInput,
};
use reqwest::blocking::{Client, multipart};
use std::time::Duration;

/// One outbound analysis: the selected image and the labels to score it against.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisRequest {
    pub file: SelectedFile,
    pub labels: LabelSet,
}

/// Something that scores an image against a set of labels.
///
/// [`HttpAnalysisService`] talks to a remote similarity service; tests and
/// offline front ends can plug in their own implementation.
pub trait AnalysisService {
    /// Scores `request.file` against every label of `request.labels`, in order.
    fn analyze(&mut self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;
}

/// Posts the image and labels as a multipart form to a similarity endpoint.
pub struct HttpAnalysisService {
    client: Client,
    endpoint: String,
}

impl HttpAnalysisService {
    /// Creates a client posting to `endpoint`, giving up on a request after `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Creates a client from the endpoint and timeout of `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, AnalysisError> {
        Self::new(config.endpoint.clone(), config.request_timeout())
    }

    /// URL the form is posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl AnalysisService for HttpAnalysisService {
    fn analyze(&mut self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let text_input = serde_json::to_string(&TextInput::from(&request.labels))
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;

        let file_part = multipart::Part::bytes(request.file.bytes().to_vec())
            .file_name(request.file.name().to_string())
            .mime_str(request.file.media_type())?;

        let form = multipart::Form::new()
            .part(FILE_FIELD, file_part)
            .text(TEXT_INPUT_FIELD, text_input);

        log::debug!(
            "POST {} with {} ({} bytes)",
            self.endpoint,
            request.file.name(),
            request.file.size()
        );

        let response = self.client.post(&self.endpoint).multipart(form).send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result = AnalysisResult::try_from(SimilarityResponse::from_json(&body)?)?;
        result.check_label_count(&request.labels)?;
        Ok(result)
    }
}
