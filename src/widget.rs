//! The image analysis widget as an explicit state machine.
//!
//! ```text
//!  Idle ──select──▶ Ready ──submit──▶ Analyzing ──ok──▶ Succeeded
//!                     ▲                   │
//!                     │                   └──err──▶ Failed
//!                     └──── select (from any state) ────┘
//! ```
//!
//! The widget never performs I/O. [`AnalysisWidget::submit`] hands out an
//! [`AnalysisTicket`] that the caller executes, and the outcome comes back
//! through [`AnalysisWidget::on_response`] tagged with the ticket's sequence
//! number. Outcomes for anything but the current ticket are dropped.

use crate::config::ClientConfig;
use crate::error::{AnalysisError, FAILURE_MESSAGE, ValidationError};
use crate::file::{MAX_FILE_BYTES, SelectedFile};
use crate::labels::LabelSet;
use crate::preview::{InMemoryPreviewStore, PreviewHandle, PreviewStore};
use crate::protocol::{AnalysisResult, ResultRow};
use crate::service::AnalysisRequest;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetState {
    /// No file selected.
    Idle,
    /// A file is selected and can be submitted.
    Ready,
    /// A request is in flight.
    Analyzing,
    /// The last request produced a result.
    Succeeded,
    /// The last request failed.
    Failed,
}

impl WidgetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetState::Idle => "idle",
            WidgetState::Ready => "ready",
            WidgetState::Analyzing => "analyzing",
            WidgetState::Succeeded => "succeeded",
            WidgetState::Failed => "failed",
        }
    }
}

/// A request the widget wants sent, tagged with its sequence number.
#[derive(Debug)]
pub struct AnalysisTicket {
    seq: u64,
    request: AnalysisRequest,
}

impl AnalysisTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn request(&self) -> &AnalysisRequest {
        &self.request
    }

    pub fn into_request(self) -> AnalysisRequest {
        self.request
    }
}

/// What [`AnalysisWidget::on_response`] did with an outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseDisposition {
    /// The outcome was applied and the widget moved to this state.
    Applied(WidgetState),
    /// The outcome belonged to a superseded request and was dropped.
    Stale,
}

/// Client-side state of one image analysis: selection, preview, request and result.
///
/// The widget owns its live [`PreviewHandle`] exclusively and releases it on
/// reselection, on [`AnalysisWidget::teardown`] and on drop.
pub struct AnalysisWidget<P: PreviewStore = InMemoryPreviewStore> {
    previews: P,
    labels: LabelSet,
    max_file_bytes: u64,
    state: WidgetState,
    selected: Option<SelectedFile>,
    preview: Option<PreviewHandle>,
    result: Option<AnalysisResult>,
    error_message: Option<String>,
    validation_message: Option<String>,
    in_flight: Option<u64>,
    last_seq: u64,
}

impl<P: PreviewStore> AnalysisWidget<P> {
    /// Creates an idle widget submitting `labels` with every image.
    pub fn new(previews: P, labels: LabelSet) -> Self {
        Self {
            previews,
            labels,
            max_file_bytes: MAX_FILE_BYTES,
            state: WidgetState::Idle,
            selected: None,
            preview: None,
            result: None,
            error_message: None,
            validation_message: None,
            in_flight: None,
            last_seq: 0,
        }
    }

    /// Creates an idle widget with the labels and size limit of `config`.
    pub fn from_config(previews: P, config: &ClientConfig) -> Self {
        Self::new(previews, config.labels.clone()).with_max_file_bytes(config.max_file_bytes)
    }

    /// Lowers the size limit. Values above 10 MiB are capped.
    pub fn with_max_file_bytes(mut self, limit: u64) -> Self {
        self.max_file_bytes = limit.min(MAX_FILE_BYTES);
        self
    }

    /// Selects a new image.
    ///
    /// An invalid candidate only sets the validation message; the current
    /// file, preview, result and state are left untouched. A valid candidate
    /// releases the previous preview before acquiring a new one, clears any
    /// result or error, abandons an in-flight request and moves to `Ready`.
    pub fn select_file(&mut self, candidate: SelectedFile) -> Result<(), ValidationError> {
        if let Err(e) = candidate.validate(self.max_file_bytes) {
            log::warn!("Rejected {}: {e}", candidate.name());
            self.validation_message = Some(e.to_string());
            return Err(e);
        }

        if let Some(previous) = self.preview.take() {
            self.previews.release(previous);
        }
        self.preview = Some(self.previews.acquire(&candidate));

        if let Some(seq) = self.in_flight.take() {
            log::debug!("Request {seq} superseded by a new selection");
        }

        log::info!(
            "Selected {} ({}, {} bytes)",
            candidate.name(),
            candidate.media_type(),
            candidate.size()
        );

        self.selected = Some(candidate);
        self.result = None;
        self.error_message = None;
        self.validation_message = None;
        self.state = WidgetState::Ready;
        Ok(())
    }

    /// Starts an analysis of the selected file.
    ///
    /// Returns `None` unless the widget is `Ready`; in particular a second
    /// submit while a request is in flight issues nothing.
    pub fn submit(&mut self) -> Option<AnalysisTicket> {
        if !self.can_submit() {
            log::debug!("Ignoring submit in state {}", self.state.as_str());
            return None;
        }
        let file = self.selected.clone()?;

        self.last_seq += 1;
        let seq = self.last_seq;
        self.in_flight = Some(seq);
        self.state = WidgetState::Analyzing;

        log::info!(
            "Submitting {} with {} labels as request {seq}",
            file.name(),
            self.labels.len()
        );

        Some(AnalysisTicket {
            seq,
            request: AnalysisRequest {
                file,
                labels: self.labels.clone(),
            },
        })
    }

    /// Applies the outcome of request `seq`.
    ///
    /// A result that does not score exactly one probability per label of the
    /// widget's [`LabelSet`] is treated as a failure.
    pub fn on_response(
        &mut self,
        seq: u64,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> ResponseDisposition {
        if self.state != WidgetState::Analyzing || self.in_flight != Some(seq) {
            log::debug!("Discarding stale response for request {seq}");
            return ResponseDisposition::Stale;
        }
        self.in_flight = None;

        let outcome = outcome.and_then(|result| {
            result.check_label_count(&self.labels)?;
            Ok(result)
        });

        match outcome {
            Ok(result) => {
                log::info!("Request {seq} scored {} labels", result.len());
                self.result = Some(result);
                self.error_message = None;
                self.state = WidgetState::Succeeded;
            }
            Err(e) => {
                log::error!("Request {seq} failed: {e}");
                self.result = None;
                self.error_message = Some(FAILURE_MESSAGE.to_string());
                self.state = WidgetState::Failed;
            }
        }
        ResponseDisposition::Applied(self.state)
    }

    /// Releases the live preview and forgets the selection.
    ///
    /// Safe to call more than once; it also runs when the widget is dropped.
    pub fn teardown(&mut self) {
        if let Some(handle) = self.preview.take() {
            self.previews.release(handle);
        }
        self.selected = None;
        self.result = None;
        self.error_message = None;
        self.validation_message = None;
        self.in_flight = None;
        self.state = WidgetState::Idle;
    }

    pub fn state(&self) -> WidgetState {
        self.state
    }

    /// Whether the submit action is enabled: a file is selected and nothing is in flight.
    pub fn can_submit(&self) -> bool {
        self.state == WidgetState::Ready && self.selected.is_some()
    }

    /// Sequence number of the request whose outcome will be applied, if any.
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub fn previews(&self) -> &P {
        &self.previews
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    /// Chart rows of the current result, empty unless `Succeeded`.
    pub fn rows(&self) -> Vec<ResultRow> {
        self.result.as_ref().map(AnalysisResult::rows).unwrap_or_default()
    }

    /// Generic failure text shown while `Failed`.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Why the last candidate file was refused, until a valid file is selected.
    pub fn validation_message(&self) -> Option<&str> {
        self.validation_message.as_deref()
    }
}

impl<P: PreviewStore> Drop for AnalysisWidget<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}
