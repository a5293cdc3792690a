use crate::engine::{AnalysisEngine, AnalysisEngineResult};
use crate::error::{AnalysisError, ValidationError};
use crate::file::SelectedFile;
use crate::preview::{InMemoryPreviewStore, PreviewStore};
use crate::widget::{AnalysisWidget, ResponseDisposition, WidgetState};
use std::time::{Duration, Instant};

/// A widget wired to an engine, ready to be driven from an event loop.
///
/// Front ends forward user events to [`AnalysisSession::select_file`] and
/// [`AnalysisSession::submit`], and call [`AnalysisSession::poll`] once per
/// frame to pick up finished requests.
pub struct AnalysisSession<P: PreviewStore = InMemoryPreviewStore> {
    widget: AnalysisWidget<P>,
    engine: AnalysisEngine,
}

impl<P: PreviewStore> AnalysisSession<P> {
    /// Pairs `widget` with the engine that will run its requests.
    pub fn new(widget: AnalysisWidget<P>, engine: AnalysisEngine) -> Self {
        Self { widget, engine }
    }

    pub fn widget(&self) -> &AnalysisWidget<P> {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut AnalysisWidget<P> {
        &mut self.widget
    }

    pub fn engine(&self) -> &AnalysisEngine {
        &self.engine
    }

    /// Forwards a file selection to the widget.
    pub fn select_file(&mut self, file: SelectedFile) -> Result<(), ValidationError> {
        self.widget.select_file(file)
    }

    /// Submits the selected file. Returns whether a request was issued.
    ///
    /// When the engine refuses the request the widget moves to `Failed` and
    /// nothing is sent.
    pub fn submit(&mut self) -> bool {
        let Some(ticket) = self.widget.submit() else {
            return false;
        };
        let seq = ticket.seq();
        match self.engine.schedule(seq, ticket.into_request()) {
            Ok(()) => true,
            Err(e) => {
                self.widget.on_response(seq, Err(e));
                false
            }
        }
    }

    /// Applies every request that has finished so far, without blocking.
    pub fn poll(&mut self) -> Vec<ResponseDisposition> {
        let mut dispositions = Vec::new();
        loop {
            match self.engine.try_poll_response() {
                AnalysisEngineResult::Response(response) => {
                    log::debug!(
                        "Request {} for {} took {:?}",
                        response.id,
                        response.file_name,
                        response.duration
                    );
                    dispositions.push(self.widget.on_response(response.id, response.outcome));
                }
                AnalysisEngineResult::Empty(_) => break,
                AnalysisEngineResult::Error(e) => {
                    if let Some(disposition) = self.fail_in_flight(e) {
                        dispositions.push(disposition);
                    }
                    break;
                }
            }
        }
        dispositions
    }

    /// Waits up to `timeout` for one finished request and applies it.
    pub fn poll_timeout(&mut self, timeout: Duration) -> Option<ResponseDisposition> {
        match self.engine.poll_response_timeout(timeout) {
            AnalysisEngineResult::Response(response) => {
                Some(self.widget.on_response(response.id, response.outcome))
            }
            AnalysisEngineResult::Empty(_) => None,
            AnalysisEngineResult::Error(e) => self.fail_in_flight(e),
        }
    }

    /// Blocks until the widget leaves `Analyzing` or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> WidgetState {
        let deadline = Instant::now() + timeout;
        while self.widget.state() == WidgetState::Analyzing {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::warn!("Gave up waiting for request {:?}", self.widget.in_flight());
                break;
            }
            if let Some(ResponseDisposition::Applied(_)) = self.poll_timeout(remaining) {
                break;
            }
        }
        self.widget.state()
    }

    fn fail_in_flight(&mut self, error: AnalysisError) -> Option<ResponseDisposition> {
        let seq = self.widget.in_flight()?;
        Some(self.widget.on_response(seq, Err(error)))
    }
}
