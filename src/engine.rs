use crate::error::AnalysisError;
use crate::protocol::AnalysisResult;
use crate::service::{AnalysisRequest, AnalysisService};
use std::{
    sync::{Arc, Mutex, mpsc},
    thread::JoinHandle,
    time::{Duration, Instant},
};

/// Represents the current state of the analysis engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisEngineState {
    /// No request is being processed.
    Idle,
    /// A request is being sent to the service.
    Processing,
}

impl AnalysisEngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisEngineState::Idle => "idle",
            AnalysisEngineState::Processing => "processing",
        }
    }
}

struct AnalysisEngineRequest {
    id: u64,
    request: AnalysisRequest,
}

/// A finished request together with its telemetry.
#[derive(Debug)]
pub struct AnalysisEngineResponse {
    /// Sequence number the request was scheduled with.
    pub id: u64,
    /// Name of the file that was analyzed.
    pub file_name: String,
    /// When the request was picked up by the worker.
    pub start_time: Instant,
    /// Time spent waiting for the service.
    pub duration: Duration,
    pub outcome: Result<AnalysisResult, AnalysisError>,
}

/// Result of polling the engine.
#[derive(Debug)]
pub enum AnalysisEngineResult {
    /// A request finished, successfully or not.
    Response(AnalysisEngineResponse),
    /// Nothing finished yet, with the current engine state.
    Empty(AnalysisEngineState),
    /// The worker thread is gone.
    Error(AnalysisError),
}

/// Runs analysis requests on a background thread.
///
/// Requests are processed one at a time in the order they were scheduled.
/// Callers poll for finished requests with [`AnalysisEngine::try_poll_response`],
/// which never blocks, so the engine fits an event loop.
pub struct AnalysisEngine {
    state: Arc<Mutex<AnalysisEngineState>>,
    req_tx: Option<mpsc::Sender<AnalysisEngineRequest>>,
    rep_rx: mpsc::Receiver<AnalysisEngineResponse>,
    worker_handle: Option<JoinHandle<()>>,
}

impl AnalysisEngine {
    /// Creates a new engine and moves `service` onto its worker thread.
    pub fn new<S>(mut service: S) -> Self
    where
        S: AnalysisService + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<AnalysisEngineRequest>();
        let (rep_tx, rep_rx) = mpsc::channel::<AnalysisEngineResponse>();
        let state = Arc::new(Mutex::new(AnalysisEngineState::Idle));

        let worker_handle = std::thread::spawn({
            let state = state.clone();
            move || {
                while let Ok(req) = req_rx.recv() {
                    log::debug!("Running analysis request {}", req.id);

                    *state.lock().unwrap() = AnalysisEngineState::Processing;
                    let start_time = Instant::now();

                    let outcome = service.analyze(&req.request);

                    log::debug!("Analysis request {} completed", req.id);

                    *state.lock().unwrap() = AnalysisEngineState::Idle;

                    let response = AnalysisEngineResponse {
                        id: req.id,
                        file_name: req.request.file.name().to_string(),
                        start_time,
                        duration: start_time.elapsed(),
                        outcome,
                    };
                    if rep_tx.send(response).is_err() {
                        break;
                    }
                }
            }
        });

        Self {
            state,
            req_tx: Some(req_tx),
            rep_rx,
            worker_handle: Some(worker_handle),
        }
    }

    pub fn state(&self) -> AnalysisEngineState {
        *self.state.lock().unwrap()
    }

    /// Attempts to retrieve a finished request without blocking.
    pub fn try_poll_response(&self) -> AnalysisEngineResult {
        match self.rep_rx.try_recv() {
            Ok(response) => AnalysisEngineResult::Response(response),
            Err(mpsc::TryRecvError::Empty) => AnalysisEngineResult::Empty(self.state()),
            Err(mpsc::TryRecvError::Disconnected) => {
                log::error!("Response channel disconnected");
                AnalysisEngineResult::Error(AnalysisError::EngineStopped)
            }
        }
    }

    /// Waits up to `timeout` for the next finished request.
    pub fn poll_response_timeout(&self, timeout: Duration) -> AnalysisEngineResult {
        match self.rep_rx.recv_timeout(timeout) {
            Ok(response) => AnalysisEngineResult::Response(response),
            Err(mpsc::RecvTimeoutError::Timeout) => AnalysisEngineResult::Empty(self.state()),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                log::error!("Response channel disconnected");
                AnalysisEngineResult::Error(AnalysisError::EngineStopped)
            }
        }
    }

    /// Queues `request` under sequence number `id`.
    pub fn schedule(&self, id: u64, request: AnalysisRequest) -> Result<(), AnalysisError> {
        let tx = self.req_tx.as_ref().ok_or(AnalysisError::EngineStopped)?;
        tx.send(AnalysisEngineRequest { id, request })
            .map_err(|_| AnalysisError::EngineStopped)
    }

    /// Stops accepting requests and waits for the worker to drain its queue.
    pub fn stop(&mut self) {
        self.req_tx.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AnalysisEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::SelectedFile;
    use crate::labels::LabelSet;
    use crate::protocol::SimilarityResponse;

    struct EchoService;

    impl AnalysisService for EchoService {
        fn analyze(&mut self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
            if request.file.name() == "broken.png" {
                return Err(AnalysisError::Malformed("broken".into()));
            }
            let labels = request.labels.as_slice().to_vec();
            let probabilities = vec![100.0 / labels.len() as f64; labels.len()];
            AnalysisResult::try_from(SimilarityResponse {
                labels,
                probabilities,
            })
        }
    }

    fn request(name: &str) -> AnalysisRequest {
        AnalysisRequest {
            file: SelectedFile::new(name, "image/png", vec![1u8; 8]),
            labels: LabelSet::new(["red", "blue"]),
        }
    }

    fn next_response(engine: &AnalysisEngine) -> AnalysisEngineResponse {
        match engine.poll_response_timeout(Duration::from_secs(5)) {
            AnalysisEngineResult::Response(response) => response,
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[test]
    fn processes_requests_in_order() {
        let engine = AnalysisEngine::new(EchoService);
        engine.schedule(1, request("a.png")).unwrap();
        engine.schedule(2, request("broken.png")).unwrap();

        let first = next_response(&engine);
        assert_eq!(first.id, 1);
        assert_eq!(first.file_name, "a.png");
        let result = first.outcome.unwrap();
        assert_eq!(result.probabilities(), &[50.0, 50.0]);

        let second = next_response(&engine);
        assert_eq!(second.id, 2);
        assert!(matches!(second.outcome, Err(AnalysisError::Malformed(_))));
    }

    #[test]
    fn empty_poll_reports_state() {
        let engine = AnalysisEngine::new(EchoService);
        assert!(matches!(
            engine.try_poll_response(),
            AnalysisEngineResult::Empty(AnalysisEngineState::Idle)
        ));
        assert_eq!(engine.state().as_str(), "idle");
    }

    #[test]
    fn stopped_engine_refuses_requests() {
        let mut engine = AnalysisEngine::new(EchoService);
        engine.stop();
        assert!(matches!(
            engine.schedule(1, request("a.png")),
            Err(AnalysisError::EngineStopped)
        ));
        assert!(matches!(
            engine.try_poll_response(),
            AnalysisEngineResult::Error(AnalysisError::EngineStopped)
        ));
    }
}
