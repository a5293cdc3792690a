//! Client side of an image/label similarity analysis.
//!
//! A user picks an image, the [`AnalysisWidget`] sends it together with a
//! fixed [`LabelSet`] to a similarity service, and the per-label
//! probabilities come back as ordered [`ResultRow`]s ready for a bar chart.
//!
//! The widget is a plain state machine with no I/O of its own, so any front
//! end can drive it. [`AnalysisSession`] pairs it with an [`AnalysisEngine`]
//! that executes requests on a background thread through an
//! [`AnalysisService`] such as [`HttpAnalysisService`].

pub mod config;
pub mod engine;
pub mod error;
pub mod file;
pub mod labels;
pub mod preview;
pub mod protocol;
pub mod service;
pub mod session;
pub mod widget;

pub use config::ClientConfig;
pub use engine::{AnalysisEngine, AnalysisEngineResponse, AnalysisEngineResult, AnalysisEngineState};
pub use error::{AnalysisError, ConfigError, FAILURE_MESSAGE, FileError, ValidationError};
pub use file::{MAX_FILE_BYTES, SelectedFile};
pub use labels::LabelSet;
pub use preview::{InMemoryPreviewStore, PreviewHandle, PreviewStore};
pub use protocol::{AnalysisResult, ResultRow, SimilarityResponse, TextInput};
pub use service::{AnalysisRequest, AnalysisService, HttpAnalysisService};
pub use session::AnalysisSession;
pub use widget::{AnalysisTicket, AnalysisWidget, ResponseDisposition, WidgetState};
