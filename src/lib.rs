mod codec;
mod labels;
mod model;
mod ort_runtime;
mod publisher;
mod runtime;
mod scheduler;

pub mod app;
pub mod camera;
pub mod config;

pub use app::{start_app, Pipeline, PipelineError};
pub use camera::{CameraError, Frame, FrameSource, TestPatternCamera};
pub use codec::Prediction;
pub use labels::ClassTable;
pub use model::ModelManager;
pub use ort_runtime::OrtRuntime;
pub use publisher::DisplayedResults;
pub use runtime::{InferenceRuntime, ModelError};
