use crate::config::ModelConfig;
use ndarray::ArrayView4;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("Model not loaded")]
    NotReady,
    #[error("Inference failed: {0}")]
    Execution(String),
}

/// Opaque inference capability: load a graph from a configured location,
/// execute it on a single-item NHWC batch, get the raw output vector back.
pub trait InferenceRuntime: Send + Sync + 'static {
    type Handle: Send;

    fn load(&self, config: &ModelConfig) -> Result<Self::Handle, ModelError>;

    fn execute(
        &self,
        handle: &mut Self::Handle,
        input: ArrayView4<'_, f32>,
    ) -> Result<Vec<f32>, ModelError>;
}
