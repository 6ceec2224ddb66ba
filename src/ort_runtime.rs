use crate::{
    config::ModelConfig,
    runtime::{InferenceRuntime, ModelError},
};
use ndarray::ArrayView4;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};

/// ONNX Runtime implementation of the inference capability.
pub struct OrtRuntime {
    output_node: String,
}

impl OrtRuntime {
    pub fn new(model_config: &ModelConfig) -> Result<Self, ModelError> {
        ort::init()
            .commit()
            .map_err(|e| ModelError::Load(format!("failed to initialize ort: {}", e)))?;

        Ok(Self {
            output_node: model_config.output_node.clone(),
        })
    }
}

impl InferenceRuntime for OrtRuntime {
    type Handle = Session;

    fn load(&self, config: &ModelConfig) -> Result<Session, ModelError> {
        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(config.get_model_path()))
            .map_err(|e| ModelError::Load(e.to_string()))?;

        tracing::info!("Created ONNX session from {:?}", config.get_model_path());

        Ok(session)
    }

    fn execute(
        &self,
        session: &mut Session,
        input: ArrayView4<'_, f32>,
    ) -> Result<Vec<f32>, ModelError> {
        let owned_buffer;
        let input_view = if input.is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)
            .map_err(|e| ModelError::Execution(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| ModelError::Execution(format!("inference failed: {}", e)))?;

        let (_, data) = outputs[self.output_node.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Execution(format!("failed to extract tensor: {}", e)))?;

        Ok(data.to_vec())
    }
}
