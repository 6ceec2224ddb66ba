use crate::{
    camera::Frame,
    codec,
    config::ModelConfig,
    runtime::{InferenceRuntime, ModelError},
};
use ndarray::{Array, Ix4};
use parking_lot::Mutex;

/// Owns the loaded model handle for the lifetime of the pipeline.
///
/// The single handle mutex makes `load`, `predict` and `dispose` mutually
/// exclusive in time, so the handle is never replaced or released while an
/// inference is running on it.
pub struct ModelManager<R: InferenceRuntime> {
    runtime: R,
    config: ModelConfig,
    handle: Mutex<Option<R::Handle>>,
}

impl<R: InferenceRuntime> ModelManager<R> {
    pub fn new(runtime: R, config: ModelConfig) -> Self {
        Self {
            runtime,
            config,
            handle: Mutex::new(None),
        }
    }

    /// Loads the model and runs one warm-up inference on a zero tensor so
    /// one-time initialization costs are paid before the first real frame.
    ///
    /// Idempotent: returns immediately when a handle already exists. On any
    /// failure the handle stays unset and a later retry is possible.
    pub fn load(&self) -> Result<(), ModelError> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Ok(());
        }

        let mut loaded = self.runtime.load(&self.config)?;

        let size = self.config.input_size as usize;
        let zeros: Array<f32, Ix4> = Array::zeros((1, size, size, 3));
        self.runtime
            .execute(&mut loaded, zeros.view())
            .map_err(|e| ModelError::Load(format!("warm-up inference failed: {}", e)))?;

        tracing::info!(input_size = size, "Model loaded and warmed up");
        *handle = Some(loaded);
        Ok(())
    }

    /// Preprocesses the frame and runs it through the loaded model,
    /// returning the raw logits.
    pub fn predict(&self, frame: &Frame) -> Result<Vec<f32>, ModelError> {
        let input = codec::preprocess(frame, self.config.input_size)?;

        let mut guard = self.handle.lock();
        let handle = guard.as_mut().ok_or(ModelError::NotReady)?;
        self.runtime.execute(handle, input.view())
    }

    /// Releases the handle and everything the runtime allocated for it.
    /// Safe to call when no handle exists; `predict` fails fast afterwards.
    pub fn dispose(&self) {
        let mut handle = self.handle.lock();
        if handle.take().is_some() {
            tracing::info!("Disposed model");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, ArrayView4};
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    #[derive(Clone)]
    struct FakeRuntime {
        loads: Arc<AtomicUsize>,
        executions: Arc<AtomicUsize>,
        fail_load: Arc<AtomicBool>,
        fail_execute: Arc<AtomicBool>,
        logits: Vec<f32>,
    }

    impl FakeRuntime {
        fn new(logits: Vec<f32>) -> Self {
            Self {
                loads: Arc::new(AtomicUsize::new(0)),
                executions: Arc::new(AtomicUsize::new(0)),
                fail_load: Arc::new(AtomicBool::new(false)),
                fail_execute: Arc::new(AtomicBool::new(false)),
                logits,
            }
        }
    }

    impl InferenceRuntime for FakeRuntime {
        type Handle = ();

        fn load(&self, _config: &ModelConfig) -> Result<(), ModelError> {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(ModelError::Load("simulated load failure".to_string()));
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn execute(
            &self,
            _handle: &mut (),
            _input: ArrayView4<'_, f32>,
        ) -> Result<Vec<f32>, ModelError> {
            if self.fail_execute.load(Ordering::SeqCst) {
                return Err(ModelError::Execution("simulated failure".to_string()));
            }
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(self.logits.clone())
        }
    }

    fn test_config() -> ModelConfig {
        ModelConfig {
            model_file: "model.onnx".to_string(),
            model_dir: std::path::PathBuf::from("./models"),
            input_size: 8,
            output_node: "Identity".to_string(),
        }
    }

    fn test_frame() -> Frame {
        Frame::new(Array3::zeros((8, 8, 3)))
    }

    #[test]
    fn test_load_is_idempotent() {
        let runtime = FakeRuntime::new(vec![0.0; 4]);
        let loads = runtime.loads.clone();
        let executions = runtime.executions.clone();
        let manager = ModelManager::new(runtime, test_config());

        manager.load().unwrap();
        manager.load().unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        // exactly one warm-up inference
        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert!(manager.is_loaded());
    }

    #[test]
    fn test_predict_before_load_fails_fast() {
        let manager = ModelManager::new(FakeRuntime::new(vec![0.0; 4]), test_config());

        let result = manager.predict(&test_frame());
        assert!(matches!(result, Err(ModelError::NotReady)));
    }

    #[test]
    fn test_predict_after_dispose_fails_fast() {
        let manager = ModelManager::new(FakeRuntime::new(vec![0.0; 4]), test_config());
        manager.load().unwrap();
        assert!(manager.predict(&test_frame()).is_ok());

        manager.dispose();
        let result = manager.predict(&test_frame());
        assert!(matches!(result, Err(ModelError::NotReady)));

        // dispose stays safe when nothing is loaded
        manager.dispose();
    }

    #[test]
    fn test_failed_load_leaves_manager_retryable() {
        let runtime = FakeRuntime::new(vec![0.0; 4]);
        let fail_load = runtime.fail_load.clone();
        let loads = runtime.loads.clone();
        let manager = ModelManager::new(runtime, test_config());

        fail_load.store(true, Ordering::SeqCst);
        assert!(matches!(manager.load(), Err(ModelError::Load(_))));
        assert!(!manager.is_loaded());

        fail_load.store(false, Ordering::SeqCst);
        manager.load().unwrap();
        assert!(manager.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_warm_up_leaves_handle_unset() {
        let runtime = FakeRuntime::new(vec![0.0; 4]);
        let fail_execute = runtime.fail_execute.clone();
        let manager = ModelManager::new(runtime, test_config());

        fail_execute.store(true, Ordering::SeqCst);
        assert!(matches!(manager.load(), Err(ModelError::Load(_))));
        assert!(!manager.is_loaded());
    }
}
