use crate::{
    camera::{CameraError, FrameSource, TestPatternCamera},
    config::Config,
    labels::ClassTable,
    model::ModelManager,
    ort_runtime::OrtRuntime,
    publisher::{DisplayedResults, ResultPublisher},
    runtime::{InferenceRuntime, ModelError},
    scheduler::Scheduler,
};
use std::{error::Error, sync::Arc};
use thiserror::Error;
use tokio::{
    signal,
    sync::{broadcast, watch},
    task::JoinHandle,
};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// A running classification pipeline.
///
/// `start` resolving successfully is the model-ready signal: the source has
/// been authorized and the model loaded and warmed before the scheduling
/// loop spawns. Consumers observe display updates through the watch channel.
pub struct Pipeline<R: InferenceRuntime> {
    results: watch::Receiver<DisplayedResults>,
    shutdown_tx: broadcast::Sender<()>,
    loop_handle: JoinHandle<()>,
    model: Arc<ModelManager<R>>,
}

impl<R: InferenceRuntime> Pipeline<R> {
    pub async fn start<S: FrameSource>(
        source: S,
        runtime: R,
        labels: ClassTable,
        config: &Config,
    ) -> Result<Self, PipelineError> {
        source.open()?;

        let model = Arc::new(ModelManager::new(runtime, config.model.clone()));
        {
            let model = model.clone();
            tokio::task::spawn_blocking(move || model.load())
                .await
                .map_err(|e| ModelError::Load(format!("load task failed: {}", e)))??;
        }
        tracing::info!("Model ready");

        let (publisher, results) = ResultPublisher::new(config.pipeline.stale_timeout());
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(source),
            model.clone(),
            Arc::new(labels),
            publisher,
            &config.pipeline,
        ));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let loop_handle = Scheduler::spawn(scheduler, config.pipeline.tick_interval(), shutdown_rx);

        Ok(Self {
            results,
            shutdown_tx,
            loop_handle,
            model,
        })
    }

    /// Snapshot-read handle on the displayed result set; notified on every
    /// accepted publish.
    pub fn results(&self) -> watch::Receiver<DisplayedResults> {
        self.results.clone()
    }

    /// Stops scheduling new ticks, waits for any in-flight inference to
    /// drain, then releases the model.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.loop_handle.await;
        self.model.dispose();
    }
}

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let labels = match ClassTable::from_file(&config.labels.get_path()) {
        Ok(labels) => labels,
        Err(e) => {
            tracing::error!("Failed to load class labels: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let runtime = match OrtRuntime::new(&config.model) {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to initialize inference runtime: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let camera = TestPatternCamera::new(640, 480);
    let pipeline = Pipeline::start(camera, runtime, labels, &config).await?;

    let mut results = pipeline.results();
    tokio::spawn(async move {
        while results.changed().await.is_ok() {
            let snapshot = results.borrow_and_update().clone();
            tracing::info!(
                predictions = ?snapshot.predictions,
                inference_ms = snapshot.inference_time.as_millis() as u64,
                "Display updated"
            );
        }
    });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown");

    pipeline.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
