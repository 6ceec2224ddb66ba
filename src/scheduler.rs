use crate::{
    camera::{CameraError, FrameSource},
    codec::{self, Prediction},
    config::PipelineConfig,
    labels::ClassTable,
    model::ModelManager,
    publisher::ResultPublisher,
    runtime::{InferenceRuntime, ModelError},
};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle, time::MissedTickBehavior};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Drives the sampling loop: one tick per available frame, classification
/// only every `sampling_interval` ticks and only while no other inference is
/// in flight. Frames are never queued, so a slow model degrades the
/// classification rate without backing up frame consumption.
pub struct Scheduler<S: FrameSource, R: InferenceRuntime> {
    source: Arc<S>,
    model: Arc<ModelManager<R>>,
    labels: Arc<ClassTable>,
    publisher: ResultPublisher,
    sampling_interval: u64,
    top_k: usize,
    min_probability: f32,
    frame_count: AtomicU64,
    busy: AtomicBool,
}

impl<S: FrameSource, R: InferenceRuntime> Scheduler<S, R> {
    pub fn new(
        source: Arc<S>,
        model: Arc<ModelManager<R>>,
        labels: Arc<ClassTable>,
        publisher: ResultPublisher,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            source,
            model,
            labels,
            publisher,
            sampling_interval: config.sampling_interval.max(1),
            top_k: config.top_k,
            min_probability: config.min_probability,
            frame_count: AtomicU64::new(0),
            busy: AtomicBool::new(false),
        }
    }

    /// One pass of the state machine. Per-tick failures are logged and
    /// contained here; nothing a single frame does can stop the loop.
    pub fn tick(&self) {
        let tick = self.frame_count.fetch_add(1, Ordering::Relaxed) + 1;
        if tick % self.sampling_interval != 0 {
            return;
        }

        // single-flight: Idle -> Busy, or skip this tick entirely
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::trace!(tick, "Classification already in flight, skipping");
            return;
        }

        let outcome = self.classify();
        self.busy.store(false, Ordering::Release);

        match outcome {
            Ok(Some((predictions, elapsed))) => {
                tracing::debug!(
                    tick,
                    elapsed_ms = elapsed.as_millis() as u64,
                    count = predictions.len(),
                    "Classified frame"
                );
                self.publisher.publish(predictions, elapsed, Instant::now());
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(tick, "Classification failed: {}", e),
        }
    }

    /// Pulls one frame and runs preprocess -> predict -> postprocess.
    /// The frame is dropped, and thereby reclaimed, on every path out.
    fn classify(&self) -> Result<Option<(Vec<Prediction>, Duration)>, SchedulerError> {
        let Some(frame) = self.source.next_frame()? else {
            return Ok(None);
        };

        let started = Instant::now();
        let logits = self.model.predict(&frame);
        drop(frame);

        let predictions = codec::postprocess(&logits?, &self.labels, self.top_k, self.min_probability);
        Ok(Some((predictions, started.elapsed())))
    }

    /// Runs the loop on a timer until the shutdown broadcast arrives.
    /// Cancellation is cooperative: an in-flight tick finishes first.
    pub fn spawn(
        scheduler: Arc<Self>,
        tick_interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => scheduler.tick(),
                }
            }
        })
    }
}
