use crate::codec::Prediction;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Snapshot of what the consumer should currently show: 0..K predictions
/// sorted by descending probability, plus how long the inference took.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayedResults {
    pub predictions: Vec<Prediction>,
    pub inference_time: Duration,
}

/// Sole writer of the displayed result set.
///
/// A new result replaces the display when it is non-empty, or when the
/// display has not been updated for longer than the stale timeout. Momentary
/// low-confidence frames therefore never blank a still-valid label, but the
/// display is guaranteed to clear once the subject genuinely leaves view.
pub struct ResultPublisher {
    tx: watch::Sender<DisplayedResults>,
    stale_timeout: Duration,
    last_update: Mutex<Option<Instant>>,
}

impl ResultPublisher {
    pub fn new(stale_timeout: Duration) -> (Self, watch::Receiver<DisplayedResults>) {
        let (tx, rx) = watch::channel(DisplayedResults::default());
        (
            Self {
                tx,
                stale_timeout,
                last_update: Mutex::new(None),
            },
            rx,
        )
    }

    /// Applies the staleness policy to a freshly classified result.
    /// Returns whether the displayed set was replaced.
    pub fn publish(
        &self,
        predictions: Vec<Prediction>,
        inference_time: Duration,
        now: Instant,
    ) -> bool {
        let mut last_update = self.last_update.lock();
        let stale = match *last_update {
            Some(at) => now.duration_since(at) > self.stale_timeout,
            None => true,
        };

        if predictions.is_empty() && !stale {
            return false;
        }

        *last_update = Some(now);
        let _ = self.tx.send(DisplayedResults {
            predictions,
            inference_time,
        });
        true
    }
}
