use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};

use crate::document::Document;

pub type SharedDocument = Arc<Mutex<Document>>;

/// Periodically flushes a document kept under `SavePolicy::Deferred`.
pub struct Autosave {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl Autosave {
    pub fn spawn(doc: SharedDocument, every: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        // Saving touches the filesystem; keep it off the runtime threads.
                        let doc = Arc::clone(&doc);
                        let flushed = tokio::task::spawn_blocking(move || {
                            let mut doc = doc.blocking_lock();
                            Ok::<_, anyhow::Error>(doc.flush()?.then(|| doc.location()))
                        })
                        .await;
                        match flushed {
                            Ok(Ok(Some(location))) => tracing::debug!(%location, "autosaved"),
                            Ok(Ok(None)) => {}
                            Ok(Err(err)) => tracing::warn!(?err, "autosave failed"),
                            Err(err) => tracing::warn!(?err, "autosave flush aborted"),
                        }
                    }
                }
            }
        });
        Self {
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// Stops the ticker and waits for it; the caller does the final flush.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(err) = (&mut self.handle).await {
            tracing::warn!(?err, "autosave task ended abnormally");
        }
    }
}
