use std::sync::Arc;

use anyhow::Context;
use rosetta_store::VersionedWriter;
use rosetta_types::BlockChangeSet;
use tokio::sync::mpsc;
use tracing::debug;

use crate::metrics::Metrics;
use crate::monitor::Progress;
use crate::monitor::Shutdown;

/// Persists change sets in arrival order.
pub struct Storer<S: ?Sized> {
    store: Arc<S>,
    progress: Arc<Progress>,
    metrics: Metrics,
}

impl<S: VersionedWriter + ?Sized + 'static> Storer<S> {
    pub fn new(
        store: Arc<S>,
        progress: Arc<Progress>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            progress,
            metrics,
        }
    }

    async fn persist(
        &self,
        changes: BlockChangeSet,
    ) -> anyhow::Result<()> {
        let block = changes.block_number;
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.apply_changes(&changes))
            .await
            .context("store task panicked")?
            .with_context(|| format!("persisting block {block}"))?;

        self.progress.record(block);
        self.metrics
            .set_last_persisted_block(block);
        debug!(block, "block persisted");
        Ok(())
    }

    /// Returns once the sender is dropped or `shutdown` triggers.
    ///
    /// A write already handed to the store always completes.
    pub async fn run(
        self,
        mut changes: mpsc::Receiver<BlockChangeSet>,
        shutdown: Shutdown,
    ) -> anyhow::Result<()> {
        loop {
            let change_set = tokio::select! {
                _ = shutdown.triggered() => return Ok(()),
                change_set = changes.recv() => match change_set {
                    Some(change_set) => change_set,
                    None => return Ok(()),
                },
            };

            self.persist(change_set)
                .await
                .inspect_err(|_| {
                    self.metrics
                        .increment_error_count("storer");
                })?;
        }
    }
}
