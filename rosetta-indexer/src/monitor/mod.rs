//! The indexing pipeline feeding the versioned store.
//!
//! Three stages connected by bounded channels: the [`HeaderListener`] emits
//! every block header after the store's watermark, the [`BlockProcessor`]
//! turns each block into a [`rosetta_types::BlockChangeSet`] and the
//! [`Storer`] persists it. A failing stage stops all of them.

mod block_processor;
mod header_listener;
mod storer;

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use alloy_primitives::Address;
use anyhow::Context;
use rosetta_store::VersionedReader;
use rosetta_store::VersionedWriter;
use rosetta_tracer::ChainClient;
use rosetta_types::BlockNr;
use rosetta_types::ContractId;
use rosetta_types::TxIndex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::error;
use tracing::info;

pub use crate::monitor::block_processor::BlockProcessor;
pub use crate::monitor::header_listener::HeaderListener;
pub use crate::monitor::storer::Storer;
use crate::metrics::Metrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub channel_capacity: usize,
    pub poll_interval: Duration,
    pub registry_address: Address,
}

/// Stop signal shared by every pipeline stage.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`Self::trigger`] was called, immediately if it already was.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx
            .wait_for(|stopped| *stopped)
            .await;
    }
}

/// Last persisted block and when it was persisted.
#[derive(Debug, Default)]
pub struct Progress {
    block: AtomicU64,
    persisted_at: AtomicU64,
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

impl Progress {
    pub fn starting_at(block: BlockNr) -> Self {
        Self {
            block: AtomicU64::new(block),
            persisted_at: AtomicU64::new(unix_now()),
        }
    }

    pub fn record(
        &self,
        block: BlockNr,
    ) {
        self.block
            .fetch_max(block, Ordering::Relaxed);
        self.persisted_at
            .store(unix_now(), Ordering::Relaxed);
    }

    pub fn block(&self) -> BlockNr {
        self.block.load(Ordering::Relaxed)
    }

    /// Seconds since the last block was persisted.
    pub fn idle_secs(&self) -> u64 {
        unix_now().saturating_sub(
            self.persisted_at
                .load(Ordering::Relaxed),
        )
    }
}

/// Runs the pipeline until `shutdown` is triggered or a stage fails.
///
/// Returns the first stage error, after every stage has stopped.
pub async fn run_monitor<C, S>(
    client: Arc<C>,
    store: Arc<S>,
    settings: MonitorSettings,
    progress: Arc<Progress>,
    shutdown: Shutdown,
) -> anyhow::Result<()>
where
    C: ChainClient + 'static,
    S: VersionedReader + VersionedWriter + 'static,
{
    let metrics = Metrics::new();

    let (last_persisted, gas_price_minimum) = {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || resume_point(store.as_ref()))
            .await
            .context("reading the resume point")??
    };
    info!(
        last_persisted,
        ?gas_price_minimum,
        "starting monitor"
    );

    let (header_tx, header_rx) = mpsc::channel(settings.channel_capacity);
    let (changes_tx, changes_rx) = mpsc::channel(settings.channel_capacity);

    let listener = HeaderListener::new(
        Arc::clone(&client),
        last_persisted + 1,
        settings.poll_interval,
        metrics,
    );
    let processor = BlockProcessor::new(
        client,
        settings.registry_address,
        gas_price_minimum,
        metrics,
    );
    let storer = Storer::new(store, progress, metrics);

    let mut stages = JoinSet::new();
    {
        let shutdown = shutdown.clone();
        stages.spawn(async move {
            listener
                .run(header_tx, shutdown)
                .await
                .context("header listener")
        });
    }
    {
        let shutdown = shutdown.clone();
        stages.spawn(async move {
            processor
                .run(header_rx, changes_tx, shutdown)
                .await
                .context("block processor")
        });
    }
    {
        let shutdown = shutdown.clone();
        stages.spawn(async move {
            storer
                .run(changes_rx, shutdown)
                .await
                .context("storer")
        });
    }

    let mut first_error = None;
    while let Some(joined) = stages.join_next().await {
        let result = joined
            .context("monitor stage panicked")
            .and_then(|result| result);
        if let Err(err) = result {
            error!("monitor stage failed: {err:?}");
            shutdown.trigger();
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => {
            info!("monitor stopped");
            Ok(())
        },
    }
}

/// The watermark and the GasPriceMinimum contract registered once it is applied.
fn resume_point<S: VersionedReader + ?Sized>(
    store: &S
) -> anyhow::Result<(BlockNr, Option<Address>)> {
    let last_persisted = store
        .last_persisted_block()
        .context("reading the last persisted block")?;

    let gas_price_minimum = match store
        .registry_address_after_watermark(ContractId::GasPriceMinimum.as_str())
    {
        Ok(address) => Some(address),
        Err(err) if err.is_not_found() => None,
        Err(err) => return Err(err).context("resolving the GasPriceMinimum contract"),
    };

    Ok((last_persisted, gas_price_minimum))
}
