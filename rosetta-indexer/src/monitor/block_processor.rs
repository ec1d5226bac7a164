use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::Address;
use anyhow::Context;
use rosetta_tracer::contracts::ContractEvent;
use rosetta_tracer::contracts::DecodeError;
use rosetta_tracer::contracts::GasPriceMinimumEvent;
use rosetta_tracer::contracts::RegistryEvent;
use rosetta_tracer::ChainClient;
use rosetta_types::BlockChangeSet;
use rosetta_types::BlockHeader;
use rosetta_types::ContractId;
use rosetta_types::Log;
use rosetta_types::RegistryChange;
use rosetta_types::TxIndex;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::metrics::Metrics;
use crate::monitor::Shutdown;

/// Derives each block's [`BlockChangeSet`] from its logs.
pub struct BlockProcessor<C> {
    client: Arc<C>,
    registry_address: Address,
    /// GasPriceMinimum contract registered as of the last processed log.
    gas_price_minimum: Option<Address>,
    metrics: Metrics,
}

/// `Ok(None)` for events the indexer has no use for.
fn decode_relevant<E: ContractEvent>(log: &Log) -> Result<Option<E>, DecodeError> {
    match E::decode(log) {
        Ok(event) => Ok(Some(event)),
        Err(err) if err.is_unknown_event() => {
            debug!(address = %log.address, "skipping {err}");
            Ok(None)
        },
        Err(err) => Err(err),
    }
}

impl<C: ChainClient> BlockProcessor<C> {
    pub fn new(
        client: Arc<C>,
        registry_address: Address,
        gas_price_minimum: Option<Address>,
        metrics: Metrics,
    ) -> Self {
        Self {
            client,
            registry_address,
            gas_price_minimum,
            metrics,
        }
    }

    pub async fn process(
        &mut self,
        header: &BlockHeader,
    ) -> anyhow::Result<BlockChangeSet> {
        let logs = self
            .client
            .block_logs(header.number)
            .await
            .with_context(|| format!("fetching logs of block {}", header.number))?;

        let mut changes = BlockChangeSet::new(header.number);
        for log in &logs {
            if log.address == self.registry_address {
                if let Some(RegistryEvent::RegistryUpdated {
                    identifier,
                    address,
                }) = decode_relevant(log)?
                {
                    if identifier == ContractId::GasPriceMinimum.as_str() {
                        self.gas_price_minimum = Some(address);
                    }
                    let change = RegistryChange {
                        tx_index: log
                            .transaction_index
                            .unwrap_or(TxIndex::MAX),
                        contract: identifier,
                        address,
                    };
                    record_change(&mut changes.registry_changes, change);
                }
            } else if Some(log.address) == self.gas_price_minimum {
                if let Some(GasPriceMinimumEvent::GasPriceMinimumUpdated { value }) =
                    decode_relevant(log)?
                {
                    changes.fee_parameter = Some(value);
                }
            }
        }

        Ok(changes)
    }

    pub async fn run(
        mut self,
        mut headers: mpsc::Receiver<BlockHeader>,
        changes: mpsc::Sender<BlockChangeSet>,
        shutdown: Shutdown,
    ) -> anyhow::Result<()> {
        loop {
            let header = tokio::select! {
                _ = shutdown.triggered() => return Ok(()),
                header = headers.recv() => match header {
                    Some(header) => header,
                    None => return Ok(()),
                },
            };

            let start = Instant::now();
            let processed = tokio::select! {
                _ = shutdown.triggered() => return Ok(()),
                processed = self.process(&header) => processed,
            };
            let change_set = processed.inspect_err(|_| {
                self.metrics
                    .increment_error_count("block_processor");
            })?;
            self.metrics
                .observe_block_processing_duration(start.elapsed().as_secs_f64());
            self.metrics
                .increment_blocks_processed();
            if !change_set
                .registry_changes
                .is_empty()
            {
                info!(
                    block = header.number,
                    changes = change_set.registry_changes.len(),
                    "registry updated"
                );
                self.metrics
                    .increment_registry_changes(change_set.registry_changes.len());
            }
            if let Some(value) = change_set.fee_parameter {
                info!(block = header.number, %value, "gas price minimum updated");
                self.metrics
                    .increment_fee_parameter_updates();
            }

            tokio::select! {
                _ = shutdown.triggered() => return Ok(()),
                sent = changes.send(change_set) => {
                    if sent.is_err() {
                        debug!("change set receiver dropped");
                        return Ok(());
                    }
                },
            }
        }
    }
}

/// Keeps one change per `(contract, tx_index)`, the last one emitted.
fn record_change(
    changes: &mut Vec<RegistryChange>,
    change: RegistryChange,
) {
    match changes
        .iter_mut()
        .find(|existing| {
            existing.contract == change.contract && existing.tx_index == change.tx_index
        }) {
        Some(existing) => {
            warn!(
                contract = %change.contract,
                tx_index = change.tx_index,
                "registry entry updated twice by one transaction"
            );
            existing.address = change.address;
        },
        None => changes.push(change),
    }
}
