use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use alloy_primitives::B256;
use metrics::counter;
use metrics::histogram;
use rosetta_store::VersionedReader;
use rosetta_types::BlockHeader;
use rosetta_types::Operation;
use rosetta_types::Receipt;
use rosetta_types::Transaction;
use tracing::debug;
use tracing::info_span;
use tracing::Instrument;

use crate::gas::compile_gas_fees;
use crate::mapper::map_logs;
use crate::mapper::CoreContracts;
use crate::reconcile::reconcile;
use crate::ChainClient;
use crate::ForkSchedule;
use crate::TracerError;

#[derive(Debug, Clone)]
pub struct TraceSettings {
    /// Name of the node-side tracer reporting internal transfers.
    pub tracer: String,
    pub timeout: Duration,
    pub forks: ForkSchedule,
}

/// Compiles transactions into ledger operations.
///
/// Holds no per-transaction state, so one instance can serve concurrent calls.
/// Store reads run on the blocking pool.
pub struct Tracer<C, S: ?Sized> {
    client: Arc<C>,
    store: Arc<S>,
    settings: TraceSettings,
}

impl<C, S> Tracer<C, S>
where
    C: ChainClient,
    S: VersionedReader + ?Sized + 'static,
{
    pub fn new(
        client: Arc<C>,
        store: Arc<S>,
        settings: TraceSettings,
    ) -> Self {
        Self {
            client,
            store,
            settings,
        }
    }

    /// All operations of `tx`. Nothing is returned unless every step succeeds.
    pub async fn trace_transaction(
        &self,
        header: &BlockHeader,
        tx: &Transaction,
        receipt: &Receipt,
    ) -> Result<Vec<Operation>, TracerError> {
        let span = info_span!(
            "trace_transaction",
            tx = %tx.hash,
            block = header.number,
            index = receipt.transaction_index,
        );

        let start = Instant::now();
        let result = self
            .compile(header, tx, receipt)
            .instrument(span)
            .await;

        match &result {
            Ok(operations) => {
                counter!("rosetta_tracer_transactions_total", "outcome" => "ok").increment(1);
                counter!("rosetta_tracer_operations_total").increment(operations.len() as u64);
            },
            Err(_) => {
                counter!("rosetta_tracer_transactions_total", "outcome" => "error").increment(1);
            },
        }
        histogram!("rosetta_tracer_duration_seconds").record(start.elapsed().as_secs_f64());

        result
    }

    /// Fetches `tx_hash` with its receipt and block, then traces it.
    pub async fn trace_by_hash(
        &self,
        tx_hash: B256,
    ) -> Result<Vec<Operation>, TracerError> {
        let receipt = self.client.receipt(tx_hash).await?;
        let tx = self.client.transaction(tx_hash).await?;
        let header = self
            .client
            .header_by_hash(receipt.block_hash)
            .await?;

        self.trace_transaction(&header, &tx, &receipt)
            .await
    }

    /// Runs `read` against the store on the blocking pool.
    async fn read_store<T, F>(
        &self,
        read: F,
    ) -> Result<T, TracerError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, TracerError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || read(store.as_ref()))
            .await
            .map_err(|err| {
                TracerError::StoreTask {
                    reason: err.to_string(),
                }
            })?
    }

    async fn compile(
        &self,
        header: &BlockHeader,
        tx: &Transaction,
        receipt: &Receipt,
    ) -> Result<Vec<Operation>, TracerError> {
        let mut operations = Vec::new();

        if tx.pays_fees_in_base_currency() {
            let sender = self
                .client
                .transaction_sender(tx, receipt.block_hash, receipt.transaction_index)
                .await?;
            let regime = self
                .settings
                .forks
                .regime_at(header.number);
            let (header, tx, receipt) = (header.clone(), tx.clone(), receipt.clone());
            operations.extend(
                self.read_store(move |store| {
                    compile_gas_fees(store, regime, &header, &tx, &receipt, sender)
                })
                .await?,
            );
        }

        if !receipt.succeeded() {
            debug!("transaction failed, only fees are charged");
            return Ok(operations);
        }

        let (block, tx_index) = (header.number, receipt.transaction_index);
        let registry = self
            .read_store(move |store| {
                let names = CoreContracts::LOOKUP.map(|contract| contract.as_str());
                Ok(store.registry_addresses_as_of(block, tx_index, &names)?)
            })
            .await?;
        let Some(contracts) = CoreContracts::from_registry(&registry) else {
            debug!(found = registry.len(), "core contracts not deployed yet");
            return Ok(operations);
        };

        let events = map_logs(&receipt.logs, &contracts)?;

        let transfers = self
            .client
            .trace_transfers(tx.hash, &self.settings.tracer, self.settings.timeout)
            .await
            .map_err(|err| {
                TracerError::Trace {
                    tx: tx.hash,
                    reason: err.to_string(),
                }
            })?;

        operations.extend(reconcile(events, &transfers)?);
        Ok(operations)
    }
}
