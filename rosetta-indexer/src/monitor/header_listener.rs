use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rosetta_tracer::ChainClient;
use rosetta_types::BlockHeader;
use rosetta_types::BlockNr;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;

use crate::metrics::Metrics;
use crate::monitor::Shutdown;

/// Emits every block header from `next_block` on, in order and without gaps.
pub struct HeaderListener<C> {
    client: Arc<C>,
    next_block: BlockNr,
    poll_interval: Duration,
    metrics: Metrics,
}

impl<C: ChainClient> HeaderListener<C> {
    pub fn new(
        client: Arc<C>,
        next_block: BlockNr,
        poll_interval: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            client,
            next_block,
            poll_interval,
            metrics,
        }
    }

    pub async fn run(
        mut self,
        headers: mpsc::Sender<BlockHeader>,
        shutdown: Shutdown,
    ) -> anyhow::Result<()> {
        info!(from = self.next_block, "listening for headers");

        loop {
            let latest = tokio::select! {
                _ = shutdown.triggered() => return Ok(()),
                latest = self.client.latest_header() => {
                    latest.context("fetching the latest header")?
                },
            };

            while self.next_block <= latest.number {
                let header = if self.next_block == latest.number {
                    latest.clone()
                } else {
                    tokio::select! {
                        _ = shutdown.triggered() => return Ok(()),
                        header = self.client.header_by_number(self.next_block) => {
                            header.with_context(|| {
                                format!("fetching header {}", self.next_block)
                            })?
                        },
                    }
                };

                tokio::select! {
                    _ = shutdown.triggered() => return Ok(()),
                    sent = headers.send(header) => {
                        if sent.is_err() {
                            debug!("header receiver dropped");
                            return Ok(());
                        }
                    },
                }

                self.metrics
                    .increment_headers_received();
                self.next_block += 1;
            }

            tokio::select! {
                _ = shutdown.triggered() => return Ok(()),
                _ = tokio::time::sleep(self.poll_interval) => {},
            }
        }
    }
}
