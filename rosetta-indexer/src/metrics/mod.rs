use metrics::counter;
use metrics::gauge;
use metrics::histogram;
use metrics::SharedString;

#[derive(Debug, Default, Clone, Copy)]
pub struct Metrics {}

impl Metrics {
    pub fn new() -> Self {
        Self {}
    }

    pub fn increment_headers_received(&self) {
        counter!("rosetta_indexer_headers_received_total").increment(1);
    }

    pub fn increment_blocks_processed(&self) {
        counter!("rosetta_indexer_blocks_processed_total").increment(1);
    }

    pub fn increment_registry_changes(
        &self,
        count: usize,
    ) {
        counter!("rosetta_indexer_registry_changes_total").increment(count as u64);
    }

    pub fn increment_fee_parameter_updates(&self) {
        counter!("rosetta_indexer_fee_parameter_updates_total").increment(1);
    }

    pub fn observe_block_processing_duration(
        &self,
        duration: f64,
    ) {
        histogram!("rosetta_indexer_block_processing_duration_seconds").record(duration);
    }

    pub fn set_last_persisted_block(
        &self,
        block: u64,
    ) {
        gauge!("rosetta_indexer_last_persisted_block").set(block as f64);
    }

    pub fn increment_error_count(
        &self,
        stage: &str,
    ) {
        let stage = SharedString::from(String::from(stage));
        counter!("rosetta_indexer_error_count", "stage" => stage).increment(1);
    }
}
