use std::time::Duration;

use alloy_primitives::Address;
use anyhow::Context;
use config::FileFormat;
use lazy_static_include::*;
use rosetta_tracer::ForkSchedule;
use rosetta_tracer::TraceSettings;
use serde_derive::Deserialize;
use tracing::debug;

use crate::monitor::MonitorSettings;

lazy_static_include_str! {
    DEFAULT_CONFIG => "src/config/default.toml",
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub node: NodeConfig,
    pub store: StoreConfig,
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub fees: ForkSchedule,
    pub prometheus: PrometheusConfig,
    pub health: HealthConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// JSON-RPC endpoint of the node.
    pub url: String,
    /// Node-side tracer reporting internal transfers.
    pub tracer: String,
    pub trace_timeout_secs: u64,
}

impl NodeConfig {
    pub fn validate(&self) {
        assert!(!self.url.is_empty(), "Node URL is required");
        assert!(!self.tracer.is_empty(), "Tracer name is required");
        assert!(
            self.trace_timeout_secs > 0,
            "Trace timeout must be positive"
        );
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub path: String,
    pub read_pool_size: u32,
}

impl StoreConfig {
    pub fn validate(&self) {
        assert!(!self.path.is_empty(), "Store path is required");
        assert!(
            self.read_pool_size > 0,
            "Read pool needs at least one connection"
        );
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub channel_capacity: usize,
    pub poll_interval_ms: u64,
    /// Address of the registry contract, fixed since genesis.
    pub registry_address: Address,
}

impl MonitorConfig {
    pub fn validate(&self) {
        assert!(
            self.channel_capacity > 0,
            "Channel capacity must be positive"
        );
        assert!(
            self.poll_interval_ms > 0,
            "Poll interval must be positive"
        );
        assert!(
            !self.registry_address.is_zero(),
            "Registry address is required"
        );
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PrometheusConfig {
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct HealthConfig {
    pub port: u16,
    /// Liveness fails when no block was persisted for this long.
    pub max_block_age_secs: u64,
}

impl Config {
    pub fn load(local_file: Option<String>) -> anyhow::Result<Config> {
        let mut config_builder = config::Config::builder();
        config_builder =
            config_builder.add_source(config::File::from_str(&DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(local_file) = local_file {
            debug!("Loading local configuration from {}", local_file);
            config_builder = config_builder.add_source(config::File::with_name(&local_file));
        }

        config_builder
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .ignore_empty(true),
            )
            .build()
            .context("loading configuration")?
            .try_deserialize()
            .context("deserializing configuration")
    }

    pub fn validate(&self) {
        self.node.validate();
        self.store.validate();
        self.monitor.validate();
    }

    pub fn trace_settings(&self) -> TraceSettings {
        TraceSettings {
            tracer: self.node.tracer.clone(),
            timeout: Duration::from_secs(self.node.trace_timeout_secs),
            forks: self.fees,
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            channel_capacity: self.monitor.channel_capacity,
            poll_interval: Duration::from_millis(self.monitor.poll_interval_ms),
            registry_address: self.monitor.registry_address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::load(None).unwrap();
        config.validate();

        assert_eq!(config.fees.post_fork_block, None);
        assert_eq!(
            config.monitor.registry_address,
            "0x000000000000000000000000000000000000ce10"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(
            config.trace_settings().timeout,
            Duration::from_secs(30)
        );
        assert_eq!(
            config.monitor_settings().poll_interval,
            Duration::from_millis(1_000)
        );
    }
}
