//! Configuration types for graylog-forwarder

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Source (OpenSearch) connection and scroll tuning
///
/// Groups the endpoint with the pagination parameters of the scroll
/// traversal. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the source search cluster
    pub url: String,

    /// Number of documents requested per scroll page (default: 1000)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Server-side inactivity expiry of the scroll cursor (default: 60s)
    ///
    /// Must cover one page's round trip plus processing under expected
    /// load, or the source may discard the cursor mid-traversal.
    #[serde(default = "default_keep_alive", with = "duration_serde")]
    pub keep_alive: Duration,

    /// Timeout applied to each individual source request (default: 30s)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl SourceConfig {
    /// Create a source config for `url` with default scroll tuning
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            page_size: default_page_size(),
            keep_alive: default_keep_alive(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Delivery (Loki push) endpoint and worker-pool tuning
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Push endpoint URL of the destination log store
    pub url: String,

    /// Number of concurrent delivery workers (default: 8)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the bounded queue between extraction and delivery
    /// (default: 1000)
    ///
    /// A full queue stalls extraction rather than dropping documents.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Timeout applied to each individual push request (default: 30s)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl DeliveryConfig {
    /// Create a delivery config for `url` with default worker tuning
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Main configuration for a migration run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Source connection and scroll tuning
    pub source: SourceConfig,

    /// Delivery endpoint and worker-pool tuning
    pub delivery: DeliveryConfig,

    /// Name of the source index to migrate
    pub index: String,
}

impl Config {
    /// Build a config from the three required endpoints, with every tuning
    /// field at its default
    pub fn new(
        source_url: impl Into<String>,
        push_url: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            source: SourceConfig::new(source_url),
            delivery: DeliveryConfig::new(push_url),
            index: index.into(),
        }
    }
}

fn default_page_size() -> u32 {
    1000
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(60)
}

fn default_workers() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
