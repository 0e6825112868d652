//! Delivery of normalized records to the log store push endpoint
//!
//! One record becomes one push request containing a single labeled stream
//! with a single timestamped entry. Delivery is best-effort: rejections and
//! transport failures are reported to the caller, never retried.

use reqwest::StatusCode;
use serde::Serialize;
use std::collections::HashMap;
use url::Url;

use crate::config::DeliveryConfig;
use crate::error::{DeliveryError, Error};
use crate::normalize::NormalizedRecord;

/// JSON body of one push request
#[derive(Debug, Serialize)]
pub struct PushRequest {
    /// Streams carried by this request; always exactly one per record here
    pub streams: Vec<PushStream>,
}

/// One labeled stream with its timestamped entries
#[derive(Debug, Serialize)]
pub struct PushStream {
    /// Label set identifying the stream
    pub stream: HashMap<String, String>,
    /// Entries as `[epoch_nanos_as_string, message]` pairs
    pub values: Vec<[String; 2]>,
}

/// Client for the log store push endpoint
///
/// Cheap to clone; all clones share one HTTP connection pool.
#[derive(Clone, Debug)]
pub struct DeliveryClient {
    http: reqwest::Client,
    url: Url,
}

impl DeliveryClient {
    /// Create a delivery client for the configured push endpoint
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the push URL does not parse, or if
    /// the HTTP client cannot be created.
    pub fn new(config: &DeliveryConfig) -> Result<Self, Error> {
        let url = Url::parse(&config.url).map_err(|e| Error::Config {
            message: format!("invalid push endpoint URL '{}': {}", config.url, e),
            key: Some("output".to_string()),
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("graylog-forwarder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, url })
    }

    /// Push one record as a single-stream, single-entry request
    ///
    /// Success is HTTP 200 or 204. Any other status is a rejection carrying
    /// the status code and response body for diagnosis; transport failures
    /// surface as [`DeliveryError::Request`].
    pub async fn push(&self, record: &NormalizedRecord) -> Result<(), DeliveryError> {
        let request = PushRequest {
            streams: vec![PushStream {
                stream: record.labels.clone(),
                values: vec![[record.timestamp_nanos.clone(), record.message.clone()]],
            }],
        };

        let response = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
