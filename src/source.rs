//! Cursor-paginated extraction from the source search engine
//!
//! Drives the scroll protocol: an initial match-all query sorted by `_doc`
//! (each page disjoint from every other), followed by scroll continuations
//! until a page comes back empty. Every decoded document is pushed onto the
//! delivery queue before the next page is requested; pages are never
//! prefetched. The scroll cursor is owned exclusively by this module and is
//! cleared, best-effort, on every exit path.

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::SourceConfig;
use crate::error::{Error, SourceError};
use crate::normalize::RawDocument;

/// One decoded page of a scroll traversal
#[derive(Debug, Deserialize)]
struct ScrollPage {
    /// Renewed cursor token; must be present while hits remain
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,

    #[serde(default)]
    hits: HitsEnvelope,
}

#[derive(Debug, Default, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Hit>,
}

/// One hit; `_source` may be missing or malformed and is checked per hit
#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: Option<Value>,
}

/// Client for the source search engine's scroll protocol
#[derive(Debug)]
pub struct SourceClient {
    http: reqwest::Client,
    base: Url,
    config: SourceConfig,
}

impl SourceClient {
    /// Create a source client for the configured cluster
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the source URL does not parse or
    /// cannot carry path segments, or if the HTTP client cannot be created.
    pub fn new(config: &SourceConfig) -> Result<Self, Error> {
        let base = Url::parse(&config.url).map_err(|e| Error::Config {
            message: format!("invalid source URL '{}': {}", config.url, e),
            key: Some("input".to_string()),
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("source URL '{}' cannot carry an index path", config.url),
                key: Some("input".to_string()),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("graylog-forwarder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base,
            config: config.clone(),
        })
    }

    /// Scroll the whole index, pushing each document onto `queue`
    ///
    /// Returns the number of documents handed to the queue. Malformed hits
    /// are logged and skipped; a missing cursor on a page with remaining
    /// hits is fatal. When `cancel` fires, extraction stops cleanly at the
    /// next page boundary, or mid-page once the consumers stop draining
    /// the queue. Whatever the outcome, the queue sender is dropped
    /// (closing the queue) and any cursor ever obtained is cleared.
    pub async fn extract(
        &self,
        index: &str,
        queue: mpsc::Sender<RawDocument>,
        cancel: &CancellationToken,
    ) -> Result<u64, SourceError> {
        let mut cursor: Option<String> = None;
        let outcome = self.run_scroll(index, &queue, cancel, &mut cursor).await;

        // Close the queue before cleanup so workers drain while the
        // clear-scroll round trip is in flight
        drop(queue);

        if let Some(scroll_id) = &cursor {
            tracing::info!(scroll_id = %scroll_id, "clearing scroll cursor");
            if let Err(e) = self.clear_scroll(scroll_id).await {
                tracing::warn!(error = %e, "failed to clear scroll cursor");
            }
        }

        outcome
    }

    /// The pagination loop proper; `cursor` records the most recent token
    /// for the caller's cleanup
    async fn run_scroll(
        &self,
        index: &str,
        queue: &mpsc::Sender<RawDocument>,
        cancel: &CancellationToken,
        cursor: &mut Option<String>,
    ) -> Result<u64, SourceError> {
        let mut emitted = 0u64;

        if cancel.is_cancelled() {
            tracing::info!("extraction cancelled before the first page");
            return Ok(emitted);
        }

        let mut page = self.search_initial(index).await?;

        loop {
            if page.hits.hits.is_empty() {
                break;
            }

            let scroll_id = page
                .scroll_id
                .take()
                .filter(|id| !id.is_empty())
                .ok_or(SourceError::MissingScrollId)?;
            *cursor = Some(scroll_id.clone());

            for hit in page.hits.hits {
                match hit.source {
                    Some(Value::Object(doc)) => {
                        if queue.send(doc).await.is_err() {
                            // A cancelled run stops the consumers first, so
                            // a dead queue is a clean stop, not a failure
                            if cancel.is_cancelled() {
                                tracing::info!(emitted, "extraction cancelled while the queue was draining");
                                return Ok(emitted);
                            }
                            return Err(SourceError::QueueClosed);
                        }
                        emitted += 1;
                    }
                    source => {
                        tracing::warn!(source = ?source, "could not parse _source from hit, skipping");
                    }
                }
            }

            if cancel.is_cancelled() {
                tracing::info!(emitted, "extraction cancelled, stopping at page boundary");
                break;
            }

            page = self.scroll_next(&scroll_id).await?;
        }

        Ok(emitted)
    }

    /// Issue the initial match-all search that opens the scroll
    async fn search_initial(&self, index: &str) -> Result<ScrollPage, SourceError> {
        let body = serde_json::json!({
            "query": { "match_all": {} },
            "sort": [ { "_doc": "asc" } ],
        });

        let response = self
            .http
            .post(self.endpoint(&[index, "_search"]))
            .query(&[
                ("scroll", self.keep_alive()),
                ("size", self.config.page_size.to_string()),
            ])
            .json(&body)
            .send()
            .await?;

        decode_page(response).await
    }

    /// Request the next page for an open cursor
    async fn scroll_next(&self, scroll_id: &str) -> Result<ScrollPage, SourceError> {
        let body = serde_json::json!({
            "scroll": self.keep_alive(),
            "scroll_id": scroll_id,
        });

        let response = self
            .http
            .post(self.endpoint(&["_search", "scroll"]))
            .json(&body)
            .send()
            .await?;

        decode_page(response).await
    }

    /// Invalidate a cursor server-side; callers treat failures as warnings
    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), SourceError> {
        let body = serde_json::json!({ "scroll_id": [scroll_id] });

        let response = self
            .http
            .delete(self.endpoint(&["_search", "scroll"]))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::SearchFailed {
                status: status.as_u16(),
                reason: error_reason(&body),
            });
        }

        Ok(())
    }

    /// Append `segments` to the base URL's path
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Cursor expiry in the source's duration syntax
    fn keep_alive(&self) -> String {
        format!("{}s", self.config.keep_alive.as_secs())
    }
}

/// Turn a raw HTTP response into a decoded page, or the source's error
async fn decode_page(response: reqwest::Response) -> Result<ScrollPage, SourceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::SearchFailed {
            status: status.as_u16(),
            reason: error_reason(&body),
        });
    }

    response
        .json::<ScrollPage>()
        .await
        .map_err(|e| SourceError::MalformedResponse(e.to_string()))
}

/// Pull `error.reason` out of an error body, falling back to the raw body
fn error_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/reason")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}
