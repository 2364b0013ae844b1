// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::batch::{Batch, BatchFactory, Submitter};
use crate::errors::{BatchError, SubmitError};
use crate::eventhub::batch::{EventDataBatch, DEFAULT_MAX_BATCH_SIZE_BYTES};
use crate::eventhub::connection::ConnectionProperties;
use crate::eventhub::sas;

const BATCH_CONTENT_TYPE: &str = "application/vnd.microsoft.servicebus.json";
const API_VERSION: &str = "2014-01";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How many times a batch is sent before giving up, and how long to wait in between.
/// Only transient failures (5xx, connection errors, request timeouts) are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Number of attempts, no delay.
    Immediate(u64),
    /// Number of attempts, delay in milliseconds between attempts.
    LinearBackoff(u64, u64),
}

impl RetryStrategy {
    fn attempts(&self) -> u64 {
        match self {
            RetryStrategy::Immediate(attempts) | RetryStrategy::LinearBackoff(attempts, _) => {
                (*attempts).max(1)
            }
        }
    }

    fn delay(&self) -> Option<Duration> {
        match self {
            RetryStrategy::Immediate(_) => None,
            RetryStrategy::LinearBackoff(_, delay_ms) => Some(Duration::from_millis(*delay_ms)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProducerClientOptions {
    pub max_batch_size_bytes: usize,
    pub retry_strategy: RetryStrategy,
    /// Per HTTP request, so a batch may take up to `attempts` times this long.
    pub request_timeout: Duration,
    pub token_ttl: Duration,
    pub https_proxy: Option<String>,
    /// Replaces `https://<namespace host>` when building request URLs.
    pub endpoint_override: Option<String>,
}

impl Default for ProducerClientOptions {
    fn default() -> Self {
        ProducerClientOptions {
            max_batch_size_bytes: DEFAULT_MAX_BATCH_SIZE_BYTES,
            retry_strategy: RetryStrategy::Immediate(1),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            token_ttl: sas::DEFAULT_TOKEN_TTL,
            https_proxy: None,
            endpoint_override: None,
        }
    }
}

/// Creates [`EventDataBatch`]es and sends them to one event hub.
#[derive(Debug)]
pub struct ProducerClient {
    client: reqwest::Client,
    connection: ConnectionProperties,
    event_hub: String,
    /// Audience of the SAS token; always the logical `https://<host>/<hub>`.
    resource_uri: String,
    send_url: String,
    max_batch_size_bytes: usize,
    retry_strategy: RetryStrategy,
    token_ttl: Duration,
    closed: AtomicBool,
}

impl ProducerClient {
    pub fn new(
        connection: ConnectionProperties,
        event_hub: impl Into<String>,
        options: ProducerClientOptions,
    ) -> Result<Self, reqwest::Error> {
        let event_hub = event_hub.into();
        let client = build_client(options.request_timeout, options.https_proxy.as_deref())?;

        let base_url = options
            .endpoint_override
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://{}", connection.host));
        let send_url = format!("{base_url}/{event_hub}/messages?timeout=60&api-version={API_VERSION}");
        let resource_uri = format!("https://{}/{event_hub}", connection.host);

        Ok(ProducerClient {
            client,
            connection,
            event_hub,
            resource_uri,
            send_url,
            max_batch_size_bytes: options.max_batch_size_bytes,
            retry_strategy: options.retry_strategy,
            token_ttl: options.token_ttl,
            closed: AtomicBool::new(false),
        })
    }

    pub fn event_hub(&self) -> &str {
        &self.event_hub
    }

    pub fn send_url(&self) -> &str {
        &self.send_url
    }

    /// Marks the session unusable. Further batch creation fails.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn send_with_retry(&self, payload: Vec<u8>) -> Result<(), SubmitError> {
        let attempts = self.retry_strategy.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.send_once(payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_permanent() => {
                    error!("Event hub {} rejected batch: {e}", self.event_hub);
                    return Err(e);
                }
                Err(e) if attempt >= attempts => {
                    error!(
                        "Failed to send batch to event hub {} after {attempt} attempts: {e}",
                        self.event_hub
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!("Attempt {attempt}/{attempts} to send batch failed: {e}");
                    if let Some(delay) = self.retry_strategy.delay() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    async fn send_once(&self, payload: Vec<u8>) -> Result<(), SubmitError> {
        let token = sas::generate_token(
            &self.resource_uri,
            &self.connection.key_name,
            &self.connection.key,
            sas::expiry_from_now(self.token_ttl),
        );

        let resp = self
            .client
            .post(&self.send_url)
            .header(AUTHORIZATION, token)
            .header(CONTENT_TYPE, BATCH_CONTENT_TYPE)
            .body(payload)
            .send()
            .await
            .map_err(|e| SubmitError::Destination(e.status(), e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        // Only read the body when something went wrong
        let body = resp.text().await.unwrap_or_default();
        Err(SubmitError::Destination(Some(status), body))
    }
}

fn build_client(
    timeout: Duration,
    https_proxy: Option<&str>,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));
    if let Some(proxy) = https_proxy {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}

impl BatchFactory for ProducerClient {
    type Batch = EventDataBatch;

    fn create_batch(&self) -> Result<EventDataBatch, BatchError> {
        if self.is_closed() {
            return Err(BatchError::SessionClosed);
        }
        Ok(EventDataBatch::new(self.max_batch_size_bytes))
    }
}

#[async_trait]
impl Submitter<EventDataBatch> for ProducerClient {
    async fn submit(&self, batch: EventDataBatch) -> Result<(), SubmitError> {
        if batch.is_empty() {
            return Err(SubmitError::Payload("refusing to send an empty batch".to_string()));
        }
        debug!(
            "Sending {} events ({} bytes) to event hub {}",
            batch.len(),
            batch.size_in_bytes(),
            self.event_hub
        );
        self.send_with_retry(batch.to_payload()).await
    }
}
