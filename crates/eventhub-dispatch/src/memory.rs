// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory batches and a recording submitter.
//!
//! Size is measured as the body length plus the key length and compact JSON length of
//! every user property, so tests can reason about capacity with plain byte counts.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::batch::{AddOutcome, Batch, BatchFactory, Submitter};
use crate::errors::{BatchError, SubmitError};
use crate::event::Event;

pub fn event_size(event: &Event) -> usize {
    event.body().len()
        + event
            .properties()
            .iter()
            .map(|(key, value)| key.len() + value.to_string().len())
            .sum::<usize>()
}

#[derive(Debug)]
pub struct MemoryBatch {
    events: Vec<Event>,
    size: usize,
    max_size_bytes: usize,
    offers: Arc<AtomicUsize>,
}

impl MemoryBatch {
    pub fn new(max_size_bytes: usize) -> Self {
        MemoryBatch {
            events: Vec::new(),
            size: 0,
            max_size_bytes,
            offers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl Batch for MemoryBatch {
    fn try_add(&mut self, event: Event) -> Result<AddOutcome, BatchError> {
        self.offers.fetch_add(1, Ordering::Relaxed);
        let event_size = event_size(&event);
        if self.size + event_size > self.max_size_bytes {
            return Ok(AddOutcome::Full(event));
        }
        self.size += event_size;
        self.events.push(event);
        Ok(AddOutcome::Added)
    }

    fn len(&self) -> usize {
        self.events.len()
    }
}

/// Hands out [`MemoryBatch`]es of a fixed capacity and counts every offer made to them.
#[derive(Debug, Clone)]
pub struct MemoryBatchFactory {
    max_size_bytes: usize,
    batch_limit: Option<usize>,
    created: Arc<AtomicUsize>,
    offers: Arc<AtomicUsize>,
}

impl MemoryBatchFactory {
    pub fn new(max_size_bytes: usize) -> Self {
        MemoryBatchFactory {
            max_size_bytes,
            batch_limit: None,
            created: Arc::new(AtomicUsize::new(0)),
            offers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Refuses to create more than `limit` batches, as a broken session would.
    #[must_use]
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = Some(limit);
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Total `try_add` calls across every batch this factory produced.
    pub fn offers(&self) -> usize {
        self.offers.load(Ordering::Relaxed)
    }
}

impl BatchFactory for MemoryBatchFactory {
    type Batch = MemoryBatch;

    fn create_batch(&self) -> Result<MemoryBatch, BatchError> {
        let created = self.created.load(Ordering::Relaxed);
        if self.batch_limit.is_some_and(|limit| created >= limit) {
            return Err(BatchError::Unavailable(format!(
                "batch limit of {created} reached"
            )));
        }
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryBatch {
            offers: Arc::clone(&self.offers),
            ..MemoryBatch::new(self.max_size_bytes)
        })
    }
}

/// Keeps every submitted batch, in submission order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSubmitter {
    submitted: Arc<Mutex<Vec<Vec<Event>>>>,
    attempts: Arc<AtomicUsize>,
    fail_at: Option<usize>,
    delay: Option<Duration>,
}

impl RecordingSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the submission with the given ordinal (0-based) with a 503.
    #[must_use]
    pub fn failing_at(mut self, ordinal: usize) -> Self {
        self.fail_at = Some(ordinal);
        self
    }

    /// Sleeps before accepting each batch.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn batches(&self) -> Vec<Vec<Event>> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every call to `submit`, including the ones that failed.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Submitter<MemoryBatch> for RecordingSubmitter {
    async fn submit(&self, batch: MemoryBatch) -> Result<(), SubmitError> {
        let ordinal = self.attempts.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_at == Some(ordinal) {
            return Err(SubmitError::Destination(
                Some(StatusCode::SERVICE_UNAVAILABLE),
                "injected failure".to_string(),
            ));
        }
        debug!("Recorded batch {ordinal} with {} events", batch.len());
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.into_events());
        Ok(())
    }
}
