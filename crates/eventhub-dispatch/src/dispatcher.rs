// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sequential first-fit packing of events into size-bounded batches.
//!
//! Events are offered to the current batch in input order. When the batch reports it
//! is full, it is submitted, a fresh batch takes its place and the same event is
//! offered again. An event that does not fit a batch that is still empty can never
//! fit, so the dispatch stops there instead of rotating forever.
//!
//! Batches are submitted one at a time and in fill order. The first failure ends the
//! dispatch; whatever was submitted before it stays submitted.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::batch::{AddOutcome, Batch, BatchFactory, Submitter};
use crate::errors::{DispatchError, SubmitError};
use crate::event::Event;

const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound for a single submission, retries inside the submitter included.
    pub submit_timeout: Duration,
    /// Checked before every batch creation and every submission.
    pub cancel_token: CancellationToken,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            cancel_token: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub batches: usize,
    pub events: usize,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    submit_timeout: Duration,
    cancel_token: CancellationToken,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Dispatcher {
            submit_timeout: config.submit_timeout,
            cancel_token: config.cancel_token,
        }
    }

    /// Packs `events` into as few batches as sequential first-fit allows and submits
    /// each one as soon as it fills up.
    ///
    /// On success every event landed in exactly one submitted batch, in input order,
    /// and no empty batch was submitted. An empty input submits nothing.
    pub async fn dispatch_all<I, F, S>(
        &self,
        events: I,
        factory: &F,
        submitter: &S,
    ) -> Result<DispatchSummary, DispatchError>
    where
        I: IntoIterator<Item = Event>,
        F: BatchFactory + ?Sized,
        S: Submitter<F::Batch> + ?Sized,
    {
        let mut summary = DispatchSummary::default();
        let mut batch = self.create_batch(factory, summary.batches)?;

        for (index, event) in events.into_iter().enumerate() {
            let mut pending = event;
            loop {
                let outcome = batch
                    .try_add(pending)
                    .map_err(|source| DispatchError::BatchRejected { index, source })?;
                match outcome {
                    AddOutcome::Added => break,
                    AddOutcome::Full(_) if batch.is_empty() => {
                        error!("Event {index} is too large for an empty batch");
                        return Err(DispatchError::EventTooLarge { index });
                    }
                    AddOutcome::Full(rejected) => {
                        debug!(
                            "Batch {} is full with {} events, rotating",
                            summary.batches,
                            batch.len()
                        );
                        self.submit(submitter, batch, &mut summary).await?;
                        batch = self.create_batch(factory, summary.batches)?;
                        pending = rejected;
                    }
                }
            }
        }

        if !batch.is_empty() {
            self.submit(submitter, batch, &mut summary).await?;
        }

        debug!(
            "Dispatched {} events in {} batches",
            summary.events, summary.batches
        );
        Ok(summary)
    }

    fn create_batch<F>(&self, factory: &F, ordinal: usize) -> Result<F::Batch, DispatchError>
    where
        F: BatchFactory + ?Sized,
    {
        self.ensure_not_cancelled(ordinal)?;
        factory.create_batch().map_err(|source| {
            error!("Failed to create batch {ordinal}: {source}");
            DispatchError::BatchCreationFailed {
                batch: ordinal,
                source,
            }
        })
    }

    async fn submit<B, S>(
        &self,
        submitter: &S,
        batch: B,
        summary: &mut DispatchSummary,
    ) -> Result<(), DispatchError>
    where
        B: Batch,
        S: Submitter<B> + ?Sized,
    {
        let ordinal = summary.batches;
        self.ensure_not_cancelled(ordinal)?;

        let n_events = batch.len();
        debug!("Submitting batch {ordinal} with {n_events} events");

        let result = match tokio::time::timeout(self.submit_timeout, submitter.submit(batch)).await
        {
            Ok(result) => result,
            Err(_) => Err(SubmitError::Timeout(self.submit_timeout)),
        };

        match result {
            Ok(()) => {
                summary.batches += 1;
                summary.events += n_events;
                Ok(())
            }
            Err(source) => {
                error!("Failed to submit batch {ordinal}: {source}");
                Err(DispatchError::SubmissionFailed {
                    batch: ordinal,
                    source,
                })
            }
        }
    }

    fn ensure_not_cancelled(&self, submitted: usize) -> Result<(), DispatchError> {
        if self.cancel_token.is_cancelled() {
            debug!("Dispatch cancelled after {submitted} batches");
            return Err(DispatchError::Cancelled { submitted });
        }
        Ok(())
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new(DispatcherConfig::default())
    }
}
