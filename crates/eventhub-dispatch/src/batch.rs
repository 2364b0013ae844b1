// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Seams between the packer and whatever transport actually carries the events.

use async_trait::async_trait;

use crate::errors::{BatchError, SubmitError};
use crate::event::Event;

/// Result of offering an event to a batch.
#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// The batch has no room left for this event. The event is handed back and the
    /// batch is left exactly as it was.
    Full(Event),
}

/// A size-bounded, append-only group of events. The batch owns its size ledger; the
/// packer only learns whether an event fit.
pub trait Batch: Send + 'static {
    /// `Err` is reserved for failures other than running out of room.
    fn try_add(&mut self, event: Event) -> Result<AddOutcome, BatchError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait BatchFactory {
    type Batch: Batch;

    /// Returns a fresh, empty batch. Fails only when the underlying session is unusable.
    fn create_batch(&self) -> Result<Self::Batch, BatchError>;
}

/// Ships a filled batch. Takes the batch by value so it can never be resubmitted.
#[async_trait]
pub trait Submitter<B: Batch>: Sync {
    async fn submit(&self, batch: B) -> Result<(), SubmitError>;
}
