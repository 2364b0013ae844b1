// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Packs ordered events into size-bounded batches and ships them to Azure Event Hubs.
//!
//! The [`dispatcher::Dispatcher`] owns the packing loop. It only talks to the
//! [`batch::Batch`], [`batch::BatchFactory`] and [`batch::Submitter`] traits, so the
//! Event Hubs REST transport in [`eventhub`] and the in-memory fakes in [`memory`]
//! are interchangeable.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod event;
pub mod eventhub;
pub mod hostname;
pub mod memory;
pub mod source;

pub use batch::{AddOutcome, Batch, BatchFactory, Submitter};
pub use dispatcher::{DispatchSummary, Dispatcher, DispatcherConfig};
pub use errors::{BatchError, DispatchError, DispatchErrorKind, SubmitError};
pub use event::Event;
