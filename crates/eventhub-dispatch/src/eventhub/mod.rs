// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Azure Event Hubs over its HTTPS send endpoint.
//!
//! Batches are sent as a JSON array to `{endpoint}/{event_hub}/messages` and
//! authenticated with a shared access signature derived from the namespace
//! connection string.

pub mod batch;
pub mod client;
pub mod connection;
pub mod sas;

pub use batch::{EventDataBatch, DEFAULT_MAX_BATCH_SIZE_BYTES};
pub use client::{ProducerClient, ProducerClientOptions, RetryStrategy};
pub use connection::{ConnectionProperties, ConnectionStringError};
