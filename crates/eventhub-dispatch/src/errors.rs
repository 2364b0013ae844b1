// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;
use std::time::Duration;

/// Failure reported by a [`crate::Batch`] or [`crate::BatchFactory`] that is not a
/// plain "batch is full" signal.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("producer session is closed")]
    SessionClosed,

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("batch unavailable: {0}")]
    Unavailable(String),
}

/// Why a submission did not land.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The batch could not be turned into a request body. Retrying will not help.
    #[error("failed to prepare payload: {0}")]
    Payload(String),

    /// The endpoint answered with an error status, or could not be reached at all.
    #[error("error shipping batch: {}", describe_destination(.0, .1))]
    Destination(Option<StatusCode>, String),

    #[error("submission timed out after {0:?}")]
    Timeout(Duration),
}

impl SubmitError {
    /// 4xx answers and payload problems are permanent; everything else may succeed later.
    pub fn is_permanent(&self) -> bool {
        match self {
            SubmitError::Payload(_) => true,
            SubmitError::Destination(status, _) => status.is_some_and(|s| s.is_client_error()),
            SubmitError::Timeout(_) => false,
        }
    }
}

fn describe_destination(status: &Option<StatusCode>, message: &str) -> String {
    match status {
        Some(status) => format!("{status}: {message}"),
        None => message.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErrorKind {
    EventTooLarge,
    SubmissionFailed,
    Timeout,
    BatchCreationFailed,
    BatchRejected,
    Cancelled,
}

/// The first failure that stopped a dispatch. Batches submitted before it stay submitted.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("event {index} does not fit into an empty batch")]
    EventTooLarge { index: usize },

    #[error("batch {batch} was not accepted: {source}")]
    SubmissionFailed {
        batch: usize,
        #[source]
        source: SubmitError,
    },

    #[error("could not create batch {batch}: {source}")]
    BatchCreationFailed {
        batch: usize,
        #[source]
        source: BatchError,
    },

    #[error("batch refused event {index}: {source}")]
    BatchRejected {
        index: usize,
        #[source]
        source: BatchError,
    },

    #[error("dispatch cancelled after {submitted} submitted batches")]
    Cancelled { submitted: usize },
}

impl DispatchError {
    pub fn kind(&self) -> DispatchErrorKind {
        match self {
            DispatchError::EventTooLarge { .. } => DispatchErrorKind::EventTooLarge,
            DispatchError::SubmissionFailed {
                source: SubmitError::Timeout(_),
                ..
            } => DispatchErrorKind::Timeout,
            DispatchError::SubmissionFailed { .. } => DispatchErrorKind::SubmissionFailed,
            DispatchError::BatchCreationFailed { .. } => DispatchErrorKind::BatchCreationFailed,
            DispatchError::BatchRejected { .. } => DispatchErrorKind::BatchRejected,
            DispatchError::Cancelled { .. } => DispatchErrorKind::Cancelled,
        }
    }

    /// Whether running the whole dispatch again could succeed. The dispatcher itself
    /// never retries.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind(),
            DispatchErrorKind::SubmissionFailed | DispatchErrorKind::Timeout
        )
    }
}
