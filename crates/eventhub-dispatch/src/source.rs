// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns a payload file holding a JSON array of objects into events.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::event::Event;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file content is not a valid JSON array of objects: {0}")]
    NotAnArray(#[source] serde_json::Error),

    #[error("no objects found in JSON array")]
    Empty,

    #[error("failed to serialize object {index}: {source}")]
    Serialize {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parses `content` as a JSON array and turns each object into one event whose body
/// is the compact JSON of that object.
pub fn parse_events(content: &[u8]) -> Result<Vec<Event>, SourceError> {
    let objects: Vec<Map<String, Value>> =
        serde_json::from_slice(content).map_err(SourceError::NotAnArray)?;
    if objects.is_empty() {
        return Err(SourceError::Empty);
    }

    objects
        .iter()
        .enumerate()
        .map(|(index, object)| {
            serde_json::to_vec(object)
                .map(Event::new)
                .map_err(|source| SourceError::Serialize { index, source })
        })
        .collect()
}

pub fn load_events(path: &Path) -> Result<Vec<Event>, SourceError> {
    let content = std::fs::read(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let events = parse_events(&content)?;
    debug!("Read {} events from {}", events.len(), path.display());
    Ok(events)
}
