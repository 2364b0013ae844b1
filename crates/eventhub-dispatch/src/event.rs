// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::{Map, Value};

/// A single opaque payload bound for the event stream.
///
/// The body is never inspected by the packer. User properties travel with the
/// event and count against the batch size, so two events with the same body can
/// still have different wire sizes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    body: Vec<u8>,
    properties: Map<String, Value>,
}

impl Event {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Event {
            body: body.into(),
            properties: Map::new(),
        }
    }

    /// Attaches a user property, replacing any previous value under the same key.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl From<&str> for Event {
    fn from(body: &str) -> Self {
        Event::new(body.as_bytes())
    }
}

impl From<Vec<u8>> for Event {
    fn from(body: Vec<u8>) -> Self {
        Event::new(body)
    }
}
