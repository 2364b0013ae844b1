// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire-size accounting for the JSON batch format of the send endpoint.
//!
//! A batch is sent as a JSON array:
//! ```json
//! [{"Body":"hello","UserProperties":{"severity":"high"}},{"Body":"world"}]
//! ```
//! The ledger tracks the exact byte length of that array, so a batch is never larger
//! than its configured maximum once serialized.

use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;

use crate::batch::{AddOutcome, Batch};
use crate::errors::BatchError;
use crate::event::Event;

/// Largest request body the standard tier accepts for a batch send.
pub const DEFAULT_MAX_BATCH_SIZE_BYTES: usize = 1024 * 1024;

/// User property that marks a body as base64 because it was not valid UTF-8.
pub const CONTENT_TRANSFER_ENCODING_PROPERTY: &str = "ContentTransferEncoding";

#[derive(Serialize)]
struct WireEvent<'a> {
    #[serde(rename = "Body")]
    body: Cow<'a, str>,
    #[serde(rename = "UserProperties", skip_serializing_if = "Map::is_empty")]
    user_properties: Cow<'a, Map<String, Value>>,
}

fn encode_event(event: &Event) -> Result<Vec<u8>, BatchError> {
    let wire = match std::str::from_utf8(event.body()) {
        Ok(text) => WireEvent {
            body: Cow::Borrowed(text),
            user_properties: Cow::Borrowed(event.properties()),
        },
        Err(_) => {
            let mut properties = event.properties().clone();
            properties.insert(
                CONTENT_TRANSFER_ENCODING_PROPERTY.to_string(),
                Value::from("base64"),
            );
            WireEvent {
                body: Cow::Owned(base64::engine::general_purpose::STANDARD.encode(event.body())),
                user_properties: Cow::Owned(properties),
            }
        }
    };
    Ok(serde_json::to_vec(&wire)?)
}

#[derive(Debug, Clone)]
pub struct EventDataBatch {
    /// Encoded entries joined by commas, without the surrounding brackets.
    buffer: Vec<u8>,
    count: usize,
    max_size_bytes: usize,
}

impl EventDataBatch {
    pub fn new(max_size_bytes: usize) -> Self {
        EventDataBatch {
            buffer: Vec::new(),
            count: 0,
            max_size_bytes,
        }
    }

    /// Serialized size of the batch, brackets included.
    pub fn size_in_bytes(&self) -> usize {
        self.buffer.len() + 2
    }

    pub fn max_size_in_bytes(&self) -> usize {
        self.max_size_bytes
    }

    /// The request body for this batch.
    pub fn to_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(self.size_in_bytes());
        payload.push(b'[');
        payload.extend_from_slice(&self.buffer);
        payload.push(b']');
        payload
    }
}

impl Batch for EventDataBatch {
    fn try_add(&mut self, event: Event) -> Result<AddOutcome, BatchError> {
        let encoded = encode_event(&event)?;
        let separator = usize::from(self.count > 0);
        if self.size_in_bytes() + separator + encoded.len() > self.max_size_bytes {
            return Ok(AddOutcome::Full(event));
        }
        if separator == 1 {
            self.buffer.push(b',');
        }
        self.buffer.extend_from_slice(&encoded);
        self.count += 1;
        Ok(AddOutcome::Added)
    }

    fn len(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_json(batch: &EventDataBatch) -> Value {
        serde_json::from_slice(&batch.to_payload()).unwrap()
    }

    #[test]
    fn test_empty_batch() {
        let batch = EventDataBatch::new(DEFAULT_MAX_BATCH_SIZE_BYTES);
        assert!(batch.is_empty());
        assert_eq!(batch.size_in_bytes(), 2);
        assert_eq!(batch.to_payload(), b"[]");
    }

    #[test]
    fn test_payload_format() {
        let mut batch = EventDataBatch::new(DEFAULT_MAX_BATCH_SIZE_BYTES);
        batch
            .try_add(Event::from("hello").with_property("severity", "high"))
            .unwrap();
        batch.try_add(Event::from("world")).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(
            String::from_utf8(batch.to_payload()).unwrap(),
            r#"[{"Body":"hello","UserProperties":{"severity":"high"}},{"Body":"world"}]"#
        );
        assert_eq!(batch.size_in_bytes(), batch.to_payload().len());
    }

    #[test]
    fn test_json_body_is_sent_as_text() {
        let mut batch = EventDataBatch::new(DEFAULT_MAX_BATCH_SIZE_BYTES);
        batch
            .try_add(Event::from(r#"{"alert":"Strong Wind","level":3}"#))
            .unwrap();

        assert_eq!(
            payload_json(&batch),
            json!([{"Body": "{\"alert\":\"Strong Wind\",\"level\":3}"}])
        );
    }

    #[test]
    fn test_binary_body_is_base64() {
        let mut batch = EventDataBatch::new(DEFAULT_MAX_BATCH_SIZE_BYTES);
        batch.try_add(Event::from(vec![0xff, 0xfe, 0x00])).unwrap();

        assert_eq!(
            payload_json(&batch),
            json!([{
                "Body": "//4A",
                "UserProperties": {"ContentTransferEncoding": "base64"}
            }])
        );
    }

    #[test]
    fn test_exact_fit() {
        // [{"Body":"hello"}] is 18 bytes, [{"Body":"hello"},{"Body":"world"}] is 35
        let mut batch = EventDataBatch::new(35);
        assert_eq!(batch.try_add(Event::from("hello")).unwrap(), AddOutcome::Added);
        assert_eq!(batch.size_in_bytes(), 18);
        assert_eq!(batch.try_add(Event::from("world")).unwrap(), AddOutcome::Added);
        assert_eq!(batch.size_in_bytes(), 35);
        assert_eq!(batch.size_in_bytes(), batch.to_payload().len());
    }

    #[test]
    fn test_full_leaves_batch_untouched() {
        let mut batch = EventDataBatch::new(34);
        batch.try_add(Event::from("hello")).unwrap();
        let before = batch.to_payload();

        let outcome = batch.try_add(Event::from("world")).unwrap();

        assert_eq!(outcome, AddOutcome::Full(Event::from("world")));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.to_payload(), before);
    }

    #[test]
    fn test_event_larger_than_empty_batch() {
        let mut batch = EventDataBatch::new(17);
        let outcome = batch.try_add(Event::from("hello")).unwrap();
        assert!(matches!(outcome, AddOutcome::Full(_)));
        assert!(batch.is_empty());
    }
}
