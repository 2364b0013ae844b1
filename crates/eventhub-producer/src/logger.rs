// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log line format for the producer.
//!
//! Everything logged while a payload file is being dispatched runs inside the
//! `dispatch{hub=..}` span opened in `main`, so retry warnings and batch rotation
//! messages from the library carry the target event hub. The banner and the
//! configuration errors are logged before that span exists and have no prefix
//! beyond the level.
//!
//! ```text
//! EH_PRODUCER | INFO | Starting event hub producer version=0.1.0 host=worker-3 hub=alerts env=dev
//! EH_PRODUCER | DEBUG | dispatch{hub=alerts}: Batch 0 is full with 812 events, rotating
//! EH_PRODUCER | WARN | dispatch{hub=alerts}: Attempt 1/3 to send batch failed: ...
//! EH_PRODUCER | ERROR | Invalid configuration: EVENTHUB_CONNECTION_STRING is not set
//! ```
//!
//! Set `EVENTHUB_LOG_LEVEL=debug` to see per-batch messages; HTTP client internals
//! (`h2`, `hyper`, `rustls`, `reqwest`) stay silenced at every level.

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;

const PREFIX: &str = "EH_PRODUCER";

/// Prefixes every line with `EH_PRODUCER` and the level, followed by the span
/// hierarchy from the root down.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "{PREFIX} | {} | ", event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
