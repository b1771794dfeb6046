//! Structured JSON logging to stdout.
//!
//! Simplified from the teacher's file-rotating, dual-layer setup: the
//! gateway has one output (stdout) and one format (JSON), since its
//! operators are container log collectors, not a local `tail -f`.
//!
//! The built-in `fmt::layer().json()` formatter has no notion of a
//! constant `logger` field, so every line is built by a small custom
//! `FormatEvent` instead -- grounded on `tracing-subscriber`'s own
//! `FormatEvent`/`Visit` extension points, the documented way to control
//! exactly which top-level keys a JSON log line carries. This mirrors
//! `original_source/api/app/logging_config.py`'s `CustomJsonFormatter`:
//! `timestamp`, `level`, `logger` (fixed `"aztec_exchange"`), `message`,
//! `request_id` (only when inside a request span), plus whatever extra
//! fields the call site attaches.
//!
//! The current request id rides along as a `tracing::Span` field set by
//! `gateway::middleware::request_context`, not a thread-local, so it
//! survives task suspension across `.await` points; `RequestIdCapture`
//! lifts that field out of the span and into the span's extensions the
//! moment the span is created, so the formatter can read it back per
//! event without re-parsing already-formatted text.

use std::fmt;

use serde_json::{Map, Value, json};
use tracing::field::{Field, Visit};
use tracing::span;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, prelude::*};

/// Logger name stamped on every emitted line (spec §4.2), matching the
/// Python original's `logging.getLogger("aztec_exchange")`.
const LOGGER_NAME: &str = "aztec_exchange";

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = tracing_subscriber::fmt::layer()
        .event_format(AztecJsonFormatter)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(RequestIdCapture)
        .with(json_layer)
        .init();
}

/// Holds the `request_id` field value of a `tracing::info_span!("request", ..)`
/// span, stashed into the span's extensions at creation time so the event
/// formatter can look it up without access to the span's raw field values.
struct RequestIdField(String);

/// Lifts the `request_id` field off a newly created span into its
/// extensions. A `Layer` rather than part of the formatter itself, since
/// `on_new_span` is only available on `Layer`, not on `FormatEvent`.
struct RequestIdCapture;

impl<S> Layer<S> for RequestIdCapture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        #[derive(Default)]
        struct FindRequestId(Option<String>);
        impl Visit for FindRequestId {
            fn record_str(&mut self, field: &Field, value: &str) {
                if field.name() == "request_id" {
                    self.0 = Some(value.to_string());
                }
            }
            fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
                if field.name() == "request_id" {
                    self.0 = Some(format!("{value:?}"));
                }
            }
        }

        let mut visitor = FindRequestId::default();
        attrs.record(&mut visitor);
        if let (Some(request_id), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(RequestIdField(request_id));
        }
    }
}

/// Collects an event's fields into a JSON object, recording `message`
/// (the unnamed format-args field `tracing::info!("...")` produces) and
/// every other structured field under its own name.
struct JsonVisitor<'a>(&'a mut Map<String, Value>);

impl Visit for JsonVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), json!(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), json!(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_string(), json!(format!("{value:?}")));
    }
}

/// Builds one JSON object per event: `timestamp`, `level`, `logger`
/// (constant), `message` and any other fields the call site attached,
/// plus `request_id` when the event is nested inside a request span.
struct AztecJsonFormatter;

impl<S, N> FormatEvent<S, N> for AztecJsonFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        let mut timestamp = String::new();
        SystemTime.format_time(&mut Writer::new(&mut timestamp))?;

        let mut fields = Map::new();
        fields.insert("timestamp".to_string(), json!(timestamp));
        fields.insert("level".to_string(), json!(meta.level().as_str()));
        fields.insert("logger".to_string(), json!(LOGGER_NAME));
        fields.insert("target".to_string(), json!(meta.target()));

        let mut visitor = JsonVisitor(&mut fields);
        event.record(&mut visitor);

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                if let Some(request_id) = span.extensions().get::<RequestIdField>() {
                    fields.insert("request_id".to_string(), json!(request_id.0));
                }
            }
        }

        let line = serde_json::to_string(&Value::Object(fields)).map_err(|_| fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedBuf {
        type Writer = SharedBuf;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn lines_from(buf: &SharedBuf) -> Vec<Value> {
        String::from_utf8(buf.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn every_line_carries_the_constant_logger_field() {
        let buf = SharedBuf::default();
        let subscriber = tracing_subscriber::registry()
            .with(RequestIdCapture)
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(AztecJsonFormatter)
                    .with_writer(buf.clone()),
            );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("outside any request span");
        });

        let lines = lines_from(&buf);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["logger"], "aztec_exchange");
        assert_eq!(lines[0]["level"], "INFO");
        assert_eq!(lines[0]["message"], "outside any request span");
        assert!(lines[0].get("request_id").is_none());
    }

    #[test]
    fn events_inside_a_request_span_carry_its_request_id() {
        let buf = SharedBuf::default();
        let subscriber = tracing_subscriber::registry()
            .with(RequestIdCapture)
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(AztecJsonFormatter)
                    .with_writer(buf.clone()),
            );

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("request", request_id = "abcd1234");
            let _guard = span.enter();
            tracing::info!("handling request");
        });

        let lines = lines_from(&buf);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["logger"], "aztec_exchange");
        assert_eq!(lines[0]["request_id"], "abcd1234");
    }
}
