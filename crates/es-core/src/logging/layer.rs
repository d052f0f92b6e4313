//! Tracing layer emitting one JSON object per event.
//!
//! Output goes to stderr so stdout stays reserved for command payloads.
//! Events name themselves through an `event` field; the tracing target is
//! used when the field is absent.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

/// Correlation fields recorded on spans.
#[derive(Debug, Clone, Default)]
struct SpanContext {
    run_id: Option<String>,
    stage: Option<String>,
}

impl Visit for SpanContext {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "run_id" => self.run_id = Some(value.to_string()),
            "stage" => self.stage = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // Display-formatted (`%`) values arrive here.
        self.record_str(field, &format!("{:?}", value));
    }
}

/// Collects event fields into a JSON map.
#[derive(Default)]
struct JsonFieldVisitor {
    fields: Map<String, Value>,
    message: Option<String>,
    event: Option<String>,
    run_id: Option<String>,
    stage: Option<String>,
}

impl JsonFieldVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }

    fn put_string(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            "event" => self.event = Some(value),
            "run_id" => self.run_id = Some(value),
            "stage" => self.stage = Some(value),
            _ => self.put(field, Value::String(value)),
        }
    }
}

impl Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put_string(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put_string(field, format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, json!(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }
}

/// JSONL tracing layer.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// Create a layer with a custom writer.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut span_ctx = SpanContext::default();
        attrs.record(&mut span_ctx);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(span_ctx);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        // Innermost span wins.
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ctx) = span.extensions().get::<SpanContext>() {
                    if visitor.run_id.is_none() {
                        visitor.run_id.clone_from(&span_ctx.run_id);
                    }
                    if visitor.stage.is_none() {
                        visitor.stage.clone_from(&span_ctx.stage);
                    }
                }
            }
        }

        let level: Level = (*event.metadata().level()).into();
        let mut obj = Map::new();
        obj.insert("ts".into(), json!(Utc::now().to_rfc3339()));
        obj.insert("level".into(), json!(level));
        obj.insert(
            "event".into(),
            json!(visitor
                .event
                .take()
                .unwrap_or_else(|| event.metadata().target().to_string())),
        );
        if let Some(id) = visitor.run_id.take() {
            obj.insert("run_id".into(), json!(id));
        }
        if let Some(stage) = visitor.stage.take() {
            obj.insert("stage".into(), json!(stage));
        }
        if let Some(msg) = visitor.message.take() {
            obj.insert("message".into(), json!(msg));
        }
        if !visitor.fields.is_empty() {
            obj.insert("fields".into(), Value::Object(visitor.fields));
        }

        let line = serde_json::to_string(&Value::Object(obj)).unwrap_or_default();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
        }
    }
}
