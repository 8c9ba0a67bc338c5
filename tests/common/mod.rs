//! Shared test helpers: a scripted in-memory transport and a tracing layer
//! that records spans and events for assertions.

#![allow(dead_code)]

use async_trait::async_trait;
use openai_pdf::transport::{Choice, Usage};
use openai_pdf::{
    ChatMessage, ClientConfig, CompletionResponse, RetryConfig, Transport, TransportError,
    UploadResult,
};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

// ── Scripted transport ───────────────────────────────────────────────────────

/// Transport that replays queued outcomes in order.
///
/// Once a queue is empty every further call fails with a transient network
/// error, which is what the "always failing" scenarios want.
#[derive(Default)]
pub struct ScriptedTransport {
    uploads: Mutex<VecDeque<Result<UploadResult, TransportError>>>,
    completions: Mutex<VecDeque<Result<CompletionResponse, TransportError>>>,
    upload_calls: AtomicU32,
    completion_calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_upload(&self, outcome: Result<UploadResult, TransportError>) -> &Self {
        self.uploads.lock().unwrap().push_back(outcome);
        self
    }

    pub fn push_completion(&self, outcome: Result<CompletionResponse, TransportError>) -> &Self {
        self.completions.lock().unwrap().push_back(outcome);
        self
    }

    pub fn upload_calls(&self) -> u32 {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn completion_calls(&self) -> u32 {
        self.completion_calls.load(Ordering::SeqCst)
    }

    /// Content of the last user message of every completion call.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn create_file(&self, _path: &Path, _purpose: &str) -> Result<UploadResult, TransportError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.uploads.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(TransportError::network("upload script exhausted")))
    }

    async fn create_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<CompletionResponse, TransportError> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(last) = messages.last() {
            self.prompts.lock().unwrap().push(last.content.clone());
        }
        let next = self.completions.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(TransportError::network("completion script exhausted")))
    }
}

pub fn uploaded(id: &str) -> UploadResult {
    UploadResult {
        id: id.to_string(),
        filename: "report.pdf".to_string(),
        purpose: "assistants".to_string(),
        bytes: 1024,
        created_at: 1_700_000_000,
        status: "uploaded".to_string(),
    }
}

pub fn completion(contents: &[&str]) -> CompletionResponse {
    CompletionResponse {
        model: "gpt-3.5-turbo".to_string(),
        choices: contents
            .iter()
            .map(|c| Choice {
                content: c.to_string(),
                finish_reason: Some("stop".to_string()),
            })
            .collect(),
        usage: Usage {
            prompt_tokens: 12,
            completion_tokens: 3,
        },
    }
}

/// Deterministic, fast retry schedule: 10 ms doubling, capped at 50 ms,
/// giving up after `ceiling`.
pub fn fast_retry(ceiling: Duration) -> RetryConfig {
    RetryConfig::completion()
        .initial_interval(Duration::from_millis(10))
        .multiplier(2.0)
        .randomization_factor(0.0)
        .max_interval(Duration::from_millis(50))
        .max_elapsed_time(ceiling)
}

pub fn fast_config(dispatch: Option<Dispatch>) -> ClientConfig {
    let mut builder = ClientConfig::builder()
        .upload_retry(fast_retry(Duration::from_millis(300)))
        .completion_retry(fast_retry(Duration::from_millis(300)));
    if let Some(d) = dispatch {
        builder = builder.dispatch(d);
    }
    builder.build().unwrap()
}

// ── Capturing tracing layer ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SpanRecord {
    pub name: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct EventRecord {
    pub level: Level,
    pub message: String,
    pub fields: HashMap<String, String>,
}

#[derive(Default)]
struct Store {
    spans: Vec<SpanRecord>,
    events: Vec<EventRecord>,
}

/// Handle onto everything a [`CaptureLayer`] has seen.
#[derive(Clone, Default)]
pub struct Captured {
    store: Arc<Mutex<Store>>,
}

impl Captured {
    /// A dispatcher that records into this handle.
    pub fn dispatch(&self) -> Dispatch {
        Dispatch::new(tracing_subscriber::registry().with(CaptureLayer {
            store: self.store.clone(),
        }))
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.store.lock().unwrap().spans.clone()
    }

    pub fn spans_named(&self, name: &str) -> Vec<SpanRecord> {
        self.spans().into_iter().filter(|s| s.name == name).collect()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.store.lock().unwrap().events.clone()
    }

    pub fn events_at(&self, level: Level) -> Vec<EventRecord> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }
}

struct CaptureLayer {
    store: Arc<Mutex<Store>>,
}

/// Index into `Store::spans`, kept in the span's extensions.
struct SpanIndex(usize);

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.fields.insert(field.name().to_string(), rendered);
        }
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);

        let mut store = self.store.lock().unwrap();
        store.spans.push(SpanRecord {
            name: attrs.metadata().name().to_string(),
            fields: visitor.fields,
        });
        let index = store.spans.len() - 1;
        drop(store);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanIndex(index));
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let Some(index) = span.extensions().get::<SpanIndex>().map(|i| i.0) else {
            return;
        };

        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        let mut store = self.store.lock().unwrap();
        store.spans[index].fields.extend(visitor.fields);
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.store.lock().unwrap().events.push(EventRecord {
            level: *event.metadata().level(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        });
    }
}
