//! The extract → upload → summarise pipeline, with the PDF and the remote
//! service both replaced by in-memory fakes.

mod common;

use async_trait::async_trait;
use common::{completion, fast_config, uploaded, ScriptedTransport};
use openai_pdf::prompts::SUMMARY_PROMPT_PREFIX;
use openai_pdf::{
    process_document, CallContext, Client, ExtractError, NoopProgressCallback, ProcessError,
    ProcessOptions, ProcessProgressCallback, Stage, TextExtractor, TransportError,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

struct FixedText(&'static str);

#[async_trait]
impl TextExtractor for FixedText {
    async fn extract_text(&self, _ctx: &CallContext, _path: &Path) -> Result<String, ExtractError> {
        Ok(self.0.to_string())
    }
}

struct MissingFile;

#[async_trait]
impl TextExtractor for MissingFile {
    async fn extract_text(&self, _ctx: &CallContext, path: &Path) -> Result<String, ExtractError> {
        Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        })
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ProcessProgressCallback for Recorder {
    fn on_stage_start(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("start:{stage}"));
    }

    fn on_stage_complete(&self, stage: Stage, _detail: &str) {
        self.events.lock().unwrap().push(format!("done:{stage}"));
    }

    fn on_stage_error(&self, stage: Stage, _error: &str) {
        self.events.lock().unwrap().push(format!("error:{stage}"));
    }
}

fn client(transport: &Arc<ScriptedTransport>) -> Client {
    Client::new(transport.clone(), fast_config(None)).unwrap()
}

#[tokio::test]
async fn full_run_uploads_and_summarises() {
    let transport = ScriptedTransport::new();
    transport
        .push_upload(Ok(uploaded("file-1")))
        .push_completion(Ok(completion(&["A short summary."])));
    let recorder = Recorder::default();

    let output = process_document(
        &client(&transport),
        &FixedText("Quarterly revenue grew by 12 percent."),
        "report.pdf",
        &ProcessOptions::default(),
        &CallContext::new(),
        &recorder,
    )
    .await
    .unwrap();

    assert_eq!(output.upload.id, "file-1");
    assert_eq!(output.summary.unwrap().content, "A short summary.");
    assert!(output.summary_error.is_none());
    assert_eq!(output.extraction.chars, 37);
    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start:extract",
            "done:extract",
            "start:upload",
            "done:upload",
            "start:summarize",
            "done:summarize",
        ]
    );
}

#[tokio::test]
async fn summary_prompt_is_truncated_on_char_boundary() {
    let transport = ScriptedTransport::new();
    transport
        .push_upload(Ok(uploaded("file-1")))
        .push_completion(Ok(completion(&["ok"])));
    let options = ProcessOptions {
        summary_chars: 5,
        ..ProcessOptions::default()
    };

    process_document(
        &client(&transport),
        &FixedText("ééééééééé and more"),
        "report.pdf",
        &options,
        &CallContext::new(),
        &NoopProgressCallback,
    )
    .await
    .unwrap();

    let prompts = transport.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0], format!("{SUMMARY_PROMPT_PREFIX}ééééé"));
}

#[tokio::test]
async fn summary_failure_is_not_fatal() {
    let transport = ScriptedTransport::new();
    transport
        .push_upload(Ok(uploaded("file-1")))
        .push_completion(Err(TransportError::from_status(401, "invalid key")));
    let recorder = Recorder::default();

    let output = process_document(
        &client(&transport),
        &FixedText("some text"),
        "report.pdf",
        &ProcessOptions::default(),
        &CallContext::new(),
        &recorder,
    )
    .await
    .unwrap();

    assert!(output.summary.is_none());
    assert!(output.summary_error.unwrap().contains("401"));
    assert!(recorder
        .events
        .lock()
        .unwrap()
        .contains(&"error:summarize".to_string()));
}

#[tokio::test]
async fn summary_can_be_disabled() {
    let transport = ScriptedTransport::new();
    transport.push_upload(Ok(uploaded("file-1")));
    let options = ProcessOptions {
        summarize: false,
        ..ProcessOptions::default()
    };

    let output = process_document(
        &client(&transport),
        &FixedText("some text"),
        "report.pdf",
        &options,
        &CallContext::new(),
        &NoopProgressCallback,
    )
    .await
    .unwrap();

    assert!(output.summary.is_none());
    assert!(output.summary_error.is_none());
    assert_eq!(transport.completion_calls(), 0);
}

#[tokio::test]
async fn empty_document_stops_before_upload() {
    let transport = ScriptedTransport::new();

    let err = process_document(
        &client(&transport),
        &FixedText("  \n\t "),
        "scan.pdf",
        &ProcessOptions::default(),
        &CallContext::new(),
        &NoopProgressCallback,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ProcessError::EmptyDocument { .. }));
    assert_eq!(transport.upload_calls(), 0);
}

#[tokio::test]
async fn extraction_failure_is_fatal() {
    let transport = ScriptedTransport::new();

    let err = process_document(
        &client(&transport),
        &MissingFile,
        "missing.pdf",
        &ProcessOptions::default(),
        &CallContext::new(),
        &NoopProgressCallback,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        ProcessError::Extract(ExtractError::FileNotFound { .. })
    ));
    assert_eq!(transport.upload_calls(), 0);
}

#[tokio::test]
async fn upload_failure_is_fatal() {
    let transport = ScriptedTransport::new();
    transport.push_upload(Err(TransportError::from_status(403, "forbidden")));
    let recorder = Recorder::default();

    let err = process_document(
        &client(&transport),
        &FixedText("some text"),
        "report.pdf",
        &ProcessOptions::default(),
        &CallContext::new(),
        &recorder,
    )
    .await
    .unwrap_err();

    match err {
        ProcessError::Upload(e) => assert!(e.is_permanent()),
        other => panic!("expected upload failure, got {other:?}"),
    }
    assert_eq!(transport.completion_calls(), 0);
    assert_eq!(
        recorder.events.lock().unwrap().last().map(String::as_str),
        Some("error:upload")
    );
}
