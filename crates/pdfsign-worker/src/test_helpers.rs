//! Mock backend and fixture documents for orchestrator tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lopdf::{dictionary, Document, Object};
use serde_json::{json, Value};

use pdfsign_core::models::{SigningRequest, SourceFile, UploadResult};
use pdfsign_core::{PdfSignError, SigningBackend};

#[derive(Debug, Clone)]
pub enum MockResponse {
    Status(u16, Value),
    TransportError,
}

/// Records every call and answers from scripted queues.
///
/// Submissions without a scripted response are answered with an officially
/// signed document; fetches without one with a qualified signed document.
#[derive(Clone, Default)]
pub struct MockBackend {
    submit_responses: Arc<Mutex<VecDeque<MockResponse>>>,
    fetch_responses: Arc<Mutex<VecDeque<MockResponse>>>,
    pub submissions: Arc<Mutex<Vec<SigningRequest>>>,
    pub fetches: Arc<Mutex<Vec<(String, String)>>>,
    pub tokens: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    delay: Duration,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push_submit(&self, response: MockResponse) {
        self.submit_responses.lock().unwrap().push_back(response);
    }

    pub fn push_fetch(&self, response: MockResponse) {
        self.fetch_responses.lock().unwrap().push_back(response);
    }

    pub fn submitted_names(&self) -> Vec<String> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.file.name.clone())
            .collect()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn answer(
        response: Option<MockResponse>,
        file: SourceFile,
        default: Value,
        default_status: u16,
    ) -> Result<UploadResult, PdfSignError> {
        match response {
            Some(MockResponse::Status(status, json)) => Ok(UploadResult { status, file, json }),
            Some(MockResponse::TransportError) => {
                Err(PdfSignError::Transport("connection refused".to_string()))
            }
            None => Ok(UploadResult {
                status: default_status,
                file,
                json: default,
            }),
        }
    }
}

#[async_trait]
impl SigningBackend for MockBackend {
    async fn submit(
        &self,
        request: SigningRequest,
        token: &str,
    ) -> Result<UploadResult, PdfSignError> {
        self.enter().await;
        let file = request.file.clone();
        let default = signed_body("OfficiallySignedDocument", &file.name);
        self.submissions.lock().unwrap().push(request);
        self.tokens.lock().unwrap().push(token.to_string());
        let response = self.submit_responses.lock().unwrap().pop_front();
        Self::answer(response, file, default, 201)
    }

    async fn fetch_artifact(
        &self,
        session_id: &str,
        file: &SourceFile,
        _token: &str,
    ) -> Result<UploadResult, PdfSignError> {
        self.enter().await;
        self.fetches
            .lock()
            .unwrap()
            .push((session_id.to_string(), file.name.clone()));
        let response = self.fetch_responses.lock().unwrap().pop_front();
        let default = signed_body("QualifiedlySignedDocument", &file.name);
        Self::answer(response, file.clone(), default, 200)
    }
}

/// Signed document payload for `name`, content `%PDF-1.7`.
pub fn signed_body(json_type: &str, name: &str) -> Value {
    json!({
        "@type": json_type,
        "identifier": format!("id-{}", name),
        "name": name.replace(".pdf", "-sig.pdf"),
        "contentUrl": "data:application/pdf;base64,JVBERi0xLjc=",
        "contentSize": 8
    })
}

pub fn challenge_body(url: &str) -> Value {
    json!({
        "@type": "QualifiedSigningRequest",
        "identifier": "request-1",
        "url": url
    })
}

fn build_pdf(signed: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), Object::Integer(792)],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => Object::Integer(1),
            "Kids" => vec![Object::Reference(page_id)],
        }),
    );
    if signed {
        doc.add_object(dictionary! {
            "Type" => "Sig",
            "Filter" => "Adobe.PPKLite",
            "SubFilter" => "adbe.pkcs7.detached",
        });
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// One 612x792 page, no signatures.
pub fn pdf(name: &str) -> SourceFile {
    SourceFile::pdf(name, build_pdf(false))
}

/// One 612x792 page carrying an existing detached signature dictionary.
pub fn signed_pdf(name: &str) -> SourceFile {
    SourceFile::pdf(name, build_pdf(true))
}
