use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::normalize::classify_probability;
use super::{Detection, DetectionProvider, DetectionRequest, ProviderError};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// In-process HTTP server standing in for a detection API.
pub struct FakeApi {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeApi {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }
}

/// Answers every request with `status` and the JSON `body`.
pub async fn serve_json(status: u16, body: serde_json::Value) -> FakeApi {
    serve(status, "application/json", body.to_string(), Duration::ZERO).await
}

/// Answers every request with `status` and `body` verbatim, labelled as JSON.
pub async fn serve_raw(status: u16, body: &str) -> FakeApi {
    serve(status, "application/json", body.to_string(), Duration::ZERO).await
}

/// Like [`serve_json`], but holds each response back for `delay_ms`.
pub async fn serve_json_delayed(delay_ms: u64, body: serde_json::Value) -> FakeApi {
    serve(
        200,
        "application/json",
        body.to_string(),
        Duration::from_millis(delay_ms),
    )
    .await
}

async fn serve(status: u16, content_type: &'static str, body: String, delay: Duration) -> FakeApi {
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let (server_hits, server_requests) = (hits.clone(), requests.clone());

    let server = HttpServer::new(move || {
        let hits = server_hits.clone();
        let requests = server_requests.clone();
        let body = body.clone();
        App::new().default_service(web::to(move |req: HttpRequest, payload: web::Bytes| {
            let hits = hits.clone();
            let requests = requests.clone();
            let body = body.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                requests.lock().unwrap().push(RecordedRequest {
                    path: req.path().to_string(),
                    query: req.query_string().to_string(),
                    authorization: req
                        .headers()
                        .get("Authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                    body: String::from_utf8_lossy(&payload).into_owned(),
                });
                if !delay.is_zero() {
                    actix_web::rt::time::sleep(delay).await;
                }
                HttpResponse::build(StatusCode::from_u16(status).unwrap())
                    .content_type(content_type)
                    .body(body)
            }
        }))
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", 0))
    .unwrap();

    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());

    FakeApi {
        base_url: format!("http://{}", addr),
        hits,
        requests,
    }
}

pub fn image_request(content: &[u8]) -> DetectionRequest {
    DetectionRequest {
        content: web::Bytes::copy_from_slice(content),
        filename: "photo.jpg".to_string(),
        mime_type: "image/jpeg".to_string(),
    }
}

pub enum Outcome {
    Probability(f64),
    Fail,
    Panic,
}

/// Provider double that counts calls and answers after an optional delay.
pub struct MockProvider {
    name: &'static str,
    configured: bool,
    delay: Duration,
    outcome: Outcome,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &'static str, outcome: Outcome) -> Self {
        Self {
            name,
            configured: true,
            delay: Duration::ZERO,
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionProvider for MockProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn detect(&self, _request: &DetectionRequest) -> Result<Detection, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            actix_web::rt::time::sleep(self.delay).await;
        }
        match self.outcome {
            Outcome::Probability(p) => classify_probability(p),
            Outcome::Fail => Err(ProviderError::Rejected("mock failure".to_string())),
            Outcome::Panic => panic!("mock provider panicked"),
        }
    }
}
