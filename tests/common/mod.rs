//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use oracle_waf::config::ProxyConfig;
use oracle_waf::oracle::Oracle;
use oracle_waf::{HttpServer, Shutdown};

pub const UPSTREAM_BODY: &str = "hello from upstream";

/// What the mock upstream saw for one request.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path_and_query: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Origin server that records every request and answers 201 with a marker header.
#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.captured.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Captured> {
        self.captured.lock().unwrap().last().cloned()
    }
}

pub async fn start_mock_upstream() -> MockUpstream {
    let captured: Arc<Mutex<Vec<Captured>>> = Arc::default();
    let sink = captured.clone();

    let app = Router::new().fallback(move |request: Request<Body>| {
        let sink = sink.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            sink.lock().unwrap().push(Captured {
                method: parts.method.to_string(),
                path_and_query: parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.to_string())
                    .unwrap_or_default(),
                headers: parts
                    .headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                    .collect(),
                body,
            });
            (
                StatusCode::CREATED,
                [("x-upstream", "mock"), ("content-type", "text/plain")],
                UPSTREAM_BODY,
            )
        }
    });

    let addr = serve(app).await;
    MockUpstream { addr, captured }
}

/// Bind an ephemeral port and serve `app` in the background.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Upstream that sends headers and part of a body, then goes silent.
pub async fn start_stalling_upstream(stall: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\nabc")
                    .await;
                tokio::time::sleep(stall).await;
                let _ = socket.write_all(b"defghij").await;
            });
        }
    });
    addr
}

/// An address with nothing listening on it.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Mock oracle endpoint serving `POST /api/generate` with a fixed reply.
pub async fn start_mock_oracle(status: StatusCode, body: &'static str, delay: Duration) -> String {
    let app = Router::new().route(
        "/api/generate",
        axum::routing::post(move || async move {
            tokio::time::sleep(delay).await;
            Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap()
                .into_response()
        }),
    );
    let addr = serve(app).await;
    format!("http://{}/api/generate", addr)
}

/// Deterministic oracle that records prompts and can stall.
pub struct StubOracle {
    answer: String,
    delay: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubOracle {
    pub fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn benign() -> Arc<Self> {
        Self::answering("RESULT: BENIGN\nREASON: ordinary request")
    }

    pub fn malicious() -> Arc<Self> {
        Self::answering("RESULT: MALICIOUS\nREASON: SQL injection in id parameter")
    }

    pub fn stalling(answer: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            delay,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for StubOracle {
    async fn query(&self, prompt: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone()
    }
}

pub fn config_for(target: Option<String>) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.target_url = target;
    config.upstream.timeout_secs = 5;
    config
}

/// Start the proxy on an ephemeral port with an injected oracle.
///
/// The server stops as soon as the returned `Shutdown` is dropped, so keep it
/// bound for the duration of the test.
pub async fn start_proxy(config: ProxyConfig, oracle: Arc<dyn Oracle>) -> (SocketAddr, Shutdown) {
    start_server(HttpServer::with_oracle(config, oracle).unwrap()).await
}

pub async fn start_server(server: HttpServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
