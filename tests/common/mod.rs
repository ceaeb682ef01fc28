//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use stats_gateway::resilience::{CircuitBreaker, RateLimiterChain, RateWindow, RetryPolicy};
use stats_gateway::upstream::{HttpTransport, ResourceClient, RoutingTable, UpstreamGatewayClient};

pub const TEST_API_KEY: &str = "test-key";

/// What the mock upstream does with one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, String),
    /// 429 with a `Retry-After` header.
    Throttled { retry_after_secs: u32 },
    /// Close the socket without answering.
    Drop,
}

impl Reply {
    pub fn ok(body: serde_json::Value) -> Self {
        Reply::Json(200, body.to_string())
    }

    pub fn status(status: u16) -> Self {
        Reply::Json(status, "{}".to_string())
    }
}

/// One request as seen by the mock.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub query: Option<String>,
    pub head: String,
}

/// A mock upstream listening on an ephemeral port.
pub struct MockUpstream {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl MockUpstream {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn hits_to(&self, path: &str) -> usize {
        self.seen.lock().unwrap().iter().filter(|s| s.path == path).count()
    }

    pub fn requests(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

/// Start a programmable mock upstream. `handler` sees the request path and
/// how many requests the mock has already served.
pub async fn start_programmable_upstream<F, Fut>(handler: F) -> MockUpstream
where
    F: Fn(String, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let recorded = seen.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let handler = handler.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        serve_one(socket, handler, recorded).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUpstream { addr, seen }
}

/// Start a mock upstream answering from a fixed path table; unknown paths get 404.
pub async fn start_routed_upstream(routes: HashMap<String, Reply>) -> MockUpstream {
    let routes = Arc::new(routes);
    start_programmable_upstream(move |path, _| {
        let routes = routes.clone();
        async move { routes.get(&path).cloned().unwrap_or_else(|| Reply::status(404)) }
    })
    .await
}

async fn serve_one<F, Fut>(mut socket: TcpStream, handler: Arc<F>, seen: Arc<Mutex<Vec<Seen>>>)
where
    F: Fn(String, usize) -> Fut,
    Fut: Future<Output = Reply>,
{
    let head = match read_head(&mut socket).await {
        Some(head) => head,
        None => return,
    };
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target, None),
    };

    let served = {
        let mut seen = seen.lock().unwrap();
        seen.push(Seen {
            path: path.clone(),
            query,
            head: head.clone(),
        });
        seen.len() - 1
    };

    let (status, extra_header, body) = match handler(path, served).await {
        Reply::Json(status, body) => (status, String::new(), body),
        Reply::Throttled { retry_after_secs } => (429, format!("Retry-After: {retry_after_secs}\r\n"), "{}".to_string()),
        Reply::Drop => return,
    };

    let status_text = match status {
        200 => "200 OK",
        403 => "403 Forbidden",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        418 => "418 I'm a teapot",
        _ => "200 OK",
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_text,
        extra_header,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            return Some(String::from_utf8_lossy(&buf).into_owned());
        }
    }
}

/// A gateway pointed at `base_url` with a real HTTP transport and a
/// generous limiter.
pub fn gateway(base_url: &str, breaker: CircuitBreaker, retry: RetryPolicy) -> UpstreamGatewayClient {
    let transport = HttpTransport::new(Some(TEST_API_KEY), Duration::from_secs(1), Duration::from_secs(2)).unwrap();
    UpstreamGatewayClient::new(
        RoutingTable::uniform(base_url).unwrap(),
        Arc::new(transport),
        RateLimiterChain::new(&[RateWindow::new(1000, 1.0)]),
        breaker,
        retry,
    )
}

/// Keyless resource client with the given retry policy.
pub fn resources(retry: RetryPolicy) -> ResourceClient {
    let transport = HttpTransport::new(None, Duration::from_secs(1), Duration::from_secs(2)).unwrap();
    ResourceClient::new(Arc::new(transport), retry)
}

/// Short delays so retry tests stay fast.
pub fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(10), Duration::from_millis(50))
}
