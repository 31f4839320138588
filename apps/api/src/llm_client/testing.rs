//! Local HTTP server that answers Gemini calls with canned replies.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde_json::{json, Value};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

use super::LlmClient;

#[derive(Clone)]
pub struct Reply {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl Reply {
    pub fn raw(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: Value) -> Self {
        Self::raw(status, "application/json", body.to_string())
    }

    /// A successful generateContent answer whose text is `text`.
    pub fn answer(text: &str) -> Self {
        Self::json(200, candidate(text))
    }

    /// A Gemini-style error envelope.
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({"error": {"code": status, "message": message}}))
    }

    /// An `alt=sse` stream with one event per chunk.
    pub fn events(chunks: &[&str]) -> Self {
        let body: String = chunks
            .iter()
            .map(|c| format!("data: {}\r\n\r\n", candidate(c)))
            .collect();
        Self::raw(200, "text/event-stream", body)
    }
}

fn candidate(text: &str) -> Value {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
}

/// Serves `replies` in order, one per request; the last one repeats.
pub struct FakeGemini {
    base_url: String,
    requests: Arc<AtomicUsize>,
}

impl FakeGemini {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(AtomicUsize::new(0));

        let counter = requests.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let Some(reply) = replies.get(n).or(replies.last()).cloned() else {
                    return;
                };
                tokio::spawn(respond(socket, reply));
            }
        });

        Self { base_url, requests }
    }

    pub fn client(&self) -> LlmClient {
        LlmClient::new(Some("AIza-test-key".into())).with_base_url(self.base_url.clone())
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

async fn respond(mut socket: TcpStream, reply: Reply) {
    read_request(&mut socket).await;
    let head = format!(
        "HTTP/1.1 {} Canned\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        reply.status,
        reply.content_type,
        reply.body.len()
    );
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(reply.body.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Drains one request (headers plus a `content-length` body).
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let Ok(n) = socket.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= head_end + 4 + length {
            return;
        }
    }
}
