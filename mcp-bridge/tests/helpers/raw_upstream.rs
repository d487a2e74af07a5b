//! Raw TCP upstream for tests that need control over how a response body
//! reaches the client: chunk by chunk, or cut off mid-stream.
//!
//! Each accepted connection serves exactly one scripted reply and is closed
//! (`Connection: close`), so every request gets a fresh connection.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Pause between chunks so each arrives in its own read.
const CHUNK_GAP: Duration = Duration::from_millis(20);

/// One scripted HTTP/1.1 200 response sent with chunked transfer encoding.
pub struct ChunkedReply {
    content_type: &'static str,
    chunks: Vec<&'static str>,
    complete: bool,
}

impl ChunkedReply {
    /// Send every chunk and terminate the body properly.
    pub fn complete(content_type: &'static str, chunks: Vec<&'static str>) -> Self {
        Self {
            content_type,
            chunks,
            complete: true,
        }
    }

    /// Send every chunk, then drop the connection without the final chunk.
    pub fn cut_off(content_type: &'static str, chunks: Vec<&'static str>) -> Self {
        Self {
            content_type,
            chunks,
            complete: false,
        }
    }

    async fn write_to(&self, stream: &mut TcpStream) {
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
            self.content_type
        );
        stream.write_all(head.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();

        for chunk in &self.chunks {
            tokio::time::sleep(CHUNK_GAP).await;
            let framed = format!("{:x}\r\n{chunk}\r\n", chunk.len());
            stream.write_all(framed.as_bytes()).await.unwrap();
            stream.flush().await.unwrap();
        }

        tokio::time::sleep(CHUNK_GAP).await;
        if self.complete {
            stream.write_all(b"0\r\n\r\n").await.unwrap();
            stream.flush().await.unwrap();
        }
    }
}

/// Upstream that answers the n-th connection with the n-th reply.
pub struct RawUpstream {
    pub url: String,
    bodies: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl RawUpstream {
    pub async fn start(replies: Vec<ChunkedReply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/mcp", listener.local_addr().unwrap());
        let bodies = Arc::new(Mutex::new(Vec::new()));

        let recorded = bodies.clone();
        let task = tokio::spawn(async move {
            for reply in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                let body = read_request_body(&mut stream).await;
                recorded.lock().unwrap().push(body);
                reply.write_to(&mut stream).await;
            }
        });

        Self { url, bodies, task }
    }

    /// Request bodies received so far, in arrival order.
    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }
}

impl Drop for RawUpstream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Read one request's head and `Content-Length` body.
async fn read_request_body(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut tmp).await.unwrap();
        if n == 0 {
            return String::new();
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = head_end + 4;
    while buf.len() < body_start + content_length {
        let n = stream.read(&mut tmp).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
    }

    let body_end = buf.len().min(body_start + content_length);
    String::from_utf8_lossy(&buf[body_start..body_end]).into_owned()
}
