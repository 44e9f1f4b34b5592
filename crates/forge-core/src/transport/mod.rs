//! Remote transports
//!
//! - `rest`: shared HTTP client and the collaborator REST endpoints
//! - `chat`: streamed chat completions over SSE
//! - `build`: build start plus the build log socket

pub mod build;
pub mod chat;
pub mod rest;

pub use build::{BuildRequest, BuildTransport};
pub use chat::{ChatMessage, ChatRequest, ChatRole, ChatTransport};
pub use rest::BackendClient;

/// Throwaway local HTTP server for transport tests
#[cfg(test)]
pub(crate) mod test_server {
    use std::future::Future;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Accept one connection, read the request, then hand the socket to `respond`.
    /// Resolves to the raw request text.
    pub(crate) async fn serve_once<F, Fut>(respond: F) -> (String, JoinHandle<String>)
    where
        F: FnOnce(TcpStream) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            respond(socket).await;
            request
        });
        (base, handle)
    }

    /// Serve one complete response with the given status line and body
    pub(crate) async fn respond_with(
        status: &'static str,
        content_type: &'static str,
        body: String,
    ) -> (String, JoinHandle<String>) {
        serve_once(move |mut socket| async move {
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                content_type,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        })
        .await
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        if name.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
