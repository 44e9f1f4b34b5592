//! Build sessions
//!
//! Starts a build over REST, then follows its log socket until the backend
//! reports a terminal status or closes the connection. Builds have no
//! client-side deadline.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use super::rest::BackendClient;
use crate::error::PipelineError;
use crate::pipeline::{BuildLog, EventSink, SessionKind, Transport};
use crate::stream::{BuildEvent, FrameDecoder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub project_id: String,
}

impl BuildRequest {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }
}

pub struct BuildTransport {
    client: BackendClient,
}

impl BuildTransport {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }
}

#[async_trait]
impl Transport for BuildTransport {
    type Request = BuildRequest;
    type Artifact = BuildLog;

    fn kind(&self) -> SessionKind {
        SessionKind::Build
    }

    async fn run(
        &self,
        request: BuildRequest,
        sink: EventSink<BuildEvent>,
    ) -> Result<(), PipelineError> {
        let build_id = self.client.start_build(&request.project_id).await?;
        sink.emit(BuildEvent::Assigned {
            build_id: build_id.clone(),
        })?;

        let url = self.client.build_socket_url(&build_id)?;
        info!(session = %sink.session(), build = %build_id, "Connecting to build socket");
        let (mut socket, _response) = connect_async(url.as_str()).await?;

        let mut decoder = FrameDecoder::new();
        while let Some(message) = socket.next().await {
            let event = match message? {
                Message::Text(text) => decoder.decode(text.as_str()),
                Message::Binary(data) => decoder.decode_binary(&data),
                Message::Close(frame) => {
                    debug!(build = %build_id, "Build socket closed by server: {:?}", frame);
                    break;
                }
                // Ping/pong are answered by tungstenite
                _ => None,
            };

            let Some(event) = event else {
                continue;
            };
            let terminal = matches!(&event, BuildEvent::Status { status } if status.is_terminal());
            sink.emit(event)?;
            if terminal {
                let _ = socket.close(None).await;
                break;
            }
        }

        debug!(
            build = %build_id,
            decoded = decoder.decoded(),
            discarded = decoder.discarded(),
            "Build socket finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::SinkExt;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    use super::*;
    use crate::bus::EventBus;
    use crate::config::ForgeConfig;
    use crate::error::ErrorKind;
    use crate::pipeline::{Inbox, SessionIds, SessionSlot, SessionState};
    use crate::stream::BuildStatus;
    use crate::transport::test_server::respond_with;

    /// Accept one socket, play `frames`, then close. Resolves to the request path.
    async fn serve_socket(frames: Vec<&'static str>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("ws://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut path = String::new();
            let mut socket = accept_hdr_async(stream, |request: &Request, response: Response| {
                path = request.uri().path().to_string();
                Ok::<_, ErrorResponse>(response)
            })
            .await
            .unwrap();
            for frame in frames {
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = socket.close(None).await;
            path
        });
        (base, handle)
    }

    async fn slot(
        frames: Vec<&'static str>,
    ) -> (SessionSlot<BuildTransport>, Inbox<BuildEvent>, JoinHandle<String>) {
        let (backend, _rest) =
            respond_with("200 OK", "application/json", r#"{"build_id":"b-1"}"#.into()).await;
        let (socket, server) = serve_socket(frames).await;
        let config = ForgeConfig {
            backend_url: backend,
            socket_url: Some(socket),
            ..Default::default()
        };
        let transport = BuildTransport::new(BackendClient::new(&config).unwrap());
        let (slot, inbox) = SessionSlot::new(transport, SessionIds::new(), EventBus::new());
        (slot, inbox, server)
    }

    #[tokio::test]
    async fn test_build_session_end_to_end() {
        let (mut slot, mut inbox, server) = slot(vec![
            r#"{"type":"status","status":"starting"}"#,
            r#"{"type":"log","text":"compiling"}"#,
            r#"{"type":"log""#,
            r#"{"type":"progress","percent":50}"#,
            r#"{"type":"status","status":"completed"}"#,
        ])
        .await;

        slot.start(BuildRequest::new("proj"));
        slot.run_until_settled(&mut inbox).await;

        let controller = slot.active().unwrap();
        assert_eq!(controller.state(), SessionState::Completed);
        let log = controller.artifact();
        assert_eq!(log.lines(), ["compiling".to_string()]);
        assert_eq!(log.status(), Some(BuildStatus::Completed));
        assert_eq!(log.build_id(), Some("b-1"));
        assert!(log.can_download());
        assert!(slot.transport().client().download_url(log).is_some());

        assert_eq!(server.await.unwrap(), "/ws/build/b-1");
    }

    #[tokio::test]
    async fn test_socket_closed_before_terminal_status() {
        let (mut slot, mut inbox, _server) = slot(vec![
            r#"{"type":"status","status":"building"}"#,
            r#"{"type":"log","text":"step 1"}"#,
        ])
        .await;

        slot.start(BuildRequest::new("proj"));
        slot.run_until_settled(&mut inbox).await;

        let controller = slot.active().unwrap();
        assert_eq!(controller.state(), SessionState::Failed);
        let detail = controller.session().error_detail.clone().unwrap();
        assert_eq!(detail.kind, ErrorKind::Transport);
        assert!(detail
            .message
            .contains("connection closed before the build finished"));
        assert!(!controller.artifact().can_download());

        let lines = controller.artifact().lines();
        assert_eq!(lines[0], "step 1");
        assert_eq!(
            lines.last().map(String::as_str),
            Some("[error: transport error: connection closed before the build finished]")
        );
    }

    #[tokio::test]
    async fn test_failed_build_status() {
        let (mut slot, mut inbox, _server) = slot(vec![
            r#"{"type":"log","text":"error[E0425]"}"#,
            r#"{"type":"status","status":"failed"}"#,
        ])
        .await;

        slot.start(BuildRequest::new("proj"));
        slot.run_until_settled(&mut inbox).await;

        let controller = slot.active().unwrap();
        assert_eq!(controller.state(), SessionState::Failed);
        assert_eq!(controller.artifact().status(), Some(BuildStatus::Failed));
        assert_eq!(
            controller.session().error_detail.as_ref().map(|d| d.kind),
            Some(ErrorKind::Remote)
        );
        assert!(controller
            .artifact()
            .lines()
            .last()
            .is_some_and(|line| line.starts_with("[error:")));
    }

    #[tokio::test]
    async fn test_build_start_rejected() {
        let (backend, _rest) =
            respond_with("500 Internal Server Error", "text/plain", "queue full".into()).await;
        let config = ForgeConfig {
            backend_url: backend,
            ..Default::default()
        };
        let transport = BuildTransport::new(BackendClient::new(&config).unwrap());
        let (mut slot, mut inbox) = SessionSlot::new(transport, SessionIds::new(), EventBus::new());

        slot.start(BuildRequest::new("proj"));
        slot.run_until_settled(&mut inbox).await;

        let controller = slot.active().unwrap();
        assert_eq!(controller.state(), SessionState::Failed);
        assert!(controller.artifact().build_id().is_none());
        assert!(controller
            .artifact()
            .lines()
            .iter()
            .any(|line| line.contains("queue full")));
    }
}
