//! Request handlers for the termbox server.
//!
//! Handlers stay thin. Box semantics live in [`termbox_core::management::BoxManager`]; this module
//! only translates between HTTP and those operations.

use std::io;

use axum::{
    body::Bytes,
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use termbox_core::runtime::ExecStream;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::{
    error::{ServerError, ValidationError},
    payload::{
        BoxListResponse, BoxStatus, CreateBoxRequest, CreateBoxResponse, ExecQuery,
        RegularMessageResponse,
    },
    state::AppState,
    ServerResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const EXEC_BUFFER_SIZE: usize = 8 * 1024;

//--------------------------------------------------------------------------------------------------
// Functions: REST API Handlers
//--------------------------------------------------------------------------------------------------

/// Handler for health check
pub async fn health() -> ServerResult<impl IntoResponse> {
    Ok((
        StatusCode::OK,
        Json(RegularMessageResponse {
            message: "Service is healthy".to_string(),
        }),
    ))
}

/// Handler for creating a box.
///
/// The body is optional. Without one the box runs the default catalog image.
pub async fn create_box(
    State(state): State<AppState>,
    body: Bytes,
) -> ServerResult<impl IntoResponse> {
    let request = parse_create_request(&body)?;
    let handle = state.get_boxes().create_box(request.image.as_deref()).await?;

    Ok((StatusCode::CREATED, Json(CreateBoxResponse::from(handle))))
}

/// Handler for listing the current boxes
pub async fn list_boxes(State(state): State<AppState>) -> ServerResult<impl IntoResponse> {
    let boxes = state
        .get_boxes()
        .list_boxes()
        .await?
        .into_iter()
        .map(BoxStatus::from)
        .collect();

    Ok((StatusCode::OK, Json(BoxListResponse { boxes })))
}

/// Handler for attaching a terminal to a box over a websocket.
///
/// The exec stream is opened before the upgrade so that unknown boxes and runtime failures are
/// reported as regular HTTP errors.
pub async fn exec_box(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ExecQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ServerResult<Response> {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            // Unknown boxes are a 404 whether or not the request can be upgraded.
            if state.get_boxes().find_box(&id).await?.is_none() {
                return Err(ServerError::NotFound(id));
            }
            return Ok(rejection.into_response());
        }
    };

    let stream = state.get_boxes().exec_box(&id, query.command()).await?;

    Ok(ws.on_upgrade(move |socket| bridge(socket, stream, id)))
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn parse_create_request(body: &[u8]) -> ServerResult<CreateBoxRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateBoxRequest::default());
    }

    serde_json::from_slice(body).map_err(|e| {
        ServerError::ValidationError(ValidationError::InvalidInput(format!(
            "invalid request body: {}",
            e
        )))
    })
}

/// Copies websocket frames into the exec stream and exec output back as binary frames until
/// either side closes.
async fn bridge(socket: WebSocket, stream: Box<dyn ExecStream>, id: String) {
    let (sink, source) = socket.split();
    relay(source, sink, stream, &id).await;
}

async fn relay<S, K, E>(source: S, sink: K, stream: Box<dyn ExecStream>, id: &str)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    K: Sink<Message> + Unpin,
    K::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (reader, writer) = tokio::io::split(stream);

    tracing::debug!("terminal attached to box {}", id);

    let result = tokio::select! {
        result = pump_input(source, writer) => result,
        result = pump_output(reader, sink) => result,
    };

    match result {
        Ok(()) => tracing::debug!("terminal detached from box {}", id),
        Err(e) => tracing::warn!("terminal session for box {} ended with error: {}", id, e),
    }
}

async fn pump_input<S, E>(
    mut source: S,
    mut writer: WriteHalf<Box<dyn ExecStream>>,
) -> io::Result<()>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    while let Some(message) = source.next().await {
        match message.map_err(io::Error::other)? {
            Message::Binary(data) => writer.write_all(&data).await?,
            Message::Text(text) => writer.write_all(text.as_str().as_bytes()).await?,
            Message::Close(_) => break,
            _ => {}
        }
        writer.flush().await?;
    }

    writer.shutdown().await
}

async fn pump_output<K>(mut reader: ReadHalf<Box<dyn ExecStream>>, mut sink: K) -> io::Result<()>
where
    K: Sink<Message> + Unpin,
    K::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut buf = vec![0u8; EXEC_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        sink.send(Message::Binary(buf[..n].to_vec().into()))
            .await
            .map_err(io::Error::other)?;
    }

    // The peer may already be gone.
    let _ = sink.send(Message::Close(None)).await;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::channel::mpsc;
    use std::time::Duration;
    use termbox_core::runtime::{ExecRequest, InMemoryRuntime, RuntimeClient};

    #[test]
    fn test_parse_create_request_accepts_empty_body() {
        let request = parse_create_request(b"").unwrap();
        assert!(request.image.is_none());

        let request = parse_create_request(b"  \n").unwrap();
        assert!(request.image.is_none());
    }

    #[test]
    fn test_parse_create_request_reads_image() {
        let request = parse_create_request(br#"{"image": "alpine:3.11"}"#).unwrap();
        assert_eq!(request.image.as_deref(), Some("alpine:3.11"));

        let request = parse_create_request(b"{}").unwrap();
        assert!(request.image.is_none());
    }

    #[test]
    fn test_parse_create_request_rejects_garbage() {
        let result = parse_create_request(b"not json");
        assert!(matches!(result, Err(ServerError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_relay_echoes_input_as_binary_frames() {
        let runtime = InMemoryRuntime::new();
        runtime.insert_pod("b1", "termbox", Utc::now());
        let stream = runtime
            .exec("b1", &ExecRequest::interactive(vec!["/bin/sh".to_string()]))
            .await
            .unwrap();

        let (input, source) = mpsc::unbounded::<Result<Message, axum::Error>>();
        let (sink, mut output) = mpsc::unbounded::<Message>();
        let session = tokio::spawn(async move { relay(source, sink, stream, "b1").await });

        input
            .unbounded_send(Ok(Message::Binary("hello".into())))
            .unwrap();
        assert_eq!(output.next().await, Some(Message::Binary("hello".into())));

        input.unbounded_send(Ok(Message::Text("ls\n".into()))).unwrap();
        assert_eq!(output.next().await, Some(Message::Binary("ls\n".into())));

        input.unbounded_send(Ok(Message::Close(None))).unwrap();
        tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .expect("session ends after close")
            .unwrap();
    }

    #[tokio::test]
    async fn test_relay_closes_socket_when_process_exits() {
        let (client, process) = tokio::io::duplex(64);
        let (input, source) = mpsc::unbounded::<Result<Message, axum::Error>>();
        let (sink, mut output) = mpsc::unbounded::<Message>();
        let session = tokio::spawn(async move {
            relay(source, sink, Box::new(client) as Box<dyn ExecStream>, "b1").await
        });

        drop(process);

        assert_eq!(output.next().await, Some(Message::Close(None)));
        tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .expect("session ends when the process exits")
            .unwrap();
        drop(input);
    }
}
