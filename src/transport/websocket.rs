//! WebSocket transport using `tokio-tungstenite`.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::{ConnectTarget, Connector, FrameSink, FrameStream, Transport};
use crate::error::{Result, RoomwireError};
use crate::handler::BoxFuture;

/// Connects to the room service over WebSocket (`ws://` or `wss://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, target: &ConnectTarget) -> BoxFuture<'static, Result<Transport>> {
        let target = target.clone();
        Box::pin(async move { connect_websocket(&target).await })
    }
}

fn header(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| RoomwireError::Protocol(format!("invalid `{name}` header: {e}")))
}

async fn connect_websocket(target: &ConnectTarget) -> Result<Transport> {
    let mut request = target.url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert("room-id", header("room-id", &target.room_id)?);
    headers.insert("api-token", header("api-token", &target.api_token)?);
    headers.insert("user-agent", header("user-agent", &target.user_agent)?);

    let (ws, response) = tokio_tungstenite::connect_async(request).await?;
    tracing::debug!(url = %target.url, status = %response.status(), "websocket connected");

    let (sink, stream) = ws.split();

    let sink: FrameSink = Box::pin(sink.sink_map_err(RoomwireError::from).with(
        |text: String| async move { Ok::<_, RoomwireError>(Message::Text(text.into())) },
    ));

    // Text frames only; control frames are answered by tungstenite itself.
    let stream: FrameStream = Box::pin(futures_util::stream::unfold(
        Some(stream),
        |state| async move {
            let mut stream = state?;
            loop {
                match stream.next().await {
                    None => return None,
                    Some(Ok(Message::Text(text))) => {
                        return Some((Ok(text.as_str().to_owned()), Some(stream)))
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        return Some((Ok(text), Some(stream)));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(?frame, "server sent close frame");
                        return None;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Some((Err(RoomwireError::from(e)), None)),
                }
            }
        },
    ));

    Ok(Transport { sink, stream })
}
