//! End-to-end test over a real WebSocket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use roomwire_client::api::ChatEvent;
use roomwire_client::{ConnectionState, Session};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

struct SeenRequest {
    path_and_query: String,
    room_id: String,
    api_token: String,
    user_agent: String,
}

fn header(request: &Request, name: &str) -> String {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn text(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

#[tokio::test]
async fn test_session_over_websocket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = oneshot::channel();
    let (frames_tx, mut frames) = mpsc::unbounded_channel::<Value>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |request: &Request, response: Response| {
            let seen = SeenRequest {
                path_and_query: request
                    .uri()
                    .path_and_query()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                room_id: header(request, "room-id"),
                api_token: header(request, "api-token"),
                user_agent: header(request, "user-agent"),
            };
            let _ = seen_tx.send(seen);
            Ok::<_, ErrorResponse>(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        ws.send(text(json!({
            "_type": "SessionMetadata",
            "user_id": "bot-1",
            "room_info": {"owner_id": "owner-1", "room_name": "Lounge"},
            "connection_id": "ws-1"
        })))
        .await
        .unwrap();

        ws.send(text(json!({
            "_type": "ChatEvent",
            "user": {"id": "alice", "username": "alice"},
            "message": "!ping",
            "whisper": false
        })))
        .await
        .unwrap();

        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(body) = message else {
                continue;
            };
            let frame: Value = serde_json::from_str(body.as_str()).unwrap();
            let mut answer = json!({"rid": frame["rid"]});
            answer["_type"] = json!(frame["_type"]
                .as_str()
                .unwrap_or_default()
                .replace("Request", "Response"));
            frames_tx.send(frame).ok();
            ws.send(text(answer)).await.unwrap();
        }
    });

    let session = Session::builder("room-1", "secret-token")
        .url(format!("ws://{addr}/web/botapi"))
        .connect_timeout(Duration::from_secs(5))
        .on_chat(|event: ChatEvent, ctx| async move {
            if event.message == "!ping" {
                ctx.client().chat("pong").await
            } else {
                Ok(())
            }
        })
        .start()
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), session.wait_live())
        .await
        .unwrap()
        .unwrap();

    let seen = seen_rx.await.unwrap();
    assert_eq!(seen.path_and_query, "/web/botapi?events=chat");
    assert_eq!(seen.room_id, "room-1");
    assert_eq!(seen.api_token, "secret-token");
    assert!(seen.user_agent.starts_with("roomwire-client/"));

    let frame = frames.recv().await.unwrap();
    assert_eq!(frame["_type"], "ChatRequest");
    assert_eq!(frame["message"], "pong");

    session.client().set_indicator(None).await.unwrap();
    let frame = frames.recv().await.unwrap();
    assert_eq!(frame["_type"], "IndicatorRequest");
    assert_eq!(frame["icon"], Value::Null);

    assert_eq!(session.state(), ConnectionState::Live);
    session.stop().await.unwrap();
    server.await.unwrap();
}
