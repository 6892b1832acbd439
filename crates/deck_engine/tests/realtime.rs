use std::sync::Arc;
use std::time::Duration;

use deck_engine::{
    PushChannel, RealtimeSettings, RowUpdate, Session, StaticSessionProvider, StatusSink,
    SupabaseRealtime,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

enum Seen {
    Update(RowUpdate),
    Closed(String),
}

struct ChannelSink(mpsc::UnboundedSender<Seen>);

impl StatusSink for ChannelSink {
    fn deliver(&self, update: RowUpdate) {
        let _ = self.0.send(Seen::Update(update));
    }

    fn closed(&self, reason: String) {
        let _ = self.0.send(Seen::Closed(reason));
    }
}

fn realtime(addr: std::net::SocketAddr) -> SupabaseRealtime {
    let settings = RealtimeSettings {
        url: format!("http://{addr}"),
        anon_key: "anon".into(),
        heartbeat: Duration::from_secs(60),
        join_timeout: Duration::from_secs(2),
        ..RealtimeSettings::default()
    };
    let sessions = StaticSessionProvider::new(Some(Session::new("u1").with_access_token("jwt")));
    SupabaseRealtime::new(settings, sessions)
}

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Option<Value> {
    while let Some(frame) = ws.next().await {
        if let Ok(Message::Text(text)) = frame {
            return serde_json::from_str(&text).ok();
        }
    }
    None
}

async fn reply(ws: &mut WebSocketStream<TcpStream>, topic: &str, status: &str) {
    let frame = json!({
        "topic": topic,
        "event": "phx_reply",
        "ref": "1",
        "payload": {"status": status, "response": {}},
    });
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

#[tokio::test]
async fn joins_delivers_updates_and_leaves() {
    deck_logging::initialize_for_tests();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let join = next_json(&mut ws).await.unwrap();
        let topic = join["topic"].as_str().unwrap().to_string();
        reply(&mut ws, &topic, "ok").await;

        let change = json!({
            "topic": topic,
            "event": "postgres_changes",
            "payload": {"data": {"type": "UPDATE", "record": {
                "process_id": "J1", "status": "completed",
                "presentation_s3_url": "s3://decks/r1.pptx",
                "updated_at": "2025-03-01T10:00:00Z",
            }}},
        });
        ws.send(Message::Text(change.to_string())).await.unwrap();

        loop {
            let frame = next_json(&mut ws).await.unwrap();
            if frame["event"] == "phx_leave" {
                return (join, frame);
            }
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = realtime(addr)
        .subscribe("J1", Arc::new(ChannelSink(tx)))
        .await
        .unwrap();
    assert_eq!(handle.job_id(), "J1");

    let Some(Seen::Update(update)) = rx.recv().await else {
        panic!("expected an update");
    };
    assert_eq!(update.status.as_deref(), Some("completed"));
    assert_eq!(update.output_reference.as_deref(), Some("s3://decks/r1.pptx"));
    assert!(update.updated_at.is_some());

    handle.close().await;
    let (join, leave) = server.await.unwrap();

    let changes = &join["payload"]["config"]["postgres_changes"][0];
    assert_eq!(changes["event"], "UPDATE");
    assert_eq!(changes["table"], "Process");
    assert_eq!(changes["filter"], "process_id=eq.J1");
    assert_eq!(join["payload"]["access_token"], "jwt");
    assert_eq!(leave["topic"], join["topic"]);

    // Closing on request is not reported as a lost subscription.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn refused_join_fails_subscribe() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let join = next_json(&mut ws).await.unwrap();
        let topic = join["topic"].as_str().unwrap().to_string();
        reply(&mut ws, &topic, "error").await;
        let _ = next_json(&mut ws).await;
    });

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = realtime(addr)
        .subscribe("J1", Arc::new(ChannelSink(tx)))
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn server_hangup_reports_closed() {
    deck_logging::initialize_for_tests();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let join = next_json(&mut ws).await.unwrap();
        let topic = join["topic"].as_str().unwrap().to_string();
        reply(&mut ws, &topic, "ok").await;
        ws.close(None).await.unwrap();
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _handle = realtime(addr)
        .subscribe("J1", Arc::new(ChannelSink(tx)))
        .await
        .unwrap();

    let seen = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap();
    assert!(matches!(seen, Some(Seen::Closed(_))));
}
