//! Supabase Realtime adapter for [`PushChannel`].
//!
//! Speaks the Phoenix channel protocol (JSON frames, `vsn=1.0.0`) over a
//! WebSocket. Each subscription owns its own socket and joins a single topic
//! whose `postgres_changes` filter narrows row updates to one job.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use deck_logging::{deck_debug, deck_info, deck_warn};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::{
    FailureKind, PushChannel, RealtimeSettings, RowUpdate, ServiceError, SessionProvider,
    StatusSink, SubscriptionHandle,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Writer = SplitSink<Socket, Message>;
type Reader = SplitStream<Socket>;

const JOIN_REF: &str = "1";

/// Column names used to pick a job's fields out of a changed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RowColumns {
    pub key: String,
    pub status: String,
    pub output: String,
}

impl RowColumns {
    fn from_settings(settings: &RealtimeSettings) -> Self {
        Self {
            key: settings.key_column.clone(),
            status: settings.status_column.clone(),
            output: settings.output_column.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(default)]
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
}

/// What an inbound frame means for a joined topic.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    Reply {
        reference: Option<String>,
        ok: bool,
        detail: String,
    },
    Change(RowUpdate),
    /// Server-side failure for the topic (`phx_error`, `phx_close`, or a failed system status).
    Failed(String),
    Ignored,
}

pub struct SupabaseRealtime {
    settings: RealtimeSettings,
    sessions: Arc<dyn SessionProvider>,
}

impl SupabaseRealtime {
    pub fn new(settings: RealtimeSettings, sessions: Arc<dyn SessionProvider>) -> Self {
        Self { settings, sessions }
    }

    fn socket_url(&self) -> Result<url::Url, ServiceError> {
        socket_url(&self.settings.url, &self.settings.anon_key)
    }

    async fn join(
        &self,
        writer: &mut Writer,
        reader: &mut Reader,
        topic: &str,
        job_id: &str,
    ) -> Result<(), ServiceError> {
        let access_token = self
            .sessions
            .current()
            .and_then(|session| session.access_token)
            .unwrap_or_else(|| self.settings.anon_key.clone());
        let join = json!({
            "topic": topic,
            "event": "phx_join",
            "payload": {
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [{
                        "event": "UPDATE",
                        "schema": self.settings.schema,
                        "table": self.settings.table,
                        "filter": format!("{}=eq.{}", self.settings.key_column, job_id),
                    }],
                },
                "access_token": access_token,
            },
            "ref": JOIN_REF,
            "join_ref": JOIN_REF,
        });
        send(writer, join).await?;

        let columns = RowColumns::from_settings(&self.settings);
        let wait_for_reply = async {
            while let Some(frame) = reader.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(frame)) => {
                        return Err(ServiceError::new(
                            FailureKind::Closed,
                            format!("socket closed during join: {frame:?}"),
                        ))
                    }
                    Ok(_) => continue,
                    Err(err) => {
                        return Err(ServiceError::new(FailureKind::Network, err.to_string()))
                    }
                };
                match decode_frame(&text, topic, job_id, &columns) {
                    Inbound::Reply { reference, ok, detail }
                        if reference.as_deref() == Some(JOIN_REF) =>
                    {
                        return if ok {
                            Ok(())
                        } else {
                            Err(ServiceError::new(
                                FailureKind::Closed,
                                format!("join refused: {detail}"),
                            ))
                        };
                    }
                    Inbound::Failed(reason) => {
                        return Err(ServiceError::new(FailureKind::Closed, reason))
                    }
                    _ => {}
                }
            }
            Err(ServiceError::new(FailureKind::Closed, "socket ended during join"))
        };
        tokio::time::timeout(self.settings.join_timeout, wait_for_reply)
            .await
            .map_err(|_| {
                ServiceError::new(FailureKind::Timeout, format!("no reply to join of {topic}"))
            })?
    }
}

#[async_trait::async_trait]
impl PushChannel for SupabaseRealtime {
    async fn subscribe(
        &self,
        job_id: &str,
        sink: Arc<dyn StatusSink>,
    ) -> Result<SubscriptionHandle, ServiceError> {
        let url = self.socket_url()?;
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|err| ServiceError::new(FailureKind::Network, err.to_string()))?;
        let (mut writer, mut reader) = socket.split();

        let topic = format!("realtime:deck-job-{job_id}");
        self.join(&mut writer, &mut reader, &topic, job_id).await?;
        deck_info!("Joined {}", topic);

        let cancel = CancellationToken::new();
        let topic_task = JoinedTopic {
            writer,
            reader,
            topic,
            job_id: job_id.to_string(),
            columns: RowColumns::from_settings(&self.settings),
            heartbeat: self.settings.heartbeat,
            cancel: cancel.clone(),
            sink,
        };
        let task = tokio::spawn(topic_task.run());
        Ok(SubscriptionHandle::new(job_id, cancel, task))
    }
}

/// One joined topic on one socket.
struct JoinedTopic {
    writer: Writer,
    reader: Reader,
    topic: String,
    job_id: String,
    columns: RowColumns,
    heartbeat: Duration,
    cancel: CancellationToken,
    sink: Arc<dyn StatusSink>,
}

impl JoinedTopic {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.heartbeat);
        ticker.tick().await;
        let mut next_ref: u64 = 2;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    let leave = json!({
                        "topic": self.topic,
                        "event": "phx_leave",
                        "payload": {},
                        "ref": next_ref.to_string(),
                        "join_ref": JOIN_REF,
                    });
                    if let Err(err) = send(&mut self.writer, leave).await {
                        deck_debug!("Leave of {} not sent: {}", self.topic, err);
                    }
                    let _ = self.writer.close().await;
                    deck_info!("Left {}", self.topic);
                    return;
                }
                _ = ticker.tick() => {
                    let beat = json!({
                        "topic": "phoenix",
                        "event": "heartbeat",
                        "payload": {},
                        "ref": next_ref.to_string(),
                    });
                    next_ref += 1;
                    if let Err(err) = send(&mut self.writer, beat).await {
                        self.lost(format!("heartbeat failed: {err}"));
                        return;
                    }
                }
                frame = self.reader.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => {
                            self.lost(format!("server closed the socket: {frame:?}"));
                            return;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => {
                            self.lost(err.to_string());
                            return;
                        }
                        None => {
                            self.lost("socket ended".to_string());
                            return;
                        }
                    };
                    match decode_frame(&text, &self.topic, &self.job_id, &self.columns) {
                        Inbound::Change(update) if !self.cancel.is_cancelled() => {
                            deck_debug!("{} status={:?}", self.topic, update.status);
                            self.sink.deliver(update);
                        }
                        Inbound::Failed(reason) => {
                            self.lost(reason);
                            return;
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn lost(&self, reason: String) {
        if self.cancel.is_cancelled() {
            return;
        }
        deck_warn!("Subscription {} lost: {}", self.topic, reason);
        self.sink.closed(reason);
    }
}

async fn send(writer: &mut Writer, frame: Value) -> Result<(), ServiceError> {
    writer
        .send(Message::Text(frame.to_string()))
        .await
        .map_err(|err| ServiceError::new(FailureKind::Network, err.to_string()))
}

pub(crate) fn socket_url(project_url: &str, anon_key: &str) -> Result<url::Url, ServiceError> {
    let mut url = url::Url::parse(project_url).map_err(|err| {
        ServiceError::new(FailureKind::InvalidUrl, format!("{project_url}: {err}"))
    })?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ServiceError::new(
                FailureKind::InvalidUrl,
                format!("unsupported scheme {other}"),
            ))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ServiceError::new(FailureKind::InvalidUrl, project_url.to_string()))?;
    let path = format!("{}/realtime/v1/websocket", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

pub(crate) fn decode_frame(text: &str, topic: &str, job_id: &str, columns: &RowColumns) -> Inbound {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            deck_warn!("Undecodable realtime frame: {}", err);
            return Inbound::Ignored;
        }
    };
    if frame.topic != topic {
        return Inbound::Ignored;
    }
    match frame.event.as_str() {
        "phx_reply" => {
            let status = frame.payload.get("status").and_then(Value::as_str);
            Inbound::Reply {
                reference: frame.reference,
                ok: status == Some("ok"),
                detail: frame
                    .payload
                    .get("response")
                    .map(Value::to_string)
                    .unwrap_or_default(),
            }
        }
        "postgres_changes" => match decode_change(&frame.payload, job_id, columns) {
            Some(update) => Inbound::Change(update),
            None => Inbound::Ignored,
        },
        "system" => {
            let status = frame.payload.get("status").and_then(Value::as_str);
            if status == Some("error") {
                let message = frame
                    .payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("subscription rejected");
                Inbound::Failed(message.to_string())
            } else {
                Inbound::Ignored
            }
        }
        "phx_error" => Inbound::Failed("channel errored".to_string()),
        "phx_close" => Inbound::Failed("channel closed by server".to_string()),
        _ => Inbound::Ignored,
    }
}

fn decode_change(payload: &Value, job_id: &str, columns: &RowColumns) -> Option<RowUpdate> {
    let data = payload.get("data").unwrap_or(payload);
    let record = data
        .get("record")
        .or_else(|| data.get("new"))
        .filter(|record| record.is_object())?;

    // The server filter should already guarantee this; rows for other jobs are dropped.
    if let Some(key) = record.get(&columns.key).and_then(scalar_string) {
        if key != job_id {
            return None;
        }
    }

    let text = |column: &str| record.get(column).and_then(Value::as_str).map(str::to_string);
    let updated_at = record
        .get("updated_at")
        .and_then(Value::as_str)
        .or_else(|| data.get("commit_timestamp").and_then(Value::as_str))
        .and_then(parse_timestamp);

    Some(RowUpdate {
        status: text(&columns.status),
        output_reference: text(&columns.output),
        updated_at,
    })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::{decode_frame, parse_timestamp, socket_url, Inbound, RowColumns};
    use crate::RowUpdate;

    fn columns() -> RowColumns {
        RowColumns {
            key: "process_id".into(),
            status: "status".into(),
            output: "presentation_s3_url".into(),
        }
    }

    const TOPIC: &str = "realtime:deck-job-J1";

    #[test]
    fn update_frame_decodes_status_and_output() {
        let text = r#"{"topic":"realtime:deck-job-J1","event":"postgres_changes","ref":null,
            "payload":{"ids":[1],"data":{"type":"UPDATE","commit_timestamp":"2025-03-01T10:00:00Z",
            "record":{"process_id":"J1","status":"Completed","presentation_s3_url":"s3://out/r1",
            "updated_at":"2025-03-01T10:00:01.250+00:00"}}}}"#;
        let Inbound::Change(update) = decode_frame(text, TOPIC, "J1", &columns()) else {
            panic!("expected change");
        };
        assert_eq!(update.status.as_deref(), Some("Completed"));
        assert_eq!(update.output_reference.as_deref(), Some("s3://out/r1"));
        assert_eq!(
            update.updated_at.map(|t| t.timestamp_millis()),
            Some(1_740_823_201_250)
        );
    }

    #[test]
    fn rows_for_other_jobs_and_topics_are_ignored() {
        let other_row = r#"{"topic":"realtime:deck-job-J1","event":"postgres_changes",
            "payload":{"data":{"record":{"process_id":"J2","status":"completed"}}}}"#;
        assert_eq!(decode_frame(other_row, TOPIC, "J1", &columns()), Inbound::Ignored);

        let other_topic = r#"{"topic":"realtime:deck-job-J2","event":"postgres_changes",
            "payload":{"data":{"record":{"process_id":"J1","status":"completed"}}}}"#;
        assert_eq!(decode_frame(other_topic, TOPIC, "J1", &columns()), Inbound::Ignored);
    }

    #[test]
    fn numeric_key_and_missing_output_are_tolerated() {
        let text = r#"{"topic":"realtime:deck-job-41","event":"postgres_changes",
            "payload":{"data":{"record":{"process_id":41,"status":"processing"}}}}"#;
        assert_eq!(
            decode_frame(text, "realtime:deck-job-41", "41", &columns()),
            Inbound::Change(RowUpdate {
                status: Some("processing".into()),
                output_reference: None,
                updated_at: None,
            })
        );
    }

    #[test]
    fn join_reply_and_system_errors() {
        let ok = r#"{"topic":"realtime:deck-job-J1","event":"phx_reply","ref":"1",
            "payload":{"status":"ok","response":{"postgres_changes":[]}}}"#;
        assert!(matches!(
            decode_frame(ok, TOPIC, "J1", &columns()),
            Inbound::Reply { ok: true, .. }
        ));

        let rejected = r#"{"topic":"realtime:deck-job-J1","event":"system",
            "payload":{"status":"error","message":"invalid filter"}}"#;
        assert_eq!(
            decode_frame(rejected, TOPIC, "J1", &columns()),
            Inbound::Failed("invalid filter".into())
        );
        assert_eq!(decode_frame("not json", TOPIC, "J1", &columns()), Inbound::Ignored);
    }

    #[test]
    fn postgres_timestamp_without_zone_is_utc() {
        let parsed = parse_timestamp("2025-03-01 10:00:01.5").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-03-01T10:00:01.500+00:00");
    }

    #[test]
    fn socket_url_switches_scheme_and_carries_key() {
        let url = socket_url("https://abc.supabase.co", "anon").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
        let local = socket_url("http://127.0.0.1:54321/", "k").unwrap();
        assert_eq!(local.scheme(), "ws");
        assert_eq!(local.path(), "/realtime/v1/websocket");
    }
}
