use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Raw bytes of one user file, ready to be transferred to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    pub name: String,
    pub mime_type: String,
    pub content: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRequest {
    pub file_name: String,
    pub file_type: String,
}

/// Short-lived permission to PUT one file to storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadAuthorization {
    pub url: String,
    pub key: String,
    pub original_name: String,
    #[serde(rename = "type")]
    pub file_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewArtifact {
    pub file_name: String,
    pub file_type: String,
    pub s3_key: String,
    pub user_id: String,
}

/// Durable record of a stored user file. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactRecord {
    pub id: RecordId,
    pub file_name: String,
    pub file_type: String,
    pub s3_key: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateJobRequest {
    pub message: String,
    pub file_ids: Vec<RecordId>,
    pub num_slides: u32,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CreateJobResponse {
    #[serde(default, deserialize_with = "opt_id_string")]
    pub process_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadLinkRequest {
    pub file_url: String,
}

/// Signed, time-limited URL for a job's output. Regenerating one is always safe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DownloadGrant {
    pub download_url: String,
}

/// Decoded row-level change for a watched job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowUpdate {
    pub status: Option<String>,
    pub output_reference: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Registry row id, echoed to the job service exactly as the registry sent it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(serde_json::Number),
    Text(String),
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::Text(id.to_owned())
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        RecordId::Number(id.into())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: FailureKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    MissingField(&'static str),
    LengthMismatch { expected: usize, actual: usize },
    Io,
    Closed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "undecodable response"),
            FailureKind::MissingField(field) => write!(f, "response missing {field}"),
            FailureKind::LengthMismatch { expected, actual } => {
                write!(f, "expected {expected} items, got {actual}")
            }
            FailureKind::Io => write!(f, "io error"),
            FailureKind::Closed => write!(f, "channel closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ArtifactRecord, CreateJobRequest, CreateJobResponse, RecordId};

    fn row(id: &str) -> String {
        format!(
            r#"{{"id":{id},"file_name":"a.csv","file_type":"text/csv","s3_key":"k","user_id":"u"}}"#
        )
    }

    #[test]
    fn numeric_and_string_ids_are_accepted() {
        let rows: Vec<ArtifactRecord> =
            serde_json::from_str(&format!("[{},{}]", row("12"), row(r#""9b2c""#))).unwrap();
        assert_eq!(rows[0].id, RecordId::from(12));
        assert_eq!(rows[1].id, RecordId::from("9b2c"));
    }

    #[test]
    fn record_ids_echo_back_with_their_json_type() {
        let rows: Vec<ArtifactRecord> = serde_json::from_str(&format!(
            "[{},{},{}]",
            row(r#""007""#),
            row(r#""12""#),
            row("18446744073709551615")
        ))
        .unwrap();
        let request = CreateJobRequest {
            message: String::new(),
            file_ids: rows.into_iter().map(|r| r.id).collect(),
            num_slides: 10,
            user_id: "u".into(),
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body["file_ids"],
            json!(["007", "12", 18446744073709551615u64])
        );
    }

    #[test]
    fn null_record_id_is_rejected() {
        let rows: Result<Vec<ArtifactRecord>, _> =
            serde_json::from_str(&format!("[{}]", row("null")));
        assert!(rows.is_err());
    }

    #[test]
    fn missing_or_null_process_id_decodes_to_none() {
        let empty: CreateJobResponse = serde_json::from_str("{}").unwrap();
        let null: CreateJobResponse = serde_json::from_str(r#"{"process_id":null}"#).unwrap();
        let number: CreateJobResponse = serde_json::from_str(r#"{"process_id":41}"#).unwrap();
        assert_eq!(empty.process_id, None);
        assert_eq!(null.process_id, None);
        assert_eq!(number.process_id.as_deref(), Some("41"));
    }
}
