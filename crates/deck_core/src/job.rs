use std::fmt;

/// Opaque identifier the backend assigns to a generation job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry id of a stored file, kept in the JSON type the registry returned.
///
/// `"12"` and `12` are different ids to the job service and never collapse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Number(serde_json::Number),
    Text(String),
}

impl From<&str> for ArtifactId {
    fn from(id: &str) -> Self {
        ArtifactId::Text(id.to_owned())
    }
}

impl From<u64> for ArtifactId {
    fn from(id: u64) -> Self {
        ArtifactId::Number(id.into())
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactId::Number(n) => write!(f, "{n}"),
            ArtifactId::Text(s) => f.write_str(s),
        }
    }
}

/// Signed, time-limited URL for a completed job's output.
///
/// Never cached: every handshake yields a fresh grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadGrant {
    pub url: String,
}

/// Client-side job lifecycle as shown to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Uploading { phase: UploadPhase },
    Processing {
        job_id: JobId,
        phase: ProcessingPhase,
    },
    Completed {
        job_id: JobId,
        download: DownloadState,
    },
    Error { reason: ErrorReason },
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Uploading { .. } => "uploading",
            JobStatus::Processing { .. } => "processing",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Error { .. })
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            JobStatus::Processing { job_id, .. } | JobStatus::Completed { job_id, .. } => {
                Some(job_id)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    /// Raw file bytes are being transferred to storage.
    Transferring,
    /// Artifacts are stored (or there were none); the job request is in flight.
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProcessingPhase {
    Queued,
    Running,
}

/// Download sub-state of a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadState {
    /// Backend reported completion but has not written the output reference yet.
    AwaitingReference,
    PendingLink { output_reference: String },
    Ready {
        output_reference: String,
        grant: DownloadGrant,
        publish: PublishState,
    },
    LinkFailed {
        output_reference: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PublishState {
    #[default]
    Idle,
    Publishing,
    Published,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorReason {
    Upload(String),
    Submission(String),
    Subscription(String),
    /// The backend itself marked the job as failed.
    JobFailed,
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorReason::Upload(reason) => write!(f, "upload failed: {reason}"),
            ErrorReason::Submission(reason) => write!(f, "submission failed: {reason}"),
            ErrorReason::Subscription(reason) => {
                write!(f, "lost track of the job: {reason}")
            }
            ErrorReason::JobFailed => write!(f, "generation failed"),
        }
    }
}

/// Status vocabulary written by the backend job processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl RemoteStatus {
    /// Case-insensitive parse. Unknown values yield `None` and are ignored upstream.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        [
            ("queued", RemoteStatus::Queued),
            ("processing", RemoteStatus::Processing),
            ("completed", RemoteStatus::Completed),
            ("error", RemoteStatus::Error),
        ]
        .into_iter()
        .find(|(name, _)| raw.eq_ignore_ascii_case(name))
        .map(|(_, status)| status)
    }
}

/// One row-update event delivered by the push channel for a watched job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusUpdate {
    pub status: Option<String>,
    pub output_reference: Option<String>,
    /// Monotonic row revision (update timestamp in milliseconds), when known.
    pub revision: Option<i64>,
}

impl StatusUpdate {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output_reference: impl Into<String>) -> Self {
        self.output_reference = Some(output_reference.into());
        self
    }

    pub fn with_revision(mut self, revision: i64) -> Self {
        self.revision = Some(revision);
        self
    }

    pub(crate) fn remote_status(&self) -> Option<RemoteStatus> {
        self.status.as_deref().and_then(RemoteStatus::parse)
    }

    /// Output reference, treating blank strings as absent.
    pub(crate) fn output(&self) -> Option<&str> {
        self.output_reference
            .as_deref()
            .map(str::trim)
            .filter(|reference| !reference.is_empty())
    }
}
