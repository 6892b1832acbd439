use crate::{ArtifactId, AttemptId, DownloadGrant, JobId, SelectedFile, StatusUpdate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Session provider reported a sign-in (user id) or sign-out (`None`).
    SessionChanged(Option<String>),
    /// User picked more files; the queue is capped after appending.
    FilesSelected(Vec<SelectedFile>),
    /// User discarded one queued file.
    FileRemoved { index: usize },
    NarrativeChanged(String),
    /// Raw slider value; clamped to the supported slide range.
    UnitCountChanged(i64),
    GenerateClicked,
    /// Upload fan-out settled. `Ok` carries artifact ids in file order.
    UploadFinished {
        attempt: AttemptId,
        result: Result<Vec<ArtifactId>, String>,
    },
    SubmissionFinished {
        attempt: AttemptId,
        result: Result<JobId, String>,
    },
    /// The push subscription for a job could not be opened.
    SubscriptionFailed { job_id: JobId, reason: String },
    /// An open push subscription ended without being asked to.
    SubscriptionDropped { job_id: JobId, reason: String },
    /// Row update pushed for a watched job.
    StatusEvent {
        job_id: JobId,
        update: StatusUpdate,
    },
    DownloadLinkFinished {
        job_id: JobId,
        result: Result<DownloadGrant, String>,
    },
    RetryDownloadClicked,
    PublishClicked,
    PublishFinished {
        job_id: JobId,
        result: Result<(), String>,
    },
    /// User acknowledged a terminal state and wants to start over.
    ResetClicked,
    ShutdownRequested,
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
