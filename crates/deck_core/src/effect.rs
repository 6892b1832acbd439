use crate::{ArtifactId, AttemptId, DownloadGrant, JobId, SelectedFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Authorize, transfer and register every file; all or nothing.
    UploadFiles {
        attempt: AttemptId,
        owner: String,
        files: Vec<SelectedFile>,
    },
    SubmitJob {
        attempt: AttemptId,
        request: JobRequest,
    },
    OpenSubscription { job_id: JobId },
    CloseSubscription { job_id: JobId },
    RequestDownloadLink {
        job_id: JobId,
        output_reference: String,
    },
    /// Fire-and-forget save of the signed URL's content.
    TriggerDownload {
        job_id: JobId,
        grant: DownloadGrant,
    },
    Publish {
        job_id: JobId,
        grant: DownloadGrant,
    },
    Notify(Notice),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub narrative: String,
    pub artifact_ids: Vec<ArtifactId>,
    pub unit_count: u32,
    pub owner: String,
}

/// Blocking notices the presentation layer must show the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    UploadFailed,
    SignInRequired,
}
