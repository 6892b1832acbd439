use bytes::Bytes;

use crate::effect::JobRequest;
use crate::view_model::{AppViewModel, FileRowView};
use crate::{ArtifactId, DownloadState, Effect, JobId, JobStatus, PublishState};

/// Maximum number of files queued for one job.
pub const MAX_SELECTED_FILES: usize = 5;
pub const MIN_UNIT_COUNT: u32 = 5;
pub const MAX_UNIT_COUNT: u32 = 20;
pub const DEFAULT_UNIT_COUNT: u32 = 10;

/// Monotonic counter identifying one press of "generate".
///
/// Results that come back tagged with an older attempt belong to an abandoned
/// job and are dropped.
pub type AttemptId = u64;

/// A user-picked file, held in memory until it is uploaded or discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub content: Bytes,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size: content.len() as u64,
            mime_type: mime_type.into(),
            content,
        }
    }
}

pub fn clamp_unit_count(requested: i64) -> u32 {
    requested.clamp(i64::from(MIN_UNIT_COUNT), i64::from(MAX_UNIT_COUNT)) as u32
}

/// Inputs captured when generation starts, so later edits do not leak into
/// the request of a job already underway.
#[derive(Debug, Clone, PartialEq, Eq)]
struct JobDraft {
    narrative: String,
    unit_count: u32,
    owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    owner: Option<String>,
    files: Vec<SelectedFile>,
    narrative: String,
    unit_count: u32,
    status: JobStatus,
    attempt: AttemptId,
    draft: Option<JobDraft>,
    watching: Option<JobId>,
    last_revision: Option<i64>,
    publishing_enabled: bool,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            owner: None,
            files: Vec::new(),
            narrative: String::new(),
            unit_count: DEFAULT_UNIT_COUNT,
            status: JobStatus::Idle,
            attempt: 0,
            draft: None,
            watching: None,
            last_revision: None,
            publishing_enabled: false,
            dirty: false,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publishing(mut self, enabled: bool) -> Self {
        self.publishing_enabled = enabled;
        self
    }

    pub fn status(&self) -> &JobStatus {
        &self.status
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn narrative(&self) -> &str {
        &self.narrative
    }

    pub fn unit_count(&self) -> u32 {
        self.unit_count
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Job whose push subscription is currently supposed to be open.
    pub fn watching(&self) -> Option<&JobId> {
        self.watching.as_ref()
    }

    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    pub fn view(&self) -> AppViewModel {
        let download = match &self.status {
            JobStatus::Completed { download, .. } => Some(download),
            _ => None,
        };
        let (download_url, publish) = match download {
            Some(DownloadState::Ready { grant, publish, .. }) => {
                (Some(grant.url.clone()), Some(publish.clone()))
            }
            _ => (None, None),
        };
        let can_publish = self.publishing_enabled
            && matches!(
                publish,
                Some(PublishState::Idle) | Some(PublishState::Failed { .. })
            );

        AppViewModel {
            signed_in: self.owner.is_some(),
            status_label: self.status.label(),
            status: self.status.clone(),
            files: self
                .files
                .iter()
                .map(|file| FileRowView {
                    name: file.name.clone(),
                    size_kb: file.size / 1024,
                    mime_type: file.mime_type.clone(),
                })
                .collect(),
            narrative: self.narrative.clone(),
            unit_count: self.unit_count,
            can_generate: self.owner.is_some() && !self.status.is_terminal() && self.has_input(),
            download_url,
            can_retry_download: matches!(
                download,
                Some(DownloadState::LinkFailed { .. }) | Some(DownloadState::Ready { .. })
            ),
            can_reset: self.status.is_terminal(),
            can_publish,
            publish,
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, clearing the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn has_input(&self) -> bool {
        !self.narrative.trim().is_empty() || !self.files.is_empty()
    }

    pub(crate) fn set_owner(&mut self, owner: Option<String>) {
        if self.owner != owner {
            self.owner = owner;
            self.mark_dirty();
        }
    }

    /// Appends files, keeping only the first [`MAX_SELECTED_FILES`].
    pub(crate) fn add_files(&mut self, files: Vec<SelectedFile>) {
        if files.is_empty() {
            return;
        }
        self.files.extend(files);
        self.files.truncate(MAX_SELECTED_FILES);
        self.mark_dirty();
    }

    pub(crate) fn remove_file(&mut self, index: usize) -> bool {
        if index >= self.files.len() {
            return false;
        }
        self.files.remove(index);
        self.mark_dirty();
        true
    }

    pub(crate) fn set_narrative(&mut self, narrative: String) {
        if self.narrative != narrative {
            self.narrative = narrative;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_unit_count(&mut self, unit_count: u32) {
        if self.unit_count != unit_count {
            self.unit_count = unit_count;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        if self.status != status {
            self.status = status;
            self.mark_dirty();
        }
    }

    /// In-place access for nested sub-state edits; callers mark dirty themselves.
    pub(crate) fn status_mut(&mut self) -> &mut JobStatus {
        &mut self.status
    }

    /// Starts a new attempt, snapshotting the current inputs for its request.
    pub(crate) fn begin_attempt(&mut self, owner: String) -> AttemptId {
        self.attempt += 1;
        self.last_revision = None;
        self.draft = Some(JobDraft {
            narrative: self.narrative.clone(),
            unit_count: self.unit_count,
            owner,
        });
        self.attempt
    }

    pub(crate) fn job_request(&self, artifact_ids: Vec<ArtifactId>) -> Option<JobRequest> {
        self.draft.as_ref().map(|draft| JobRequest {
            narrative: draft.narrative.clone(),
            artifact_ids,
            unit_count: draft.unit_count,
            owner: draft.owner.clone(),
        })
    }

    pub(crate) fn start_watching(&mut self, job_id: JobId) {
        self.watching = Some(job_id);
    }

    /// Emits the teardown effect for the live subscription, if any.
    pub(crate) fn release_subscription(&mut self) -> Vec<Effect> {
        match self.watching.take() {
            Some(job_id) => vec![Effect::CloseSubscription { job_id }],
            None => Vec::new(),
        }
    }

    /// Applies the ordering guard. Returns false for an event older than the
    /// newest revision already applied.
    pub(crate) fn accept_revision(&mut self, revision: Option<i64>) -> bool {
        let Some(revision) = revision else {
            return true;
        };
        if let Some(last) = self.last_revision {
            if revision < last {
                return false;
            }
        }
        self.last_revision = Some(revision);
        true
    }

    /// Forgets the active job: closes its subscription and invalidates any
    /// upload or submission still in flight.
    pub(crate) fn abandon_job(&mut self) -> Vec<Effect> {
        let effects = self.release_subscription();
        self.attempt += 1;
        self.draft = None;
        self.last_revision = None;
        self.set_status(JobStatus::Idle);
        effects
    }
}
