//! Deckgen core: pure session state machine and view-model helpers.
mod effect;
mod job;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, JobRequest, Notice};
pub use job::{
    ArtifactId, DownloadGrant, DownloadState, ErrorReason, JobId, JobStatus, ProcessingPhase,
    PublishState, RemoteStatus, StatusUpdate, UploadPhase,
};
pub use msg::Msg;
pub use state::{
    clamp_unit_count, AppState, AttemptId, SelectedFile, DEFAULT_UNIT_COUNT, MAX_SELECTED_FILES,
    MAX_UNIT_COUNT, MIN_UNIT_COUNT,
};
pub use update::update;
pub use view_model::{AppViewModel, FileRowView};
