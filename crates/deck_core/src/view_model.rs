use crate::{JobStatus, PublishState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub signed_in: bool,
    pub status: JobStatus,
    pub status_label: &'static str,
    pub files: Vec<FileRowView>,
    pub narrative: String,
    pub unit_count: u32,
    pub can_generate: bool,
    /// Signed URL of the most recent grant, once minted.
    pub download_url: Option<String>,
    pub can_retry_download: bool,
    pub can_reset: bool,
    pub can_publish: bool,
    pub publish: Option<PublishState>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRowView {
    pub name: String,
    pub size_kb: u64,
    pub mime_type: String,
}
