use deck_core::{AppViewModel, FileRowView, JobStatus, Notice, PublishState};
use deck_logging::{deck_info, deck_warn};

/// Presentation callbacks. The controller calls `render` whenever the state changed.
pub trait RenderHooks: Send {
    fn render(&mut self, view: &AppViewModel);
    fn notify(&mut self, notice: Notice);
}

/// Headless presentation: every frame becomes one log line.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last_line: Option<String>,
}

impl RenderHooks for LogRenderer {
    fn render(&mut self, view: &AppViewModel) {
        let line = status_line(view);
        if self.last_line.as_deref() != Some(line.as_str()) {
            deck_info!("{}", line);
            for row in &view.files {
                deck_info!("  {}", format_file_row(row));
            }
            self.last_line = Some(line);
        }
    }

    fn notify(&mut self, notice: Notice) {
        deck_warn!("{}", notice_text(notice));
    }
}

pub fn status_line(view: &AppViewModel) -> String {
    let mut line = format!(
        "Status: {} | Files: {} | Slides: {}",
        view.status_label,
        view.files.len(),
        view.unit_count
    );
    match &view.status {
        JobStatus::Processing { job_id, phase } => {
            line.push_str(&format!(" | Job {job_id} ({phase:?})"));
        }
        JobStatus::Error { reason } => line.push_str(&format!(" | {reason}")),
        _ => {}
    }
    if view.download_url.is_some() {
        line.push_str(" | Download ready");
    } else if view.can_retry_download {
        line.push_str(" | Download link failed, retry available");
    }
    match &view.publish {
        Some(PublishState::Publishing) => line.push_str(" | Publishing"),
        Some(PublishState::Published) => line.push_str(" | Published"),
        Some(PublishState::Failed { .. }) => line.push_str(" | Publish failed"),
        _ => {}
    }
    if !view.signed_in {
        line.push_str(" | Signed out");
    }
    line
}

pub fn notice_text(notice: Notice) -> &'static str {
    match notice {
        Notice::UploadFailed => "Upload failed",
        Notice::SignInRequired => "Sign in to generate a deck",
    }
}

fn format_file_row(row: &FileRowView) -> String {
    format!(
        "{} ({} KB, {})",
        row.name,
        format_with_commas(row.size_kb),
        row.mime_type
    )
}

fn format_with_commas(value: u64) -> String {
    let mut out = String::new();
    for (i, ch) in value.to_string().chars().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
