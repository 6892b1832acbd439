use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use deck_app::{
    config_path, initialize_logging, load_config, read_selected_file, status_line, LogRenderer,
    SessionJobController,
};
use deck_core::{AppViewModel, DownloadState, JobStatus, Msg, PublishState};
use deck_engine::{Engine, SessionProvider, StaticSessionProvider};
use deck_logging::{deck_info, deck_warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path();
    let config = load_config(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    initialize_logging(config.log_destination, config.log_level);

    let sessions: Arc<dyn SessionProvider> = StaticSessionProvider::new(config.initial_session());
    let engine = Engine::from_settings(&config.engine_settings(), Arc::clone(&sessions))
        .context("building job service clients")?;
    let mut controller =
        SessionJobController::new(Arc::new(engine), sessions, LogRenderer::default());
    controller.start().await;

    let Some(request) = config.request.clone() else {
        deck_info!("No request in {}; nothing to generate", path.display());
        controller.shutdown().await;
        return Ok(());
    };

    let mut files = Vec::with_capacity(request.files.len());
    for file in &request.files {
        let selected =
            read_selected_file(file).with_context(|| format!("reading {}", file.display()))?;
        files.push(selected);
    }
    controller.dispatch(Msg::FilesSelected(files)).await;
    controller
        .dispatch(Msg::NarrativeChanged(request.narrative.clone()))
        .await;
    if let Some(slides) = request.slides {
        controller.dispatch(Msg::UnitCountChanged(slides)).await;
    }
    controller.dispatch(Msg::GenerateClicked).await;

    let limit = Duration::from_secs(config.run_timeout_secs);
    if !controller.run_until(limit, job_settled).await {
        deck_warn!("Gave up waiting after {:?}: {}", limit, status_line(&controller.view()));
    }

    if controller.view().can_publish {
        controller.dispatch(Msg::PublishClicked).await;
        controller
            .run_until(limit, |view| {
                !matches!(view.publish, Some(PublishState::Publishing))
            })
            .await;
    }

    let view = controller.view();
    controller.shutdown().await;
    match view.status {
        JobStatus::Error { reason } => anyhow::bail!("generation failed: {reason}"),
        _ => Ok(()),
    }
}

/// The headless run is over once the job failed or its download was attempted.
fn job_settled(view: &AppViewModel) -> bool {
    match &view.status {
        // Still idle after Generate means the request was refused.
        JobStatus::Idle | JobStatus::Error { .. } => true,
        JobStatus::Completed { download, .. } => matches!(
            download,
            DownloadState::Ready { .. } | DownloadState::LinkFailed { .. }
        ),
        JobStatus::Uploading { .. } | JobStatus::Processing { .. } => false,
    }
}
