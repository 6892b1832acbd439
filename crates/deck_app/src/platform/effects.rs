use std::sync::Arc;

use deck_core::{ArtifactId, DownloadGrant, Effect, JobId, Msg, SelectedFile};
use deck_engine::{Engine, RecordId, Session, SessionProvider, UploadSource};
use deck_logging::{deck_debug, deck_error, deck_info, deck_warn};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

/// Runs the network side of effects on the runtime and reports back as messages.
///
/// Subscription and notice effects belong to the controller and never reach here.
pub struct EffectRunner {
    engine: Arc<Engine>,
    sessions: Arc<dyn SessionProvider>,
    msg_tx: mpsc::UnboundedSender<Msg>,
    tasks: TaskTracker,
}

impl EffectRunner {
    pub fn new(
        engine: Arc<Engine>,
        sessions: Arc<dyn SessionProvider>,
        msg_tx: mpsc::UnboundedSender<Msg>,
    ) -> Self {
        Self {
            engine,
            sessions,
            msg_tx,
            tasks: TaskTracker::new(),
        }
    }

    pub fn run(&self, effect: Effect) {
        match effect {
            Effect::UploadFiles {
                attempt,
                owner,
                files,
            } => {
                deck_info!("UploadFiles attempt={} files={}", attempt, files.len());
                let session = self.session_for(&owner);
                let engine = Arc::clone(&self.engine);
                let tx = self.msg_tx.clone();
                self.tasks.spawn(async move {
                    let sources: Vec<UploadSource> = files.into_iter().map(to_source).collect();
                    let result = engine
                        .uploads
                        .upload_files(&sources, &session)
                        .await
                        .map(|records| {
                            records
                                .into_iter()
                                .map(|record| to_artifact_id(record.id))
                                .collect()
                        })
                        .map_err(|err| {
                            deck_warn!("Upload attempt {} failed: {}", attempt, err);
                            err.to_string()
                        });
                    let _ = tx.send(Msg::UploadFinished { attempt, result });
                });
            }
            Effect::SubmitJob { attempt, request } => {
                deck_info!(
                    "SubmitJob attempt={} artifacts={} slides={}",
                    attempt,
                    request.artifact_ids.len(),
                    request.unit_count
                );
                let session = self.session_for(&request.owner);
                let engine = Arc::clone(&self.engine);
                let tx = self.msg_tx.clone();
                self.tasks.spawn(async move {
                    let ids: Vec<RecordId> =
                        request.artifact_ids.into_iter().map(to_record_id).collect();
                    let result = engine
                        .submitter
                        .submit(
                            &request.narrative,
                            &ids,
                            request.unit_count,
                            &session,
                        )
                        .await
                        .map(JobId::new)
                        .map_err(|err| {
                            deck_warn!("Submission attempt {} failed: {}", attempt, err);
                            err.to_string()
                        });
                    let _ = tx.send(Msg::SubmissionFinished { attempt, result });
                });
            }
            Effect::RequestDownloadLink {
                job_id,
                output_reference,
            } => {
                let engine = Arc::clone(&self.engine);
                let tx = self.msg_tx.clone();
                self.tasks.spawn(async move {
                    let result = engine
                        .handshake
                        .finalize(&output_reference)
                        .await
                        .map(|grant| DownloadGrant {
                            url: grant.download_url,
                        })
                        .map_err(|err| err.to_string());
                    let _ = tx.send(Msg::DownloadLinkFinished { job_id, result });
                });
            }
            Effect::TriggerDownload { job_id, grant } => {
                deck_debug!("TriggerDownload job={}", job_id);
                self.engine.handshake.trigger(&deck_engine::DownloadGrant {
                    download_url: grant.url,
                });
            }
            Effect::Publish { job_id, grant } => {
                let publisher = self.engine.publisher.clone();
                let tx = self.msg_tx.clone();
                self.tasks.spawn(async move {
                    let result = match publisher {
                        Some(publisher) => publisher
                            .publish(&grant.url)
                            .await
                            .map_err(|err| {
                                deck_error!("Publish of job {} failed: {}", job_id, err);
                                err.to_string()
                            }),
                        None => Err("publishing is not configured".to_string()),
                    };
                    let _ = tx.send(Msg::PublishFinished { job_id, result });
                });
            }
            Effect::OpenSubscription { .. }
            | Effect::CloseSubscription { .. }
            | Effect::Notify(_) => {
                deck_warn!("Controller effect reached the runner: {:?}", effect);
            }
        }
    }

    /// Waits for every running effect task.
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// The provider's session carries the access token; the owner id alone is the fallback.
    fn session_for(&self, owner: &str) -> Session {
        match self.sessions.current() {
            Some(session) if session.user_id == owner => session,
            _ => Session::new(owner),
        }
    }
}

fn to_source(file: SelectedFile) -> UploadSource {
    UploadSource {
        name: file.name,
        mime_type: file.mime_type,
        content: file.content,
    }
}

fn to_artifact_id(id: RecordId) -> ArtifactId {
    match id {
        RecordId::Number(n) => ArtifactId::Number(n),
        RecordId::Text(s) => ArtifactId::Text(s),
    }
}

fn to_record_id(id: ArtifactId) -> RecordId {
    match id {
        ArtifactId::Number(n) => RecordId::Number(n),
        ArtifactId::Text(s) => RecordId::Text(s),
    }
}
