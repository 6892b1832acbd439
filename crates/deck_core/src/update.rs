use deck_logging::{deck_debug, deck_error, deck_info, deck_warn};

use crate::state::clamp_unit_count;
use crate::{
    AppState, ArtifactId, AttemptId, DownloadGrant, DownloadState, Effect, ErrorReason, JobId,
    JobStatus, Msg, Notice, ProcessingPhase, PublishState, RemoteStatus, StatusUpdate,
    UploadPhase,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::SessionChanged(owner) => {
            // Sign-out and user switches both orphan the job of the previous owner.
            let owner_lost = state.owner().is_some() && state.owner() != owner.as_deref();
            state.set_owner(owner);
            if owner_lost {
                deck_info!("Session changed; abandoning active job");
                state.abandon_job()
            } else {
                Vec::new()
            }
        }
        Msg::FilesSelected(files) => {
            state.add_files(files);
            Vec::new()
        }
        Msg::FileRemoved { index } => {
            if !state.remove_file(index) {
                deck_debug!("Ignoring removal of missing file index {}", index);
            }
            Vec::new()
        }
        Msg::NarrativeChanged(text) => {
            state.set_narrative(text);
            Vec::new()
        }
        Msg::UnitCountChanged(requested) => {
            state.set_unit_count(clamp_unit_count(requested));
            Vec::new()
        }
        Msg::GenerateClicked => start_generation(&mut state),
        Msg::UploadFinished { attempt, result } => upload_finished(&mut state, attempt, result),
        Msg::SubmissionFinished { attempt, result } => {
            submission_finished(&mut state, attempt, result)
        }
        Msg::SubscriptionFailed { job_id, reason }
        | Msg::SubscriptionDropped { job_id, reason } => {
            subscription_lost(&mut state, job_id, reason)
        }
        Msg::StatusEvent { job_id, update } => status_event(&mut state, job_id, update),
        Msg::DownloadLinkFinished { job_id, result } => {
            download_link_finished(&mut state, job_id, result)
        }
        Msg::RetryDownloadClicked => retry_download(&mut state),
        Msg::PublishClicked => start_publish(&mut state),
        Msg::PublishFinished { job_id, result } => publish_finished(&mut state, job_id, result),
        Msg::ResetClicked => {
            if state.status().is_terminal() {
                state.abandon_job()
            } else {
                deck_debug!("Reset ignored in state {}", state.status().label());
                Vec::new()
            }
        }
        Msg::ShutdownRequested => state.abandon_job(),
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start_generation(state: &mut AppState) -> Vec<Effect> {
    // Completed and error only leave through an explicit reset.
    if state.status().is_terminal() {
        deck_debug!("Generate ignored in state {}", state.status().label());
        return Vec::new();
    }
    let Some(owner) = state.owner().map(ToOwned::to_owned) else {
        return vec![Effect::Notify(Notice::SignInRequired)];
    };
    if !state.has_input() {
        return Vec::new();
    }

    let mut effects = state.release_subscription();
    let attempt = state.begin_attempt(owner.clone());

    if state.files().is_empty() {
        state.set_status(JobStatus::Uploading {
            phase: UploadPhase::Submitting,
        });
        effects.extend(
            state
                .job_request(Vec::new())
                .map(|request| Effect::SubmitJob { attempt, request }),
        );
    } else {
        state.set_status(JobStatus::Uploading {
            phase: UploadPhase::Transferring,
        });
        effects.push(Effect::UploadFiles {
            attempt,
            owner,
            files: state.files().to_vec(),
        });
    }
    effects
}

fn is_current(state: &AppState, attempt: AttemptId, phase: UploadPhase) -> bool {
    attempt == state.attempt() && *state.status() == JobStatus::Uploading { phase }
}

fn upload_finished(
    state: &mut AppState,
    attempt: AttemptId,
    result: Result<Vec<ArtifactId>, String>,
) -> Vec<Effect> {
    if !is_current(state, attempt, UploadPhase::Transferring) {
        deck_debug!("Dropping upload result of abandoned attempt {}", attempt);
        return Vec::new();
    }
    match result {
        Ok(artifact_ids) => {
            let Some(request) = state.job_request(artifact_ids) else {
                return Vec::new();
            };
            state.set_status(JobStatus::Uploading {
                phase: UploadPhase::Submitting,
            });
            vec![Effect::SubmitJob { attempt, request }]
        }
        Err(reason) => {
            deck_warn!("Upload failed: {}", reason);
            state.set_status(JobStatus::Error {
                reason: ErrorReason::Upload(reason),
            });
            vec![Effect::Notify(Notice::UploadFailed)]
        }
    }
}

fn submission_finished(
    state: &mut AppState,
    attempt: AttemptId,
    result: Result<JobId, String>,
) -> Vec<Effect> {
    if !is_current(state, attempt, UploadPhase::Submitting) {
        deck_debug!("Dropping submission result of abandoned attempt {}", attempt);
        return Vec::new();
    }
    match result {
        Ok(job_id) => {
            deck_info!("Job {} accepted; watching for status updates", job_id);
            state.set_status(JobStatus::Processing {
                job_id: job_id.clone(),
                phase: ProcessingPhase::Queued,
            });
            state.start_watching(job_id.clone());
            vec![Effect::OpenSubscription { job_id }]
        }
        Err(reason) => {
            deck_warn!("Submission failed: {}", reason);
            state.set_status(JobStatus::Error {
                reason: ErrorReason::Submission(reason),
            });
            Vec::new()
        }
    }
}

fn subscription_lost(state: &mut AppState, job_id: JobId, reason: String) -> Vec<Effect> {
    if state.watching() != Some(&job_id) {
        return Vec::new();
    }
    let effects = state.release_subscription();
    // Without the channel neither a status nor a late output reference can arrive.
    let waiting_on_channel = matches!(
        state.status(),
        JobStatus::Processing { .. }
            | JobStatus::Completed {
                download: DownloadState::AwaitingReference,
                ..
            }
    );
    if waiting_on_channel {
        deck_warn!("Subscription for job {} lost: {}", job_id, reason);
        state.set_status(JobStatus::Error {
            reason: ErrorReason::Subscription(reason),
        });
    } else {
        deck_warn!(
            "Subscription for job {} lost while {}: {}",
            job_id,
            state.status().label(),
            reason
        );
    }
    effects
}

fn status_event(state: &mut AppState, job_id: JobId, update: StatusUpdate) -> Vec<Effect> {
    if state.watching() != Some(&job_id) {
        deck_debug!("Ignoring status event for unwatched job {}", job_id);
        return Vec::new();
    }
    let Some(remote) = update.remote_status() else {
        deck_debug!("Ignoring unrecognized status {:?} for job {}", update.status, job_id);
        return Vec::new();
    };
    if !state.accept_revision(update.revision) {
        deck_debug!("Ignoring stale status event for job {}", job_id);
        return Vec::new();
    }
    let output = update.output().map(ToOwned::to_owned);

    let processing = match state.status() {
        JobStatus::Processing { phase, .. } => Some(*phase),
        _ => None,
    };
    let awaiting_reference = matches!(
        state.status(),
        JobStatus::Completed {
            download: DownloadState::AwaitingReference,
            ..
        }
    );

    match remote {
        // Queued never regresses a running job; repeats are no-ops.
        RemoteStatus::Processing if processing == Some(ProcessingPhase::Queued) => {
            state.set_status(JobStatus::Processing {
                job_id,
                phase: ProcessingPhase::Running,
            });
            Vec::new()
        }
        RemoteStatus::Completed if processing.is_some() || awaiting_reference => {
            complete(state, job_id, output)
        }
        RemoteStatus::Error if processing.is_some() => {
            deck_warn!("Job {} failed on the backend", job_id);
            let effects = state.release_subscription();
            state.set_status(JobStatus::Error {
                reason: ErrorReason::JobFailed,
            });
            effects
        }
        _ => Vec::new(),
    }
}

fn complete(state: &mut AppState, job_id: JobId, output: Option<String>) -> Vec<Effect> {
    match output {
        Some(output_reference) => {
            deck_info!("Job {} completed; requesting download link", job_id);
            let mut effects = state.release_subscription();
            state.set_status(JobStatus::Completed {
                job_id: job_id.clone(),
                download: DownloadState::PendingLink {
                    output_reference: output_reference.clone(),
                },
            });
            effects.push(Effect::RequestDownloadLink {
                job_id,
                output_reference,
            });
            effects
        }
        None => {
            deck_info!("Job {} completed without output reference yet", job_id);
            state.set_status(JobStatus::Completed {
                job_id,
                download: DownloadState::AwaitingReference,
            });
            Vec::new()
        }
    }
}

fn download_link_finished(
    state: &mut AppState,
    job_id: JobId,
    result: Result<DownloadGrant, String>,
) -> Vec<Effect> {
    let output_reference = match state.status() {
        JobStatus::Completed {
            job_id: current,
            download: DownloadState::PendingLink { output_reference },
        } if *current == job_id => output_reference.clone(),
        _ => {
            deck_debug!("Dropping download link for job {} no longer pending", job_id);
            return Vec::new();
        }
    };
    match result {
        Ok(grant) => {
            state.set_status(JobStatus::Completed {
                job_id: job_id.clone(),
                download: DownloadState::Ready {
                    output_reference,
                    grant: grant.clone(),
                    publish: PublishState::Idle,
                },
            });
            vec![Effect::TriggerDownload { job_id, grant }]
        }
        Err(reason) => {
            deck_error!("Could not mint download link for job {}: {}", job_id, reason);
            state.set_status(JobStatus::Completed {
                job_id,
                download: DownloadState::LinkFailed {
                    output_reference,
                    reason,
                },
            });
            Vec::new()
        }
    }
}

fn retry_download(state: &mut AppState) -> Vec<Effect> {
    let (job_id, output_reference) = match state.status() {
        JobStatus::Completed {
            job_id,
            download:
                DownloadState::LinkFailed {
                    output_reference, ..
                }
                | DownloadState::Ready {
                    output_reference, ..
                },
        } => (job_id.clone(), output_reference.clone()),
        _ => return Vec::new(),
    };
    state.set_status(JobStatus::Completed {
        job_id: job_id.clone(),
        download: DownloadState::PendingLink {
            output_reference: output_reference.clone(),
        },
    });
    vec![Effect::RequestDownloadLink {
        job_id,
        output_reference,
    }]
}

fn start_publish(state: &mut AppState) -> Vec<Effect> {
    if !state.publishing_enabled() {
        return Vec::new();
    }
    let JobStatus::Completed {
        job_id,
        download: DownloadState::Ready { grant, publish, .. },
    } = state.status_mut()
    else {
        return Vec::new();
    };
    if matches!(publish, PublishState::Publishing | PublishState::Published) {
        return Vec::new();
    }
    *publish = PublishState::Publishing;
    let effect = Effect::Publish {
        job_id: job_id.clone(),
        grant: grant.clone(),
    };
    state.mark_dirty();
    vec![effect]
}

fn publish_finished(
    state: &mut AppState,
    job_id: JobId,
    result: Result<(), String>,
) -> Vec<Effect> {
    let JobStatus::Completed {
        job_id: current,
        download: DownloadState::Ready { publish, .. },
    } = state.status_mut()
    else {
        return Vec::new();
    };
    if *current != job_id || *publish != PublishState::Publishing {
        return Vec::new();
    }
    *publish = match result {
        Ok(()) => PublishState::Published,
        Err(reason) => {
            deck_warn!("Publishing job {} failed: {}", job_id, reason);
            PublishState::Failed { reason }
        }
    };
    state.mark_dirty();
    Vec::new()
}
