use std::sync::Once;

use deck_core::{
    update, AppState, Effect, ErrorReason, JobId, JobRequest, JobStatus, Msg, Notice,
    ProcessingPhase, SelectedFile, UploadPhase, DEFAULT_UNIT_COUNT, MAX_SELECTED_FILES,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(deck_logging::initialize_for_tests);
}

fn file(name: &str) -> SelectedFile {
    SelectedFile::new(name, "text/csv", format!("{name},1,2\n").into_bytes())
}

fn signed_in() -> AppState {
    let (state, _) = update(AppState::new(), Msg::SessionChanged(Some("user-1".into())));
    state
}

fn apply(state: AppState, msgs: Vec<Msg>) -> (AppState, Vec<Effect>) {
    msgs.into_iter()
        .fold((state, Vec::new()), |(state, _), msg| update(state, msg))
}

#[test]
fn sixth_file_is_silently_capped() {
    init_logging();
    let files: Vec<_> = (0..4).map(|i| file(&format!("f{i}.csv"))).collect();
    let (state, _) = update(signed_in(), Msg::FilesSelected(files));
    let (mut state, effects) = update(
        state,
        Msg::FilesSelected(vec![file("f4.csv"), file("f5.csv")]),
    );

    let names: Vec<_> = state.view().files.into_iter().map(|f| f.name).collect();
    assert_eq!(names.len(), MAX_SELECTED_FILES);
    assert_eq!(names, vec!["f0.csv", "f1.csv", "f2.csv", "f3.csv", "f4.csv"]);
    assert!(effects.is_empty());
    assert!(state.consume_dirty());
}

#[test]
fn removing_a_file_keeps_order_and_ignores_bad_index() {
    init_logging();
    let (state, _) = update(
        signed_in(),
        Msg::FilesSelected(vec![file("a.csv"), file("b.csv"), file("c.csv")]),
    );
    let (mut state, _) = update(state, Msg::FileRemoved { index: 1 });
    let names: Vec<_> = state.files().iter().map(|f| f.name.clone()).collect();
    assert_eq!(names, vec!["a.csv", "c.csv"]);
    assert!(state.consume_dirty());

    let (mut state, effects) = update(state, Msg::FileRemoved { index: 9 });
    assert_eq!(state.files().len(), 2);
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
}

#[test]
fn unit_count_is_clamped_to_supported_range() {
    init_logging();
    let state = signed_in();
    assert_eq!(state.unit_count(), DEFAULT_UNIT_COUNT);

    let (state, _) = update(state, Msg::UnitCountChanged(3));
    assert_eq!(state.unit_count(), 5);
    let (state, _) = update(state, Msg::UnitCountChanged(42));
    assert_eq!(state.unit_count(), 20);
    let (state, _) = update(state, Msg::UnitCountChanged(12));
    assert_eq!(state.unit_count(), 12);
}

#[test]
fn generate_without_input_does_nothing() {
    init_logging();
    let (state, effects) = apply(
        signed_in(),
        vec![Msg::NarrativeChanged("   ".into()), Msg::GenerateClicked],
    );

    assert_eq!(*state.status(), JobStatus::Idle);
    assert!(effects.is_empty());
}

#[test]
fn generate_without_session_asks_for_sign_in() {
    init_logging();
    let (state, effects) = apply(
        AppState::new(),
        vec![Msg::NarrativeChanged("Q3 review".into()), Msg::GenerateClicked],
    );

    assert_eq!(*state.status(), JobStatus::Idle);
    assert_eq!(effects, vec![Effect::Notify(Notice::SignInRequired)]);
}

#[test]
fn text_only_generation_skips_storage() {
    init_logging();
    let (state, effects) = apply(
        signed_in(),
        vec![
            Msg::NarrativeChanged("Quarterly numbers for the board".into()),
            Msg::UnitCountChanged(8),
            Msg::GenerateClicked,
        ],
    );

    assert_eq!(
        *state.status(),
        JobStatus::Uploading {
            phase: UploadPhase::Submitting
        }
    );
    assert_eq!(
        effects,
        vec![Effect::SubmitJob {
            attempt: 1,
            request: JobRequest {
                narrative: "Quarterly numbers for the board".into(),
                artifact_ids: Vec::new(),
                unit_count: 8,
                owner: "user-1".into(),
            },
        }]
    );
}

#[test]
fn files_are_uploaded_before_submission() {
    init_logging();
    let (state, effects) = apply(
        signed_in(),
        vec![
            Msg::FilesSelected(vec![file("a.csv"), file("b.csv")]),
            Msg::GenerateClicked,
        ],
    );
    assert_eq!(
        *state.status(),
        JobStatus::Uploading {
            phase: UploadPhase::Transferring
        }
    );
    assert_eq!(
        effects,
        vec![Effect::UploadFiles {
            attempt: 1,
            owner: "user-1".into(),
            files: vec![file("a.csv"), file("b.csv")],
        }]
    );

    let (state, effects) = update(
        state,
        Msg::UploadFinished {
            attempt: 1,
            result: Ok(vec!["11".into(), "12".into()]),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::SubmitJob {
            attempt: 1,
            request: JobRequest {
                narrative: String::new(),
                artifact_ids: vec!["11".into(), "12".into()],
                unit_count: DEFAULT_UNIT_COUNT,
                owner: "user-1".into(),
            },
        }]
    );

    let (state, effects) = update(
        state,
        Msg::SubmissionFinished {
            attempt: 1,
            result: Ok(JobId::new("J1")),
        },
    );
    assert_eq!(
        *state.status(),
        JobStatus::Processing {
            job_id: JobId::new("J1"),
            phase: ProcessingPhase::Queued
        }
    );
    assert_eq!(state.watching(), Some(&JobId::new("J1")));
    assert_eq!(
        effects,
        vec![Effect::OpenSubscription {
            job_id: JobId::new("J1")
        }]
    );
}

#[test]
fn request_uses_inputs_captured_at_generate_time() {
    init_logging();
    let (state, _) = apply(
        signed_in(),
        vec![
            Msg::NarrativeChanged("first draft".into()),
            Msg::FilesSelected(vec![file("a.csv")]),
            Msg::GenerateClicked,
            Msg::NarrativeChanged("edited while uploading".into()),
            Msg::UnitCountChanged(15),
        ],
    );
    let (_, effects) = update(
        state,
        Msg::UploadFinished {
            attempt: 1,
            result: Ok(vec!["7".into()]),
        },
    );

    let Some(Effect::SubmitJob { request, .. }) = effects.first() else {
        panic!("expected submit effect, got {effects:?}");
    };
    assert_eq!(request.narrative, "first draft");
    assert_eq!(request.unit_count, DEFAULT_UNIT_COUNT);
}

#[test]
fn upload_failure_never_submits() {
    init_logging();
    let (state, _) = apply(
        signed_in(),
        vec![
            Msg::NarrativeChanged("with data".into()),
            Msg::FilesSelected(vec![file("a.csv"), file("b.csv")]),
            Msg::GenerateClicked,
        ],
    );
    let (state, effects) = update(
        state,
        Msg::UploadFinished {
            attempt: 1,
            result: Err("transfer of b.csv failed".into()),
        },
    );

    assert_eq!(
        *state.status(),
        JobStatus::Error {
            reason: ErrorReason::Upload("transfer of b.csv failed".into())
        }
    );
    assert_eq!(effects, vec![Effect::Notify(Notice::UploadFailed)]);
}

#[test]
fn missing_job_id_ends_in_error_without_subscription() {
    init_logging();
    let (state, _) = apply(
        signed_in(),
        vec![Msg::NarrativeChanged("text only".into()), Msg::GenerateClicked],
    );
    let (state, effects) = update(
        state,
        Msg::SubmissionFinished {
            attempt: 1,
            result: Err("response carried no process_id".into()),
        },
    );

    assert!(matches!(
        state.status(),
        JobStatus::Error {
            reason: ErrorReason::Submission(_)
        }
    ));
    assert_eq!(state.watching(), None);
    assert!(effects.is_empty());
}

#[test]
fn results_of_abandoned_attempt_are_dropped() {
    init_logging();
    let (state, _) = apply(
        signed_in(),
        vec![
            Msg::NarrativeChanged("first".into()),
            Msg::GenerateClicked,
            Msg::NarrativeChanged("second".into()),
            Msg::GenerateClicked,
        ],
    );
    assert_eq!(state.attempt(), 2);

    let (state, effects) = update(
        state,
        Msg::SubmissionFinished {
            attempt: 1,
            result: Ok(JobId::new("old")),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(
        *state.status(),
        JobStatus::Uploading {
            phase: UploadPhase::Submitting
        }
    );

    let (state, effects) = update(
        state,
        Msg::SubmissionFinished {
            attempt: 2,
            result: Ok(JobId::new("new")),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::OpenSubscription {
            job_id: JobId::new("new")
        }]
    );
    assert_eq!(state.watching(), Some(&JobId::new("new")));
}

#[test]
fn sign_out_abandons_the_active_job() {
    init_logging();
    let (state, _) = apply(
        signed_in(),
        vec![
            Msg::NarrativeChanged("text".into()),
            Msg::GenerateClicked,
            Msg::SubmissionFinished {
                attempt: 1,
                result: Ok(JobId::new("J1")),
            },
        ],
    );
    let (state, effects) = update(state, Msg::SessionChanged(None));

    assert_eq!(*state.status(), JobStatus::Idle);
    assert_eq!(state.watching(), None);
    assert!(!state.view().signed_in);
    assert_eq!(
        effects,
        vec![Effect::CloseSubscription {
            job_id: JobId::new("J1")
        }]
    );
}
