use std::sync::Arc;
use std::time::Duration;

use deck_core::{update, AppState, AppViewModel, Effect, JobId, JobStatus, Msg, StatusUpdate};
use deck_engine::{Engine, RowUpdate, SessionProvider, StatusSink, SubscriptionHandle};
use deck_logging::{deck_debug, deck_info, deck_warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::effects::EffectRunner;
use super::render::RenderHooks;

/// Single owner of a session's job state and of its one live subscription.
///
/// Every input, whether a UI action, a network result or a pushed status
/// change, arrives as a [`Msg`] and goes through [`deck_core::update`].
pub struct SessionJobController<H: RenderHooks> {
    state: AppState,
    engine: Arc<Engine>,
    sessions: Arc<dyn SessionProvider>,
    runner: EffectRunner,
    subscription: Option<SubscriptionHandle>,
    hooks: H,
    msg_tx: mpsc::UnboundedSender<Msg>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    forwarding: Option<(CancellationToken, JoinHandle<()>)>,
}

impl<H: RenderHooks> SessionJobController<H> {
    pub fn new(engine: Arc<Engine>, sessions: Arc<dyn SessionProvider>, hooks: H) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let runner = EffectRunner::new(Arc::clone(&engine), Arc::clone(&sessions), msg_tx.clone());
        let state = AppState::new().with_publishing(engine.publisher.is_some());
        Self {
            state,
            engine,
            sessions,
            runner,
            subscription: None,
            hooks,
            msg_tx,
            msg_rx,
            forwarding: None,
        }
    }

    /// Channel for UI events; messages are applied by [`Self::pump`].
    pub fn sender(&self) -> mpsc::UnboundedSender<Msg> {
        self.msg_tx.clone()
    }

    pub fn status(&self) -> &JobStatus {
        self.state.status()
    }

    pub fn view(&self) -> AppViewModel {
        self.state.view()
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// Applies the current session and starts forwarding session changes.
    pub async fn start(&mut self) {
        self.stop();
        let mut changes = self.sessions.subscribe();
        let current = changes.borrow_and_update().clone();
        self.dispatch(Msg::SessionChanged(current.map(|session| session.user_id)))
            .await;

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let tx = self.msg_tx.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => return,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let owner = changes
                            .borrow_and_update()
                            .as_ref()
                            .map(|session| session.user_id.clone());
                        if tx.send(Msg::SessionChanged(owner)).is_err() {
                            return;
                        }
                    }
                }
            }
        });
        self.forwarding = Some((cancel, task));
        self.render(true);
    }

    /// Stops forwarding session changes. The job state is left as is.
    pub fn stop(&mut self) {
        if let Some((cancel, _task)) = self.forwarding.take() {
            cancel.cancel();
        }
    }

    pub async fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.apply(effects).await;
        let dirty = self.state.consume_dirty();
        self.render(dirty);
    }

    /// Applies the next queued message. Returns `false` once the queue is closed.
    pub async fn pump(&mut self) -> bool {
        match self.msg_rx.recv().await {
            Some(msg) => {
                self.dispatch(msg).await;
                true
            }
            None => false,
        }
    }

    /// Pumps messages until `done` holds for the view or `limit` elapses.
    pub async fn run_until<F>(&mut self, limit: Duration, mut done: F) -> bool
    where
        F: FnMut(&AppViewModel) -> bool,
    {
        let deadline = tokio::time::Instant::now() + limit;
        while !done(&self.state.view()) {
            match tokio::time::timeout_at(deadline, self.pump()).await {
                Ok(true) => {}
                Ok(false) | Err(_) => return false,
            }
        }
        true
    }

    /// Tears the session down: releases the subscription and waits for
    /// in-flight effects and file saves to finish.
    pub async fn shutdown(mut self) -> H {
        self.stop();
        self.dispatch(Msg::ShutdownRequested).await;
        if let Some(handle) = self.subscription.take() {
            self.engine.push.unsubscribe(handle).await;
        }
        self.runner.settle().await;
        self.engine.handshake.flush().await;
        deck_info!("Session controller shut down");
        self.hooks
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenSubscription { job_id } => self.open_subscription(job_id).await,
                Effect::CloseSubscription { job_id } => self.close_subscription(&job_id).await,
                Effect::Notify(notice) => self.hooks.notify(notice),
                other => self.runner.run(other),
            }
        }
    }

    async fn open_subscription(&mut self, job_id: JobId) {
        if let Some(previous) = self.subscription.take() {
            deck_warn!(
                "Closing stale subscription for {} before watching {}",
                previous.job_id(),
                job_id
            );
            self.engine.push.unsubscribe(previous).await;
        }

        let sink = Arc::new(ControllerSink {
            job_id: job_id.clone(),
            tx: self.msg_tx.clone(),
        });
        match self.engine.push.subscribe(job_id.as_str(), sink).await {
            Ok(handle) => {
                deck_info!("Watching job {}", job_id);
                self.subscription = Some(handle);
            }
            Err(err) => {
                deck_warn!("Subscription for job {} failed: {}", job_id, err);
                let _ = self.msg_tx.send(Msg::SubscriptionFailed {
                    job_id,
                    reason: err.to_string(),
                });
            }
        }
    }

    async fn close_subscription(&mut self, job_id: &JobId) {
        match self.subscription.take() {
            Some(handle) if handle.job_id() == job_id.as_str() => {
                deck_debug!("Releasing subscription for job {}", job_id);
                self.engine.push.unsubscribe(handle).await;
            }
            Some(handle) => {
                deck_warn!(
                    "Close requested for {} but {} is live; keeping it",
                    job_id,
                    handle.job_id()
                );
                self.subscription = Some(handle);
            }
            None => {}
        }
    }

    fn render(&mut self, dirty: bool) {
        if dirty {
            let view = self.state.view();
            self.hooks.render(&view);
        }
    }
}

/// Turns pushed row changes into messages for the job they were opened for.
struct ControllerSink {
    job_id: JobId,
    tx: mpsc::UnboundedSender<Msg>,
}

impl StatusSink for ControllerSink {
    fn deliver(&self, row: RowUpdate) {
        let update = StatusUpdate {
            status: row.status,
            output_reference: row.output_reference,
            revision: row.updated_at.map(|at| at.timestamp_millis()),
        };
        let _ = self.tx.send(Msg::StatusEvent {
            job_id: self.job_id.clone(),
            update,
        });
    }

    fn closed(&self, reason: String) {
        let _ = self.tx.send(Msg::SubscriptionDropped {
            job_id: self.job_id.clone(),
            reason,
        });
    }
}
