use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{RowUpdate, ServiceError};

/// Receives decoded changes for one subscribed job.
pub trait StatusSink: Send + Sync {
    fn deliver(&self, update: RowUpdate);
    /// The transport ended without being asked to. Not called after `close`.
    fn closed(&self, reason: String);
}

/// Live subscription to one job's status changes. Dropping it cancels delivery.
#[derive(Debug)]
pub struct SubscriptionHandle {
    job_id: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn new(job_id: impl Into<String>, cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            job_id: job_id.into(),
            cancel,
            task: Some(task),
        }
    }

    /// A handle with no background task, for channels that deliver inline.
    pub fn detached(job_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            job_id: job_id.into(),
            cancel,
            task: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stops delivery and waits for the transport to leave the channel.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait::async_trait]
pub trait PushChannel: Send + Sync {
    async fn subscribe(
        &self,
        job_id: &str,
        sink: Arc<dyn StatusSink>,
    ) -> Result<SubscriptionHandle, ServiceError>;

    async fn unsubscribe(&self, handle: SubscriptionHandle) {
        handle.close().await;
    }
}
