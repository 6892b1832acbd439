use std::sync::Arc;

use deck_logging::{deck_info, deck_warn};

use crate::{CreateJobRequest, CreateJobResponse, RecordId, ServiceError, Session};

#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    async fn create_job(
        &self,
        request: &CreateJobRequest,
    ) -> Result<CreateJobResponse, ServiceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionFailure {
    #[error("nothing to generate from: narrative is empty and no files were attached")]
    EmptyRequest,
    #[error("job creation failed: {0}")]
    Transport(#[source] ServiceError),
    #[error("job service accepted the request without returning a job id")]
    MissingJobId,
}

/// Creates a generation job and hands back its server-issued id.
#[derive(Clone)]
pub struct JobSubmitter {
    api: Arc<dyn JobApi>,
}

impl JobSubmitter {
    pub fn new(api: Arc<dyn JobApi>) -> Self {
        Self { api }
    }

    /// No retry happens here; repeating a submission may create a duplicate job.
    pub async fn submit(
        &self,
        narrative: &str,
        artifact_ids: &[RecordId],
        unit_count: u32,
        owner: &Session,
    ) -> Result<String, SubmissionFailure> {
        if narrative.trim().is_empty() && artifact_ids.is_empty() {
            return Err(SubmissionFailure::EmptyRequest);
        }

        let request = CreateJobRequest {
            message: narrative.to_string(),
            file_ids: artifact_ids.to_vec(),
            num_slides: unit_count,
            user_id: owner.user_id.clone(),
        };
        let response = self
            .api
            .create_job(&request)
            .await
            .map_err(SubmissionFailure::Transport)?;

        match response.process_id {
            Some(job_id) => {
                deck_info!(
                    "Created job {} with {} artifacts and {} slides",
                    job_id,
                    artifact_ids.len(),
                    unit_count
                );
                Ok(job_id)
            }
            None => {
                deck_warn!("Job service response carried no process_id");
                Err(SubmissionFailure::MissingJobId)
            }
        }
    }
}
