use std::sync::Arc;

use deck_logging::{deck_debug, deck_info, deck_warn, redact_url};
use futures_util::future::join_all;

use crate::{
    ArtifactRecord, NewArtifact, ServiceError, Session, UploadAuthorization, UploadRequest,
    UploadSource,
};

/// Issues one upload authorization per requested file, in request order.
#[async_trait::async_trait]
pub trait StorageAuthorizer: Send + Sync {
    async fn authorize(
        &self,
        files: &[UploadRequest],
    ) -> Result<Vec<UploadAuthorization>, ServiceError>;
}

/// Transfers raw bytes to an authorized storage URL.
#[async_trait::async_trait]
pub trait ObjectUploader: Send + Sync {
    async fn put(
        &self,
        authorization: &UploadAuthorization,
        file: &UploadSource,
    ) -> Result<(), ServiceError>;
}

/// Persists artifact metadata once the bytes are in storage.
#[async_trait::async_trait]
pub trait ArtifactRegistry: Send + Sync {
    async fn register(
        &self,
        rows: &[NewArtifact],
        session: &Session,
    ) -> Result<Vec<ArtifactRecord>, ServiceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum UploadFailure {
    #[error("upload authorization failed: {0}")]
    Authorize(#[source] ServiceError),
    #[error("expected {expected} upload authorizations, got {actual}")]
    AuthorizationCount { expected: usize, actual: usize },
    #[error("transfer of {file_name} failed: {source}")]
    Transfer {
        index: usize,
        file_name: String,
        #[source]
        source: ServiceError,
    },
    #[error("artifact registration failed: {0}")]
    Register(#[source] ServiceError),
    #[error("registry returned {actual} records for {expected} files")]
    RecordCount { expected: usize, actual: usize },
}

/// All-or-nothing upload of a file set: authorize in one batch, transfer in
/// parallel, register in one batch.
#[derive(Clone)]
pub struct UploadCoordinator {
    authorizer: Arc<dyn StorageAuthorizer>,
    uploader: Arc<dyn ObjectUploader>,
    registry: Arc<dyn ArtifactRegistry>,
}

impl UploadCoordinator {
    pub fn new(
        authorizer: Arc<dyn StorageAuthorizer>,
        uploader: Arc<dyn ObjectUploader>,
        registry: Arc<dyn ArtifactRegistry>,
    ) -> Self {
        Self {
            authorizer,
            uploader,
            registry,
        }
    }

    /// Returns the registered records in the same order as `files`.
    ///
    /// On any error nothing is registered; objects already transferred are
    /// left to the storage service's own lifecycle.
    pub async fn upload_files(
        &self,
        files: &[UploadSource],
        owner: &Session,
    ) -> Result<Vec<ArtifactRecord>, UploadFailure> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<UploadRequest> = files
            .iter()
            .map(|file| UploadRequest {
                file_name: file.name.clone(),
                file_type: file.mime_type.clone(),
            })
            .collect();
        let authorizations = self
            .authorizer
            .authorize(&requests)
            .await
            .map_err(UploadFailure::Authorize)?;
        if authorizations.len() != files.len() {
            return Err(UploadFailure::AuthorizationCount {
                expected: files.len(),
                actual: authorizations.len(),
            });
        }

        // Wait for every transfer to settle before judging the batch.
        let results = join_all(
            authorizations
                .iter()
                .zip(files)
                .map(|(authorization, file)| self.uploader.put(authorization, file)),
        )
        .await;

        let mut first_failure = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(()) => deck_debug!(
                    "Uploaded {} to {}",
                    files[index].name,
                    redact_url(&authorizations[index].url)
                ),
                Err(source) => {
                    deck_warn!("Transfer of {} failed: {}", files[index].name, source);
                    first_failure.get_or_insert(UploadFailure::Transfer {
                        index,
                        file_name: files[index].name.clone(),
                        source,
                    });
                }
            }
        }
        if let Some(failure) = first_failure {
            return Err(failure);
        }

        let rows: Vec<NewArtifact> = authorizations
            .iter()
            .map(|authorization| NewArtifact {
                file_name: authorization.original_name.clone(),
                file_type: authorization.file_type.clone(),
                s3_key: authorization.key.clone(),
                user_id: owner.user_id.clone(),
            })
            .collect();
        let records = self
            .registry
            .register(&rows, owner)
            .await
            .map_err(UploadFailure::Register)?;
        if records.len() != rows.len() {
            return Err(UploadFailure::RecordCount {
                expected: rows.len(),
                actual: records.len(),
            });
        }

        let records = restore_order(&rows, records);
        deck_info!("Registered {} artifacts", records.len());
        Ok(records)
    }
}

/// Orders records by the storage key of the row that created them. Falls back
/// to the registry's order when keys do not line up one-to-one.
fn restore_order(rows: &[NewArtifact], records: Vec<ArtifactRecord>) -> Vec<ArtifactRecord> {
    let positions: Option<Vec<usize>> = records
        .iter()
        .map(|record| rows.iter().position(|row| row.s3_key == record.s3_key))
        .collect();
    let Some(positions) = positions else {
        return records;
    };
    let mut seen = vec![false; rows.len()];
    if positions.iter().any(|&p| std::mem::replace(&mut seen[p], true)) {
        return records;
    }

    let mut paired: Vec<(usize, ArtifactRecord)> = positions.into_iter().zip(records).collect();
    paired.sort_by_key(|(position, _)| *position);
    paired.into_iter().map(|(_, record)| record).collect()
}
