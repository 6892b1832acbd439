use std::sync::Arc;

use crate::api::HttpApi;
use crate::handshake::FileDownloadSink;
use crate::http::{build_client, build_transfer_client};
use crate::publish::CloudinaryPublisher;
use crate::realtime::SupabaseRealtime;
use crate::registry::RestArtifactRegistry;
use crate::{
    CompletionHandshake, EngineSettings, JobSubmitter, Publisher, PushChannel, ServiceError,
    SessionProvider, UploadCoordinator,
};

/// Everything the controller needs to run jobs, wired to its collaborators.
#[derive(Clone)]
pub struct Engine {
    pub uploads: UploadCoordinator,
    pub submitter: JobSubmitter,
    pub handshake: CompletionHandshake,
    pub push: Arc<dyn PushChannel>,
    pub publisher: Option<Arc<dyn Publisher>>,
}

impl Engine {
    pub fn new(
        uploads: UploadCoordinator,
        submitter: JobSubmitter,
        handshake: CompletionHandshake,
        push: Arc<dyn PushChannel>,
    ) -> Self {
        Self {
            uploads,
            submitter,
            handshake,
            push,
            publisher: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Wires the HTTP, PostgREST and Realtime collaborators from settings.
    pub fn from_settings(
        settings: &EngineSettings,
        sessions: Arc<dyn SessionProvider>,
    ) -> Result<Self, ServiceError> {
        let client = build_client(&settings.http)?;
        let transfers = build_transfer_client(&settings.http)?;
        let api = Arc::new(
            HttpApi::new(client.clone(), &settings.api)?.with_transfer_client(transfers.clone()),
        );
        let registry = Arc::new(RestArtifactRegistry::new(client.clone(), &settings.registry)?);
        let sink = Arc::new(FileDownloadSink::new(
            transfers,
            settings.download.directory.clone(),
        ));

        let engine = Self::new(
            UploadCoordinator::new(api.clone(), api.clone(), registry),
            JobSubmitter::new(api.clone()),
            CompletionHandshake::new(api, sink, settings.download.filename.clone()),
            Arc::new(SupabaseRealtime::new(settings.realtime.clone(), sessions)),
        );
        match &settings.publish {
            Some(publish) => Ok(engine.with_publisher(Arc::new(CloudinaryPublisher::new(
                client,
                publish.clone(),
            )?))),
            None => Ok(engine),
        }
    }
}
