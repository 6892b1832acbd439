//! Deckgen engine: job service collaborators and the upload, submission,
//! push and download components built on them.
mod api;
mod engine;
mod handshake;
mod http;
mod persist;
mod publish;
mod push;
mod realtime;
mod registry;
mod session;
mod settings;
mod submit;
mod types;
mod upload;

pub use api::HttpApi;
pub use engine::Engine;
pub use handshake::{
    CompletionHandshake, DownloadSink, FileDownloadSink, HandshakeFailure, LinkIssuer,
};
pub use http::{build_client, build_transfer_client, HttpSettings};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use publish::{CloudinaryPublisher, Publisher};
pub use push::{PushChannel, StatusSink, SubscriptionHandle};
pub use realtime::SupabaseRealtime;
pub use registry::RestArtifactRegistry;
pub use session::{Session, SessionProvider, StaticSessionProvider};
pub use settings::{
    ApiSettings, DownloadSettings, EngineSettings, PublishSettings, RealtimeSettings,
    RegistrySettings,
};
pub use submit::{JobApi, JobSubmitter, SubmissionFailure};
pub use types::{
    ArtifactRecord, CreateJobRequest, CreateJobResponse, DownloadGrant, DownloadLinkRequest,
    FailureKind, NewArtifact, RecordId, RowUpdate, ServiceError, UploadAuthorization,
    UploadRequest, UploadSource,
};
pub use upload::{
    ArtifactRegistry, ObjectUploader, StorageAuthorizer, UploadCoordinator, UploadFailure,
};
