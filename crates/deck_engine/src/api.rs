use deck_logging::{deck_debug, redact_url};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::http::{ensure_success, join, map_reqwest_error, parse_base, read_json};
use crate::{
    ApiSettings, CreateJobRequest, CreateJobResponse, DownloadGrant, DownloadLinkRequest,
    FailureKind, JobApi, LinkIssuer, ObjectUploader, ServiceError, StorageAuthorizer,
    UploadAuthorization, UploadRequest, UploadSource,
};

#[derive(Serialize)]
struct PresignRequest<'a> {
    files: &'a [UploadRequest],
}

#[derive(Deserialize)]
struct LinkResponse {
    #[serde(default)]
    download_url: Option<String>,
}

/// JSON client for the job service. One instance backs several collaborator traits.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    transfers: reqwest::Client,
    base: reqwest::Url,
}

impl HttpApi {
    pub fn new(client: reqwest::Client, settings: &ApiSettings) -> Result<Self, ServiceError> {
        Ok(Self {
            transfers: client.clone(),
            client,
            base: parse_base(&settings.base_url)?,
        })
    }

    /// Object PUTs go through `transfers` instead of the JSON client.
    pub fn with_transfer_client(mut self, transfers: reqwest::Client) -> Self {
        self.transfers = transfers;
        self
    }

    async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let url = join(&self.base, endpoint)?;
        deck_debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl StorageAuthorizer for HttpApi {
    async fn authorize(
        &self,
        files: &[UploadRequest],
    ) -> Result<Vec<UploadAuthorization>, ServiceError> {
        // The service answers with a bare array, one entry per requested file.
        self.post_json("generate-presigned-urls", &PresignRequest { files })
            .await
    }
}

#[async_trait::async_trait]
impl ObjectUploader for HttpApi {
    async fn put(
        &self,
        authorization: &UploadAuthorization,
        file: &UploadSource,
    ) -> Result<(), ServiceError> {
        let url = reqwest::Url::parse(&authorization.url).map_err(|err| {
            ServiceError::new(
                FailureKind::InvalidUrl,
                format!("{}: {err}", redact_url(&authorization.url)),
            )
        })?;
        let response = self
            .transfers
            .put(url)
            .header(CONTENT_TYPE, file.mime_type.as_str())
            .body(file.content.clone())
            .send()
            .await
            .map_err(map_reqwest_error)?;
        ensure_success(response)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobApi for HttpApi {
    async fn create_job(
        &self,
        request: &CreateJobRequest,
    ) -> Result<CreateJobResponse, ServiceError> {
        self.post_json("chat", request).await
    }
}

#[async_trait::async_trait]
impl LinkIssuer for HttpApi {
    async fn issue(&self, output_reference: &str) -> Result<DownloadGrant, ServiceError> {
        let response: LinkResponse = self
            .post_json(
                "generate-download-url",
                &DownloadLinkRequest {
                    file_url: output_reference.to_string(),
                },
            )
            .await?;
        // An empty URL passes through; the handshake rejects it.
        response
            .download_url
            .map(|download_url| DownloadGrant { download_url })
            .ok_or_else(|| {
                ServiceError::new(FailureKind::MissingField("download_url"), "no download url")
            })
    }
}
