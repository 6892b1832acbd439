use deck_logging::{deck_info, redact_url};
use serde::Serialize;

use crate::http::{ensure_success, join, map_reqwest_error, parse_base};
use crate::{PublishSettings, ServiceError};

/// Shares a finished deck with the public catalog.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, download_url: &str) -> Result<(), ServiceError>;
}

#[derive(Serialize)]
struct UnsignedUpload<'a> {
    file: &'a str,
    upload_preset: &'a str,
    folder: &'a str,
    tags: [&'a str; 1],
    resource_type: &'static str,
}

/// Unsigned Cloudinary upload: the host fetches the deck from the signed URL itself.
#[derive(Debug, Clone)]
pub struct CloudinaryPublisher {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    settings: PublishSettings,
}

impl CloudinaryPublisher {
    pub fn new(client: reqwest::Client, settings: PublishSettings) -> Result<Self, ServiceError> {
        let base = parse_base(&settings.api_base)?;
        let endpoint = join(&base, &format!("v1_1/{}/auto/upload", settings.cloud_name))?;
        Ok(Self {
            client,
            endpoint,
            settings,
        })
    }
}

#[async_trait::async_trait]
impl Publisher for CloudinaryPublisher {
    async fn publish(&self, download_url: &str) -> Result<(), ServiceError> {
        let body = UnsignedUpload {
            file: download_url,
            upload_preset: &self.settings.upload_preset,
            folder: &self.settings.folder,
            tags: [&self.settings.tag],
            resource_type: "auto",
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        ensure_success(response)?;
        deck_info!("Published {}", redact_url(download_url));
        Ok(())
    }
}
