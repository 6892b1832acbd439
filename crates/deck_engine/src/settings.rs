use std::path::PathBuf;
use std::time::Duration;

use crate::HttpSettings;

/// Job service endpoints: storage authorization, job creation and link exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

/// Where job status changes are pushed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeSettings {
    /// Project URL; `http(s)` is rewritten to `ws(s)` when connecting.
    pub url: String,
    pub anon_key: String,
    pub schema: String,
    pub table: String,
    pub key_column: String,
    pub status_column: String,
    pub output_column: String,
    pub heartbeat: Duration,
    pub join_timeout: Duration,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            schema: "public".to_string(),
            table: "Process".to_string(),
            key_column: "process_id".to_string(),
            status_column: "status".to_string(),
            output_column: "presentation_s3_url".to_string(),
            heartbeat: Duration::from_secs(25),
            join_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub rest_url: String,
    pub anon_key: String,
    pub table: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            rest_url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            table: "files".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub directory: PathBuf,
    pub filename: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./downloads"),
            filename: "SigSigma_Presentation.pptx".to_string(),
        }
    }
}

/// Unsigned upload target for publishing finished decks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    pub api_base: String,
    pub cloud_name: String,
    pub upload_preset: String,
    pub folder: String,
    pub tag: String,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.cloudinary.com".to_string(),
            cloud_name: String::new(),
            upload_preset: String::new(),
            folder: "community_pdfs".to_string(),
            tag: "public_feed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub http: HttpSettings,
    pub api: ApiSettings,
    pub realtime: RealtimeSettings,
    pub registry: RegistrySettings,
    pub download: DownloadSettings,
    /// Publishing is off when this is `None`.
    pub publish: Option<PublishSettings>,
}
