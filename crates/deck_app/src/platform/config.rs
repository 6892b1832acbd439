//! Application configuration read from `./deckgen.ron`.
//!
//! The path can be overridden with the `DECKGEN_CONFIG` environment variable.
//! Every field has a default, so a missing file or a partial file is fine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use deck_engine::{
    ApiSettings, DownloadSettings, EngineSettings, HttpSettings, PublishSettings,
    RealtimeSettings, RegistrySettings, Session,
};
use deck_logging::deck_info;
use serde::{Deserialize, Serialize};

use super::logging::{LogDestination, LogLevel};

pub const CONFIG_ENV: &str = "DECKGEN_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./deckgen.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_destination: LogDestination,
    pub log_level: LogLevel,
    pub api_base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub transfer_read_timeout_secs: u64,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub realtime_heartbeat_secs: u64,
    pub download_dir: PathBuf,
    pub download_filename: String,
    pub publish: Option<PublishConfig>,
    pub session: Option<SessionConfig>,
    pub request: Option<RequestConfig>,
    /// Upper bound on how long the headless run waits for a job to settle.
    pub run_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        let http = HttpSettings::default();
        let realtime = RealtimeSettings::default();
        let download = DownloadSettings::default();
        Self {
            log_destination: LogDestination::Both,
            log_level: LogLevel::Info,
            api_base_url: api.base_url,
            connect_timeout_secs: http.connect_timeout.as_secs(),
            request_timeout_secs: http.request_timeout.as_secs(),
            transfer_read_timeout_secs: http.transfer_read_timeout.as_secs(),
            supabase_url: realtime.url,
            supabase_anon_key: String::new(),
            realtime_heartbeat_secs: realtime.heartbeat.as_secs(),
            download_dir: download.directory,
            download_filename: download.filename,
            publish: None,
            session: None,
            request: None,
            run_timeout_secs: 900,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    #[serde(default = "default_publish_folder")]
    pub folder: String,
    #[serde(default = "default_publish_tag")]
    pub tag: String,
}

fn default_publish_folder() -> String {
    PublishSettings::default().folder
}

fn default_publish_tag() -> String {
    PublishSettings::default().tag
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub user_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// A generation request fed to the controller as if typed into the UI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub narrative: String,
    pub files: Vec<PathBuf>,
    pub slides: Option<i64>,
}

impl AppConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        let http = HttpSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            transfer_read_timeout: Duration::from_secs(self.transfer_read_timeout_secs),
        };
        EngineSettings {
            http,
            api: ApiSettings {
                base_url: self.api_base_url.clone(),
            },
            realtime: RealtimeSettings {
                url: self.supabase_url.clone(),
                anon_key: self.supabase_anon_key.clone(),
                heartbeat: Duration::from_secs(self.realtime_heartbeat_secs),
                ..RealtimeSettings::default()
            },
            registry: RegistrySettings {
                rest_url: self.supabase_url.clone(),
                anon_key: self.supabase_anon_key.clone(),
                ..RegistrySettings::default()
            },
            download: DownloadSettings {
                directory: self.download_dir.clone(),
                filename: self.download_filename.clone(),
            },
            publish: self.publish.as_ref().map(|publish| PublishSettings {
                cloud_name: publish.cloud_name.clone(),
                upload_preset: publish.upload_preset.clone(),
                folder: publish.folder.clone(),
                tag: publish.tag.clone(),
                ..PublishSettings::default()
            }),
        }
    }

    pub fn initial_session(&self) -> Option<Session> {
        self.session.as_ref().map(|session| Session {
            user_id: session.user_id.clone(),
            access_token: session.access_token.clone(),
        })
    }
}

pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AppConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let config = ron::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    deck_info!("Loaded configuration from {:?}", path);
    Ok(config)
}
