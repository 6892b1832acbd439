//! Deckgen application shell: the session controller and its headless front end.
pub mod platform;

pub use platform::{
    config::{config_path, load_config, AppConfig, ConfigError, RequestConfig},
    controller::SessionJobController,
    effects::EffectRunner,
    logging::{initialize as initialize_logging, LogDestination, LogLevel},
    render::{notice_text, status_line, LogRenderer, RenderHooks},
    selection::{guess_mime, read_selected_file},
};
