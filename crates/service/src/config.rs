use std::time::Duration;

use common::coalescer::DEFAULT_COALESCE_WINDOW_MS;
use common::prelude::KeyMaterial;
use common::session::SessionConfig;

#[derive(Debug)]
pub struct Config {
    // session configuration
    /// how long inbound updates are batched before
    ///  a snapshot is published
    pub coalesce_window: Duration,
    /// session-scoped id, if not set then a
    ///  random uuid will be used
    pub session_id: Option<String>,
    /// keys the session writes with, if not set then
    ///  writes go out plain and unsigned
    pub session_key: Option<KeyMaterial>,

    // misc
    pub log_level: tracing::Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coalesce_window: Duration::from_millis(DEFAULT_COALESCE_WINDOW_MS),
            session_id: None,
            session_key: None,
            log_level: tracing::Level::INFO,
        }
    }
}

impl Config {
    /// The part of the config the session itself consumes
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            coalesce_window: self.coalesce_window,
            session_id: Some(
                self.session_id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            ),
        }
    }
}
