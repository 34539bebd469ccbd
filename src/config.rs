//! User settings persisted with the application state.

use crate::constants::DEFAULT_SERVER_URL;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the execution server URL.
pub const SERVER_URL_ENV: &str = "FLOW_CANVAS_SERVER_URL";

/// Settings edited from the toolbar and stored in eframe storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// WebSocket endpoint of the execution server
    pub server_url: String,
    /// Whether the footer shows frame statistics
    pub show_fps: bool,
    /// Whether dropping a node snaps it to the grid
    pub snap_to_grid: bool,
    /// Whether New/Open/Quit ask before discarding unsaved changes
    pub confirm_discard: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            show_fps: false,
            snap_to_grid: false,
            confirm_discard: true,
        }
    }
}

impl Settings {
    /// Applies an override for the server URL. Blank overrides are ignored.
    pub fn with_server_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
            log::info!("Using execution server {url} from {SERVER_URL_ENV}");
            self.server_url = url;
        }
        self
    }

    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let url = std::env::var(SERVER_URL_ENV).ok();
            self.with_server_override(url)
        }
        #[cfg(target_arch = "wasm32")]
        {
            self
        }
    }

    /// Server URL, or the default when the stored one is blank.
    pub fn effective_server_url(&self) -> &str {
        let url = self.server_url.trim();
        if url.is_empty() {
            DEFAULT_SERVER_URL
        } else {
            url
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"show_fps": true}"#).unwrap();
        assert!(settings.show_fps);
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
        assert!(settings.confirm_discard);
    }

    #[test]
    fn override_replaces_url_unless_blank() {
        let settings = Settings::default().with_server_override(Some("ws://example:9000/run".into()));
        assert_eq!(settings.effective_server_url(), "ws://example:9000/run");

        let settings = Settings::default().with_server_override(Some("   ".into()));
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);

        let blank = Settings {
            server_url: String::new(),
            ..Default::default()
        };
        assert_eq!(blank.effective_server_url(), DEFAULT_SERVER_URL);
    }
}
