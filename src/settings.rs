use crate::datasource::DatasourceSetting;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Root of the backend server, e.g. `http://localhost:8080`.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Path prefix every API request is sent under.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// When enabled the application initialises the logger at debug level.
    /// Defaults to `false` when the field is missing in the settings file.
    #[serde(default)]
    pub debug_logging: bool,
    /// Write logs to this file instead of stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Enable toast notifications in the UI.
    #[serde(default = "default_toasts")]
    pub enable_toasts: bool,
    /// Duration of toast notifications in seconds.
    #[serde(default = "default_toast_duration")]
    pub toast_duration: f32,
    #[serde(default = "default_from")]
    pub default_from: String,
    #[serde(default = "default_to")]
    pub default_to: String,
    /// Where the dashboard is persisted when no server is available.
    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: String,
    /// Offline datasource list, used when the server can't be reached.
    #[serde(default)]
    pub datasources: Vec<DatasourceSetting>,
    /// Pixel height of one grid unit.
    #[serde(default = "default_row_height")]
    pub row_height: f32,
    #[serde(default = "default_grid_columns")]
    pub grid_columns: u32,
}

fn default_server_url() -> String {
    "http://localhost:8080".into()
}

fn default_api_base() -> String {
    "/api/v1".into()
}

fn default_toasts() -> bool {
    true
}

fn default_toast_duration() -> f32 {
    3.0
}

fn default_from() -> String {
    "now-1h".into()
}

fn default_to() -> String {
    "now".into()
}

fn default_dashboard_path() -> String {
    "dashboard.json".into()
}

fn default_row_height() -> f32 {
    30.0
}

fn default_grid_columns() -> u32 {
    crate::dashboard::GRID_COLUMNS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_base: default_api_base(),
            debug_logging: false,
            log_file: None,
            enable_toasts: default_toasts(),
            toast_duration: default_toast_duration(),
            default_from: default_from(),
            default_to: default_to(),
            dashboard_path: default_dashboard_path(),
            datasources: Vec::new(),
            row_height: default_row_height(),
            grid_columns: default_grid_columns(),
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// `<config dir>/gridscope/settings.json`, or `settings.json` in the
    /// working directory when the platform has no config dir.
    pub fn default_path() -> PathBuf {
        match dirs_next::config_dir() {
            Some(dir) => dir.join("gridscope").join("settings.json"),
            None => PathBuf::from("settings.json"),
        }
    }

    /// Full URL prefix for API requests.
    pub fn api_url(&self) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.api_base.trim_start_matches('/')
        )
    }
}
