use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::card::Filter;
use crate::gesture::DEFAULT_SWIPE_THRESHOLD;
use crate::http::DEFAULT_API_URL;
use crate::session::AdvanceMode;
use crate::speech::DEFAULT_LOCALE;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub filter: Filter,
    pub locale: String,
    pub advance_mode: AdvanceMode,
    pub swipe_threshold: f64,
    pub speech: bool,
    /// Seconds on one card before its time is pushed without waiting for a
    /// card change.
    pub flush_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            filter: Filter::All,
            locale: DEFAULT_LOCALE.to_string(),
            advance_mode: AdvanceMode::Browse,
            swipe_threshold: DEFAULT_SWIPE_THRESHOLD,
            speech: true,
            flush_interval_secs: 30,
        }
    }
}

impl Config {
    /// Replaces values the session cannot work with by their defaults.
    pub fn sanitized(mut self) -> Self {
        if !is_valid_swipe_threshold(self.swipe_threshold) {
            log::warn!(
                "swipe threshold {} must be a positive number, using {}",
                self.swipe_threshold,
                DEFAULT_SWIPE_THRESHOLD
            );
            self.swipe_threshold = DEFAULT_SWIPE_THRESHOLD;
        }
        self
    }
}

pub fn is_valid_swipe_threshold(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "flipdeck") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("flipdeck_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg.sanitized(),
                Err(e) => log::warn!("ignoring unreadable config {}: {e}", self.path.display()),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
