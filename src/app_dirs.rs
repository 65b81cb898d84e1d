use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("flipdeck"),
            )
        } else {
            ProjectDirs::from("", "", "flipdeck")
                .map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    /// Where the session log goes while the terminal is in raw mode.
    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("flipdeck.log"))
    }
}
