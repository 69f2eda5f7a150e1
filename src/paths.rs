use std::path::{Path, PathBuf};

/// Host application data directory: `~/.local/share/lunchbox/` (platform equivalent).
pub fn user_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("lunchbox")
}

/// Persisted settings file inside the data directory.
pub fn settings_file(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

/// Plugins directory inside the data directory.
pub fn plugins_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("plugins")
}

/// Boot log directory inside the data directory.
pub fn logs_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}
