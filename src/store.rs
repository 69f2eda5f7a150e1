use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures_util::future::LocalBoxFuture;

use crate::error::LunchboxError;
use crate::settings::StoredSettings;

/// Key-value persistence for [`StoredSettings`].
pub trait SettingsStore {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> LocalBoxFuture<'_, Result<Option<StoredSettings>, LunchboxError>>;

    fn save<'a>(&'a self, settings: &'a StoredSettings) -> LocalBoxFuture<'a, Result<(), LunchboxError>>;
}

/// Stores settings as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> LocalBoxFuture<'_, Result<Option<StoredSettings>, LunchboxError>> {
        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&self.path).await {
                Ok(c) => c,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %self.path.display(), "no stored settings");
                    return Ok(None);
                }
                Err(source) => {
                    return Err(LunchboxError::SettingsLoad {
                        path: self.path.display().to_string(),
                        source,
                    });
                }
            };

            if contents.trim().is_empty() {
                return Ok(None);
            }

            let stored: StoredSettings =
                facet_json::from_str(&contents).map_err(|e| LunchboxError::SettingsParse {
                    path: self.path.display().to_string(),
                    message: e.to_string(),
                })?;
            Ok(Some(stored))
        })
    }

    fn save<'a>(&'a self, settings: &'a StoredSettings) -> LocalBoxFuture<'a, Result<(), LunchboxError>> {
        Box::pin(async move {
            let json = facet_json::to_string(settings).map_err(|e| LunchboxError::SettingsEncode {
                message: e.to_string(),
            })?;

            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| LunchboxError::Io {
                        context: format!("creating directory {}", parent.display()),
                        source: e,
                    })?;
            }

            let tmp_path = self.path.with_extension("json.tmp");
            tokio::fs::write(&tmp_path, json)
                .await
                .map_err(|e| LunchboxError::Io {
                    context: format!("writing {}", tmp_path.display()),
                    source: e,
                })?;
            tokio::fs::rename(&tmp_path, &self.path)
                .await
                .map_err(|e| LunchboxError::Io {
                    context: format!("renaming {} to {}", tmp_path.display(), self.path.display()),
                    source: e,
                })?;

            tracing::debug!(path = %self.path.display(), "settings saved");
            Ok(())
        })
    }
}
