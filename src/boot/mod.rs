//! Boot pipeline.
//!
//! Every operation takes the shared [`BootContext`], writes progress lines
//! to its status sink, and resolves with `()` or a [`Failure`]. The
//! operations are registered into named groups by [`registry`], in the
//! order they run at start-up.

pub mod load;
pub mod plugins;
pub mod prerequisites;
pub mod vm;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::chain::LinkFuture;
use crate::config::AppConfig;
use crate::error::{Failure, LunchboxError};
use crate::manifest::ManifestFetcher;
use crate::ops::OperationRegistry;
use crate::runner::CommandRunner;
use crate::settings::Settings;
use crate::sink::StatusSink;
use crate::store::SettingsStore;

pub const GROUP_BOOT: &str = "boot";
pub const GROUP_PREREQUISITES: &str = "prerequisites";
pub const GROUP_PLUGINS: &str = "plugins";
pub const GROUP_VM: &str = "vm";

/// Future returned by every boot operation.
pub type BootFuture<'a> = LinkFuture<'a, (), Failure>;

pub type BootRegistry = OperationRegistry<BootContext, (), Failure>;

/// State threaded through every boot operation.
pub struct BootContext {
    pub config: AppConfig,
    /// Host application data directory.
    pub data_dir: PathBuf,
    pub sink: Rc<dyn StatusSink>,
    pub store: Box<dyn SettingsStore>,
    pub runner: Box<dyn CommandRunner>,
    pub fetcher: Box<dyn ManifestFetcher>,
    /// `None` until `load_settings` has run.
    pub settings: Option<Settings>,
    /// Tool name → version found by the prerequisite checks.
    pub found_versions: BTreeMap<String, String>,
    pub reprovision_notice_shown: bool,
}

impl BootContext {
    pub fn new(
        config: AppConfig,
        data_dir: &Path,
        sink: Rc<dyn StatusSink>,
        store: Box<dyn SettingsStore>,
        runner: Box<dyn CommandRunner>,
        fetcher: Box<dyn ManifestFetcher>,
    ) -> Self {
        Self {
            config,
            data_dir: data_dir.to_path_buf(),
            sink,
            store,
            runner,
            fetcher,
            settings: None,
            found_versions: BTreeMap::new(),
            reprovision_notice_shown: false,
        }
    }

    pub fn settings(&self) -> Result<&Settings, Failure> {
        self.settings
            .as_ref()
            .ok_or_else(|| Failure::new("Settings have not been loaded."))
    }

    pub fn settings_mut(&mut self) -> Result<&mut Settings, Failure> {
        self.settings
            .as_mut()
            .ok_or_else(|| Failure::new("Settings have not been loaded."))
    }

    /// Settings, loading them from the store first if no operation has yet.
    ///
    /// Lets a group run on its own, e.g. `plugins` without `boot`.
    pub async fn ensure_settings(&mut self) -> Result<&mut Settings, Failure> {
        if self.settings.is_none() {
            tracing::debug!("settings not loaded yet, reading store");
            let stored = self.store.load().await.map_err(Failure::from)?;
            self.settings = Some(Settings::from_stored(stored, &self.data_dir));
        }
        self.settings_mut()
    }

    /// Write the current settings through the store.
    pub async fn persist(&self) -> Result<(), LunchboxError> {
        let Some(settings) = &self.settings else {
            return Ok(());
        };
        let stored = settings.to_stored();
        self.store.save(&stored).await
    }

    /// Persist, reporting a failed save on the sink instead of failing.
    pub(crate) async fn persist_or_report(&self) {
        if let Err(e) = self.persist().await {
            tracing::warn!(error = %e, "saving settings failed");
            self.sink.append(
                &Failure::from(e).render(),
                crate::sink::Severity::Error,
            );
        }
    }
}

/// All boot operations, grouped in start-up order.
pub fn registry() -> BootRegistry {
    let mut registry = OperationRegistry::new();
    registry.register(GROUP_BOOT, "load_settings", load::load_settings);
    registry.register(GROUP_BOOT, "check_plugins_dir", plugins::check_plugins_dir);
    registry.register(
        GROUP_PREREQUISITES,
        "check_prerequisites",
        prerequisites::check_prerequisites,
    );
    registry.register(GROUP_PLUGINS, "check_plugins", plugins::check_plugins);
    registry.register(GROUP_VM, "detect_vm", vm::detect_vm);
    registry.register(GROUP_VM, "check_provision_status", vm::check_provision_status);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{StoredPlugin, StoredSettings};
    use crate::testing::{Harness, MemoryStore};

    #[tokio::test]
    async fn ensure_settings_loads_once_from_store() {
        let store = MemoryStore::with(StoredSettings {
            plugins: Some(vec![StoredPlugin {
                name_nice: "Drush".into(),
                path: "/plugins/drush".into(),
            }]),
            ..Default::default()
        });
        let harness = Harness::with_store(store);
        let mut ctx = harness.context(Path::new("/data"));

        let settings = ctx.ensure_settings().await.unwrap();
        assert_eq!(settings.plugins.len(), 1);
        settings.plugins.clear();

        // Already loaded: in-memory state wins over the store.
        assert!(ctx.ensure_settings().await.unwrap().plugins.is_empty());
    }

    #[tokio::test]
    async fn ensure_settings_reports_store_failure() {
        let harness = Harness::new();
        harness.store.fail_load("unreadable");
        let mut ctx = harness.context(Path::new("/data"));

        let failure = ctx.ensure_settings().await.unwrap_err();

        assert!(failure.render().contains("unreadable"));
    }

    #[test]
    fn groups_are_registered_in_start_up_order() {
        let registry = registry();
        assert_eq!(
            registry.group_names(),
            vec![GROUP_BOOT, GROUP_PREREQUISITES, GROUP_PLUGINS, GROUP_VM]
        );
        assert_eq!(
            registry.operation_names(GROUP_BOOT),
            Some(vec!["load_settings", "check_plugins_dir"])
        );
        assert_eq!(
            registry.operation_names(GROUP_VM),
            Some(vec!["detect_vm", "check_provision_status"])
        );
    }
}
