//! Application settings: the in-memory model and its persisted form.
//!
//! The persisted structs (`Stored*`) are what the settings store reads and
//! writes. [`Settings`] is built from them once per load, with missing
//! collections defaulted and host paths derived, and converts back for every
//! save. Runtime-only data such as a plugin's live instance exists only on
//! the in-memory side.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use facet::Facet;
use facet_value::{Value, value};

/// Persisted plugin entry.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct StoredPlugin {
    pub name_nice: String,
    pub path: String,
}

/// Persisted VM status.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct StoredVm {
    pub id: String,
    pub name: String,
    pub state: String,
    pub home: String,
    pub config: Option<Value>,
    pub needs_reprovision: bool,
}

/// Settings exactly as the store holds them. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Facet)]
#[facet(default)]
pub struct StoredSettings {
    pub plugins: Option<Vec<StoredPlugin>>,
    pub views: Option<Value>,
    pub vm: Option<StoredVm>,
}

/// Live handle of a booted plugin.
pub trait PluginHandle: fmt::Debug {
    fn name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct Plugin {
    pub name_nice: String,
    pub path: PathBuf,
    /// Runtime only; never persisted.
    pub instance: Option<Rc<dyn PluginHandle>>,
}

impl Plugin {
    pub fn new(name_nice: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name_nice: name_nice.into(),
            path: path.into(),
            instance: None,
        }
    }
}

impl PartialEq for Plugin {
    fn eq(&self, other: &Self) -> bool {
        self.name_nice == other.name_nice && self.path == other.path
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VmStatus {
    pub id: String,
    pub name: String,
    pub state: String,
    pub home: PathBuf,
    pub config: Option<Value>,
    pub needs_reprovision: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub plugins: Vec<Plugin>,
    /// view name → cached per-view state
    pub views: Value,
    pub vm: VmStatus,
    pub user_data_path: PathBuf,
    pub plugins_path: PathBuf,
}

/// Seed value for `views` when the store has none.
pub fn default_views() -> Value {
    value!({
        "dashboard": {},
        "settings": {},
    })
}

impl Settings {
    /// Build settings from stored data, defaulting absent collections.
    pub fn from_stored(stored: Option<StoredSettings>, user_data_path: &Path) -> Self {
        let stored = stored.unwrap_or_default();

        let plugins = stored
            .plugins
            .unwrap_or_default()
            .into_iter()
            .map(|p| Plugin::new(p.name_nice, p.path))
            .collect();

        let vm = stored
            .vm
            .map(|vm| VmStatus {
                id: vm.id,
                name: vm.name,
                state: vm.state,
                home: PathBuf::from(vm.home),
                config: vm.config,
                needs_reprovision: vm.needs_reprovision,
            })
            .unwrap_or_default();

        Self {
            plugins,
            views: stored.views.unwrap_or_else(default_views),
            vm,
            user_data_path: user_data_path.to_path_buf(),
            plugins_path: crate::paths::plugins_dir(user_data_path),
        }
    }

    /// Persisted form. Plugin instances and derived paths are left out.
    pub fn to_stored(&self) -> StoredSettings {
        StoredSettings {
            plugins: Some(
                self.plugins
                    .iter()
                    .map(|p| StoredPlugin {
                        name_nice: p.name_nice.clone(),
                        path: p.path.display().to_string(),
                    })
                    .collect(),
            ),
            views: Some(self.views.clone()),
            vm: Some(StoredVm {
                id: self.vm.id.clone(),
                name: self.vm.name.clone(),
                state: self.vm.state.clone(),
                home: self.vm.home.display().to_string(),
                config: self.vm.config.clone(),
                needs_reprovision: self.vm.needs_reprovision,
            }),
        }
    }

    /// Store `value` under `key` in the cached state of `view`.
    pub fn set_view_state(&mut self, view: &str, key: &str, value: Value) {
        if self.views.as_object().is_none() {
            self.views = default_views();
        }
        let Some(views) = self.views.as_object_mut() else {
            return;
        };
        let mut state = views.get(view).cloned().unwrap_or_else(|| value!({}));
        if let Some(obj) = state.as_object_mut() {
            obj.insert(key, value);
        }
        views.insert(view, state);
    }
}
