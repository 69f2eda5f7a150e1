use std::path::{Path, PathBuf};

use facet::Facet;

use crate::error::LunchboxError;

pub const DEFAULT_CONFIG_FILE: &str = "lunchbox.toml";

pub const DEFAULT_ROLES_MANIFEST: &str =
    "https://raw.githubusercontent.com/geerlingguy/drupal-vm/master/provisioning/requirements.yml";

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct AppConfig {
    /// Overrides the host data directory.
    pub data_dir: Option<String>,
    #[facet(default)]
    pub vm: VmConfig,
    #[facet(default)]
    pub tools: ToolsConfig,
    #[facet(default)]
    pub roles: RolesConfig,
    #[facet(default)]
    pub packages: PackagesConfig,
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct VmConfig {
    /// Machine name of the managed VM in `vagrant global-status`.
    #[facet(default = "drupalvm")]
    pub name: String,
    /// VM configuration file, relative to the VM's home directory.
    #[facet(default = "config.yml")]
    pub config_file: String,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            name: "drupalvm".into(),
            config_file: "config.yml".into(),
        }
    }
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct ToolsConfig {
    #[facet(default = "vagrant")]
    pub vagrant: String,
    #[facet(default = "vboxmanage")]
    pub vboxmanage: String,
    #[facet(default = "ansible")]
    pub ansible: String,
    #[facet(default = "ansible-galaxy")]
    pub ansible_galaxy: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            vagrant: "vagrant".into(),
            vboxmanage: "vboxmanage".into(),
            ansible: "ansible".into(),
            ansible_galaxy: "ansible-galaxy".into(),
        }
    }
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct RolesConfig {
    #[facet(default = "https://raw.githubusercontent.com/geerlingguy/drupal-vm/master/provisioning/requirements.yml")]
    pub manifest_url: String,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_ROLES_MANIFEST.into(),
        }
    }
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct PackagesConfig {
    /// Package manifest to verify; the check is skipped when unset.
    pub manifest: Option<String>,
    #[facet(default = "node_modules")]
    pub modules_dir: String,
    #[facet(default = "npm install")]
    pub install_command: String,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            manifest: None,
            modules_dir: "node_modules".into(),
            install_command: "npm install".into(),
        }
    }
}

impl AppConfig {
    /// Data directory: CLI override, then config, then the host default.
    pub fn resolve_data_dir(&self, cli_override: Option<&Path>) -> PathBuf {
        if let Some(dir) = cli_override {
            return dir.to_path_buf();
        }
        match &self.data_dir {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => crate::paths::user_data_dir(),
        }
    }
}

// ── validation ────────────────────────────────────────────

fn validate_config(config: &AppConfig) -> Result<(), LunchboxError> {
    let name = &config.vm.name;
    if name.is_empty() {
        return Err(LunchboxError::Validation {
            message: "vm.name must not be empty".into(),
        });
    }
    if name.chars().any(char::is_whitespace) {
        return Err(LunchboxError::Validation {
            message: format!("vm.name must not contain whitespace (got '{name}')"),
        });
    }

    if config.vm.config_file.is_empty() {
        return Err(LunchboxError::Validation {
            message: "vm.config_file must not be empty".into(),
        });
    }

    if !config.roles.manifest_url.starts_with("https://") {
        return Err(LunchboxError::Validation {
            message: format!(
                "roles.manifest_url must be an https:// URL (got '{}')",
                config.roles.manifest_url
            ),
        });
    }

    for (key, value) in [
        ("tools.vagrant", &config.tools.vagrant),
        ("tools.vboxmanage", &config.tools.vboxmanage),
        ("tools.ansible", &config.tools.ansible),
        ("tools.ansible_galaxy", &config.tools.ansible_galaxy),
    ] {
        if value.trim().is_empty() {
            return Err(LunchboxError::Validation {
                message: format!("{key} must not be empty"),
            });
        }
    }

    Ok(())
}

// ── public API ────────────────────────────────────────────

pub fn parse_config(contents: &str, path: &Path) -> Result<AppConfig, LunchboxError> {
    let config: AppConfig = facet_toml::from_str(contents).map_err(|e| LunchboxError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Load configuration.
///
/// An explicit path must exist. Without one, `lunchbox.toml` in the working
/// directory is used when present, otherwise the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, LunchboxError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                return Ok(AppConfig::default());
            }
            fallback
        }
    };

    let contents = std::fs::read_to_string(&path).map_err(|source| LunchboxError::ConfigLoad {
        path: path.display().to_string(),
        source,
    })?;

    parse_config(&contents, &path)
}
