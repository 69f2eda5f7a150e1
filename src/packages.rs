//! Local package dependency consistency.
//!
//! A manifest declares `dependencies: { name: requirement }`. Every declared
//! package must be installed under the modules directory, with its own
//! manifest reporting a version not older than the requirement.

use std::collections::BTreeMap;
use std::path::Path;

use facet::Facet;

use crate::error::LunchboxError;
use crate::version;

#[derive(Debug, Default, Facet)]
#[facet(default)]
struct PackageManifest {
    #[facet(default)]
    dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Default, Facet)]
#[facet(default)]
struct InstalledPackage {
    #[facet(default)]
    version: String,
}

/// A declared dependency that is not satisfied on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetPackage {
    pub name: String,
    pub required: String,
    /// `None` when the package is not installed at all.
    pub installed: Option<String>,
}

/// Minimum version encoded in a requirement such as `^1.2.0` or `>=0.4`.
///
/// Requirements without a leading number (`*`, `latest`, URLs) only demand
/// presence and yield `None`.
fn minimum_version(requirement: &str) -> Option<&str> {
    let trimmed = requirement
        .trim()
        .trim_start_matches(['^', '~', '=', '>', 'v', ' ']);
    let first = trimmed.split_whitespace().next()?;
    first.starts_with(|c: char| c.is_ascii_digit()).then_some(first)
}

async fn read_optional(path: &Path) -> Result<Option<String>, LunchboxError> {
    match tokio::fs::read_to_string(path).await {
        Ok(c) => Ok(Some(c)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LunchboxError::Io {
            context: format!("reading {}", path.display()),
            source,
        }),
    }
}

fn parse_error(path: &Path, message: String) -> LunchboxError {
    LunchboxError::ConfigParse {
        path: path.display().to_string(),
        message,
    }
}

/// Check every dependency declared in `manifest` against `modules_dir`.
pub async fn unmet_dependencies(
    manifest: &Path,
    modules_dir: &Path,
) -> Result<Vec<UnmetPackage>, LunchboxError> {
    let Some(contents) = read_optional(manifest).await? else {
        return Err(LunchboxError::Io {
            context: format!("package manifest not found: {}", manifest.display()),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        });
    };
    let declared: PackageManifest =
        facet_json::from_str(&contents).map_err(|e| parse_error(manifest, e.to_string()))?;

    let mut unmet = Vec::new();
    for (name, required) in declared.dependencies {
        let installed_manifest = modules_dir.join(&name).join("package.json");
        let installed = match read_optional(&installed_manifest).await? {
            Some(contents) => {
                let package: InstalledPackage = facet_json::from_str(&contents)
                    .map_err(|e| parse_error(&installed_manifest, e.to_string()))?;
                Some(package.version)
            }
            None => None,
        };

        let ok = match (&installed, minimum_version(&required)) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(found), Some(min)) => version::satisfies(found, min),
        };
        if !ok {
            tracing::debug!(package = %name, %required, ?installed, "unmet dependency");
            unmet.push(UnmetPackage {
                name,
                required,
                installed,
            });
        }
    }
    Ok(unmet)
}
