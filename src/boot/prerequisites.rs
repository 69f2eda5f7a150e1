//! Host prerequisite checks.
//!
//! Packages, then every required tool in list order, then the optional
//! provisioning roles. All of it runs as one nested [`TaskChain`], so the
//! first failure stops the rest.

use std::path::{Path, PathBuf};

use regex::RegexBuilder;

use crate::chain::TaskChain;
use crate::config::ToolsConfig;
use crate::error::Failure;
use crate::manifest::{self, FetchError};
use crate::packages;
use crate::version;

use super::{BootContext, BootFuture};

/// Installation help attached to a missing-tool failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Help {
    None,
    /// Same text on every host.
    Generic(&'static str),
    /// Keyed by `std::env::consts::OS`; hosts without an entry get nothing.
    PerPlatform(&'static [(&'static str, &'static [&'static str])]),
}

impl Help {
    pub fn lines(&self, os: &str) -> Vec<&'static str> {
        match self {
            Help::None => Vec::new(),
            Help::Generic(text) => vec![*text],
            Help::PerPlatform(table) => table
                .iter()
                .find(|(key, _)| *key == os)
                .map(|(_, lines)| lines.to_vec())
                .unwrap_or_default(),
        }
    }
}

const VAGRANT_HELP: &[(&str, &[&str])] = &[
    (
        "macos",
        &[
            "Vagrant can be installed via a binary: http://www.vagrantup.com/downloads, or",
            "using Homebrew: http://sourabhbajaj.com/mac-setup/Vagrant/README.html",
        ],
    ),
    (
        "linux",
        &[
            "Vagrant can be installed via a binary: http://www.vagrantup.com/downloads, or",
            "via command line: http://www.olindata.com/blog/2014/07/installing-vagrant-and-virtual-box-ubuntu-1404-lts",
        ],
    ),
    (
        "windows",
        &["Vagrant can be installed via a binary: http://www.vagrantup.com/downloads"],
    ),
];

/// One external tool that must be installed.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub name: &'static str,
    pub check_command: String,
    /// Case-insensitive; capture group 1 is the version.
    pub version_pattern: Option<&'static str>,
    pub min_version: &'static str,
    pub help: Help,
}

/// The required tools, in the order they are checked.
pub fn requirements(tools: &ToolsConfig) -> Vec<Requirement> {
    let plugin_list = format!("{} plugin list", tools.vagrant);
    vec![
        Requirement {
            name: "VirtualBox",
            check_command: format!("{} --version", tools.vboxmanage),
            version_pattern: Some(r"(\d+\.\d+\.\d+)"),
            min_version: "5.0.10",
            help: Help::None,
        },
        Requirement {
            name: "Vagrant",
            check_command: format!("{} --version", tools.vagrant),
            version_pattern: Some(r"Vagrant (\d+\.\d+\.\d+)"),
            min_version: "1.7.4",
            help: Help::PerPlatform(VAGRANT_HELP),
        },
        Requirement {
            name: "Vagrant VBGuest Plugin",
            check_command: plugin_list.clone(),
            version_pattern: Some(r"vagrant-vbguest \((\d+\.\d+\.\d+)\)"),
            min_version: "0.11.0",
            help: Help::Generic(
                "Vagrant VBGuest Plugin can be installed by running 'vagrant plugin install vagrant-vbguest'.",
            ),
        },
        Requirement {
            name: "Vagrant HostsUpdater Plugin",
            check_command: plugin_list,
            version_pattern: Some(r"vagrant-hostsupdater \((\d+\.\d+\.\d+)\)"),
            min_version: "1.0.1",
            help: Help::Generic(
                "Vagrant HostsUpdater Plugin can be installed by running 'vagrant plugin install vagrant-hostsupdater'.",
            ),
        },
    ]
}

/// Build the prerequisite chain: packages, each requirement, then roles.
pub fn prerequisite_chain(
    requirements: Vec<Requirement>,
) -> TaskChain<BootContext, (), Failure> {
    let mut chain: TaskChain<BootContext, (), Failure> = TaskChain::new();
    chain.push(|ctx| Box::pin(check_packages(ctx)));
    for requirement in requirements {
        chain.push(move |ctx| Box::pin(check_software(ctx, requirement)));
    }
    chain.push(|ctx| Box::pin(check_roles(ctx)));
    chain
}

pub fn check_prerequisites(ctx: &mut BootContext) -> BootFuture<'_> {
    let chain = prerequisite_chain(requirements(&ctx.config.tools));
    Box::pin(async move { chain.run(ctx).await })
}

fn modules_dir(manifest: &Path, modules_dir: &str) -> PathBuf {
    let modules = PathBuf::from(modules_dir);
    if modules.is_absolute() {
        return modules;
    }
    manifest
        .parent()
        .map(|parent| parent.join(&modules))
        .unwrap_or(modules)
}

async fn check_packages(ctx: &mut BootContext) -> Result<(), Failure> {
    let Some(manifest) = ctx.config.packages.manifest.as_deref() else {
        tracing::debug!("no package manifest configured; skipping package check");
        ctx.sink
            .log("No package manifest configured; skipping package check.");
        return Ok(());
    };
    let manifest = PathBuf::from(manifest);
    let modules = modules_dir(&manifest, &ctx.config.packages.modules_dir);

    let unmet = packages::unmet_dependencies(&manifest, &modules)
        .await
        .map_err(Failure::from)?;
    if unmet.is_empty() {
        return Ok(());
    }

    let details = unmet.iter().map(|p| match &p.installed {
        Some(found) => format!("\t{} {} (found {found})", p.name, p.required),
        None => format!("\t{} {} (not installed)", p.name, p.required),
    });
    Err(Failure::new(format!(
        "Unmet package dependencies. Please run \"{}\" in the project directory.",
        ctx.config.packages.install_command
    ))
    .with_details(details))
}

fn missing_tool(requirement: &Requirement, stderr: &str) -> Failure {
    Failure::new(format!(
        "Could not find {}; ensure it is installed and available in PATH.",
        requirement.name
    ))
    .with_detail(format!("\tTried to execute: {}", requirement.check_command))
    .with_detail(format!("\tGot error: {}", stderr.trim_end()))
    .with_details(requirement.help.lines(std::env::consts::OS))
}

async fn check_software(ctx: &mut BootContext, requirement: Requirement) -> Result<(), Failure> {
    let output = match ctx.runner.exec(&requirement.check_command).await {
        Ok(output) => output,
        Err(e) => return Err(missing_tool(&requirement, &e.to_string())),
    };
    if !output.success() {
        return Err(missing_tool(&requirement, &output.stderr));
    }

    if let Some(pattern) = requirement.version_pattern {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Failure::new(format!("Invalid version pattern for {}: {e}", requirement.name)))?;

        let Some(found) = version::extract(&regex, &output.stdout) else {
            return Err(Failure::new(format!(
                "{} was found, but the version could not be determined.",
                requirement.name
            )));
        };

        if !version::satisfies(&found, requirement.min_version) {
            return Err(Failure::new(format!(
                "{name} was found, but a newer version is required. Please upgrade {name} to version {min} or higher.",
                name = requirement.name,
                min = requirement.min_version,
            ))
            .with_detail(format!("\tFound version: {found}")));
        }

        tracing::info!(tool = requirement.name, version = %found, "tool found");
        ctx.found_versions
            .insert(requirement.name.to_string(), found);
    }

    ctx.sink.log(&format!("{} found.", requirement.name));
    Ok(())
}

async fn check_roles(ctx: &mut BootContext) -> Result<(), Failure> {
    let version_cmd = format!("{} --version", ctx.config.tools.ansible);
    match ctx.runner.exec(&version_cmd).await {
        Ok(output) if output.success() => {}
        _ => {
            tracing::debug!("ansible not installed; skipping role check");
            return Ok(());
        }
    }

    ctx.sink.log("Ansible found. Checking role requirements.");

    let url = ctx.config.roles.manifest_url.clone();
    let manifest = ctx.fetcher.fetch(&url).await.map_err(|e| match e {
        FetchError::Status(status) => {
            tracing::warn!(%url, status, "role manifest request failed");
            Failure::new("Could not get list of ansible roles. Expected list to be available at:")
                .with_detail(format!("\t{url}"))
        }
        FetchError::Transport(message) => {
            Failure::new("Could not parse list of ansible roles. Received error:")
                .with_detail(format!("\t{message}"))
        }
    })?;
    let required = manifest::parse_required_roles(&manifest);

    let list_command = format!("{} list", ctx.config.tools.ansible_galaxy);
    let listing = match ctx.runner.exec(&list_command).await {
        Ok(output) if output.success() => output.stdout,
        _ => return Err(Failure::new("Could not execute \"ansible-galaxy list\".")),
    };
    let installed = manifest::parse_installed_roles(&listing);

    let missing = manifest::missing_roles(&required, &installed);
    if missing.is_empty() {
        return Ok(());
    }

    Err(
        Failure::new("The following required ansible-galaxy roles are missing:")
            .with_details(missing.iter().map(|role| format!("\t{role}")))
            .with_detail(
                "This can be fixed by running \"ansible-galaxy install\" as specified in the DrupalVM quickstart:",
            )
            .with_detail("\t https://github.com/geerlingguy/drupal-vm")
            .with_detail(
                "If you encounter the \"Error: cannot find role\" issue, ensure that /etc/ansible/roles is owned by your user.",
            ),
    )
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::testing::{Harness, failed_output, ok_output};

    const MANIFEST: &str = "---\n- src: geerlingguy.apache\n- src: geerlingguy.mysql\n- src: geerlingguy.php\n";

    fn all_tools_present(harness: &Harness) {
        harness
            .runner
            .on_exec("vboxmanage --version", ok_output("5.0.14r105127\n"))
            .on_exec("vagrant --version", ok_output("Vagrant 1.8.1\n"))
            .on_exec(
                "vagrant plugin list",
                ok_output("vagrant-hostsupdater (1.0.2)\nvagrant-vbguest (0.11.0)\n"),
            );
    }

    #[test]
    fn per_platform_help_picks_host_entry() {
        let help = Help::PerPlatform(VAGRANT_HELP);
        assert_eq!(help.lines("windows").len(), 1);
        assert_eq!(help.lines("linux").len(), 2);
        assert!(help.lines("freebsd").is_empty());
        assert_eq!(Help::Generic("x").lines("linux"), vec!["x"]);
    }

    #[test]
    fn requirements_follow_configured_executables() {
        let tools = ToolsConfig {
            vagrant: "/opt/vagrant/bin/vagrant".into(),
            ..ToolsConfig::default()
        };
        let commands: Vec<String> = requirements(&tools)
            .into_iter()
            .map(|r| r.check_command)
            .collect();
        assert_eq!(
            commands,
            vec![
                "vboxmanage --version",
                "/opt/vagrant/bin/vagrant --version",
                "/opt/vagrant/bin/vagrant plugin list",
                "/opt/vagrant/bin/vagrant plugin list",
            ]
        );
    }

    #[tokio::test]
    async fn all_present_without_ansible_succeeds() {
        let harness = Harness::new();
        all_tools_present(&harness);
        let mut ctx = harness.loaded_context(Path::new("/data"));

        check_prerequisites(&mut ctx).await.unwrap();

        assert_eq!(ctx.found_versions.get("VirtualBox").unwrap(), "5.0.14");
        assert_eq!(ctx.found_versions.get("Vagrant").unwrap(), "1.8.1");
        assert!(harness.sink.contains("Vagrant HostsUpdater Plugin found."));
        assert!(!harness.sink.contains("Ansible found."));
        assert!(harness.fetcher.urls().is_empty());
        assert!(harness.sink.contains("skipping package check"));
    }

    #[tokio::test]
    async fn missing_tool_reports_command_and_stderr() {
        let harness = Harness::new();
        harness
            .runner
            .on_exec("vboxmanage --version", failed_output("vboxmanage: command not found\n"));
        let mut ctx = harness.loaded_context(Path::new("/data"));

        let failure = check_prerequisites(&mut ctx).await.unwrap_err();

        assert_eq!(
            failure.summary,
            "Could not find VirtualBox; ensure it is installed and available in PATH."
        );
        assert_eq!(failure.detail_lines[0], "\tTried to execute: vboxmanage --version");
        assert_eq!(failure.detail_lines[1], "\tGot error: vboxmanage: command not found");
        // Later checks never ran.
        assert_eq!(harness.runner.calls(), vec!["vboxmanage --version"]);
    }

    #[tokio::test]
    async fn missing_plugin_carries_generic_help() {
        let harness = Harness::new();
        harness
            .runner
            .on_exec("vboxmanage --version", ok_output("5.0.10\n"))
            .on_exec("vagrant --version", ok_output("Vagrant 1.7.4\n"))
            .on_exec("vagrant plugin list", ok_output("vagrant-hostsupdater (1.0.2)\n"));
        let mut ctx = harness.loaded_context(Path::new("/data"));

        let failure = check_prerequisites(&mut ctx).await.unwrap_err();

        assert_eq!(
            failure.summary,
            "Vagrant VBGuest Plugin was found, but the version could not be determined."
        );
    }

    #[tokio::test]
    async fn outdated_tool_requires_upgrade() {
        let harness = Harness::new();
        harness
            .runner
            .on_exec("vboxmanage --version", ok_output("5.0.10\n"))
            .on_exec("vagrant --version", ok_output("Vagrant 1.6.0\n"));
        let mut ctx = harness.loaded_context(Path::new("/data"));

        let failure = check_prerequisites(&mut ctx).await.unwrap_err();

        assert_eq!(
            failure.summary,
            "Vagrant was found, but a newer version is required. Please upgrade Vagrant to version 1.7.4 or higher."
        );
        assert_eq!(failure.detail_lines, vec!["\tFound version: 1.6.0"]);
        assert!(!ctx.found_versions.contains_key("Vagrant"));
    }

    #[tokio::test]
    async fn version_match_is_case_insensitive() {
        let harness = Harness::new();
        all_tools_present(&harness);
        harness
            .runner
            .on_exec("vagrant --version", ok_output("vagrant 1.7.10\n"));
        let mut ctx = harness.loaded_context(Path::new("/data"));

        check_prerequisites(&mut ctx).await.unwrap();

        assert_eq!(ctx.found_versions.get("Vagrant").unwrap(), "1.7.10");
    }

    #[tokio::test]
    async fn missing_roles_are_listed() {
        let harness = Harness::new();
        all_tools_present(&harness);
        harness
            .runner
            .on_exec("ansible --version", ok_output("ansible 2.0.0.2\n"))
            .on_exec(
                "ansible-galaxy list",
                ok_output("- geerlingguy.apache, 1.0.0\n- geerlingguy.php, 2.1.0\n"),
            );
        harness.fetcher.respond(Ok(MANIFEST.into()));
        let mut ctx = harness.loaded_context(Path::new("/data"));

        let failure = check_prerequisites(&mut ctx).await.unwrap_err();

        assert_eq!(
            failure.summary,
            "The following required ansible-galaxy roles are missing:"
        );
        assert_eq!(failure.detail_lines[0], "\tgeerlingguy.mysql");
        assert!(failure.detail_lines[1].starts_with("This can be fixed by running"));
        assert!(harness.sink.contains("Ansible found. Checking role requirements."));
        assert_eq!(
            harness.fetcher.urls(),
            vec![ctx.config.roles.manifest_url.clone()]
        );
    }

    #[tokio::test]
    async fn all_roles_installed_succeeds() {
        let harness = Harness::new();
        all_tools_present(&harness);
        harness
            .runner
            .on_exec("ansible --version", ok_output("ansible 2.0.0.2\n"))
            .on_exec(
                "ansible-galaxy list",
                ok_output(
                    "- geerlingguy.apache, 1.0.0\n- geerlingguy.mysql, 2.0.0\n- geerlingguy.php, 2.1.0\n",
                ),
            );
        harness.fetcher.respond(Ok(MANIFEST.into()));
        let mut ctx = harness.loaded_context(Path::new("/data"));

        check_prerequisites(&mut ctx).await.unwrap();
    }

    #[tokio::test]
    async fn manifest_status_error_names_url() {
        let harness = Harness::new();
        all_tools_present(&harness);
        harness
            .runner
            .on_exec("ansible --version", ok_output("ansible 2.0.0.2\n"));
        harness.fetcher.respond(Err(FetchError::Status(404)));
        let mut ctx = harness.loaded_context(Path::new("/data"));

        let failure = check_prerequisites(&mut ctx).await.unwrap_err();

        assert_eq!(
            failure.summary,
            "Could not get list of ansible roles. Expected list to be available at:"
        );
        assert_eq!(
            failure.detail_lines,
            vec![format!("\t{}", ctx.config.roles.manifest_url)]
        );
    }

    #[tokio::test]
    async fn manifest_transport_error_is_surfaced() {
        let harness = Harness::new();
        all_tools_present(&harness);
        harness
            .runner
            .on_exec("ansible --version", ok_output("ansible 2.0.0.2\n"));
        harness
            .fetcher
            .respond(Err(FetchError::Transport("connection reset".into())));
        let mut ctx = harness.loaded_context(Path::new("/data"));

        let failure = check_prerequisites(&mut ctx).await.unwrap_err();

        assert_eq!(failure.detail_lines, vec!["\tconnection reset"]);
    }

    #[tokio::test]
    async fn galaxy_list_failure_rejects() {
        let harness = Harness::new();
        all_tools_present(&harness);
        harness
            .runner
            .on_exec("ansible --version", ok_output("ansible 2.0.0.2\n"));
        harness.fetcher.respond(Ok(MANIFEST.into()));
        let mut ctx = harness.loaded_context(Path::new("/data"));

        let failure = check_prerequisites(&mut ctx).await.unwrap_err();

        assert_eq!(failure.summary, "Could not execute \"ansible-galaxy list\".");
    }

    #[tokio::test]
    async fn unmet_packages_fail_before_tools() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("package.json");
        std::fs::write(&manifest, r#"{"dependencies": {"q": "^1.4.1"}}"#).unwrap();

        let mut harness = Harness::new();
        harness.config.packages.manifest = Some(manifest.display().to_string());
        let mut ctx = harness.loaded_context(dir.path());

        let failure = check_prerequisites(&mut ctx).await.unwrap_err();

        assert_eq!(
            failure.summary,
            "Unmet package dependencies. Please run \"npm install\" in the project directory."
        );
        assert_eq!(failure.detail_lines, vec!["\tq ^1.4.1 (not installed)"]);
        assert!(harness.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn satisfied_packages_continue_to_tools() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("package.json");
        std::fs::write(&manifest, r#"{"dependencies": {"q": "^1.4.1"}}"#).unwrap();
        let q = dir.path().join("node_modules").join("q");
        std::fs::create_dir_all(&q).unwrap();
        std::fs::write(q.join("package.json"), r#"{"version": "1.4.1"}"#).unwrap();

        let mut harness = Harness::new();
        harness.config.packages.manifest = Some(manifest.display().to_string());
        all_tools_present(&harness);
        let mut ctx = harness.loaded_context(dir.path());

        check_prerequisites(&mut ctx).await.unwrap();
    }
}
