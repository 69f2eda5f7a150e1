//! Managed VM detection and provision status.

use std::path::PathBuf;

use facet_value::Value;

use crate::error::Failure;
use crate::settings::VmStatus;

use super::{BootContext, BootFuture};

/// One row of `vagrant global-status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub id: String,
    pub name: String,
    pub state: String,
    pub home: PathBuf,
}

/// Match a global-status row against the managed VM's name.
///
/// Rows are `id name provider state directory`. Only the name column is
/// compared, and it must equal `vm_name` exactly. A directory containing
/// spaces is rejoined with single spaces.
pub fn parse_status_line(line: &str, vm_name: &str) -> Option<StatusLine> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 || fields[1] != vm_name {
        return None;
    }
    Some(StatusLine {
        id: fields[0].to_string(),
        name: fields[1].to_string(),
        state: fields[3].to_string(),
        home: PathBuf::from(fields[4..].join(" ")),
    })
}

async fn load_vm_config(path: &std::path::Path) -> Result<Value, Failure> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        Failure::new(format!("Could not read VM config: {}", path.display()))
            .with_detail(format!("\t{e}"))
    })?;
    facet_yaml::from_str::<Value>(&contents).map_err(|e| {
        Failure::new(format!("Could not parse VM config: {}", path.display()))
            .with_detail(format!("\t{e}"))
    })
}

/// Find the managed VM in the hypervisor's global status and record it.
///
/// Output is streamed to the sink while the command runs and scanned once
/// it exits.
pub fn detect_vm(ctx: &mut BootContext) -> BootFuture<'_> {
    Box::pin(async move {
        let program = ctx.config.tools.vagrant.clone();
        let vm_name = ctx.config.vm.name.clone();

        let mut captured = Vec::new();
        let sink = ctx.sink.clone();
        let mut on_line = |line: &str| {
            sink.log(line);
            captured.push(line.to_string());
        };
        let exit_code = ctx
            .runner
            .stream(&program, &["global-status"], &mut on_line)
            .await
            .map_err(|e| {
                Failure::new(format!("Could not execute \"{program} global-status\"."))
                    .with_detail(format!("\t{e}"))
            })?;
        tracing::debug!(?exit_code, lines = captured.len(), "global-status finished");

        let Some(found) = captured
            .iter()
            .find_map(|line| parse_status_line(line, &vm_name))
        else {
            return Err(Failure::new(format!("Could not find managed VM \"{vm_name}\".")));
        };

        let config = load_vm_config(&found.home.join(&ctx.config.vm.config_file)).await?;

        tracing::info!(id = %found.id, state = %found.state, home = %found.home.display(), "managed VM found");
        let settings = ctx.ensure_settings().await?;
        let needs_reprovision = settings.vm.needs_reprovision;
        settings.vm = VmStatus {
            id: found.id,
            name: found.name,
            state: found.state,
            home: found.home,
            config: Some(config),
            needs_reprovision,
        };

        ctx.persist_or_report().await;
        Ok(())
    })
}

/// Show the reprovision notice once per context when the VM asks for it.
pub fn check_provision_status(ctx: &mut BootContext) -> BootFuture<'_> {
    Box::pin(async move {
        ctx.sink.log("Checking provision status.");

        let needs_reprovision = ctx.ensure_settings().await?.vm.needs_reprovision;
        if needs_reprovision && !ctx.reprovision_notice_shown {
            ctx.sink.notice(
                "The VM configuration has changed since it was last provisioned. Re-provision the VM to apply the changes.",
            );
            ctx.reprovision_notice_shown = true;
        }
        Ok(())
    })
}
