use crate::error::Failure;

use super::{BootContext, BootFuture};

/// Create `path` owner-only. Missing parents get default permissions.
async fn create_private_dir(path: &std::path::Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut builder = tokio::fs::DirBuilder::new();
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(path).await
}

/// Make sure the plugins directory exists, creating it owner-only if not.
pub fn check_plugins_dir(ctx: &mut BootContext) -> BootFuture<'_> {
    Box::pin(async move {
        ctx.sink.log("Checking for plugins.");
        let path = ctx.ensure_settings().await?.plugins_path.clone();

        let is_dir = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_dir {
            ctx.sink
                .log(&format!("Found plugins directory: {}.", path.display()));
            return Ok(());
        }

        ctx.sink
            .log("Plugins directory not found; attempting to create.");
        if let Err(e) = create_private_dir(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "creating plugins directory failed");
            return Err(
                Failure::new(format!("Could not create plugins directory: {}", path.display()))
                    .with_detail(format!("\t{e}")),
            );
        }

        tracing::info!(path = %path.display(), "created plugins directory");
        ctx.sink
            .log(&format!("Created plugins directory: {}.", path.display()));
        Ok(())
    })
}

/// Drop plugins whose directories are gone, then persist the survivors.
///
/// A missing plugin is not a failure.
pub fn check_plugins(ctx: &mut BootContext) -> BootFuture<'_> {
    Box::pin(async move {
        let plugins = ctx.ensure_settings().await?.plugins.clone();
        if plugins.is_empty() {
            return Ok(());
        }

        let mut found = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            ctx.sink
                .log(&format!("Checking plugin: {}.", plugin.name_nice));

            let present = tokio::fs::metadata(&plugin.path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if present {
                found.push(plugin);
            } else {
                tracing::warn!(plugin = %plugin.name_nice, path = %plugin.path.display(), "removing missing plugin");
                ctx.sink.log(&format!(
                    "Plugin files not found in {}. Removing plugin.",
                    plugin.path.display()
                ));
            }
        }

        ctx.settings_mut()?.plugins = found;
        ctx.persist_or_report().await;
        Ok(())
    })
}
