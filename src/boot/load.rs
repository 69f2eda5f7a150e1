use crate::error::Failure;
use crate::settings::Settings;

use super::{BootContext, BootFuture};

/// Load persisted settings and install them in the context.
///
/// Only a store failure rejects; absent fields are defaulted.
pub fn load_settings(ctx: &mut BootContext) -> BootFuture<'_> {
    Box::pin(async move {
        ctx.sink.log("Loading Lunchbox settings.");

        let stored = ctx.store.load().await.map_err(Failure::from)?;
        let settings = Settings::from_stored(stored, &ctx.data_dir);

        tracing::info!(
            plugins = settings.plugins.len(),
            data_dir = %settings.user_data_path.display(),
            "settings loaded"
        );
        ctx.settings = Some(settings);
        Ok(())
    })
}
