use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use vigil_source::ChannelSource;
use vigil_types::ChannelHandle;

/// Resolve the configured channel names against the dialogs visible to the
/// authenticated session. Runs once at startup.
///
/// The dialog scan stops as soon as every requested name has been matched.
/// Names that stay unmatched are reported as warnings; an empty result is a
/// configuration error and the engine must not start.
pub async fn resolve_channels<S: ChannelSource>(
    source: &S,
    names: &[String],
) -> Result<Vec<ChannelHandle>> {
    let dialogs = source.dialogs().await.context("listing dialogs")?;

    let mut found: Vec<ChannelHandle> = Vec::new();
    for dialog in dialogs {
        if names.contains(&dialog.name) && !found.iter().any(|c| c.name == dialog.name) {
            info!(channel = %dialog.name, id = dialog.id, "resolved channel");
            found.push(dialog);
            if found.len() == names.len() {
                break;
            }
        }
    }

    let missing: Vec<&str> = names
        .iter()
        .filter(|name| !found.iter().any(|c| &c.name == *name))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        warn!(?missing, "channels not visible to this session");
    }

    if found.is_empty() {
        bail!("none of the configured channels are visible to this session");
    }

    // configuration order, not dialog-list order
    let ordered = names
        .iter()
        .filter_map(|name| found.iter().find(|c| &c.name == name).cloned())
        .collect();
    Ok(ordered)
}
