use anyhow::{Context, Result};
use shared::domain::{OperatorId, OperatorSettings};
use storage::RecordStore;
use tracing::info;

/// Reads the operator's settings, writing the defaults on first use.
pub async fn load_or_init_settings(
    store: &dyn RecordStore,
    operator_id: &OperatorId,
) -> Result<OperatorSettings> {
    if let Some(settings) = store
        .get_settings(operator_id)
        .await
        .with_context(|| format!("failed to read settings for {operator_id}"))?
    {
        return Ok(settings);
    }

    let defaults = OperatorSettings::default();
    store
        .put_settings(operator_id, &defaults)
        .await
        .with_context(|| format!("failed to initialize settings for {operator_id}"))?;
    info!(%operator_id, "initialized default operator settings");
    Ok(defaults)
}

pub async fn save_settings(
    store: &dyn RecordStore,
    operator_id: &OperatorId,
    settings: &OperatorSettings,
) -> Result<()> {
    store
        .put_settings(operator_id, settings)
        .await
        .with_context(|| format!("failed to save settings for {operator_id}"))
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
