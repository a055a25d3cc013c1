//! Scene engine host
//!
//! Loads `res_scene.yaml`, brings up an in-process host with simulated
//! devices, restores stored scenes and serves the `res_scene.*` services
//! until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use res_scene::{hass_directory, register_services, scene_store, Host, SceneManager};
use res_scene_config::{load_config, ResSceneConfig, CONFIG_FILE};
use res_scene_core::Context;
use res_scene_hass::{EntityEntry, Hass};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Create the configured entities and their registry entries
fn seed_entities(hass: &Hass, config: &ResSceneConfig) -> Result<()> {
    for seed in &config.entities {
        let entity_id = seed.entity_id()?;

        let mut entry = EntityEntry::new(entity_id.clone());
        if let Some(area) = &seed.area {
            entry = entry.with_area(area);
        }
        for label in &seed.labels {
            entry = entry.with_label(label);
        }
        hass.entities.register(entry);

        let attributes = seed
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        hass.states
            .set(entity_id, seed.state.clone(), attributes, Context::new());
    }
    info!(count = config.entities.len(), "Seeded entities");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(config_dir = %config.config_dir.display(), "Starting scene engine");

    let hass = Hass::new(&config.config_dir);
    hass.install_virtual_devices(config.device_latency())?;
    seed_entities(&hass, &config)?;

    let host = Host::from_hass(&hass);
    let manager = Arc::new(
        SceneManager::load(
            host.clone(),
            Arc::new(scene_store(&hass.storage)),
            config.engine_settings(),
        )
        .await?,
    );
    manager.set_user_options(config.user_options());
    manager.restore_all().await;

    register_services(
        &hass.services,
        manager.clone(),
        hass_directory(&hass),
        host.status.clone(),
    )?;

    info!(scenes = manager.len().await, "Scene engine is running");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    Ok(())
}
