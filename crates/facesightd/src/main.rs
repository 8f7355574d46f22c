use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod source;

use config::Config;
use dbus_interface::FaceSightService;
use engine::FaceEngine;
use source::ImageSource;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facesightd starting");

    let config = Config::from_env();
    let capability = facesight_hw::probe(config.force_cpu);
    tracing::info!(
        accelerator = ?capability.accelerator_kind,
        devices = capability.device_count,
        providers = ?capability.providers,
        "capability probe complete"
    );

    let engine = Arc::new(FaceEngine::new(config, capability));
    engine
        .initialize()
        .await
        .context("model initialization failed")?;

    let source = ImageSource::new().context("http client setup failed")?;
    let service = FaceSightService::new(engine, source);

    let _connection = zbus::connection::Builder::session()?
        .name("org.freedesktop.FaceSight1")?
        .serve_at("/org/freedesktop/FaceSight1", service)?
        .build()
        .await
        .context("failed to claim D-Bus name")?;

    tracing::info!("facesightd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("facesightd shutting down");

    Ok(())
}
