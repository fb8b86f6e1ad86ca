//! `switchboard watch`

use anyhow::{Context, Result};
use switchboard_core::{callback, Event, EventBus};
use tokio::sync::mpsc;
use tracing::info;

use crate::app::{config::AppConfig, connect_bus};

pub async fn run(config: &AppConfig) -> Result<()> {
    let bus = connect_bus(config).await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let subscription = bus
        .subscribe(callback(move |event| {
            let _ = tx.send(event.clone());
            Ok(())
        }))
        .await
        .context("Failed to subscribe to the event bus")?;
    info!(backend = %bus.backend(), "Watching events (Ctrl-C to stop)");

    loop {
        tokio::select! {
            Some(event) = rx.recv() => println!("{}", serde_json::to_string(&event)?),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    subscription.unsubscribe();
    Ok(())
}
