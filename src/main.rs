use anyhow::Result;
use forecourt::card::probe_card_reader;
use forecourt::input::probe_trigger;
use forecourt::{Config, Kiosk, KioskCommand, KioskHandle};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    forecourt::logging::init_logging(&config.logging)?;

    info!(
        "Forecourt {} starting up",
        option_env!("APP_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
    );

    // Hardware is probed once; failures select the fallback for the whole run
    let trigger = probe_trigger(&config.gpio, config.timing.key_release_timeout());
    let reader = probe_card_reader(&config.rfid).await;

    let kiosk = Kiosk::new(config, trigger, reader);
    let handle = kiosk.handle();

    let (stopped_tx, stopped_rx) = watch::channel(false);
    let web_handle = handle.clone();
    let web_task = tokio::spawn(async move {
        let mut stopped = stopped_rx;
        let shutdown = async move {
            let _ = stopped.wait_for(|s| *s).await;
        };
        if let Err(e) = forecourt::web::serve(web_handle, shutdown).await {
            error!("Web server error: {}", e);
        }
    });

    let signal_task = tokio::spawn(forward_signals(handle));

    let outcome = kiosk.run().await;
    let _ = stopped_tx.send(true);
    signal_task.abort();
    let _ = web_task.await;

    match outcome {
        Ok(_) => {
            info!("Kiosk shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Kiosk failed with error: {}", e);
            Err(anyhow::anyhow!("Kiosk error: {}", e))
        }
    }
}

/// Turn SIGINT/SIGTERM into the same exit command the UI sends
async fn forward_signals(handle: KioskHandle) {
    if let Err(e) = wait_for_signal().await {
        error!("Signal handlers unavailable, exit via the UI only: {}", e);
        return;
    }
    handle.send(KioskCommand::Exit);
}

async fn wait_for_signal() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received"),
        _ = sigterm.recv() => info!("SIGTERM received"),
    }
    Ok(())
}
