use anyhow::Context;
use clap::Parser;
use miband_stream::domain::settings::SettingsService;
use miband_stream::infrastructure::logging;
use miband_stream::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// Stream raw accelerometer samples from a Mi Band 2
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Bluetooth address of the band; defaults to the one in the settings file
    address: Option<String>,

    /// Settings file (defaults to the per-user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// First-time binding: hand the key to the band before the challenge
    #[arg(long)]
    init: bool,

    /// Print every decoded record instead of the last one per packet
    #[arg(long)]
    every_record: bool,

    /// Stop after this many seconds (default: until Ctrl-C)
    #[arg(long)]
    duration: Option<u64>,
}

/// Resolves on Ctrl-C or once `duration` has passed
async fn stop_requested(duration: Option<Duration>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl-C: {}", e);
            // no handler: only the duration can end the stream
            std::future::pending::<()>().await;
        }
    };
    match duration {
        Some(duration) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = tokio::time::sleep(duration) => {}
            }
        }
        None => ctrl_c.await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => SettingsService::from_path(path.clone()),
        None => SettingsService::new()?,
    };
    let _log_guard = logging::init_logger(&settings.get().log_settings)?;
    info!("Starting Mi Band stream");

    let address = match args.address.clone() {
        Some(address) => {
            settings.set_address(&address)?;
            address
        }
        None => settings
            .get()
            .device
            .address
            .clone()
            .context("no band address given and none saved in the settings file")?,
    };

    let mut config = SessionConfig::from(&settings.get().session);
    if args.every_record {
        config.callback_delivery = CallbackDelivery::EveryRecord;
    }

    let transport = BtleTransport::connect(&address)
        .await
        .with_context(|| format!("connecting to {}", address))?;
    let mut session = Session::connect(transport, Aes128Ecb, config).await?;

    if args.init {
        session.initialize().await?;
    } else {
        session.reauthenticate().await?;
    }

    let stop = session.stop_handle();
    let duration = args.duration.map(Duration::from_secs);
    tokio::spawn(async move {
        stop_requested(duration).await;
        info!("Stopping...");
        stop.stop();
    });

    let callback: SampleCallback = Box::new(|sample| match serde_json::to_string(&sample) {
        Ok(line) => println!("{}", line),
        Err(e) => error!("Could not encode sample: {}", e),
    });
    session.start_streaming(Some(callback)).await?;

    info!(
        "Stream stopped, {} sample(s) left in the queue",
        session.sample_queue().len()
    );
    session.into_transport().disconnect().await?;
    Ok(())
}
