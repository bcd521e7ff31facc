mod config;
mod dbus;
mod error;
mod player;

use crate::config::Settings;
use crate::error::App;
use crate::player::Audio;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming};
use log::{error, info, warn};
use std::path::PathBuf;
use tokio::fs;
use tokio::{
    sync::{mpsc, watch},
    task,
};

#[tokio::main]
async fn main() -> Result<(), App> {
    let home_dir = std::env::var("HOME").map_err(|e| {
        App::Io(
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Failed to get HOME environment variable: {e}"),
            )
            .to_string(),
        )
    })?;
    let base_dir = PathBuf::from(format!("{home_dir}/.config/tunequiz"));
    let log_dir = base_dir.join("logs");

    for dir in [&base_dir, &log_dir] {
        fs::create_dir_all(dir).await?;
    }

    let settings = Settings::load_or_create(&base_dir.join("config.toml")).await?;

    Logger::try_with_str(&settings.log_level)?
        .log_to_file(FileSpec::default().directory(&log_dir))
        .rotate(
            Criterion::Size(1_000_000),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(3),
        )
        .duplicate_to_stderr(Duplicate::None)
        .start()?;

    if !player::source::tool_available(&settings.resolver).await {
        warn!(
            "Resolver {} not found, every load will fail until it is installed",
            settings.resolver
        );
    }

    let (stop_sender, stop_receiver) = watch::channel(());
    let _audio_player = start_player_and_dbus_listener(settings, stop_sender)?;
    wait_for_stop_signal(stop_receiver).await;
    info!("tunequiz exiting");
    Ok(())
}

async fn wait_for_stop_signal(mut stop_receiver: watch::Receiver<()>) {
    tokio::select! {
        result = stop_receiver.changed() => {
            if result.is_err() {
                warn!("Stop signal sender dropped");
            }
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Interrupted");
        }
    }
}

fn start_player_and_dbus_listener(
    settings: Settings,
    stop_signal: watch::Sender<()>,
) -> Result<Audio, App> {
    let (command_sender, command_receiver) = mpsc::channel(1);

    let audio_player = Audio::new(settings)?;
    audio_player.start(command_receiver, stop_signal.subscribe())?;

    task::spawn({
        let stop_signal = stop_signal.clone();
        async move {
            if let Err(e) = dbus::run_dbus_server(command_sender, stop_signal.clone()).await {
                error!("DBus server error: {}", e);
                // Without the bus nobody can reach the player.
                let _ = stop_signal.send(());
            }
        }
    });

    Ok(audio_player)
}
