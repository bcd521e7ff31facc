use log::info;
use tokio::sync::{mpsc, oneshot, watch};
use zbus::{fdo, interface, ConnectionBuilder};

use crate::player::Command;

pub const SERVICE_NAME: &str = "org.tunequiz.Player";
pub const OBJECT_PATH: &str = "/org/tunequiz/Player";

#[derive(Clone)]
pub struct PlayerDBus {
    tx: mpsc::Sender<Command>,
    stop_signal: watch::Sender<()>,
}

impl PlayerDBus {
    async fn send(&self, command: Command) -> fdo::Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| fdo::Error::Failed("Player is shutting down".into()))
    }

    async fn ask<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> fdo::Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| fdo::Error::Failed("Player dropped the request".into()))
    }
}

#[interface(name = "org.tunequiz.Player")]
impl PlayerDBus {
    async fn test_connection(&self) -> fdo::Result<()> {
        Ok(())
    }

    async fn load(&self, url: String) -> fdo::Result<()> {
        self.ask(|reply| Command::Load(url, reply))
            .await?
            .map_err(fdo::Error::Failed)
    }

    async fn play(&self) -> fdo::Result<()> {
        self.send(Command::Play).await
    }

    async fn pause(&self) -> fdo::Result<()> {
        self.send(Command::Pause).await
    }

    async fn toggle(&self) -> fdo::Result<bool> {
        self.ask(Command::Toggle).await
    }

    async fn set_volume(&self, percent: f64) -> fdo::Result<()> {
        self.send(Command::SetVolume(percent)).await
    }

    async fn begin_seek(&self) -> fdo::Result<()> {
        self.send(Command::BeginSeek).await
    }

    async fn seek_change(&self, percent: f64) -> fdo::Result<()> {
        self.send(Command::SeekChange(percent)).await
    }

    async fn end_seek(&self) -> fdo::Result<()> {
        self.send(Command::EndSeek).await
    }

    async fn toggle_title(&self) -> fdo::Result<bool> {
        self.ask(Command::ToggleTitle).await
    }

    async fn status(&self) -> fdo::Result<String> {
        let report = self.ask(Command::Status).await?;
        serde_json::to_string(&report).map_err(|e| fdo::Error::Failed(e.to_string()))
    }

    async fn stop(&self) -> fdo::Result<()> {
        self.send(Command::Stop).await?;
        self.stop_signal
            .send(())
            .map_err(|e| fdo::Error::Failed(e.to_string()))
    }
}

pub async fn run_dbus_server(
    command_sender: mpsc::Sender<Command>,
    stop_signal: watch::Sender<()>,
) -> Result<(), zbus::Error> {
    let player_dbus = PlayerDBus {
        tx: command_sender,
        stop_signal: stop_signal.clone(),
    };

    let _connection = ConnectionBuilder::session()?
        .name(SERVICE_NAME)?
        .serve_at(OBJECT_PATH, player_dbus)?
        .build()
        .await?;

    let mut stop_receiver = stop_signal.subscribe();

    // Wait for the stop signal
    tokio::select! {
        _ = stop_receiver.changed() => {
            info!("Stop signal received, shutting down DBus server...");
        }
    }

    Ok(())
}
