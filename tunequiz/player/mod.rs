pub mod gst_logic;
pub mod source;
pub mod state;

use tokio::sync::oneshot;

pub use gst_logic::Audio;
use state::StatusReport;

/// Answer to a load: `Ok` once the track prerolled, else the user-facing message.
pub type LoadReply = oneshot::Sender<Result<(), String>>;

pub enum Command {
    Load(String, LoadReply),
    Play,
    Pause,
    Toggle(oneshot::Sender<bool>),
    SetVolume(f64),
    BeginSeek,
    SeekChange(f64),
    EndSeek,
    ToggleTitle(oneshot::Sender<bool>),
    Status(oneshot::Sender<StatusReport>),
    Stop,
}
