use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound of the seek slider; the played fraction never reaches 1.
pub const MAX_PLAYED: f64 = 0.999_999;

pub const LOAD_FAILED_MESSAGE: &str = "Error loading video. Please check the URL and try again.";
pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const TITLE_UNAVAILABLE: &str = "Title Unavailable";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Please enter a YouTube URL")]
    Empty,
    #[error("Invalid YouTube URL")]
    Invalid,
    #[error("{}", LOAD_FAILED_MESSAGE)]
    Failed,
    #[error("Loading was replaced by a newer URL")]
    Superseded,
}

/// Snapshot handed out over D-Bus as JSON.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusReport {
    pub url: Option<String>,
    pub loaded: bool,
    pub is_playing: bool,
    pub volume: f64,
    pub duration: f64,
    pub played: f64,
    pub current_time: f64,
    pub seeking: bool,
    pub error: Option<String>,
    pub title: Option<String>,
    pub show_title: bool,
}

#[derive(Clone, Debug)]
pub struct PlaybackState {
    url: Option<String>,
    is_playing: bool,
    volume: f64,
    duration: f64,
    played: f64,
    seeking: bool,
    loaded: bool,
    error: Option<String>,
    title: Option<String>,
    show_title: bool,
}

impl PlaybackState {
    pub fn new(volume: f64) -> Self {
        Self {
            url: None,
            is_playing: false,
            volume: clamp_unit(volume),
            duration: 0.0,
            played: 0.0,
            seeking: false,
            loaded: false,
            error: None,
            title: None,
            show_title: false,
        }
    }

    /// Validates a submitted URL and, if accepted, resets everything tied to
    /// the previous track. Rejected input leaves the current track alone.
    pub fn submit_url(
        &mut self,
        input: &str,
        can_play: impl Fn(&str) -> bool,
    ) -> Result<String, LoadError> {
        let url = input.trim();
        if url.is_empty() {
            self.error = Some(LoadError::Empty.to_string());
            return Err(LoadError::Empty);
        }
        if !can_play(url) {
            self.error = Some(LoadError::Invalid.to_string());
            return Err(LoadError::Invalid);
        }

        self.url = Some(url.to_string());
        self.is_playing = false;
        self.loaded = false;
        self.played = 0.0;
        self.duration = 0.0;
        self.seeking = false;
        self.title = None;
        self.show_title = false;
        self.error = None;
        Ok(url.to_string())
    }

    pub fn on_ready(&mut self, title: Option<&str>) {
        self.loaded = true;
        self.title = Some(match title.map(str::trim) {
            Some("") => UNKNOWN_TITLE.to_string(),
            Some(title) => title.to_string(),
            None => TITLE_UNAVAILABLE.to_string(),
        });
    }

    pub fn on_duration(&mut self, seconds: f64) {
        self.duration = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            0.0
        };
    }

    pub fn on_error(&mut self) {
        self.error = Some(LOAD_FAILED_MESSAGE.to_string());
        self.loaded = false;
        self.is_playing = false;
        self.seeking = false;
    }

    /// The stream ran out; the embedded player rewinds to the start.
    pub fn on_ended(&mut self) {
        self.is_playing = false;
        self.played = 0.0;
    }

    /// Returns the resulting playing flag; a no-op until the track is loaded.
    pub fn set_playing(&mut self, playing: bool) -> bool {
        if self.loaded {
            self.is_playing = playing;
        }
        self.is_playing
    }

    pub fn set_volume_percent(&mut self, percent: f64) -> f64 {
        self.volume = clamp_unit(percent / 100.0);
        self.volume
    }

    pub fn begin_seek(&mut self) {
        self.seeking = true;
    }

    pub fn seek_change_percent(&mut self, percent: f64) {
        self.played = clamp_played(percent / 100.0);
    }

    /// Releases the seek control and returns the fraction to jump to.
    pub fn end_seek(&mut self) -> Option<f64> {
        self.seeking = false;
        self.loaded.then_some(self.played)
    }

    pub fn should_poll(&self) -> bool {
        self.is_playing && !self.seeking && self.loaded
    }

    pub fn on_progress(&mut self, current_seconds: f64) {
        if !self.should_poll() {
            return;
        }
        self.played = if self.duration > 0.0 {
            clamp_played(current_seconds / self.duration)
        } else {
            0.0
        };
    }

    pub fn current_time(&self) -> f64 {
        self.duration * self.played
    }

    pub fn toggle_title(&mut self) -> bool {
        self.show_title = !self.show_title;
        self.show_title
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn report(&self) -> StatusReport {
        StatusReport {
            url: self.url.clone(),
            loaded: self.loaded,
            is_playing: self.is_playing,
            volume: self.volume,
            duration: self.duration,
            played: self.played,
            current_time: self.current_time(),
            seeking: self.seeking,
            error: self.error.clone(),
            title: if self.show_title {
                self.title.clone()
            } else {
                None
            },
            show_title: self.show_title,
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn clamp_played(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_PLAYED)
    }
}
