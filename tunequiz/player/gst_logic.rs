use crate::config::Settings;
use crate::error::App;
use crate::player::source::{self, ResolvedAudio};
use crate::player::state::{LoadError, PlaybackState};
use crate::player::{Command, LoadReply};
use futures_util::stream::StreamExt;
use gstreamer::prelude::*;
use gstreamer::{ClockTime, MessageView, Pipeline, SeekFlags};
use log::{error, info, warn};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, interval, MissedTickBehavior};

enum BusEvent {
    Prerolled,
    DurationChanged,
    Ended,
    Failed,
}

#[derive(Debug)]
struct PendingLoad {
    generation: u64,
    reply: LoadReply,
}

/// The load in flight: its generation, the caller waiting on it and the task
/// resolving it. A newer load aborts the older task.
#[derive(Debug, Default)]
struct LoadTracker {
    generation: u64,
    pending: Option<PendingLoad>,
    task: Option<JoinHandle<()>>,
}

impl LoadTracker {
    /// Returns the new generation and the caller of a load it displaced.
    fn begin(&mut self, reply: LoadReply) -> (u64, Option<LoadReply>) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation += 1;
        let displaced = self
            .pending
            .replace(PendingLoad {
                generation: self.generation,
                reply,
            })
            .map(|pending| pending.reply);
        (self.generation, displaced)
    }

    fn track(&mut self, task: JoinHandle<()>) {
        self.task = Some(task);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    fn take(&mut self, generation: u64) -> Option<LoadReply> {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.generation == generation)
        {
            self.pending.take().map(|pending| pending.reply)
        } else {
            None
        }
    }

    fn take_any(&mut self) -> Option<LoadReply> {
        self.pending.take().map(|pending| pending.reply)
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.pending = None;
    }
}

#[derive(Clone, Debug)]
pub struct Audio {
    pipeline: Arc<Pipeline>,
    client: Arc<Client>,
    settings: Arc<Settings>,
    state: Arc<Mutex<PlaybackState>>,
    resolved: Arc<Mutex<Option<ResolvedAudio>>>,
    loads: Arc<Mutex<LoadTracker>>,
}

impl Audio {
    pub fn new(settings: Settings) -> Result<Self, App> {
        gstreamer::init().map_err(|e| App::Init(e.to_string()))?;
        let pipeline = Arc::new(Pipeline::new());
        let state = PlaybackState::new(settings.default_volume);

        info!("GStreamer created successfully.");
        Ok(Self {
            pipeline,
            client: Arc::new(Client::new()),
            settings: Arc::new(settings),
            state: Arc::new(Mutex::new(state)),
            resolved: Arc::new(Mutex::new(None)),
            loads: Arc::new(Mutex::new(LoadTracker::default())),
        })
    }

    /// Spawns the bus listener, the progress poller and the command loop.
    pub fn start(
        &self,
        command_receiver: mpsc::Receiver<Command>,
        stop_receiver: watch::Receiver<()>,
    ) -> Result<(), App> {
        self.listen_to_bus()?;
        self.start_progress_poller(stop_receiver);
        self.listen_for_commands(command_receiver);
        Ok(())
    }

    fn listen_to_bus(&self) -> Result<(), App> {
        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| App::Pipeline("Failed to get GStreamer bus".to_string()))?;

        let audio = self.clone();
        task::spawn(bus.stream().for_each(move |msg| {
            let event = match msg.view() {
                MessageView::AsyncDone(_) => Some(BusEvent::Prerolled),
                MessageView::DurationChanged(_) => Some(BusEvent::DurationChanged),
                MessageView::Eos(_) => Some(BusEvent::Ended),
                MessageView::Error(err) => {
                    error!(
                        "Error from GStreamer pipeline: {} ({:?})",
                        err.error(),
                        err.debug()
                    );
                    Some(BusEvent::Failed)
                }
                _ => None,
            };
            let audio = audio.clone();
            async move {
                if let Some(event) = event {
                    audio.handle_bus_event(event).await;
                }
            }
        }));
        Ok(())
    }

    async fn handle_bus_event(&self, event: BusEvent) {
        match event {
            BusEvent::Prerolled => self.on_prerolled().await,
            BusEvent::DurationChanged => {
                if let Some(duration) = self.query_duration() {
                    self.state.lock().await.on_duration(duration);
                }
            }
            BusEvent::Ended => {
                info!("EOS message received, rewinding.");
                self.state.lock().await.on_ended();
                if let Err(e) = self.rewind() {
                    error!("Failed to rewind after EOS: {}", e);
                }
            }
            BusEvent::Failed => {
                self.state.lock().await.on_error();
                if let Err(e) = reset_pipeline(&self.pipeline) {
                    error!("Failed to reset pipeline: {}", e);
                }
                if let Some(reply) = self.loads.lock().await.take_any() {
                    send_load_reply(reply, Err(LoadError::Failed));
                }
            }
        }
    }

    fn start_progress_poller(&self, mut stop_receiver: watch::Receiver<()>) {
        let audio = self.clone();
        task::spawn(async move {
            let mut ticker = interval(audio.settings.poll_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => audio.poll_progress().await,
                    _ = stop_receiver.changed() => {
                        info!("Stop signal received, stopping progress poller");
                        break;
                    }
                }
            }
        });
    }

    async fn poll_progress(&self) {
        let mut state = self.state.lock().await;
        if !state.should_poll() {
            return;
        }
        if let Some(position) = self.pipeline.query_position::<ClockTime>() {
            state.on_progress(clock_seconds(position));
        }
    }

    fn listen_for_commands(&self, mut command_receiver: mpsc::Receiver<Command>) {
        let audio = self.clone();
        task::spawn(async move {
            while let Some(command) = command_receiver.recv().await {
                audio.handle_command(command).await;
            }
            info!("Command channel closed");
        });
    }

    async fn handle_command(&self, command: Command) {
        match command {
            Command::Load(url, reply) => {
                info!("Load {}", url);
                self.begin_load(&url, reply).await;
            }
            Command::Play => {
                info!("Resume playback");
                self.set_playing(true).await;
            }
            Command::Pause => {
                info!("Pause");
                self.set_playing(false).await;
            }
            Command::Toggle(reply) => {
                let playing = !self.state.lock().await.is_playing();
                info!("Toggle playback to {}", if playing { "play" } else { "pause" });
                send_reply(reply, self.set_playing(playing).await, "Toggle");
            }
            Command::SetVolume(percent) => {
                let volume = self.state.lock().await.set_volume_percent(percent);
                info!("Volume set to {:.2}", volume);
                self.apply_volume(volume);
            }
            Command::BeginSeek => self.state.lock().await.begin_seek(),
            Command::SeekChange(percent) => self.state.lock().await.seek_change_percent(percent),
            Command::EndSeek => {
                let target = {
                    let mut state = self.state.lock().await;
                    state
                        .end_seek()
                        .map(|fraction| fraction * state.duration())
                };
                if let Some(seconds) = target {
                    info!("Seek to {:.1}s", seconds);
                    if let Err(e) = self.seek_to(seconds) {
                        error!("Failed to seek: {}", e);
                    }
                }
            }
            Command::ToggleTitle(reply) => {
                let shown = self.state.lock().await.toggle_title();
                send_reply(reply, shown, "Title toggle");
            }
            Command::Status(reply) => {
                let report = self.state.lock().await.report();
                send_reply(reply, report, "Status");
            }
            Command::Stop => {
                info!("Stop");
                self.loads.lock().await.cancel();
                self.state.lock().await.set_playing(false);
                if let Err(e) = reset_pipeline(&self.pipeline) {
                    error!("Failed to stop: {}", e);
                }
            }
        }
    }

    /// Validates in place, then hands resolving and prerolling to a task so the
    /// command loop keeps answering. The reply is sent once the bus settles.
    async fn begin_load(&self, input: &str, reply: LoadReply) {
        let submitted = self.state.lock().await.submit_url(input, source::can_play);
        let url = match submitted {
            Ok(url) => url,
            Err(e) => {
                warn!("Rejected URL {:?}: {}", input, e);
                send_load_reply(reply, Err(e));
                return;
            }
        };

        let mut loads = self.loads.lock().await;
        let (generation, displaced) = loads.begin(reply);
        if let Some(displaced) = displaced {
            info!("Previous load replaced by {}", url);
            send_load_reply(displaced, Err(LoadError::Superseded));
        }
        *self.resolved.lock().await = None;
        if let Err(e) = reset_pipeline(&self.pipeline) {
            error!("Failed to reset pipeline: {}", e);
        }

        let audio = self.clone();
        loads.track(task::spawn(async move {
            audio.run_load(generation, url).await;
        }));
    }

    async fn run_load(&self, generation: u64, url: String) {
        if let Err(e) = self.prepare(generation, &url).await {
            error!("Failed to load {}: {}", url, e);
            self.fail_load(generation).await;
            return;
        }
        time::sleep(self.settings.resolve_timeout()).await;
        if self.fail_load(generation).await {
            warn!("Timed out waiting for {} to preroll", url);
        }
    }

    /// Marks the load failed if it is still waiting. Returns whether it was.
    async fn fail_load(&self, generation: u64) -> bool {
        let Some(reply) = self.loads.lock().await.take(generation) else {
            return false;
        };
        self.state.lock().await.on_error();
        if let Err(e) = reset_pipeline(&self.pipeline) {
            error!("Failed to reset pipeline: {}", e);
        }
        send_load_reply(reply, Err(LoadError::Failed));
        true
    }

    async fn prepare(&self, generation: u64, url: &str) -> Result<(), App> {
        let resolved = source::resolve(&self.settings, url).await?;
        if !source::verify(&self.client, &resolved.stream_url).await? {
            return Err(App::Resolve("Audio stream is not reachable".to_string()));
        }

        let loads = self.loads.lock().await;
        if !loads.is_current(generation) {
            return Err(App::Resolve("Load was replaced by a newer URL".to_string()));
        }
        reset_pipeline(&self.pipeline)?;
        let volume = self.state.lock().await.volume();
        build_pipeline(&self.pipeline, &resolved.stream_url, volume)?;
        *self.resolved.lock().await = Some(resolved);

        self.pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|_| App::State("Failed to set pipeline to Paused".to_string()))?;
        drop(loads);
        Ok(())
    }

    async fn on_prerolled(&self) {
        let Some(resolved) = self.resolved.lock().await.clone() else {
            return;
        };
        {
            let mut state = self.state.lock().await;
            if state.is_loaded() {
                return;
            }
            let duration = self
                .query_duration()
                .or(resolved.duration)
                .unwrap_or_default();
            state.on_duration(duration);
            state.on_ready(resolved.title.as_deref());
            info!("Track ready, duration {:.1}s", duration);
        }
        if let Some(reply) = self.loads.lock().await.take_any() {
            send_load_reply(reply, Ok(()));
        }
    }

    async fn set_playing(&self, playing: bool) -> bool {
        let mut state = self.state.lock().await;
        if !state.is_loaded() {
            warn!("Nothing loaded yet");
            return false;
        }
        let target = if playing {
            gstreamer::State::Playing
        } else {
            gstreamer::State::Paused
        };
        if let Err(e) = self.pipeline.set_state(target) {
            error!("Failed to switch pipeline to {:?}: {}", target, e);
            return state.is_playing();
        }
        state.set_playing(playing)
    }

    fn apply_volume(&self, volume: f64) {
        match self.pipeline.by_name("volume") {
            Some(element) => element.set_property("volume", volume),
            None => info!("No track loaded, volume applies to the next one"),
        }
    }

    fn seek_to(&self, seconds: f64) -> Result<(), App> {
        self.pipeline
            .seek_simple(
                SeekFlags::FLUSH | SeekFlags::KEY_UNIT,
                ClockTime::from_nseconds(seconds_to_nanos(seconds)),
            )
            .map_err(App::from)
    }

    fn rewind(&self) -> Result<(), App> {
        self.pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|_| App::State("Failed to set pipeline to Paused".to_string()))?;
        self.seek_to(0.0)
    }

    fn query_duration(&self) -> Option<f64> {
        self.pipeline
            .query_duration::<ClockTime>()
            .map(clock_seconds)
    }
}

fn send_reply<T>(reply: oneshot::Sender<T>, value: T, what: &str) {
    if reply.send(value).is_err() {
        warn!("{} caller went away before the reply", what);
    }
}

fn send_load_reply(reply: LoadReply, result: Result<(), LoadError>) {
    send_reply(reply, result.map_err(|e| e.to_string()), "Load");
}

fn reset_pipeline(pipeline: &Pipeline) -> Result<(), App> {
    pipeline
        .set_state(gstreamer::State::Null)
        .map_err(|_| App::State("Failed to set pipeline to Null".to_string()))?;

    for element in pipeline.children() {
        pipeline
            .remove(&element)
            .map_err(|_| App::Element("Failed to remove element from pipeline".to_string()))?;
    }
    Ok(())
}

fn make_element(factory: &str, name: &str) -> Result<gstreamer::Element, App> {
    gstreamer::ElementFactory::make(factory)
        .name(name)
        .build()
        .map_err(|_| App::Element(format!("Failed to create {factory} element")))
}

fn build_pipeline(pipeline: &Pipeline, url: &str, volume: f64) -> Result<(), App> {
    let src = make_element("souphttpsrc", "source")?;
    src.set_property("location", url);
    src.set_property("user-agent", source::user_agent());

    let decodebin = make_element("decodebin", "decoder")?;
    let convert = make_element("audioconvert", "convert")?;
    let resample = make_element("audioresample", "resample")?;
    let gain = make_element("volume", "volume")?;
    gain.set_property("volume", volume);
    let sink = make_element("autoaudiosink", "sink")?;

    pipeline
        .add_many([&src, &decodebin, &convert, &resample, &gain, &sink])
        .map_err(|_| App::Pipeline("Failed to add elements to pipeline".to_string()))?;
    src.link(&decodebin)
        .map_err(|_| App::Link("Failed to link source to decodebin".to_string()))?;
    gstreamer::Element::link_many([&convert, &resample, &gain, &sink])
        .map_err(|_| App::Link("Failed to link audio output chain".to_string()))?;

    let convert_weak = convert.downgrade();
    decodebin.connect_pad_added(move |_, src_pad| {
        let Some(convert) = convert_weak.upgrade() else {
            error!("Failed to upgrade audioconvert reference");
            return;
        };
        if let Err(e) = link_audio_pad(src_pad, &convert) {
            error!("{}", e);
        }
    });
    Ok(())
}

fn link_audio_pad(src_pad: &gstreamer::Pad, convert: &gstreamer::Element) -> Result<(), App> {
    let is_audio = src_pad
        .current_caps()
        .and_then(|caps| {
            caps.structure(0)
                .map(|structure| structure.name().starts_with("audio/"))
        })
        .unwrap_or(false);
    if !is_audio {
        info!("Ignoring non-audio decoder pad");
        return Ok(());
    }

    let sink_pad = convert
        .static_pad("sink")
        .ok_or_else(|| App::Link("audioconvert has no sink pad".to_string()))?;
    if sink_pad.is_linked() {
        return Ok(());
    }
    src_pad
        .link(&sink_pad)
        .map_err(|e| App::Link(format!("Failed to link decoder pad: {e:?}")))?;
    info!("Pipeline elements linked successfully");
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn clock_seconds(time: ClockTime) -> f64 {
    time.nseconds() as f64 / 1_000_000_000.0
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn seconds_to_nanos(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1_000_000_000.0) as u64
    } else {
        0
    }
}
