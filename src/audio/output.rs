//! Local sound-card transport: the "channel" names an output device and each
//! connected session owns one output stream on a dedicated thread.

use std::{
    fs::File,
    io::{BufReader, ErrorKind},
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::Duration,
};

use async_trait::async_trait;
use flume::Sender;
use reqwest::Client;
use rodio::{Decoder, Sink, mixer::Mixer};
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        completion::CompletionHandle,
        config::{EngineConfig, ReconnectPolicy},
        error::{ConnectError, PlaybackError},
        traits::{AudioInput, AudioSession, ChannelHandle, VoiceConnector},
        util::{find_device, open_output},
    },
    stream::{StreamHealth, StreamingDataSource},
};

pub struct RodioConnector {
    client: Client,
    poll: Duration,
}

impl RodioConnector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: Client::new(),
            poll: config.completion_poll,
        }
    }
}

#[async_trait]
impl VoiceConnector for RodioConnector {
    async fn connect(
        &self,
        channel: &ChannelHandle,
    ) -> Result<Box<dyn AudioSession>, ConnectError> {
        let (ready_tx, ready_rx) = flume::bounded(1);
        let (close_tx, close_rx) = flume::bounded::<()>(1);
        let name = channel.as_str().to_owned();

        // cpal streams are not Send; the stream lives and dies on this thread.
        thread::Builder::new()
            .name(format!("voxqueue-output-{name}"))
            .spawn(move || {
                let stream = match find_device(&name).and_then(open_output) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(stream.mixer().clone()));
                let _ = close_rx.recv();
                drop(stream);
            })
            .map_err(|e| ConnectError::Transport(e.to_string()))?;

        let mixer = ready_rx
            .recv_async()
            .await
            .map_err(|_| ConnectError::Transport("output thread exited".into()))??;

        info!(channel = channel.as_str(), "output_opened");
        Ok(Box::new(RodioSession {
            mixer,
            client: self.client.clone(),
            poll: self.poll,
            runtime: Handle::current(),
            close_tx: Mutex::new(Some(close_tx)),
            current: Mutex::new(None),
            volume: Mutex::new(1.0),
        }))
    }
}

struct Playback {
    sink: Arc<Sink>,
    task: JoinHandle<()>,
}

pub struct RodioSession {
    mixer: Mixer,
    client: Client,
    poll: Duration,
    runtime: Handle,
    close_tx: Mutex<Option<Sender<()>>>,
    current: Mutex<Option<Playback>>,
    volume: Mutex<f32>,
}

impl RodioSession {
    fn halt(&self) {
        if let Some(playback) = lock(&self.current).take() {
            playback.sink.stop();
            playback.task.abort();
        }
    }
}

impl AudioSession for RodioSession {
    fn play(&self, input: AudioInput, volume: f32, on_completion: CompletionHandle) {
        self.halt();
        *lock(&self.volume) = volume;

        let sink = Arc::new(Sink::connect_new(&self.mixer));
        sink.set_volume(volume);

        let task = self.runtime.spawn(drive(
            input,
            sink.clone(),
            self.client.clone(),
            self.poll,
            on_completion,
        ));
        *lock(&self.current) = Some(Playback { sink, task });
    }

    fn pause(&self) {
        if let Some(playback) = lock(&self.current).as_ref() {
            playback.sink.pause();
        }
    }

    fn resume(&self) {
        if let Some(playback) = lock(&self.current).as_ref() {
            playback.sink.play();
        }
    }

    fn stop(&self) {
        self.halt();
    }

    fn set_volume(&self, volume: f32) {
        *lock(&self.volume) = volume;
        if let Some(playback) = lock(&self.current).as_ref() {
            playback.sink.set_volume(volume);
        }
    }

    fn close(&self) {
        self.halt();
        if signal_close(&self.close_tx) {
            debug!("output_close_requested");
        }
    }
}

impl Drop for RodioSession {
    // Dropping `close_tx` ends the output thread as well.
    fn drop(&mut self) {
        self.halt();
    }
}

/// Tells the output thread to let go of its stream. Only the first call sends.
fn signal_close(close_tx: &Mutex<Option<Sender<()>>>) -> bool {
    match lock(close_tx).take() {
        Some(close) => {
            let _ = close.send(());
            true
        }
        None => false,
    }
}

async fn drive(
    input: AudioInput,
    sink: Arc<Sink>,
    client: Client,
    poll: Duration,
    on_completion: CompletionHandle,
) {
    let stream = on_completion.stream();
    let health = match start(input, &sink, client).await {
        Ok(health) => health,
        Err(err) => {
            warn!(stream = %stream, error = %err, "output_start_failed");
            on_completion.finish(Some(err));
            return;
        }
    };
    debug!(stream = %stream, "output_started");

    while !sink.empty() {
        if on_completion.is_suppressed() {
            return;
        }
        tokio::time::sleep(poll).await;
    }

    let error = health
        .and_then(|health| health.failure())
        .map(PlaybackError::Network);
    on_completion.finish(error);
}

async fn start(
    input: AudioInput,
    sink: &Sink,
    client: Client,
) -> Result<Option<Arc<StreamHealth>>, PlaybackError> {
    match input {
        AudioInput::File(path) => {
            let decoder = blocking(move || decode_file(path)).await?;
            sink.append(decoder);
            Ok(None)
        }
        AudioInput::Stream { url, reconnect } => {
            let source = open_stream(client, &url, reconnect).await?;
            let health = source.health();
            let total = source.total_bytes();
            let hint = format_hint(&url);
            let decoder = blocking(move || {
                let builder = Decoder::builder()
                    .with_data(source)
                    .with_byte_len(total)
                    .with_coarse_seek(true)
                    .with_gapless(true);
                let builder = match hint {
                    Some(ext) => builder.with_hint(&ext),
                    None => builder,
                };
                builder.build().map_err(|e| PlaybackError::Decode(e.to_string()))
            })
            .await?;
            sink.append(decoder);
            Ok(Some(health))
        }
    }
}

async fn open_stream(
    client: Client,
    url: &str,
    reconnect: ReconnectPolicy,
) -> Result<StreamingDataSource, PlaybackError> {
    StreamingDataSource::open(client, url.to_owned(), reconnect).await
}

fn decode_file(path: PathBuf) -> Result<Decoder<BufReader<File>>, PlaybackError> {
    let file = File::open(&path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => PlaybackError::FileNotFound(path.clone()),
        _ => err.into(),
    })?;
    let len = file.metadata()?.len();

    let builder = Decoder::builder()
        .with_data(BufReader::new(file))
        .with_byte_len(len)
        .with_gapless(true);
    let builder = match format_hint(&path.to_string_lossy()) {
        Some(ext) => builder.with_hint(&ext),
        None => builder,
    };
    builder
        .build()
        .map_err(|e| PlaybackError::Decode(e.to_string()))
}

async fn blocking<T, F>(f: F) -> Result<T, PlaybackError>
where
    F: FnOnce() -> Result<T, PlaybackError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PlaybackError::Io(e.to_string()))?
}

/// File extension of the last path segment, ignoring any query string.
fn format_hint(location: &str) -> Option<String> {
    let path = location.split(['?', '#']).next()?;
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty() && ext.len() <= 5).then(|| ext.to_ascii_lowercase())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
