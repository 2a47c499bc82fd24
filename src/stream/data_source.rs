use std::{
    future::Future,
    io::{self, Read, Seek, SeekFrom},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use flume::{Receiver, RecvTimeoutError, Sender};
use reqwest::{Client, StatusCode, header};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::buffer::ByteWindow;
use crate::audio::{config::ReconnectPolicy, error::PlaybackError};

const CHUNK_SIZE: u64 = 256 * 1024;
const LOW_WATER: usize = 128 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const NOTIFY_POLL: Duration = Duration::from_millis(50);

enum FetchCommand {
    Fetch { start: u64, end: u64, generation: u64 },
    Shutdown,
}

/// Set once the transport gives up on a stream.
#[derive(Debug, Default)]
pub struct StreamHealth {
    failure: Mutex<Option<String>>,
}

impl StreamHealth {
    pub fn failure(&self) -> Option<String> {
        lock(&self.failure).clone()
    }

    fn fail(&self, reason: String) {
        lock(&self.failure).get_or_insert(reason);
    }
}

/// Blocking `Read + Seek` view of a remote file, filled by ranged HTTP requests
/// on the Tokio runtime. Failed requests are retried under the stream's
/// [`ReconnectPolicy`]; once that is exhausted reads fail and [`StreamHealth`]
/// records why.
pub struct StreamingDataSource {
    total_bytes: u64,
    position: u64,
    window: Arc<Mutex<ByteWindow>>,
    generation: Arc<AtomicU64>,
    health: Arc<StreamHealth>,
    fetch_tx: Sender<FetchCommand>,
    notify_rx: Receiver<()>,
    task: JoinHandle<()>,
}

impl StreamingDataSource {
    pub async fn open(
        client: Client,
        url: String,
        reconnect: ReconnectPolicy,
    ) -> Result<Self, PlaybackError> {
        let total = with_retries(&reconnect, "probe", || probe_length(&client, &url)).await?;
        debug!(url = url.as_str(), total, "stream_opened");

        let window = Arc::new(Mutex::new(ByteWindow::new(total)));
        let generation = Arc::new(AtomicU64::new(0));
        let health = Arc::new(StreamHealth::default());
        let (fetch_tx, fetch_rx) = flume::unbounded();
        let (notify_tx, notify_rx) = flume::unbounded();

        let task = tokio::spawn(fetch_loop(FetchWorker {
            client,
            url,
            reconnect,
            window: window.clone(),
            generation: generation.clone(),
            health: health.clone(),
            commands: fetch_rx,
            notify: notify_tx,
        }));

        let source = Self {
            total_bytes: total,
            position: 0,
            window,
            generation,
            health,
            fetch_tx,
            notify_rx,
            task,
        };
        source.request(0);
        Ok(source)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn health(&self) -> Arc<StreamHealth> {
        self.health.clone()
    }

    fn request(&self, start: u64) {
        let end = (start + CHUNK_SIZE).min(self.total_bytes);
        if end <= start {
            return;
        }
        lock(&self.window).set_pending(start, end);
        let _ = self.fetch_tx.send(FetchCommand::Fetch {
            start,
            end,
            generation: self.generation.load(Ordering::SeqCst),
        });
    }

    fn ensure(&self, pos: u64) -> io::Result<()> {
        {
            let mut window = lock(&self.window);
            if window.covers(pos) {
                return Ok(());
            }
            let in_flight = window
                .pending()
                .is_some_and(|(start, end)| (start..end).contains(&pos));
            if !in_flight {
                if window.end() != pos {
                    self.generation.fetch_add(1, Ordering::SeqCst);
                    window.reset(pos);
                }
                drop(window);
                self.request(pos);
            }
        }

        let deadline = Instant::now() + READ_TIMEOUT;
        loop {
            if lock(&self.window).covers(pos) {
                return Ok(());
            }
            if let Some(reason) = self.health.failure() {
                return Err(io::Error::other(reason));
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "timed out waiting for stream data",
                ));
            }
            match self.notify_rx.recv_timeout(NOTIFY_POLL) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::other("stream fetcher stopped"));
                }
            }
        }
    }

    fn prefetch(&self) {
        let next = {
            let window = lock(&self.window);
            window
                .needs_more(self.position, LOW_WATER)
                .then(|| window.end())
        };
        if let Some(start) = next {
            self.request(start);
        }
    }
}

impl Read for StreamingDataSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.total_bytes {
            return Ok(0);
        }

        self.ensure(self.position)?;
        let read = lock(&self.window).copy_out(self.position, buf);
        self.position += read as u64;
        self.prefetch();
        Ok(read)
    }
}

impl Seek for StreamingDataSource {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let target = match from {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.total_bytes.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;

        self.position = target.min(self.total_bytes);
        Ok(self.position)
    }
}

impl Drop for StreamingDataSource {
    fn drop(&mut self) {
        let _ = self.fetch_tx.send(FetchCommand::Shutdown);
        self.task.abort();
    }
}

struct FetchWorker {
    client: Client,
    url: String,
    reconnect: ReconnectPolicy,
    window: Arc<Mutex<ByteWindow>>,
    generation: Arc<AtomicU64>,
    health: Arc<StreamHealth>,
    commands: Receiver<FetchCommand>,
    notify: Sender<()>,
}

async fn fetch_loop(worker: FetchWorker) {
    while let Ok(command) = worker.commands.recv_async().await {
        let FetchCommand::Fetch {
            start,
            end,
            generation,
        } = command
        else {
            break;
        };
        if generation != worker.generation.load(Ordering::SeqCst) {
            continue;
        }

        let fetched = with_retries(&worker.reconnect, "range", || {
            fetch_range(&worker.client, &worker.url, start, end)
        })
        .await;

        match fetched {
            Ok(bytes) => {
                if generation == worker.generation.load(Ordering::SeqCst) {
                    lock(&worker.window).push(start, &bytes);
                }
            }
            Err(err) => {
                warn!(url = worker.url.as_str(), start, end, error = %err, "stream_fetch_failed");
                lock(&worker.window).clear_pending();
                worker.health.fail(err.to_string());
            }
        }
        let _ = worker.notify.send(());
    }
}

async fn probe_length(client: &Client, url: &str) -> Result<u64, PlaybackError> {
    let resp = client
        .head(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(network)?;

    resp.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| PlaybackError::Network(format!("{url}: content-length missing")))
}

async fn fetch_range(
    client: &Client,
    url: &str,
    start: u64,
    end: u64,
) -> Result<Vec<u8>, PlaybackError> {
    let resp = client
        .get(url)
        .header(header::RANGE, format!("bytes={}-{}", start, end - 1))
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(network)?;

    let ignored_range = resp.status() == StatusCode::OK;
    let body = resp.bytes().await.map_err(network)?;

    let from = if ignored_range { start as usize } else { 0 };
    let to = (from + (end - start) as usize).min(body.len());
    Ok(body.get(from..to).map(<[u8]>::to_vec).unwrap_or_default())
}

/// Runs `op` until it succeeds or `policy` runs out of attempts.
pub(crate) async fn with_retries<T, F, Fut>(
    policy: &ReconnectPolicy,
    what: &'static str,
    mut op: F,
) -> Result<T, PlaybackError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlaybackError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !policy.allows(attempt) {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                debug!(what, attempt, delay_ms = delay.as_millis() as u64, error = %err, "stream_retry");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn network(err: reqwest::Error) -> PlaybackError {
    PlaybackError::Network(err.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
