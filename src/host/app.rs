use std::{path::Path, sync::Arc};

use color_eyre::eyre::eyre;
use flume::Receiver;
use im::Vector;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::{
    audio::{
        commands::{AudioCommand, CommandOutcome},
        config::EngineConfig,
        favorites::{FavoritesStore, JsonFavoritesStore},
        output::RodioConnector,
        registry::{PlayerRegistry, RequestOutcome},
        track::Track,
        traits::{ChannelHandle, GuildId},
        util::DEFAULT_DEVICE,
    },
    event::events::Event,
};

use super::input::{HELP, HostMessage, InputHandler};

/// The console drives a single guild.
const CONSOLE_GUILD: GuildId = GuildId(0);

pub struct App {
    pub registry: PlayerRegistry,
    pub favorites: JsonFavoritesStore,
    pub channel: ChannelHandle,
    pub should_quit: bool,
    guild: GuildId,
}

impl App {
    pub fn new(config: EngineConfig) -> color_eyre::Result<(Self, Receiver<Event>)> {
        let (event_tx, event_rx) = flume::unbounded();
        let favorites = JsonFavoritesStore::open(&config.favorites_path)?;
        let connector = Arc::new(RodioConnector::new(&config));
        let registry = PlayerRegistry::new(connector, config).with_events(event_tx);

        let app = Self {
            registry,
            favorites,
            channel: ChannelHandle::new(DEFAULT_DEVICE),
            should_quit: false,
            guild: CONSOLE_GUILD,
        };
        Ok((app, event_rx))
    }

    pub async fn run(&mut self) -> color_eyre::Result<()> {
        println!("{HELP}");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while !self.should_quit {
            let Some(line) = lines.next_line().await? else {
                break;
            };
            match InputHandler::parse_line(&line) {
                Ok(Some(message)) => {
                    if let Err(err) = self.handle_message(message).await {
                        println!("error: {err}");
                    }
                }
                Ok(None) => {}
                Err(err) => println!("{err}"),
            }
        }

        self.registry.shutdown().await;
        info!("console_closed");
        Ok(())
    }

    pub async fn handle_message(&mut self, message: HostMessage) -> color_eyre::Result<()> {
        debug!(?message, "console_message");
        match message {
            HostMessage::Join(channel) => {
                if let Ok(player) = self.registry.get(self.guild).await {
                    player.connect(&channel).await?;
                }
                println!("joined {channel}");
                self.channel = channel;
            }
            HostMessage::Stream { url, title } => {
                let title = title.unwrap_or_else(|| title_from(&url));
                let track = Track::remote(title, url, 0)?;
                self.request(track).await?;
            }
            HostMessage::File { path, title } => {
                let track = local_track(&path, title)?;
                self.request(track).await?;
            }
            HostMessage::FavoriteAdd { path, title } => {
                let track = local_track(&path, Some(title))?;
                let title = track.title().to_owned();
                self.favorites.insert(track)?;
                println!("saved favorite {title:?}");
            }
            HostMessage::FavoritePlay(title) => {
                let outcome = self
                    .registry
                    .request_favorite(self.guild, &self.channel, &self.favorites, &title)
                    .await?;
                print_outcome(&title, outcome);
            }
            HostMessage::FavoriteList => {
                let titles = self.favorites.titles();
                if titles.is_empty() {
                    println!("no favorites yet");
                }
                for title in titles {
                    println!("* {title}");
                }
            }
            HostMessage::VolumeUp => {
                let step = self.registry.config().volume_step;
                self.dispatch(AudioCommand::VolumeUp(step)).await?;
            }
            HostMessage::VolumeDown => {
                let step = self.registry.config().volume_step;
                self.dispatch(AudioCommand::VolumeDown(step)).await?;
            }
            HostMessage::Player(command) => self.dispatch(command).await?,
            HostMessage::Help => println!("{HELP}"),
            HostMessage::Quit => self.should_quit = true,
        }
        Ok(())
    }

    async fn request(&self, track: Track) -> color_eyre::Result<()> {
        let title = track.title().to_owned();
        let outcome = self.registry.request(self.guild, &self.channel, track).await?;
        print_outcome(&title, outcome);
        Ok(())
    }

    async fn dispatch(&self, command: AudioCommand) -> color_eyre::Result<()> {
        match self.registry.dispatch(self.guild, command).await? {
            CommandOutcome::Done => {}
            CommandOutcome::Removed(track) => println!("removed {}", track.title()),
            CommandOutcome::Volume(level) => println!("volume {}%", (level * 100.0).round()),
            CommandOutcome::Queue(queue) => {
                if queue.is_empty() {
                    println!("queue is empty");
                }
                for line in queue_lines(&queue) {
                    println!("{line}");
                }
            }
        }
        Ok(())
    }
}

/// `"{n}. {title} [mm:ss]"`, numbered from 1.
pub fn queue_lines(queue: &Vector<Track>) -> Vec<String> {
    queue
        .iter()
        .enumerate()
        .map(|(i, track)| format!("{}. {} [{}]", i + 1, track.title(), track.display_duration()))
        .collect()
}

pub fn describe_event(event: &Event) -> Option<String> {
    let line = match event {
        Event::Connected { channel, .. } => format!("connected to {channel}"),
        Event::TrackStarted { track, .. } => format!("now playing: {}", track.title()),
        Event::TrackSkipped { track, .. } => format!("skipped: {}", track.title()),
        Event::TrackFailed { track, error, .. } => match track {
            Some(track) => format!("could not play {}: {error}", track.title()),
            None => format!("playback error: {error}"),
        },
        Event::QueueEnded { .. } => "queue finished".to_owned(),
        Event::TrackEnded { .. }
        | Event::StateChanged { .. }
        | Event::VolumeChanged { .. }
        | Event::PlayerDestroyed { .. } => return None,
    };
    Some(line)
}

pub async fn print_events(events: Receiver<Event>) {
    while let Ok(event) = events.recv_async().await {
        if let Some(line) = describe_event(&event) {
            println!("{line}");
        }
    }
}

fn print_outcome(title: &str, outcome: RequestOutcome) {
    match outcome {
        RequestOutcome::Started => println!("playing {title}"),
        RequestOutcome::Queued { position } => println!("queued {title} at position {position}"),
    }
}

fn local_track(path: &Path, title: Option<String>) -> color_eyre::Result<Track> {
    let path = std::fs::canonicalize(path)
        .map_err(|err| eyre!("cannot open {}: {err}", path.display()))?;
    let title = title.unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    });
    let uri = format!("file://{}", path.display());
    Ok(Track::local(title, uri, path, 0)?)
}

fn title_from(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .unwrap_or(url)
        .to_owned()
}
