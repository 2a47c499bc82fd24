use std::path::PathBuf;

use thiserror::Error;

use crate::audio::{commands::AudioCommand, traits::ChannelHandle, util::DEFAULT_DEVICE};

pub const HELP: &str = "\
commands:
  join [device]              connect to an output device (default: system default)
  stream <url> [title]       request a remote track
  file <path> [title]        request a local file
  fav add <path> <title>     save a local file as a favorite
  fav play <title>           request a favorite
  fav list                   list favorites
  play | pause | resume | stop | skip
  volume <0-100> | volume + | volume -
  queue                      list pending tracks
  remove <n>                 remove the n-th pending track
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    Join(ChannelHandle),
    Stream { url: String, title: Option<String> },
    File { path: PathBuf, title: Option<String> },
    FavoriteAdd { path: PathBuf, title: String },
    FavoritePlay(String),
    FavoriteList,
    Player(AudioCommand),
    VolumeUp,
    VolumeDown,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq)]
pub enum InputError {
    #[error("Unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

pub struct InputHandler;

impl InputHandler {
    /// Blank lines parse to `None`.
    pub fn parse_line(line: &str) -> Result<Option<HostMessage>, InputError> {
        let line = line.trim();
        let (word, rest) = split_word(line);
        if word.is_empty() {
            return Ok(None);
        }

        let message = match word.to_ascii_lowercase().as_str() {
            "join" => HostMessage::Join(ChannelHandle::new(if rest.is_empty() {
                DEFAULT_DEVICE
            } else {
                rest
            })),
            "stream" => {
                let (url, title) = split_word(rest);
                if url.is_empty() {
                    return Err(InputError::Usage("stream <url> [title]"));
                }
                HostMessage::Stream {
                    url: url.to_owned(),
                    title: non_empty(title),
                }
            }
            "file" => {
                let (path, title) = split_word(rest);
                if path.is_empty() {
                    return Err(InputError::Usage("file <path> [title]"));
                }
                HostMessage::File {
                    path: PathBuf::from(path),
                    title: non_empty(title),
                }
            }
            "fav" => Self::parse_favorite(rest)?,
            "play" => HostMessage::Player(AudioCommand::Play),
            "pause" => HostMessage::Player(AudioCommand::Pause),
            "resume" => HostMessage::Player(AudioCommand::Resume),
            "stop" => HostMessage::Player(AudioCommand::Stop),
            "skip" | "next" => HostMessage::Player(AudioCommand::Skip),
            "queue" | "q" => HostMessage::Player(AudioCommand::ListQueue),
            "volume" | "vol" => match rest {
                "+" => HostMessage::VolumeUp,
                "-" => HostMessage::VolumeDown,
                value => value
                    .parse::<i64>()
                    .map(|percent| HostMessage::Player(AudioCommand::SetVolumePercent(percent)))
                    .map_err(|_| InputError::Usage("volume <0-100> | volume + | volume -"))?,
            },
            "remove" | "rm" => {
                let position = rest
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or(InputError::Usage("remove <n>  (n starts at 1)"))?;
                HostMessage::Player(AudioCommand::RemoveFromQueue(position - 1))
            }
            "help" | "?" => HostMessage::Help,
            "quit" | "exit" => HostMessage::Quit,
            other => return Err(InputError::Unknown(other.to_owned())),
        };
        Ok(Some(message))
    }

    fn parse_favorite(rest: &str) -> Result<HostMessage, InputError> {
        let (action, args) = split_word(rest);
        match action {
            "add" => {
                let (path, title) = split_word(args);
                if path.is_empty() || title.is_empty() {
                    return Err(InputError::Usage("fav add <path> <title>"));
                }
                Ok(HostMessage::FavoriteAdd {
                    path: PathBuf::from(path),
                    title: title.to_owned(),
                })
            }
            "play" if !args.is_empty() => Ok(HostMessage::FavoritePlay(args.to_owned())),
            "list" | "" => Ok(HostMessage::FavoriteList),
            _ => Err(InputError::Usage("fav add <path> <title> | fav play <title> | fav list")),
        }
    }
}

fn split_word(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}
