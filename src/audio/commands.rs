use im::Vector;

use crate::audio::track::Track;

#[derive(Debug, Clone, PartialEq)]
pub enum AudioCommand {
    Enqueue(Track),
    RemoveFromQueue(usize),
    Play,
    Pause,
    Resume,
    Stop,
    Skip,
    SetVolume(f32),
    /// 0-100 scale; out-of-range values are clamped.
    SetVolumePercent(i64),
    VolumeUp(u8),
    VolumeDown(u8),
    ListQueue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Done,
    Removed(Track),
    Volume(f32),
    Queue(Vector<Track>),
}
