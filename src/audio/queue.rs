use im::Vector;

use crate::audio::track::Track;

/// Pending tracks for one player. The currently playing track is never in here.
///
/// Backed by a persistent vector, so [`Queue::snapshot`] shares structure with
/// the live queue instead of copying it.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vector<Track>,
}

impl Queue {
    pub fn new() -> Self {
        Self {
            tracks: Vector::new(),
        }
    }

    pub fn enqueue(&mut self, track: Track) {
        self.tracks.push_back(track);
    }

    pub fn dequeue_front(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        Some(self.tracks.remove(index))
    }

    pub fn snapshot(&self) -> Vector<Track> {
        self.tracks.clone()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }
}

impl FromIterator<Track> for Queue {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        Self {
            tracks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str) -> Track {
        Track::remote(title, format!("https://example.com/{title}"), 60).unwrap()
    }

    fn titles(queue: &Queue) -> Vec<&str> {
        queue.iter().map(Track::title).collect()
    }

    #[test]
    fn dequeues_in_fifo_order() {
        let mut queue: Queue = ["a", "b", "c"].into_iter().map(track).collect();

        assert_eq!(queue.dequeue_front().unwrap().title(), "a");
        assert_eq!(queue.dequeue_front().unwrap().title(), "b");
        assert_eq!(queue.dequeue_front().unwrap().title(), "c");
        assert!(queue.dequeue_front().is_none());
    }

    #[test]
    fn remove_at_keeps_relative_order() {
        let mut queue: Queue = ["a", "b", "c", "d"].into_iter().map(track).collect();

        let removed = queue.remove_at(1).unwrap();

        assert_eq!(removed.title(), "b");
        assert_eq!(titles(&queue), ["a", "c", "d"]);
    }

    #[test]
    fn remove_at_out_of_range_leaves_queue_untouched() {
        let mut queue: Queue = ["a", "b"].into_iter().map(track).collect();

        assert!(queue.remove_at(5).is_none());
        assert!(queue.remove_at(2).is_none());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn snapshot_is_detached_from_later_mutations() {
        let mut queue: Queue = ["a", "b"].into_iter().map(track).collect();

        let snapshot = queue.snapshot();
        queue.enqueue(track("c"));
        queue.dequeue_front();

        let snapshot_titles: Vec<_> = snapshot.iter().map(Track::title).collect();
        assert_eq!(snapshot_titles, ["a", "b"]);
        assert_eq!(titles(&queue), ["b", "c"]);
    }

    #[test]
    fn allows_duplicate_titles() {
        let mut queue = Queue::new();
        queue.enqueue(track("same"));
        queue.enqueue(track("same"));

        assert_eq!(queue.len(), 2);
    }
}
