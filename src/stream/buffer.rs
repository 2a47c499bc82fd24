use std::collections::VecDeque;

pub(crate) const WINDOW_CAPACITY: usize = 8 * 1024 * 1024;

/// Sliding window over a remote byte range. Holds one contiguous run of bytes
/// starting at `offset`; anything non-contiguous restarts the window.
#[derive(Debug)]
pub struct ByteWindow {
    bytes: VecDeque<u8>,
    offset: u64,
    total_bytes: u64,
    capacity: usize,
    pending: Option<(u64, u64)>,
}

impl ByteWindow {
    pub fn new(total_bytes: u64) -> Self {
        Self::with_capacity(total_bytes, WINDOW_CAPACITY)
    }

    pub fn with_capacity(total_bytes: u64, capacity: usize) -> Self {
        Self {
            bytes: VecDeque::new(),
            offset: 0,
            total_bytes,
            capacity,
            pending: None,
        }
    }

    pub fn covers(&self, pos: u64) -> bool {
        pos >= self.offset && pos < self.end()
    }

    pub fn readable_from(&self, pos: u64) -> usize {
        if self.covers(pos) {
            (self.end() - pos) as usize
        } else {
            0
        }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.bytes.len() as u64
    }

    pub fn is_complete(&self) -> bool {
        self.end() >= self.total_bytes
    }

    pub fn copy_out(&self, pos: u64, buf: &mut [u8]) -> usize {
        let len = buf.len().min(self.readable_from(pos));
        if len == 0 {
            return 0;
        }
        let from = (pos - self.offset) as usize;
        for (dst, src) in buf.iter_mut().zip(self.bytes.range(from..from + len)) {
            *dst = *src;
        }
        len
    }

    /// Appends a fetched chunk. Returns false if it was dropped.
    pub fn push(&mut self, start: u64, chunk: &[u8]) -> bool {
        if self
            .pending
            .is_some_and(|(from, to)| (from..to).contains(&start))
        {
            self.pending = None;
        }
        if chunk.is_empty() || start < self.offset {
            return false;
        }
        if start != self.end() {
            if !self.bytes.is_empty() {
                return false;
            }
            self.offset = start;
        }

        self.bytes.extend(chunk);
        let overflow = self.bytes.len().saturating_sub(self.capacity);
        if overflow > 0 {
            self.bytes.drain(..overflow);
            self.offset += overflow as u64;
        }
        true
    }

    /// Drops everything and repositions the window at `start`.
    pub fn reset(&mut self, start: u64) {
        self.bytes.clear();
        self.offset = start;
        self.pending = None;
    }

    pub fn pending(&self) -> Option<(u64, u64)> {
        self.pending
    }

    pub fn set_pending(&mut self, start: u64, end: u64) {
        self.pending = Some((start, end));
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    pub fn needs_more(&self, pos: u64, low_water: usize) -> bool {
        !self.is_complete() && self.pending.is_none() && self.readable_from(pos) < low_water
    }
}
