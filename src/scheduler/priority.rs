//! Stream priorities and the ready set.

use std::collections::VecDeque;
use std::fmt;

use super::error::SchedulerError;

/// Stream priority. Higher values are served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(31);
    /// Number of distinct priority levels.
    pub const LEVELS: usize = Self::MAX.0 as usize + 1;

    pub fn new(value: u32) -> Result<Self, SchedulerError> {
        if value > Self::MAX.0 as u32 {
            return Err(SchedulerError::InvalidArgument(format!(
                "priority {value} outside [0, {}]",
                Self::MAX.0
            )));
        }
        Ok(Self(value as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Streams holding a dispatchable op, partitioned by priority.
///
/// Each partition is a round-robin ring of stream handles: the front is the
/// least recently served stream. `occupied` has bit `p` set iff partition
/// `p` is non-empty, so the highest ready level is one `leading_zeros` away.
/// Membership is tracked by the caller; a handle must not be pushed twice.
pub struct ReadySet {
    partitions: Vec<VecDeque<usize>>,
    occupied: u32,
    len: usize,
}

impl ReadySet {
    pub fn new() -> Self {
        Self {
            partitions: (0..Priority::LEVELS).map(|_| VecDeque::new()).collect(),
            occupied: 0,
            len: 0,
        }
    }

    /// Append `handle` at the tail of its priority partition.
    pub fn push(&mut self, handle: usize, priority: Priority) {
        let idx = priority.index();
        self.partitions[idx].push_back(handle);
        self.occupied |= 1 << idx;
        self.len += 1;
    }

    /// Remove the least recently served stream of the highest ready priority.
    pub fn pop_highest(&mut self) -> Option<usize> {
        if self.occupied == 0 {
            return None;
        }
        let idx = 31 - self.occupied.leading_zeros() as usize;
        let partition = &mut self.partitions[idx];
        let handle = partition.pop_front()?;
        if partition.is_empty() {
            self.occupied &= !(1 << idx);
        }
        self.len -= 1;
        Some(handle)
    }

    /// Remove a specific handle. Returns false if it was not present.
    pub fn remove(&mut self, handle: usize, priority: Priority) -> bool {
        let idx = priority.index();
        let partition = &mut self.partitions[idx];
        let Some(pos) = partition.iter().position(|&h| h == handle) else {
            return false;
        };
        partition.remove(pos);
        if partition.is_empty() {
            self.occupied &= !(1 << idx);
        }
        self.len -= 1;
        true
    }

    pub fn highest(&self) -> Option<Priority> {
        if self.occupied == 0 {
            return None;
        }
        Some(Priority((31 - self.occupied.leading_zeros()) as u8))
    }

    pub fn clear(&mut self) {
        for partition in &mut self.partitions {
            partition.clear();
        }
        self.occupied = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for ReadySet {
    fn default() -> Self {
        Self::new()
    }
}
