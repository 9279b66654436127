//! Per-tick state records and the cursor-addressed timeline that stores them

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Immutable record of one vehicle at one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
    pub target_rotation: Quat,
    /// In [-0.5, 1]
    pub forward_input: f32,
    /// In [-1, 1]
    pub steer_input: f32,
    pub energy: f32,
}

/// Ordered snapshots plus a cursor.
///
/// The cursor is `Some(i)` with `i < len` whenever the timeline is non-empty
/// and `None` otherwise. Appends only happen at the tail and move the cursor
/// onto the new entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    snapshots: Vec<Snapshot>,
    cursor: Option<usize>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.and_then(|i| self.snapshots.get(i))
    }

    pub fn at_head(&self) -> bool {
        self.cursor.map_or(true, |i| i == 0)
    }

    pub fn at_tail(&self) -> bool {
        match self.cursor {
            Some(i) => i + 1 == self.snapshots.len(),
            None => true,
        }
    }

    /// Append at the tail; the cursor follows
    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
        self.cursor = Some(self.snapshots.len() - 1);
    }

    /// Move one entry toward the head. Returns `None` and leaves the cursor
    /// alone when already at the head.
    pub fn step_back(&mut self) -> Option<Snapshot> {
        match self.cursor {
            Some(i) if i > 0 => {
                self.cursor = Some(i - 1);
                Some(self.snapshots[i - 1])
            }
            _ => None,
        }
    }

    /// Move one entry toward the tail. Returns `None` at the tail.
    pub fn step_forward(&mut self) -> Option<Snapshot> {
        match self.cursor {
            Some(i) if i + 1 < self.snapshots.len() => {
                self.cursor = Some(i + 1);
                Some(self.snapshots[i + 1])
            }
            _ => None,
        }
    }

    /// Fork at the cursor. The returned clone holds entries `[0..=k]` with
    /// its cursor on `k`; `self` is truncated to the same prefix, so its
    /// cursor ends up on its tail.
    pub fn cut(&mut self) -> Timeline {
        let clone = self.prefix_clone();
        self.truncate_after_cursor();
        clone
    }

    /// Like [`Timeline::cut`], but the clone also keeps the entries after the
    /// cursor, so whoever owns it replays the abandoned future.
    pub fn cut_keeping_branch(&mut self) -> Timeline {
        let clone = self.clone();
        self.truncate_after_cursor();
        clone
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = None;
    }

    fn prefix_clone(&self) -> Timeline {
        match self.cursor {
            Some(k) => Timeline {
                snapshots: self.snapshots[..=k].to_vec(),
                cursor: Some(k),
            },
            None => Timeline::new(),
        }
    }

    /// Drop every snapshot past the cursor
    pub fn truncate_after_cursor(&mut self) {
        if let Some(k) = self.cursor {
            self.snapshots.truncate(k + 1);
        }
    }
}
