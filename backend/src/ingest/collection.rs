//! Caller-owned frame store shared between an ingest task and readers.

use parking_lot::RwLock;
use std::sync::Arc;

use super::messages::ScanProgress;
use crate::models::Frame;
use crate::parsing::rejection_log::apply_rejections;

/// Frames received so far plus the latest scan counters.
///
/// Cloning shares the underlying storage. Readers never see a half-applied
/// update: computations run on [`FrameCollection::snapshot`].
#[derive(Clone, Default)]
pub struct FrameCollection {
    frames: Arc<RwLock<Vec<Frame>>>,
    progress: Arc<RwLock<ScanProgress>>,
}

impl FrameCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self {
            frames: Arc::new(RwLock::new(frames)),
            progress: Arc::default(),
        }
    }

    pub fn push(&self, frame: Frame) {
        self.frames.write().push(frame);
    }

    pub fn extend(&self, frames: impl IntoIterator<Item = Frame>) {
        self.frames.write().extend(frames);
    }

    /// Copy of the frames at call time.
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.read().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.read().is_empty()
    }

    pub fn progress(&self) -> ScanProgress {
        *self.progress.read()
    }

    pub fn set_progress(&self, progress: ScanProgress) {
        *self.progress.write() = progress;
    }

    /// Flag frames named in a rejection list. Returns how many were flagged.
    pub fn apply_rejections(&self, rejected: &[String]) -> usize {
        apply_rejections(&mut self.frames.write(), rejected)
    }

    /// Drop all frames and reset the counters, e.g. before a rescan.
    pub fn clear(&self) {
        self.frames.write().clear();
        *self.progress.write() = ScanProgress::default();
    }
}

impl std::fmt::Debug for FrameCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCollection")
            .field("frames", &self.len())
            .field("progress", &self.progress())
            .finish()
    }
}
