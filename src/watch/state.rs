use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::orchestrator::ContentHash;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    /// Waiting for the path to go quiet until `deadline`.
    PendingDebounce { deadline: Instant },
    /// A worker owns the path. `requeued` records events seen meanwhile.
    Processing { requeued: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchState {
    /// Hash of the last contents this process wrote to the path.
    pub last_written_hash: Option<ContentHash>,
    pub phase: Phase,
}

/// Per-path debounce bookkeeping. Owned by the controller's intake thread,
/// so every transition for a path happens on one thread.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    paths: HashMap<PathBuf, WatchState>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            paths: HashMap::new(),
        }
    }

    pub fn state(&self, path: &Path) -> Option<&WatchState> {
        self.paths.get(path)
    }

    pub fn phase(&self, path: &Path) -> Phase {
        self.paths.get(path).map_or(Phase::Idle, |s| s.phase)
    }

    /// Remembers a write made before the controller started.
    pub fn seed(&mut self, path: PathBuf, hash: ContentHash) {
        self.paths.entry(path).or_default().last_written_hash = Some(hash);
    }

    /// A create or modify event arrived for `path`. Restarts its quiet
    /// period, or marks it for another pass if it is being processed.
    pub fn touch(&mut self, path: PathBuf, now: Instant) {
        let state = self.paths.entry(path).or_default();
        state.phase = match state.phase {
            Phase::Idle | Phase::PendingDebounce { .. } => Phase::PendingDebounce {
                deadline: now + self.quiet,
            },
            Phase::Processing { .. } => Phase::Processing { requeued: true },
        };
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.paths
            .values()
            .filter_map(|s| match s.phase {
                Phase::PendingDebounce { deadline } => Some(deadline),
                _ => None,
            })
            .min()
    }

    /// Moves every path whose quiet period has elapsed into processing and
    /// returns them with the hash of their last known self-write.
    pub fn take_due(&mut self, now: Instant) -> Vec<(PathBuf, Option<ContentHash>)> {
        let mut due: Vec<_> = self
            .paths
            .iter_mut()
            .filter(|(_, s)| {
                matches!(s.phase, Phase::PendingDebounce { deadline } if deadline <= now)
            })
            .map(|(path, s)| {
                s.phase = Phase::Processing { requeued: false };
                (path.clone(), s.last_written_hash)
            })
            .collect();
        due.sort_by(|a, b| a.0.cmp(&b.0));
        due
    }

    /// Processing of `path` finished. Records a fresh self-write, then
    /// returns the path to idle or, when events arrived meanwhile, to a new
    /// quiet period. Returns whether it was re-queued.
    pub fn finish(&mut self, path: &Path, written: Option<ContentHash>, now: Instant) -> bool {
        let Some(state) = self.paths.get_mut(path) else {
            return false;
        };
        if written.is_some() {
            state.last_written_hash = written;
        }
        let requeued = matches!(state.phase, Phase::Processing { requeued: true });
        if requeued {
            state.phase = Phase::PendingDebounce {
                deadline: now + self.quiet,
            };
        } else if state.last_written_hash.is_some() {
            state.phase = Phase::Idle;
        } else {
            self.paths.remove(path);
        }
        requeued
    }

    /// `path` was deleted or moved away. Drops its state and any pending
    /// expiry. A path being processed is left to `finish`.
    pub fn forget(&mut self, path: &Path) {
        if !matches!(self.phase(path), Phase::Processing { .. }) {
            self.paths.remove(path);
        }
    }

    /// Number of paths with state held.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
