mod controller;
mod state;

pub use controller::{
    Controller, ControllerHandle, JobOutcome, Notifier, SweepSummary, WatchReport,
};
pub use state::{Debouncer, Phase, WatchState};

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;

use crate::scan::ScanFilter;

/// Subscribes to changes below `root` and forwards every accepted MIDI path
/// to the controller. Watching stops when the returned watcher is dropped.
pub fn watch_root(
    root: &Path,
    filter: ScanFilter,
    notifier: Notifier,
) -> notify::Result<RecommendedWatcher> {
    let base = root.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => forward(event, &base, &filter, &notifier),
            Err(e) => tracing::error!("watch error: {}", e),
        },
        Config::default(),
    )?;

    watcher.watch(root, RecursiveMode::Recursive)?;
    tracing::info!("watching {}", root.display());
    Ok(watcher)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Touched,
    Removed,
    /// Both ends of a rename: the first path went away, the second appeared.
    Renamed,
}

/// Creates, writes and renames count; metadata and access changes do not.
fn classify(kind: &EventKind) -> Option<Change> {
    match kind {
        EventKind::Create(_) => Some(Change::Touched),
        EventKind::Remove(_) => Some(Change::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(Change::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Some(Change::Renamed),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(Change::Touched),
        _ => None,
    }
}

fn forward(event: notify::Event, root: &Path, filter: &ScanFilter, notifier: &Notifier) {
    let Some(change) = classify(&event.kind) else {
        return;
    };
    for (index, path) in event.paths.into_iter().enumerate() {
        if !filter.accepts(root, &path) {
            continue;
        }
        match change {
            Change::Removed => notifier.remove(path),
            Change::Renamed if index == 0 => notifier.remove(path),
            Change::Touched | Change::Renamed => notifier.touch(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    #[test]
    fn content_changes_are_recognised() {
        let modify = |kind| classify(&EventKind::Modify(kind));
        assert_eq!(classify(&EventKind::Create(CreateKind::File)), Some(Change::Touched));
        assert_eq!(modify(ModifyKind::Data(DataChange::Any)), Some(Change::Touched));
        assert_eq!(modify(ModifyKind::Name(RenameMode::To)), Some(Change::Touched));
        assert_eq!(modify(ModifyKind::Any), Some(Change::Touched));

        assert_eq!(modify(ModifyKind::Metadata(MetadataKind::Permissions)), None);
        assert_eq!(classify(&EventKind::Access(AccessKind::Any)), None);
    }

    #[test]
    fn deletions_and_renames_away_are_removals() {
        assert_eq!(classify(&EventKind::Remove(RemoveKind::File)), Some(Change::Removed));
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(Change::Removed)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(Change::Renamed)
        );
    }
}
