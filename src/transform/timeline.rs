use crate::codec::{TimedEvent, Track};

/// An event pinned to its absolute tick within the track.
#[derive(Debug, Clone)]
pub(crate) struct Stamped {
    pub tick: u64,
    pub event: TimedEvent,
}

/// Rebuilds a track as absolute-time events, so edits can insert, drop or
/// move events without touching their neighbours' positions.
pub(crate) fn stamp(track: Track) -> Vec<Stamped> {
    let mut tick = 0u64;
    track
        .into_iter()
        .map(|event| {
            tick += u64::from(event.delta_ticks);
            Stamped { tick, event }
        })
        .collect()
}

/// Re-derives delta times from absolute ticks. Events must already be in
/// tick order.
pub(crate) fn restamp(events: Vec<Stamped>) -> Track {
    let mut previous = 0u64;
    events
        .into_iter()
        .map(|Stamped { tick, mut event }| {
            event.delta_ticks = u32::try_from(tick - previous).unwrap_or(u32::MAX);
            previous = tick;
            event
        })
        .collect()
}

/// Absolute tick of every event in `track`.
pub fn absolute_ticks(track: &Track) -> Vec<u64> {
    track
        .iter()
        .scan(0u64, |tick, event| {
            *tick += u64::from(event.delta_ticks);
            Some(*tick)
        })
        .collect()
}
