use std::collections::{HashMap, VecDeque};

use crate::codec::{MetaKind, Payload, TimedEvent, Track};
use super::timeline::{restamp, stamp};

pub(crate) fn strip_to_notes(track: Track, keep_meta: &[MetaKind]) -> Track {
    let mut events = stamp(track);
    events.retain(|s| match &s.event.payload {
        Payload::NoteOn { .. } | Payload::NoteOff { .. } => true,
        Payload::Meta { kind, .. } => {
            *kind == MetaKind::EndOfTrack || keep_meta.contains(kind)
        }
        Payload::Other { .. } => false,
    });
    restamp(events)
}

pub(crate) fn transpose(track: &mut Track, semitones: i32) {
    for event in track.iter_mut() {
        if let Payload::NoteOn { pitch, .. } | Payload::NoteOff { pitch, .. } = &mut event.payload {
            *pitch = transpose_pitch(*pitch, semitones);
        }
    }
}

pub fn transpose_pitch(pitch: u8, semitones: i32) -> u8 {
    (i32::from(pitch).saturating_add(semitones)).clamp(0, 127) as u8
}

pub(crate) fn set_track_name(track: &mut Track, name: &str) {
    let mut replaced = false;
    for event in track.iter_mut() {
        if let Payload::Meta {
            kind: MetaKind::TrackName,
            data,
        } = &mut event.payload
        {
            *data = name.as_bytes().to_vec();
            replaced = true;
        }
    }
    if !replaced {
        track.insert(0, TimedEvent::new(0, Payload::track_name(name)));
    }
}

/// Replaces each release that lands more than `max_ticks` after its
/// note-on with a plain note-off exactly `max_ticks` after it. Releases pair
/// with the earliest still-open note-on of the same channel and pitch.
pub(crate) fn cap_note_length(track: Track, max_ticks: u64) -> Track {
    let mut events = stamp(track);
    let mut open: HashMap<(u8, u8), VecDeque<u64>> = HashMap::new();
    let mut moved = false;

    for stamped in events.iter_mut() {
        if let Some(key) = stamped.event.payload.strikes() {
            open.entry(key).or_default().push_back(stamped.tick);
        } else if let Some(key) = stamped.event.payload.releases() {
            let Some(on_tick) = open.get_mut(&key).and_then(VecDeque::pop_front) else {
                continue;
            };
            let capped = on_tick + max_ticks;
            if stamped.tick > capped {
                let (channel, pitch) = key;
                stamped.tick = capped;
                stamped.event = TimedEvent::new(
                    0,
                    Payload::NoteOff {
                        channel,
                        pitch,
                        velocity: 0,
                    },
                );
                moved = true;
            }
        }
    }

    if moved {
        // stable: a moved note-off lands after events already at its tick
        events.sort_by_key(|s| s.tick);
    }
    restamp(events)
}

pub(crate) fn force_channel_zero(track: &mut Track) {
    for event in track.iter_mut() {
        if let Payload::NoteOn { channel, .. } | Payload::NoteOff { channel, .. } =
            &mut event.payload
        {
            *channel = 0;
        }
    }
}
