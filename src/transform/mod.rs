//! Timing-preserving edits over decoded tracks.

mod edits;
mod timeline;

use std::fmt;

use thiserror::Error;

use crate::codec::{MetaKind, MidiFile};

pub use edits::transpose_pitch;
pub use timeline::absolute_ticks;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("note length {0} needs ticks-per-quarter timing, but the file uses SMPTE timing")]
    SmpteTiming(NoteLength),
}

/// A musical duration a note may be capped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteLength {
    Eighth,
}

impl NoteLength {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1/8" => Some(NoteLength::Eighth),
            _ => None,
        }
    }

    pub fn ticks(self, ticks_per_quarter: u16) -> u64 {
        match self {
            NoteLength::Eighth => u64::from(ticks_per_quarter) * 4 / 8,
        }
    }
}

impl fmt::Display for NoteLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteLength::Eighth => write!(f, "1/8"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Drop everything but notes, end of track and the listed meta kinds.
    StripToNotes { keep_meta: Vec<MetaKind> },
    Transpose(i32),
    SetTrackName(String),
    CapNoteLength(NoteLength),
    ForceChannelZero,
}

impl Edit {
    fn apply(&self, file: &mut MidiFile) -> Result<(), TransformError> {
        match self {
            Edit::StripToNotes { keep_meta } => {
                for track in file.tracks.iter_mut() {
                    *track = edits::strip_to_notes(std::mem::take(track), keep_meta);
                }
            }
            Edit::Transpose(semitones) => {
                for track in file.tracks.iter_mut() {
                    edits::transpose(track, *semitones);
                }
            }
            Edit::SetTrackName(name) => {
                for track in file.tracks.iter_mut() {
                    edits::set_track_name(track, name);
                }
            }
            Edit::CapNoteLength(length) => {
                let ticks_per_quarter = file
                    .header
                    .timing
                    .ticks_per_quarter()
                    .ok_or(TransformError::SmpteTiming(*length))?;
                let max_ticks = length.ticks(ticks_per_quarter);
                for track in file.tracks.iter_mut() {
                    *track = edits::cap_note_length(std::mem::take(track), max_ticks);
                }
            }
            Edit::ForceChannelZero => {
                for track in file.tracks.iter_mut() {
                    edits::force_channel_zero(track);
                }
            }
        }
        Ok(())
    }
}

/// An ordered list of edits, run front to back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    edits: Vec<Edit>,
}

impl Pipeline {
    pub fn new(edits: Vec<Edit>) -> Self {
        Self { edits }
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn apply(&self, mut file: MidiFile) -> Result<MidiFile, TransformError> {
        for edit in &self.edits {
            edit.apply(&mut file)?;
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Header, Payload, TimedEvent, Timing};

    fn file(timing: Timing, track: Vec<TimedEvent>) -> MidiFile {
        MidiFile::new(Header::new(0, 1, timing), vec![track])
    }

    fn note(delta: u32, on: bool, channel: u8, pitch: u8) -> TimedEvent {
        let payload = if on {
            Payload::NoteOn {
                channel,
                pitch,
                velocity: 90,
            }
        } else {
            Payload::NoteOff {
                channel,
                pitch,
                velocity: 0,
            }
        };
        TimedEvent::new(delta, payload)
    }

    #[test]
    fn eighth_note_is_half_a_quarter() {
        assert_eq!(NoteLength::parse("1/8"), Some(NoteLength::Eighth));
        assert_eq!(NoteLength::parse("1/4"), None);
        assert_eq!(NoteLength::Eighth.ticks(480), 240);
        assert_eq!(NoteLength::Eighth.ticks(96), 48);
    }

    #[test]
    fn edits_run_in_order() {
        let pipeline = Pipeline::new(vec![
            Edit::StripToNotes { keep_meta: vec![] },
            Edit::Transpose(-12),
            Edit::SetTrackName("Bass".into()),
            Edit::ForceChannelZero,
        ]);
        let input = file(
            Timing::TicksPerQuarter(480),
            vec![
                TimedEvent::new(0, Payload::track_name("old")),
                note(0, true, 4, 40),
                note(480, false, 4, 40),
                TimedEvent::new(0, Payload::end_of_track()),
            ],
        );
        let output = pipeline.apply(input).unwrap();
        assert_eq!(
            output.tracks[0],
            vec![
                TimedEvent::new(0, Payload::track_name("Bass")),
                note(0, true, 0, 28),
                note(480, false, 0, 28),
                TimedEvent::new(0, Payload::end_of_track()),
            ]
        );
    }

    #[test]
    fn cap_uses_file_resolution() {
        let pipeline = Pipeline::new(vec![Edit::CapNoteLength(NoteLength::Eighth)]);
        let input = file(
            Timing::TicksPerQuarter(96),
            vec![
                note(0, true, 9, 36),
                note(96, false, 9, 36),
                TimedEvent::new(0, Payload::end_of_track()),
            ],
        );
        let output = pipeline.apply(input).unwrap();
        assert_eq!(absolute_ticks(&output.tracks[0]), [0, 48, 96]);
    }

    #[test]
    fn cap_rejects_smpte_timing() {
        let pipeline = Pipeline::new(vec![Edit::CapNoteLength(NoteLength::Eighth)]);
        let input = file(
            Timing::Smpte(0xE728),
            vec![TimedEvent::new(0, Payload::end_of_track())],
        );
        assert_eq!(
            pipeline.apply(input),
            Err(TransformError::SmpteTiming(NoteLength::Eighth))
        );
    }

    #[test]
    fn empty_pipeline_returns_input() {
        let input = file(
            Timing::TicksPerQuarter(480),
            vec![TimedEvent::new(0, Payload::end_of_track())],
        );
        assert_eq!(Pipeline::default().apply(input.clone()).unwrap(), input);
    }
}
