//! Standard MIDI File codec.
//!
//! Decoding keeps enough layout detail (delta-time widths, running status,
//! non-track chunks) that encoding an unmodified file reproduces its bytes
//! exactly.

mod event;
mod reader;
mod vlq;
mod writer;

use thiserror::Error;

pub use event::{Header, MetaKind, MidiFile, Payload, TimedEvent, Timing, Track};
pub use reader::decode;
pub use writer::encode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed MIDI data at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
    #[error("cannot encode MIDI data: {0}")]
    Unencodable(String),
}

impl CodecError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        CodecError::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_480: [u8; 14] = [
        b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 1, 0, 1, 0x01, 0xE0,
    ];

    fn file_with_track(body: &[u8]) -> Vec<u8> {
        let mut bytes = HEADER_480.to_vec();
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(body);
        bytes
    }

    fn assert_round_trip(bytes: &[u8]) {
        let file = decode(bytes).unwrap();
        assert_eq!(encode(&file).unwrap(), bytes);
    }

    #[test]
    fn decodes_notes_and_meta() {
        let bytes = file_with_track(&[
            0x00, 0xFF, 0x03, 0x04, b'L', b'e', b'a', b'd', // track name
            0x00, 0x91, 0x3C, 0x64, // note on ch1
            0x83, 0x60, 0x81, 0x3C, 0x40, // note off after 480
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        let file = decode(&bytes).unwrap();

        assert_eq!(file.header.timing, Timing::TicksPerQuarter(480));
        assert_eq!(file.tracks.len(), 1);
        let track = &file.tracks[0];
        assert_eq!(track.len(), 4);
        assert_eq!(track[0].payload, Payload::track_name("Lead"));
        assert_eq!(
            track[1].payload,
            Payload::NoteOn {
                channel: 1,
                pitch: 60,
                velocity: 100
            }
        );
        assert_eq!(track[2].delta_ticks, 480);
        assert!(track[3].is_end_of_track());
    }

    #[test]
    fn round_trips_running_status() {
        assert_round_trip(&file_with_track(&[
            0x00, 0x90, 0x3C, 0x64, // note on
            0x00, 0x40, 0x64, // running status note on
            0x60, 0x3C, 0x00, // running status, velocity zero
            0x00, 0xB0, 0x07, 0x7F, // control change
            0x00, 0x0A, 0x40, // running status control change
            0x00, 0xFF, 0x2F, 0x00,
        ]));
    }

    #[test]
    fn round_trips_padded_delta_times_and_meta_lengths() {
        assert_round_trip(&file_with_track(&[
            0x80, 0x00, 0x90, 0x3C, 0x64, // zero delta written in two bytes
            0x80, 0x80, 0x10, 0x80, 0x3C, 0x00, // 16 in three bytes
            0x00, 0xFF, 0x01, 0x80, 0x02, b'h', b'i', // text with padded length
            0x00, 0xFF, 0x2F, 0x00,
        ]));
    }

    #[test]
    fn round_trips_sysex_and_alien_chunks() {
        let mut bytes = file_with_track(&[
            0x00, 0xF0, 0x03, 0x7E, 0x09, 0xF7, // sysex
            0x00, 0xC5, 0x21, // program change
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        bytes.extend_from_slice(b"XFIH");
        bytes.extend_from_slice(&[0, 0, 0, 2, 0xAB, 0xCD]);
        bytes.extend_from_slice(&[0, 0]);
        assert_round_trip(&bytes);
    }

    #[test]
    fn round_trips_extended_header() {
        let mut bytes = vec![b'M', b'T', b'h', b'd', 0, 0, 0, 8, 0, 0, 0, 1, 0, 96, 0xAA, 0xBB];
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&[0, 0, 0, 4, 0x00, 0xFF, 0x2F, 0x00]);
        assert_round_trip(&bytes);
    }

    #[test]
    fn running_status_survives_meta_events() {
        let bytes = file_with_track(&[
            0x00, 0x90, 0x3C, 0x64, //
            0x00, 0xFF, 0x01, 0x00, // empty text
            0x10, 0x3C, 0x00, // running status after meta
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        let file = decode(&bytes).unwrap();
        assert_eq!(
            file.tracks[0][2].payload,
            Payload::NoteOn {
                channel: 0,
                pitch: 60,
                velocity: 0
            }
        );
        assert_round_trip(&bytes);
    }

    #[test]
    fn explicit_status_is_written_when_running_status_is_broken() {
        let bytes = file_with_track(&[
            0x00, 0xB0, 0x07, 0x7F, //
            0x00, 0x90, 0x3C, 0x64, //
            0x10, 0x3C, 0x00, // relies on the note on above
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        let mut file = decode(&bytes).unwrap();
        file.tracks[0].remove(1);
        let encoded = encode(&file).unwrap();
        let reparsed = decode(&encoded).unwrap();
        assert_eq!(
            reparsed.tracks[0][1].payload,
            Payload::NoteOn {
                channel: 0,
                pitch: 60,
                velocity: 0
            }
        );
    }

    #[test]
    fn encodes_constructed_file_canonically() {
        let file = MidiFile::new(
            Header::new(0, 1, Timing::TicksPerQuarter(96)),
            vec![vec![
                TimedEvent::new(
                    0,
                    Payload::NoteOn {
                        channel: 0,
                        pitch: 64,
                        velocity: 90,
                    },
                ),
                TimedEvent::new(
                    200,
                    Payload::NoteOn {
                        channel: 0,
                        pitch: 64,
                        velocity: 0,
                    },
                ),
                TimedEvent::new(0, Payload::end_of_track()),
            ]],
        );
        let bytes = encode(&file).unwrap();
        assert_eq!(
            &bytes[14..],
            &[
                b'M', b'T', b'r', b'k', 0, 0, 0, 13, //
                0x00, 0x90, 0x40, 0x5A, //
                0x81, 0x48, 0x90, 0x40, 0x00, //
                0x00, 0xFF, 0x2F, 0x00,
            ]
        );
        assert_eq!(decode(&bytes).unwrap(), file);
    }

    fn malformed_reason(bytes: &[u8]) -> String {
        match decode(bytes) {
            Err(CodecError::Malformed { reason, .. }) => reason,
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_header() {
        assert!(malformed_reason(b"RIFF\0\0\0\x06\0\0\0\x01\x01\xE0").contains("MThd"));
        assert!(malformed_reason(&HEADER_480[..10]).contains("MThd"));

        let mut short = HEADER_480.to_vec();
        short[7] = 4;
        assert!(malformed_reason(&short).contains("below 6"));

        let mut zero = HEADER_480.to_vec();
        zero[12] = 0;
        zero[13] = 0;
        assert!(malformed_reason(&zero).contains("zero ticks"));
    }

    #[test]
    fn rejects_oversized_track_chunk() {
        let mut bytes = file_with_track(&[0x00, 0xFF, 0x2F, 0x00]);
        bytes[21] = 0x40;
        assert!(malformed_reason(&bytes).contains("exceeds"));
    }

    #[test]
    fn rejects_track_without_end_of_track() {
        let bytes = file_with_track(&[0x00, 0x90, 0x3C, 0x64]);
        assert!(malformed_reason(&bytes).contains("without end of track"));
    }

    #[test]
    fn rejects_events_after_end_of_track() {
        let bytes = file_with_track(&[0x00, 0xFF, 0x2F, 0x00, 0x00, 0x90, 0x3C, 0x64]);
        assert!(malformed_reason(&bytes).contains("after end of track"));
    }

    #[test]
    fn rejects_data_byte_without_running_status() {
        let bytes = file_with_track(&[0x00, 0x3C, 0x64, 0x00, 0xFF, 0x2F, 0x00]);
        assert!(malformed_reason(&bytes).contains("running status"));
    }

    #[test]
    fn rejects_truncated_event() {
        let bytes = file_with_track(&[0x00, 0x90, 0x3C]);
        assert!(malformed_reason(&bytes).contains("end of data"));
    }

    #[test]
    fn rejects_overlong_delta() {
        let bytes = file_with_track(&[0xFF, 0xFF, 0xFF, 0xFF, 0x7F, 0xFF, 0x2F, 0x00]);
        assert!(malformed_reason(&bytes).contains("longer than 4 bytes"));
    }

    #[test]
    fn refuses_to_encode_oversized_delta() {
        let file = MidiFile::new(
            Header::new(0, 1, Timing::TicksPerQuarter(96)),
            vec![vec![TimedEvent::new(0x1000_0000, Payload::end_of_track())]],
        );
        assert!(matches!(encode(&file), Err(CodecError::Unencodable(_))));
    }
}
