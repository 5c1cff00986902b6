/// How an event was laid out on disk, so untouched events encode back to
/// the exact bytes they were read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Layout {
    /// Width of the delta-time field when it was wider than necessary.
    pub delta_width: Option<u8>,
    /// Width of a meta length field when it was wider than necessary.
    pub length_width: Option<u8>,
    /// The status byte was omitted (running status).
    pub running_status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub delta_ticks: u32,
    pub payload: Payload,
    pub(crate) layout: Layout,
}

impl TimedEvent {
    pub fn new(delta_ticks: u32, payload: Payload) -> Self {
        Self {
            delta_ticks,
            payload,
            layout: Layout::default(),
        }
    }

    pub fn is_end_of_track(&self) -> bool {
        matches!(
            self.payload,
            Payload::Meta {
                kind: MetaKind::EndOfTrack,
                ..
            }
        )
    }

    pub fn is_note(&self) -> bool {
        matches!(self.payload, Payload::NoteOn { .. } | Payload::NoteOff { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8, velocity: u8 },
    Meta { kind: MetaKind, data: Vec<u8> },
    /// Any other channel message or a sysex event, status byte first.
    Other { raw: Vec<u8> },
}

impl Payload {
    pub fn end_of_track() -> Self {
        Payload::Meta {
            kind: MetaKind::EndOfTrack,
            data: Vec::new(),
        }
    }

    pub fn track_name(name: &str) -> Self {
        Payload::Meta {
            kind: MetaKind::TrackName,
            data: name.as_bytes().to_vec(),
        }
    }

    /// `(channel, pitch)` when this event ends a sounding note. A note-on
    /// with zero velocity counts as a note-off.
    pub fn releases(&self) -> Option<(u8, u8)> {
        match *self {
            Payload::NoteOff { channel, pitch, .. } => Some((channel, pitch)),
            Payload::NoteOn {
                channel,
                pitch,
                velocity: 0,
            } => Some((channel, pitch)),
            _ => None,
        }
    }

    /// `(channel, pitch)` when this event starts a sounding note.
    pub fn strikes(&self) -> Option<(u8, u8)> {
        match *self {
            Payload::NoteOn {
                channel,
                pitch,
                velocity,
            } if velocity > 0 => Some((channel, pitch)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKind {
    SequenceNumber,
    Text,
    Copyright,
    TrackName,
    InstrumentName,
    Lyrics,
    Marker,
    CueMarker,
    ChannelPrefix,
    MidiPort,
    EndOfTrack,
    SetTempo,
    SmpteOffset,
    TimeSignature,
    KeySignature,
    SequencerSpecific,
    Unknown(u8),
}

const NAMED_KINDS: [(MetaKind, &str); 16] = [
    (MetaKind::SequenceNumber, "sequence_number"),
    (MetaKind::Text, "text"),
    (MetaKind::Copyright, "copyright"),
    (MetaKind::TrackName, "track_name"),
    (MetaKind::InstrumentName, "instrument_name"),
    (MetaKind::Lyrics, "lyrics"),
    (MetaKind::Marker, "marker"),
    (MetaKind::CueMarker, "cue_marker"),
    (MetaKind::ChannelPrefix, "channel_prefix"),
    (MetaKind::MidiPort, "midi_port"),
    (MetaKind::EndOfTrack, "end_of_track"),
    (MetaKind::SetTempo, "set_tempo"),
    (MetaKind::SmpteOffset, "smpte_offset"),
    (MetaKind::TimeSignature, "time_signature"),
    (MetaKind::KeySignature, "key_signature"),
    (MetaKind::SequencerSpecific, "sequencer_specific"),
];

impl MetaKind {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => MetaKind::SequenceNumber,
            0x01 => MetaKind::Text,
            0x02 => MetaKind::Copyright,
            0x03 => MetaKind::TrackName,
            0x04 => MetaKind::InstrumentName,
            0x05 => MetaKind::Lyrics,
            0x06 => MetaKind::Marker,
            0x07 => MetaKind::CueMarker,
            0x20 => MetaKind::ChannelPrefix,
            0x21 => MetaKind::MidiPort,
            0x2F => MetaKind::EndOfTrack,
            0x51 => MetaKind::SetTempo,
            0x54 => MetaKind::SmpteOffset,
            0x58 => MetaKind::TimeSignature,
            0x59 => MetaKind::KeySignature,
            0x7F => MetaKind::SequencerSpecific,
            other => MetaKind::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            MetaKind::SequenceNumber => 0x00,
            MetaKind::Text => 0x01,
            MetaKind::Copyright => 0x02,
            MetaKind::TrackName => 0x03,
            MetaKind::InstrumentName => 0x04,
            MetaKind::Lyrics => 0x05,
            MetaKind::Marker => 0x06,
            MetaKind::CueMarker => 0x07,
            MetaKind::ChannelPrefix => 0x20,
            MetaKind::MidiPort => 0x21,
            MetaKind::EndOfTrack => 0x2F,
            MetaKind::SetTempo => 0x51,
            MetaKind::SmpteOffset => 0x54,
            MetaKind::TimeSignature => 0x58,
            MetaKind::KeySignature => 0x59,
            MetaKind::SequencerSpecific => 0x7F,
            MetaKind::Unknown(byte) => byte,
        }
    }

    /// Looks up a meta kind by its configuration name, e.g. `"set_tempo"`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        NAMED_KINDS
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(kind, _)| *kind)
    }
}

pub type Track = Vec<TimedEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    TicksPerQuarter(u16),
    /// Raw SMPTE division word, top bit set.
    Smpte(u16),
}

impl Timing {
    pub fn from_division(division: u16) -> Self {
        if division & 0x8000 != 0 {
            Timing::Smpte(division)
        } else {
            Timing::TicksPerQuarter(division)
        }
    }

    pub fn division(self) -> u16 {
        match self {
            Timing::TicksPerQuarter(ticks) => ticks,
            Timing::Smpte(raw) => raw,
        }
    }

    pub fn ticks_per_quarter(self) -> Option<u16> {
        match self {
            Timing::TicksPerQuarter(ticks) => Some(ticks),
            Timing::Smpte(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub format: u16,
    /// Track count as declared in the header.
    pub track_count: u16,
    pub timing: Timing,
    /// Header bytes beyond the standard six.
    pub(crate) extra: Vec<u8>,
}

impl Header {
    pub fn new(format: u16, track_count: u16, timing: Timing) -> Self {
        Self {
            format,
            track_count,
            timing,
            extra: Vec::new(),
        }
    }
}

/// A chunk that is neither the header nor a track, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AlienChunk {
    /// Number of track chunks that precede this chunk.
    pub after_tracks: usize,
    pub id: [u8; 4],
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiFile {
    pub header: Header,
    pub tracks: Vec<Track>,
    pub(crate) alien_chunks: Vec<AlienChunk>,
    pub(crate) trailer: Vec<u8>,
}

impl MidiFile {
    pub fn new(header: Header, tracks: Vec<Track>) -> Self {
        Self {
            header,
            tracks,
            alien_chunks: Vec::new(),
            trailer: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_kind_bytes_and_names_agree() {
        for (kind, name) in NAMED_KINDS {
            assert_eq!(MetaKind::from_byte(kind.to_byte()), kind);
            assert_eq!(MetaKind::from_name(name), Some(kind));
        }
        assert_eq!(MetaKind::from_byte(0x60), MetaKind::Unknown(0x60));
        assert_eq!(MetaKind::from_name("Set_Tempo"), Some(MetaKind::SetTempo));
        assert_eq!(MetaKind::from_name("tempo"), None);
    }

    #[test]
    fn zero_velocity_note_on_releases() {
        let payload = Payload::NoteOn {
            channel: 2,
            pitch: 60,
            velocity: 0,
        };
        assert_eq!(payload.releases(), Some((2, 60)));
        assert_eq!(payload.strikes(), None);
    }

    #[test]
    fn smpte_division_is_detected() {
        assert_eq!(Timing::from_division(480), Timing::TicksPerQuarter(480));
        assert_eq!(Timing::from_division(0xE728).ticks_per_quarter(), None);
    }
}
