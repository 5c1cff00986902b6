use super::CodecError;
use super::event::{
    AlienChunk, Header, Layout, MetaKind, MidiFile, Payload, TimedEvent, Timing, Track,
};
use super::vlq;

/// Byte cursor over a whole file. Offsets in errors are absolute.
struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    fn malformed(&self, reason: impl Into<String>) -> CodecError {
        CodecError::malformed(self.position, reason)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(self.malformed("unexpected end of data"));
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.position).copied()
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn chunk_id(&mut self) -> Result<[u8; 4], CodecError> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Reads a variable-length quantity, returning the value and how many
    /// bytes it occupied.
    fn vlq(&mut self) -> Result<(u32, u8), CodecError> {
        let mut value = 0u32;
        for width in 1..=vlq::MAX_WIDTH {
            let byte = self.byte()?;
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok((value, width));
            }
        }
        Err(self.malformed("variable-length quantity longer than 4 bytes"))
    }

    fn data_byte(&mut self) -> Result<u8, CodecError> {
        let byte = self.byte()?;
        if byte & 0x80 != 0 {
            self.position -= 1;
            return Err(self.malformed(format!("expected data byte, found {byte:#04x}")));
        }
        Ok(byte)
    }
}

/// Width to remember: `None` when the value used its minimal encoding.
fn recorded_width(value: u32, width: u8) -> Option<u8> {
    (width != vlq::min_width(value)).then_some(width)
}

pub fn decode(bytes: &[u8]) -> Result<MidiFile, CodecError> {
    let mut reader = Reader::new(bytes);

    if reader.remaining() < 14 || reader.chunk_id()? != *b"MThd" {
        return Err(CodecError::malformed(0, "missing MThd header chunk"));
    }
    let header_len = reader.u32()? as usize;
    if header_len < 6 {
        return Err(reader.malformed(format!("header chunk length {header_len} is below 6")));
    }
    if header_len > reader.remaining() {
        return Err(reader.malformed("header chunk length exceeds file size"));
    }
    let format = reader.u16()?;
    let track_count = reader.u16()?;
    let timing = Timing::from_division(reader.u16()?);
    if timing == Timing::TicksPerQuarter(0) {
        return Err(reader.malformed("resolution of zero ticks per quarter note"));
    }
    let extra = reader.take(header_len - 6)?.to_vec();

    let mut tracks = Vec::new();
    let mut alien_chunks = Vec::new();
    let mut trailer = Vec::new();

    while reader.remaining() > 0 {
        if reader.remaining() < 8 {
            trailer = reader.take(reader.remaining())?.to_vec();
            break;
        }
        let chunk_start = reader.position;
        let id = reader.chunk_id()?;
        let len = reader.u32()? as usize;
        if len > reader.remaining() {
            return Err(CodecError::malformed(
                chunk_start,
                format!(
                    "chunk length {len} exceeds the {} bytes remaining",
                    reader.remaining()
                ),
            ));
        }
        if id == *b"MTrk" {
            let body_start = reader.position;
            let mut body = Reader {
                bytes: &reader.bytes[..body_start + len],
                position: body_start,
            };
            tracks.push(decode_track(&mut body)?);
            reader.position = body_start + len;
        } else {
            alien_chunks.push(AlienChunk {
                after_tracks: tracks.len(),
                id,
                data: reader.take(len)?.to_vec(),
            });
        }
    }

    Ok(MidiFile {
        header: Header {
            format,
            track_count,
            timing,
            extra,
        },
        tracks,
        alien_chunks,
        trailer,
    })
}

fn decode_track(reader: &mut Reader<'_>) -> Result<Track, CodecError> {
    let mut track = Vec::new();
    let mut running: Option<u8> = None;

    while reader.remaining() > 0 {
        let (delta_ticks, delta_len) = reader.vlq()?;
        let mut layout = Layout {
            delta_width: recorded_width(delta_ticks, delta_len),
            ..Layout::default()
        };

        let status = match reader.peek() {
            Some(byte) if byte & 0x80 != 0 => {
                reader.position += 1;
                byte
            }
            Some(_) => {
                layout.running_status = true;
                running.ok_or_else(|| reader.malformed("data byte without running status"))?
            }
            None => return Err(reader.malformed("event truncated after delta time")),
        };

        let payload = match status {
            0xFF => {
                let kind = MetaKind::from_byte(reader.byte()?);
                let (len, len_width) = reader.vlq()?;
                layout.length_width = recorded_width(len, len_width);
                let data = reader.take(len as usize)?.to_vec();
                Payload::Meta { kind, data }
            }
            0xF0 | 0xF7 => {
                let start = reader.position - 1;
                let (len, _) = reader.vlq()?;
                reader.take(len as usize)?;
                Payload::Other {
                    raw: reader.bytes[start..reader.position].to_vec(),
                }
            }
            0x80..=0xEF => {
                running = Some(status);
                decode_channel_message(reader, status)?
            }
            other => {
                return Err(reader.malformed(format!("unsupported status byte {other:#04x}")));
            }
        };

        let event = TimedEvent {
            delta_ticks,
            payload,
            layout,
        };
        let done = event.is_end_of_track();
        track.push(event);
        if done {
            if reader.remaining() > 0 {
                return Err(reader.malformed("events after end of track"));
            }
            return Ok(track);
        }
    }

    Err(reader.malformed("track chunk without end of track"))
}

fn decode_channel_message(reader: &mut Reader<'_>, status: u8) -> Result<Payload, CodecError> {
    let channel = status & 0x0F;
    let payload = match status & 0xF0 {
        0x80 => Payload::NoteOff {
            channel,
            pitch: reader.data_byte()?,
            velocity: reader.data_byte()?,
        },
        0x90 => Payload::NoteOn {
            channel,
            pitch: reader.data_byte()?,
            velocity: reader.data_byte()?,
        },
        0xC0 | 0xD0 => Payload::Other {
            raw: vec![status, reader.data_byte()?],
        },
        _ => Payload::Other {
            raw: vec![status, reader.data_byte()?, reader.data_byte()?],
        },
    };
    Ok(payload)
}
