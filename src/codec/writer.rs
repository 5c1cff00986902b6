use super::CodecError;
use super::event::{MidiFile, Payload, TimedEvent, Track};
use super::vlq;

pub fn encode(file: &MidiFile) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();

    out.extend_from_slice(b"MThd");
    write_len(6 + file.header.extra.len(), &mut out)?;
    out.extend_from_slice(&file.header.format.to_be_bytes());
    out.extend_from_slice(&file.header.track_count.to_be_bytes());
    out.extend_from_slice(&file.header.timing.division().to_be_bytes());
    out.extend_from_slice(&file.header.extra);

    let mut aliens = file.alien_chunks.iter().peekable();
    for (index, track) in file.tracks.iter().enumerate() {
        while let Some(chunk) = aliens.next_if(|c| c.after_tracks <= index) {
            write_chunk(&chunk.id, &chunk.data, &mut out)?;
        }
        let body = encode_track(track)?;
        write_chunk(b"MTrk", &body, &mut out)?;
    }
    for chunk in aliens {
        write_chunk(&chunk.id, &chunk.data, &mut out)?;
    }
    out.extend_from_slice(&file.trailer);

    Ok(out)
}

fn write_len(len: usize, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let len = u32::try_from(len)
        .map_err(|_| CodecError::Unencodable(format!("chunk of {len} bytes is too large")))?;
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn write_chunk(id: &[u8; 4], body: &[u8], out: &mut Vec<u8>) -> Result<(), CodecError> {
    out.extend_from_slice(id);
    write_len(body.len(), out)?;
    out.extend_from_slice(body);
    Ok(())
}

fn encode_track(track: &Track) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    let mut running: Option<u8> = None;
    for event in track {
        encode_event(event, &mut running, &mut out)?;
    }
    Ok(out)
}

fn encode_event(
    event: &TimedEvent,
    running: &mut Option<u8>,
    out: &mut Vec<u8>,
) -> Result<(), CodecError> {
    if event.delta_ticks > vlq::MAX_VALUE {
        return Err(CodecError::Unencodable(format!(
            "delta time {} exceeds the format limit",
            event.delta_ticks
        )));
    }
    vlq::write(event.delta_ticks, event.layout.delta_width, out);

    match &event.payload {
        Payload::NoteOn {
            channel,
            pitch,
            velocity,
        } => write_channel(0x90 | (channel & 0x0F), &[*pitch, *velocity], event, running, out),
        Payload::NoteOff {
            channel,
            pitch,
            velocity,
        } => write_channel(0x80 | (channel & 0x0F), &[*pitch, *velocity], event, running, out),
        Payload::Meta { kind, data } => {
            let len = u32::try_from(data.len())
                .ok()
                .filter(|len| *len <= vlq::MAX_VALUE)
                .ok_or_else(|| {
                    CodecError::Unencodable(format!("meta event of {} bytes", data.len()))
                })?;
            out.push(0xFF);
            out.push(kind.to_byte());
            vlq::write(len, event.layout.length_width, out);
            out.extend_from_slice(data);
        }
        Payload::Other { raw } => match raw.split_first() {
            Some((&status, data)) if (0x80..0xF0).contains(&status) => {
                write_channel(status, data, event, running, out)
            }
            Some(_) => out.extend_from_slice(raw),
            None => return Err(CodecError::Unencodable("empty event".into())),
        },
    }
    Ok(())
}

fn write_channel(
    status: u8,
    data: &[u8],
    event: &TimedEvent,
    running: &mut Option<u8>,
    out: &mut Vec<u8>,
) {
    if !(event.layout.running_status && *running == Some(status)) {
        out.push(status);
    }
    *running = Some(status);
    out.extend(data.iter().map(|b| b & 0x7F));
}
