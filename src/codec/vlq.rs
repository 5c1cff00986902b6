//! Variable-length quantities as used for delta times and meta lengths.

pub(crate) const MAX_WIDTH: u8 = 4;
pub(crate) const MAX_VALUE: u32 = 0x0FFF_FFFF;

pub(crate) fn min_width(value: u32) -> u8 {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        _ => 4,
    }
}

/// Writes `value` using `width` bytes, or the minimal width if `width` is
/// too narrow for it. The caller guarantees `value <= MAX_VALUE`.
pub(crate) fn write(value: u32, width: Option<u8>, out: &mut Vec<u8>) {
    let minimal = min_width(value);
    let width = width.map_or(minimal, |w| w.clamp(minimal, MAX_WIDTH));
    for i in (0..width).rev() {
        let mut byte = ((value >> (7 * u32::from(i))) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
}
