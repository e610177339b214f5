//! Minimal RIFF container scan for WebP animation timing.
//!
//! The generic decoder hands out pixels but not the per-frame display
//! durations in the form the pipeline needs, so the `ANMF` chunk headers are
//! read directly. Only timing is extracted; everything else is skipped.

use std::io::{Read, Seek, SeekFrom};

use super::ConvertError;

/// Offset of the 24-bit duration field inside an ANMF payload.
const DURATION_OFFSET: usize = 12;

/// Scans a RIFF/WEBP stream and returns one display duration (ms) per
/// `ANMF` chunk, in file order.
///
/// The scan stops once the absolute cursor position passes the size declared
/// in the RIFF header. Every chunk read is bounds-checked against the actual
/// stream length; a chunk that overruns it fails with
/// [`ConvertError::TruncatedContainer`].
pub fn frame_durations<R: Read + Seek>(reader: &mut R) -> Result<Vec<u32>, ConvertError> {
    let stream_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut tag = [0u8; 4];
    read_exact(reader, &mut tag)?;
    if &tag != b"RIFF" {
        return Err(ConvertError::InvalidContainer);
    }
    let declared_size = u64::from(read_u32_le(reader)?);
    read_exact(reader, &mut tag)?;
    if &tag != b"WEBP" {
        return Err(ConvertError::InvalidContainer);
    }

    let mut durations = Vec::new();
    while reader.stream_position()? < declared_size {
        read_exact(reader, &mut tag)?;
        let chunk_size = u64::from(read_u32_le(reader)?);
        if reader.stream_position()? + chunk_size > stream_len {
            return Err(ConvertError::TruncatedContainer);
        }
        if &tag == b"ANMF" {
            // The payload must at least cover the duration field.
            if chunk_size < (DURATION_OFFSET + 3) as u64 {
                return Err(ConvertError::TruncatedContainer);
            }
            let mut payload = vec![0u8; chunk_size as usize];
            read_exact(reader, &mut payload)?;
            durations.push(duration_ms(&payload));
        } else {
            reader.seek(SeekFrom::Current(chunk_size as i64))?;
        }
    }

    Ok(durations)
}

/// 24-bit little-endian duration at payload offset 12.
fn duration_ms(payload: &[u8]) -> u32 {
    let b = &payload[DURATION_OFFSET..DURATION_OFFSET + 3];
    u32::from(b[2]) << 16 | u32::from(b[1]) << 8 | u32::from(b[0])
}

fn read_u32_le<R: Read>(reader: &mut R) -> Result<u32, ConvertError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// `read_exact` with EOF mapped to the truncation error; everything else
/// stays an i/o failure.
fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), ConvertError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ConvertError::TruncatedContainer,
        _ => ConvertError::Io(e),
    })
}
