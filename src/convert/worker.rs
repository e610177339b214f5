//! Background conversion worker: decode, reduce, quantize, encode.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use color_quant::NeuQuant;
use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, Delay, Frame, RgbaImage};

use super::{riff, ConversionJob, ConversionReport, ConvertError};

/// Substituted when the container scan does not cover every decoded frame.
const DEFAULT_FRAME_MS: u32 = 100;

/// NeuQuant sampling factor; 10 is the usual quality/speed middle ground.
const QUANT_SAMPLE_FAC: i32 = 10;

/// Runs one conversion job start to finish. Writes the output GIF and
/// reports how many frames went in and came out.
pub fn convert(job: &ConversionJob) -> Result<ConversionReport, ConvertError> {
    log::info!("converting {:?} -> {:?}", job.source, job.output);

    // Timing scan first: pure byte parsing, no pixel decode.
    let mut reader = BufReader::new(File::open(&job.source)?);
    let durations = riff::frame_durations(&mut reader)?;
    log::info!("container declares {} animation frames", durations.len());

    let decoder = WebPDecoder::new(BufReader::new(File::open(&job.source)?))
        .map_err(ConvertError::Decode)?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(ConvertError::Decode)?;
    let total = frames.len();
    if total == 0 {
        return Err(ConvertError::EmptyAnimation);
    }

    let indices = keep_indices(total, job.ratio.keep_fraction());
    let frame_ms = uniform_duration_ms(&durations, total);
    log::info!(
        "keeping {} of {} frames at {}ms each, {} colors",
        indices.len(),
        total,
        frame_ms,
        job.colors.colors()
    );

    let writer = BufWriter::new(File::create(&job.output)?);
    let kept = encode_gif(writer, &frames, &indices, frame_ms, job.colors.colors())?;
    log::info!("wrote {:?}", job.output);

    Ok(ConversionReport {
        frames_before: total,
        frames_kept: kept,
        output: job.output.clone(),
    })
}

/// Evenly-spaced frame selection: `floor(total * keep_fraction)` indices
/// (at least one) across `[0, total - 1]` inclusive, intermediate positions
/// truncated. The first and last frame are always kept once two or more are
/// requested. Duplicates are tolerated, not deduplicated.
fn keep_indices(total: usize, keep_fraction: f64) -> Vec<usize> {
    let count = ((total as f64 * keep_fraction) as usize).max(1);
    if count == 1 {
        return vec![0];
    }
    let step = (total - 1) as f64 / (count - 1) as f64;
    (0..count).map(|i| (i as f64 * step) as usize).collect()
}

/// Uniform output duration: the first parsed ANMF duration when the scan
/// covered every decoded frame, otherwise the 100ms fallback. Per-frame
/// timing variation in the source is discarded.
fn uniform_duration_ms(durations: &[u32], total_frames: usize) -> u32 {
    if !durations.is_empty() && durations.len() >= total_frames {
        durations[0]
    } else {
        DEFAULT_FRAME_MS
    }
}

/// Quantizes the selected frames and writes them as an infinitely-looping
/// GIF, every frame at the same duration. Returns the number of frames
/// written.
fn encode_gif<W: Write>(
    writer: W,
    frames: &[Frame],
    indices: &[usize],
    frame_ms: u32,
    colors: usize,
) -> Result<usize, ConvertError> {
    let mut encoder = GifEncoder::new(writer);
    encoder
        .set_repeat(Repeat::Infinite)
        .map_err(ConvertError::Encode)?;
    for &index in indices {
        let reduced = quantize_rgba(frames[index].buffer(), colors);
        let frame = Frame::from_parts(reduced, 0, 0, Delay::from_numer_denom_ms(frame_ms, 1));
        encoder.encode_frame(frame).map_err(ConvertError::Encode)?;
    }
    Ok(indices.len())
}

/// Reduces a frame to at most `colors` distinct colors and maps every pixel
/// back through the palette, so the result is full-color RGBA again and any
/// generic GIF encoder can take it.
fn quantize_rgba(frame: &RgbaImage, colors: usize) -> RgbaImage {
    let quantizer = NeuQuant::new(QUANT_SAMPLE_FAC, colors, frame.as_raw());
    let palette = quantizer.color_map_rgba();
    let mut reduced = frame.clone();
    for pixel in reduced.chunks_exact_mut(4) {
        let entry = quantizer.index_of(pixel) * 4;
        pixel.copy_from_slice(&palette[entry..entry + 4]);
    }
    reduced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ColorDepth, FrameRatio};
    use image::codecs::gif::GifDecoder;
    use image::Rgba;
    use std::io::Cursor;

    #[test]
    fn keeps_half_the_frames_evenly() {
        assert_eq!(keep_indices(10, 0.5), vec![0, 2, 4, 6, 9]);
    }

    #[test]
    fn single_frame_always_survives() {
        assert_eq!(keep_indices(1, 0.5), vec![0]);
        assert_eq!(keep_indices(1, 2.0 / 3.0), vec![0]);
        assert_eq!(keep_indices(1, 1.0), vec![0]);
    }

    #[test]
    fn unchanged_ratio_keeps_every_index() {
        assert_eq!(keep_indices(6, 1.0), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn endpoints_are_always_kept() {
        for total in [4usize, 8, 25] {
            for keep in [0.5, 2.0 / 3.0, 0.75] {
                let indices = keep_indices(total, keep);
                assert_eq!(indices.first(), Some(&0), "total={total} keep={keep}");
                assert_eq!(indices.last(), Some(&(total - 1)), "total={total} keep={keep}");
            }
        }
    }

    #[test]
    fn duration_prefers_first_chunk_when_scan_covers_all_frames() {
        assert_eq!(uniform_duration_ms(&[70, 40, 90], 3), 70);
        assert_eq!(uniform_duration_ms(&[70, 40, 90], 2), 70);
    }

    #[test]
    fn duration_falls_back_when_scan_is_short_or_empty() {
        assert_eq!(uniform_duration_ms(&[], 3), 100);
        assert_eq!(uniform_duration_ms(&[70, 40], 3), 100);
    }

    fn gradient_frame(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 7 % 256) as u8,
                (y * 11 % 256) as u8,
                ((x + y) * 5 % 256) as u8,
                255,
            ])
        })
    }

    fn distinct_colors(frame: &RgbaImage) -> usize {
        let mut colors: Vec<[u8; 4]> = frame.pixels().map(|p| p.0).collect();
        colors.sort_unstable();
        colors.dedup();
        colors.len()
    }

    #[test]
    fn quantization_stays_within_color_limit() {
        let frame = gradient_frame(64, 64);
        assert!(distinct_colors(&frame) > 256);
        for colors in [256, 128, 64, 32] {
            let reduced = quantize_rgba(&frame, colors);
            assert!(distinct_colors(&reduced) <= colors);
            assert_eq!(reduced.dimensions(), frame.dimensions());
        }
    }

    #[test]
    fn pipeline_reduces_quantizes_and_loops() {
        // Eight frames at keep 3/4 -> six output frames, uniform 50ms.
        let frames: Vec<Frame> = (0..8u32)
            .map(|i| {
                let shade = 255 - (i * 30) as u8;
                let buffer = RgbaImage::from_pixel(16, 16, Rgba([shade, (i * 25) as u8, 128, 255]));
                Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(50, 1))
            })
            .collect();

        let indices = keep_indices(frames.len(), FrameRatio::Quarter.keep_fraction());
        assert_eq!(indices.len(), 6);

        let mut bytes = Vec::new();
        let written = encode_gif(Cursor::new(&mut bytes), &frames, &indices, 50, 64).unwrap();
        assert_eq!(written, 6);
        // NETSCAPE2.0 application extension carries the infinite-loop flag.
        assert!(bytes.windows(11).any(|w| w == b"NETSCAPE2.0"));

        let decoded = GifDecoder::new(Cursor::new(&bytes))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(decoded.len(), 6);
        for frame in &decoded {
            let (numer, denom) = frame.delay().numer_denom_ms();
            assert_eq!(numer / denom, 50);
            assert!(distinct_colors(frame.buffer()) <= 64);
        }
    }

    #[test]
    fn invalid_magic_leaves_no_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("bogus.webp");
        std::fs::write(&source, b"JFIF0000WEBP").unwrap();

        let job = ConversionJob::new(source, ColorDepth::C64, FrameRatio::Quarter);
        let err = convert(&job).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidContainer));
        assert!(!job.output.exists());
    }

    #[test]
    fn undecodable_pixels_report_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("hollow.webp");
        // A valid RIFF/WEBP shell with no image data the decoder can use.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&12u32.to_le_bytes());
        bytes.extend_from_slice(b"WEBP");
        bytes.extend_from_slice(b"JUNK");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        std::fs::write(&source, &bytes).unwrap();

        let job = ConversionJob::new(source, ColorDepth::C128, FrameRatio::Half);
        let err = convert(&job).unwrap_err();
        assert!(matches!(err, ConvertError::Decode(_)));
        assert!(!job.output.exists());
    }
}
