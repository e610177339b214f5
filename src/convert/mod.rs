pub mod riff;
pub mod worker;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Palette sizes offered by the UI. GIF caps palettes at 256 entries.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ColorDepth {
    C256,
    C128,
    C64,
    C32,
}

impl ColorDepth {
    pub const ALL: [ColorDepth; 4] = [
        ColorDepth::C256,
        ColorDepth::C128,
        ColorDepth::C64,
        ColorDepth::C32,
    ];

    /// Palette size handed to the quantizer.
    pub fn colors(self) -> usize {
        match self {
            ColorDepth::C256 => 256,
            ColorDepth::C128 => 128,
            ColorDepth::C64 => 64,
            ColorDepth::C32 => 32,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ColorDepth::C256 => "256",
            ColorDepth::C128 => "128",
            ColorDepth::C64 => "64",
            ColorDepth::C32 => "32",
        }
    }
}

/// Frame-reduction menu. The label names the fraction of frames *dropped*,
/// not kept: "1/3" keeps 2/3 of the frames and "1/4" keeps 3/4.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FrameRatio {
    Unchanged,
    Half,
    Third,
    Quarter,
}

impl FrameRatio {
    pub const ALL: [FrameRatio; 4] = [
        FrameRatio::Unchanged,
        FrameRatio::Half,
        FrameRatio::Third,
        FrameRatio::Quarter,
    ];

    /// Fraction of the original frames that survives subsampling.
    pub fn keep_fraction(self) -> f64 {
        match self {
            FrameRatio::Unchanged => 1.0,
            FrameRatio::Half => 0.5,
            FrameRatio::Third => 2.0 / 3.0,
            FrameRatio::Quarter => 0.75,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FrameRatio::Unchanged => "unchanged",
            FrameRatio::Half => "1/2",
            FrameRatio::Third => "1/3",
            FrameRatio::Quarter => "1/4",
        }
    }
}

/// One conversion, created on user action and moved into the worker thread.
/// Dropped on completion or failure; never persisted.
#[derive(Clone, Debug)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub colors: ColorDepth,
    pub ratio: FrameRatio,
    pub output: PathBuf,
}

impl ConversionJob {
    pub fn new(source: PathBuf, colors: ColorDepth, ratio: FrameRatio) -> Self {
        let output = output_path(&source, colors, ratio);
        Self {
            source,
            colors,
            ratio,
            output,
        }
    }
}

/// What a finished job reports back for display.
#[derive(Clone, Debug)]
pub struct ConversionReport {
    pub frames_before: usize,
    pub frames_kept: usize,
    pub output: PathBuf,
}

/// Error type produced by the conversion core.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Input lacks the RIFF/WEBP magic, not a WebP container at all.
    #[error("not a RIFF/WEBP container")]
    InvalidContainer,

    /// Container ends mid-chunk, or a chunk overruns the file.
    #[error("container is truncated mid-chunk")]
    TruncatedContainer,

    /// The WebP decoder rejected the pixel data.
    #[error("failed to decode WebP animation")]
    Decode(#[source] image::ImageError),

    /// Decoding succeeded but produced nothing to convert.
    #[error("input contains no animation frames")]
    EmptyAnimation,

    /// The GIF writer failed.
    #[error("failed to encode GIF")]
    Encode(#[source] image::ImageError),

    /// Source unreadable or output unwritable.
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}

/// Suffix-only check used at the UI boundary; the container magic is
/// verified later by the duration reader.
pub fn is_webp_path(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("webp"))
}

/// Derives the output path next to the input:
/// `{first 10 chars of stem}_{colors}_{ratio label with '/' as '_'}frames.gif`.
pub fn output_path(source: &Path, colors: ColorDepth, ratio: FrameRatio) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let prefix: String = stem.chars().take(10).collect();
    let label = ratio.label().replace('/', "_");
    source.with_file_name(format!("{}_{}_{}frames.gif", prefix, colors.colors(), label))
}
