//! Core value domain: errors, enumerations, gain map records.

use enough::StopReason;
use thiserror::Error;

/// Errors surfaced by every fallible operation in the codec.
///
/// The set is closed; each variant carries a human-readable detail string
/// that names the offending values and is stable across releases (tests
/// assert on fragments of it). Errors are `Clone` because a sealed session
/// latches its terminal status and replays it on re-entry.
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Malformed or out-of-range input to a configuration call.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Call ordering violates the session state machine, or the input
    /// combination is unsupported for the selected path.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A well-formed parameter this build does not implement.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Output buffer too small or allocation failed.
    #[error("memory error: {0}")]
    MemError(String),

    /// Codec-internal failure, metadata parse failure, or unreachable branch.
    #[error("unknown error: {0}")]
    UnknownError(String),
}

/// Discriminant of [`Error`], for code-level comparisons in tests and FFI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// See [`Error::InvalidParam`].
    InvalidParam,
    /// See [`Error::InvalidOperation`].
    InvalidOperation,
    /// See [`Error::UnsupportedFeature`].
    UnsupportedFeature,
    /// See [`Error::MemError`].
    MemError,
    /// See [`Error::UnknownError`].
    UnknownError,
}

impl Error {
    /// The error's code, independent of its detail string.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidParam(_) => ErrorCode::InvalidParam,
            Error::InvalidOperation(_) => ErrorCode::InvalidOperation,
            Error::UnsupportedFeature(_) => ErrorCode::UnsupportedFeature,
            Error::MemError(_) => ErrorCode::MemError,
            Error::UnknownError(_) => ErrorCode::UnknownError,
        }
    }

    /// The detail string.
    pub fn detail(&self) -> &str {
        match self {
            Error::InvalidParam(s)
            | Error::InvalidOperation(s)
            | Error::UnsupportedFeature(s)
            | Error::MemError(s)
            | Error::UnknownError(s) => s,
        }
    }
}

impl From<StopReason> for Error {
    fn from(reason: StopReason) -> Self {
        Error::UnknownError(format!("operation stopped: {reason}"))
    }
}

/// Result type used throughout the codec.
pub type Result<T> = core::result::Result<T, Error>;

/// Color gamut / primaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorGamut {
    /// BT.709 / sRGB primaries.
    #[default]
    Bt709,
    /// Display P3 primaries.
    DisplayP3,
    /// BT.2100 / BT.2020 primaries (wide gamut for HDR).
    Bt2100,
}

/// Opto-electronic transfer function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorTransfer {
    /// sRGB transfer (IEC 61966-2-1).
    #[default]
    Srgb,
    /// Linear (gamma 1.0), normalized so 1.0 = SDR white.
    Linear,
    /// Hybrid Log-Gamma (ITU-R BT.2100).
    Hlg,
    /// Perceptual Quantizer (SMPTE ST 2084).
    Pq,
}

/// Sample value range. Carried through the pipeline, interpreted only when
/// unpacking limited-range YCbCr inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorRange {
    /// Full range (0..255 / 0..1023).
    #[default]
    Full,
    /// Limited / studio range (16..235 luma).
    Limited,
}

/// Pixel layout of a raw image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit YCbCr 4:2:0, three planes (Y, U, V).
    Yuv420,
    /// 10-bit YCbCr 4:2:0 in 16-bit containers, two planes (Y, interleaved UV).
    P010,
    /// Packed 8-bit RGBA.
    Rgba8888,
    /// Packed 10-10-10-2 RGBA.
    Rgba1010102,
    /// Packed half-float RGBA.
    RgbaF16,
    /// 8-bit single channel (gain maps).
    Gray8,
}

impl PixelFormat {
    /// Number of planes for this layout.
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Yuv420 => 3,
            PixelFormat::P010 => 2,
            _ => 1,
        }
    }

    /// Whether this is one of the HDR input layouts.
    pub fn is_hdr(self) -> bool {
        matches!(
            self,
            PixelFormat::P010 | PixelFormat::Rgba1010102 | PixelFormat::RgbaF16
        )
    }
}

/// Role of an image attached to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageIntent {
    /// HDR rendition.
    Hdr,
    /// SDR rendition.
    Sdr,
    /// Base (primary) rendition of an already-composed file.
    Base,
    /// Gain map rendition.
    GainMap,
}

/// A decoded or computed gain map image.
#[derive(Debug, Clone)]
pub struct GainMap {
    /// Width in pixels (usually smaller than the base image).
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// 1 for a luminance gain map, 3 for per-channel RGB.
    pub channels: u8,
    /// Row-major samples, `channels` bytes per pixel.
    pub data: Vec<u8>,
}

impl GainMap {
    /// Allocate a zeroed gain map.
    pub fn new(width: u32, height: u32, channels: u8) -> Result<Self> {
        if width == 0 || height == 0 || !(channels == 1 || channels == 3) {
            return Err(Error::InvalidParam(format!(
                "bad gain map geometry {width}x{height} with {channels} channel(s)"
            )));
        }
        let size = (width as usize)
            .checked_mul(height as usize)
            .and_then(|s| s.checked_mul(channels as usize))
            .ok_or_else(|| Error::MemError("gain map size overflow".into()))?;
        Ok(Self {
            width,
            height,
            channels,
            data: vec![0u8; size],
        })
    }
}

/// Gain map metadata as transported in the gain map image's XMP packet.
///
/// All values are linear-space; log2 encoding happens at the XMP boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainMapMetadata {
    /// Largest HDR/SDR pixel ratio the gain map encodes.
    pub max_content_boost: f32,
    /// Smallest HDR/SDR pixel ratio (may darken; `<= max_content_boost`).
    pub min_content_boost: f32,
    /// Gamma applied to the normalized gain map samples.
    pub gamma: f32,
    /// Offset added to SDR values before the ratio is formed.
    pub offset_sdr: f32,
    /// Offset added to HDR values before the ratio is formed.
    pub offset_hdr: f32,
    /// Display boost below which the gain map has no effect (`>= 1`).
    pub hdr_capacity_min: f32,
    /// Display boost at which the gain map applies fully.
    pub hdr_capacity_max: f32,
}

impl Default for GainMapMetadata {
    fn default() -> Self {
        Self {
            max_content_boost: 1.0,
            min_content_boost: 1.0,
            gamma: 1.0,
            offset_sdr: 1.0 / 64.0,
            offset_hdr: 1.0 / 64.0,
            hdr_capacity_min: 1.0,
            hdr_capacity_max: 1.0,
        }
    }
}

impl GainMapMetadata {
    /// Check the record against the documented value ranges.
    ///
    /// Returns `InvalidParam` with the offending values in the detail string.
    pub fn validate(&self) -> Result<()> {
        let all = [
            self.max_content_boost,
            self.min_content_boost,
            self.gamma,
            self.offset_sdr,
            self.offset_hdr,
            self.hdr_capacity_min,
            self.hdr_capacity_max,
        ];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidParam(format!(
                "gainmap metadata contains a non-finite value: {self:?}"
            )));
        }
        if self.max_content_boost < self.min_content_boost {
            return Err(Error::InvalidParam(format!(
                "received bad value for content boost min {} > max {}",
                self.min_content_boost, self.max_content_boost
            )));
        }
        if self.gamma <= 0.0 {
            return Err(Error::InvalidParam(format!(
                "received bad value for gamma {}, expects > 0.0",
                self.gamma
            )));
        }
        if self.offset_sdr < 0.0 {
            return Err(Error::InvalidParam(format!(
                "received bad value for offset sdr {}, expects to be >= 0.0",
                self.offset_sdr
            )));
        }
        if self.offset_hdr < 0.0 {
            return Err(Error::InvalidParam(format!(
                "received bad value for offset hdr {}, expects to be >= 0.0",
                self.offset_hdr
            )));
        }
        if self.hdr_capacity_max < self.hdr_capacity_min {
            return Err(Error::InvalidParam(format!(
                "received bad value for hdr capacity min {} > max {}",
                self.hdr_capacity_min, self.hdr_capacity_max
            )));
        }
        if self.hdr_capacity_min < 1.0 {
            return Err(Error::InvalidParam(format!(
                "received bad value for hdr capacity min {}, expects to be >= 1.0",
                self.hdr_capacity_min
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sane() -> GainMapMetadata {
        GainMapMetadata {
            max_content_boost: 4.0,
            min_content_boost: 1.0,
            gamma: 1.0,
            offset_sdr: 1.0 / 64.0,
            offset_hdr: 1.0 / 64.0,
            hdr_capacity_min: 1.0,
            hdr_capacity_max: 4.0,
        }
    }

    #[test]
    fn default_metadata_is_valid() {
        assert!(GainMapMetadata::default().validate().is_ok());
        assert!(sane().validate().is_ok());
    }

    #[test]
    fn rejects_min_boost_above_max() {
        let mut m = sane();
        m.min_content_boost = 5.0;
        let err = m.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParam);
        assert!(err.detail().contains("content boost"), "{err}");
    }

    #[test]
    fn rejects_non_positive_gamma() {
        for g in [0.0, -1.0] {
            let mut m = sane();
            m.gamma = g;
            let err = m.validate().unwrap_err();
            assert!(err.detail().contains("gamma"), "{err}");
        }
    }

    #[test]
    fn rejects_negative_offsets() {
        let mut m = sane();
        m.offset_sdr = -0.1;
        assert!(m.validate().unwrap_err().detail().contains("offset sdr"));

        let mut m = sane();
        m.offset_hdr = -0.1;
        assert!(m.validate().unwrap_err().detail().contains("offset hdr"));
    }

    #[test]
    fn rejects_hdr_capacity_min_below_one() {
        let mut m = sane();
        m.hdr_capacity_min = 0.5;
        m.hdr_capacity_max = 4.0;
        let err = m.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParam);
        assert!(err.detail().contains("hdr capacity min"), "{err}");
        assert!(err.detail().contains("0.5"), "{err}");
    }

    #[test]
    fn rejects_capacity_min_above_max() {
        let mut m = sane();
        m.hdr_capacity_min = 6.0;
        m.hdr_capacity_max = 4.0;
        assert!(m
            .validate()
            .unwrap_err()
            .detail()
            .contains("hdr capacity min"));
    }

    #[test]
    fn rejects_nan_anywhere() {
        for field in 0..7 {
            let mut m = sane();
            match field {
                0 => m.max_content_boost = f32::NAN,
                1 => m.min_content_boost = f32::NAN,
                2 => m.gamma = f32::NAN,
                3 => m.offset_sdr = f32::NAN,
                4 => m.offset_hdr = f32::NAN,
                5 => m.hdr_capacity_min = f32::NAN,
                _ => m.hdr_capacity_max = f32::INFINITY,
            }
            assert!(m.validate().is_err(), "field {field} accepted a non-finite");
        }
    }

    #[test]
    fn error_code_mapping() {
        assert_eq!(
            Error::MemError("x".into()).code(),
            ErrorCode::MemError
        );
        assert_eq!(
            Error::UnsupportedFeature("x".into()).code(),
            ErrorCode::UnsupportedFeature
        );
    }
}
