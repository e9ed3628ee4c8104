//! Core gain map math and metadata for UltraHDR JPEG.
//!
//! This crate provides the computational components shared by the `jpegr`
//! encoder/decoder sessions:
//! - Value domain: image buffers, gain map metadata, error codes
//! - Gain map computation (HDR + SDR → gain map) and application
//! - Color math: transfer functions, RGB ↔ YCbCr, HDR → SDR tone mapping
//! - Metadata transport: hdrgm XMP packets, Multi-Picture Format boxes
//! - Geometric effect kernels (rotate, mirror, crop, resize)
//!
//! This crate has **no JPEG entropy codec dependency**. For full UltraHDR
//! encode/decode, use the `jpegr` crate which provides the session layer and
//! codec integration.
//!
//! # Cooperative Cancellation
//!
//! Per-pixel loops accept an `impl Stop` parameter from the `enough` crate.
//! Use `Never` when cancellation is not needed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod color;
pub mod effects;
pub mod gainmap;
pub mod image;
pub mod metadata;
mod types;

pub use effects::{Effect, MirrorDirection};
pub use image::{CompressedImage, PlaneDesc, RawImage};
pub use types::{
    ColorGamut, ColorRange, ColorTransfer, Error, ErrorCode, GainMap, GainMapMetadata,
    ImageIntent, PixelFormat, Result,
};

// Re-export enough for convenience
pub use enough::{Stop, StopReason, Never};

/// Hard limits on inputs the library accepts.
pub mod limits {
    /// Smallest accepted image width in pixels.
    pub const MIN_WIDTH: u32 = 8;

    /// Smallest accepted image height in pixels.
    pub const MIN_HEIGHT: u32 = 8;

    /// Largest accepted image width in pixels.
    pub const MAX_WIDTH: u32 = 8192;

    /// Largest accepted image height in pixels.
    pub const MAX_HEIGHT: u32 = 8192;

    /// Maximum XMP packet length the parser will look at (16 MB).
    pub const MAX_XMP_LENGTH: usize = 16 * 1024 * 1024;
}
