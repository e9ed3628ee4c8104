//! UltraHDR JPEG encoder/decoder.
//!
//! An UltraHDR file is a backwards-compatible JPEG: legacy viewers see the
//! SDR base image, while HDR-capable displays reconstruct the HDR rendition
//! from an embedded gain map. The gain map travels as a secondary JPEG
//! referenced by an MPF (Multi-Picture Format) index, with its parameters
//! serialized as XMP in the gain map image's APP1 segment.
//!
//! # Crate Structure
//!
//! - [`jpegr_core`] - gain map math, metadata transport, color conversions
//! - `jpegr` (this crate) - encoder/decoder sessions and container plumbing
//!
//! # Sessions
//!
//! Both [`Encoder`] and [`Decoder`] are stateful, single-threaded sessions:
//! configuration calls accumulate inputs, a terminal call (`encode()`, or
//! `probe()`/`decode()`) seals the session and latches its status, and
//! `reset()` restores the defaults. Retrieval methods borrow session-owned
//! buffers that stay valid until the next `reset()` or drop.
//!
//! # Example
//!
//! ```ignore
//! use jpegr::{Encoder, Decoder, ImageIntent, RawImage};
//!
//! let mut encoder = Encoder::new();
//! encoder.set_raw_image(&hdr_image, ImageIntent::Hdr)?;
//! encoder.set_quality(90, ImageIntent::Base)?;
//! encoder.encode()?;
//! let ultrahdr_jpeg = encoder.encoded_stream().unwrap();
//!
//! let mut decoder = Decoder::new();
//! decoder.set_image(ultrahdr_jpeg)?;
//! decoder.probe()?;
//! decoder.decode()?;
//! let hdr_surface = decoder.decoded_image().unwrap();
//! ```
//!
//! # Standards
//!
//! - [Ultra HDR Image Format v1.0](https://developer.android.com/media/platform/hdr-image-format)
//! - CIPA DC-007 (Multi-Picture Format)
//! - Adobe XMP (hdrgm namespace)

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export the computational core
pub use jpegr_core::{color, gainmap, image, metadata};

pub use jpegr_core::{
    limits, ColorGamut, ColorRange, ColorTransfer, CompressedImage, Effect, Error, ErrorCode,
    GainMap, GainMapMetadata, ImageIntent, MirrorDirection, PixelFormat, RawImage, Result,
};

pub mod jpeg;

mod decode;
mod effects;
mod encode;
mod pipeline;
mod validate;

pub use decode::Decoder;
pub use encode::{Encoder, OutputFormat};

/// Classify a byte stream: 1 when it probes as an UltraHDR image, else 0.
///
/// Constructs a throwaway decoder, attaches the bytes and runs `probe()`.
pub fn is_uhdr_image(data: &[u8]) -> bool {
    let img = CompressedImage::new(
        data.to_vec(),
        ColorGamut::default(),
        ColorTransfer::default(),
        ColorRange::default(),
    );
    let mut decoder = Decoder::new();
    if decoder.set_image(&img).is_err() {
        return false;
    }
    decoder.probe().is_ok()
}
