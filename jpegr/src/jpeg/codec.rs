//! The JPEG entropy codec seam.
//!
//! Everything the rest of the crate needs from a JPEG codec is these four
//! functions; swapping the backend only touches this file.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};
use jpegr_core::{Error, Result};

fn encode_error(e: impl std::fmt::Display) -> Error {
    Error::UnknownError(format!("encountered unknown error during encoding: {e}"))
}

fn decode_error(e: impl std::fmt::Display) -> Error {
    Error::UnknownError(format!("encountered unknown error during decoding: {e}"))
}

/// Encode interleaved RGB8 to a baseline JPEG.
pub fn encode_rgb8(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    encoder
        .encode(rgb, width, height, ExtendedColorType::Rgb8)
        .map_err(encode_error)?;
    Ok(out)
}

/// Encode single-channel 8-bit samples to a grayscale JPEG.
pub fn encode_gray8(gray: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    encoder
        .encode(gray, width, height, ExtendedColorType::L8)
        .map_err(encode_error)?;
    Ok(out)
}

/// Decode a JPEG to interleaved RGB8.
pub fn decode_rgb8(jpeg: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg).map_err(decode_error)?;
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    Ok((rgb.into_raw(), w, h))
}

/// Decode a JPEG to single-channel 8-bit samples.
pub fn decode_gray8(jpeg: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg).map_err(decode_error)?;
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    Ok((gray.into_raw(), w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_roundtrip_preserves_dimensions() {
        let w = 20u32;
        let h = 12u32;
        let rgb: Vec<u8> = (0..w * h).flat_map(|i| [(i % 256) as u8, 128, 64]).collect();
        let jpeg = encode_rgb8(&rgb, w, h, 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let (back, bw, bh) = decode_rgb8(&jpeg).unwrap();
        assert_eq!((bw, bh), (w, h));
        assert_eq!(back.len(), (w * h * 3) as usize);
    }

    #[test]
    fn gray_roundtrip_preserves_dimensions_and_tone() {
        let w = 16u32;
        let h = 16u32;
        let gray = vec![200u8; (w * h) as usize];
        let jpeg = encode_gray8(&gray, w, h, 90).unwrap();
        let (back, bw, bh) = decode_gray8(&jpeg).unwrap();
        assert_eq!((bw, bh), (w, h));
        assert!((back[128] as i32 - 200).abs() < 8, "got {}", back[128]);
    }

    #[test]
    fn garbage_decode_reports_unknown_error() {
        let err = decode_rgb8(b"not a jpeg at all").unwrap_err();
        assert_eq!(err.code(), jpegr_core::ErrorCode::UnknownError);
    }
}
