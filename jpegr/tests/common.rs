//! Shared helpers for the integration tests: synthetic raw images and
//! pre-encoded sample streams.

#![allow(dead_code)]

use jpegr::jpeg::codec;
use jpegr::{
    ColorGamut, ColorRange, ColorTransfer, CompressedImage, Encoder, GainMapMetadata, ImageIntent,
    PixelFormat, RawImage,
};
use jpegr::image::plane;

/// Solid P010 HDR image, HLG transfer, BT.2100 gamut.
pub fn create_p010_solid(width: u32, height: u32) -> RawImage {
    let mut img = RawImage::new(
        PixelFormat::P010,
        ColorGamut::Bt2100,
        ColorTransfer::Hlg,
        ColorRange::Full,
        width,
        height,
    )
    .unwrap();
    // HLG signal at 75%, neutral chroma
    let luma = ((767u16) << 6).to_le_bytes();
    let chroma = ((512u16) << 6).to_le_bytes();
    for y in 0..height {
        for chunk in img.row_mut(plane::Y, y).chunks_exact_mut(2) {
            chunk.copy_from_slice(&luma);
        }
    }
    for cy in 0..img.planes()[plane::UV].height {
        for pair in img.row_mut(plane::UV, cy).chunks_exact_mut(4) {
            pair[0..2].copy_from_slice(&chroma);
            pair[2..4].copy_from_slice(&chroma);
        }
    }
    img
}

/// Solid YCbCr 4:2:0 SDR image, sRGB transfer.
pub fn create_yuv420_solid(width: u32, height: u32, luma: u8, gamut: ColorGamut) -> RawImage {
    let mut img = RawImage::new(
        PixelFormat::Yuv420,
        gamut,
        ColorTransfer::Srgb,
        ColorRange::Full,
        width,
        height,
    )
    .unwrap();
    for y in 0..height {
        img.row_mut(plane::Y, y).fill(luma);
    }
    for cy in 0..img.planes()[plane::U].height {
        img.row_mut(plane::U, cy).fill(128);
        img.row_mut(plane::V, cy).fill(128);
    }
    img
}

/// Solid packed RGBA8888 SDR image.
pub fn create_rgba8888_solid(width: u32, height: u32, value: u8) -> RawImage {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
        data.extend_from_slice(&[value, value, value, 255]);
    }
    RawImage::from_packed(
        PixelFormat::Rgba8888,
        ColorGamut::Bt709,
        ColorTransfer::Srgb,
        ColorRange::Full,
        width,
        height,
        data,
    )
    .unwrap()
}

/// A plain (non-UltraHDR) JPEG of the given size.
pub fn create_plain_jpeg(width: u32, height: u32) -> Vec<u8> {
    let rgb = vec![127u8; (width * height * 3) as usize];
    codec::encode_rgb8(&rgb, width, height, 90).unwrap()
}

/// A compressed grayscale JPEG usable as a gain map intent.
pub fn create_gainmap_jpeg(width: u32, height: u32) -> Vec<u8> {
    let gray = vec![192u8; (width * height) as usize];
    codec::encode_gray8(&gray, width, height, 85).unwrap()
}

/// Wrap bytes as a compressed image with default tags.
pub fn compressed(data: Vec<u8>) -> CompressedImage {
    CompressedImage::new(
        data,
        ColorGamut::Bt709,
        ColorTransfer::Srgb,
        ColorRange::Full,
    )
}

/// Well-formed gain map metadata with a 4x boost range.
pub fn sample_metadata() -> GainMapMetadata {
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

/// Encode an UltraHDR stream from a solid HDR (+ optional SDR) pair.
pub fn encode_sample(width: u32, height: u32, with_sdr: bool) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder
        .set_raw_image(&create_p010_solid(width, height), ImageIntent::Hdr)
        .unwrap();
    if with_sdr {
        encoder
            .set_raw_image(
                &create_yuv420_solid(width, height, 180, ColorGamut::DisplayP3),
                ImageIntent::Sdr,
            )
            .unwrap();
    }
    encoder.encode().unwrap();
    encoder.encoded_stream().unwrap().data().to_vec()
}

/// True when `needle` occurs anywhere in `haystack`.
pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
