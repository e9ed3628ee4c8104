//! Pure validation predicates over session inputs.
//!
//! Validators never mutate state; they return `Ok(())` or an error whose
//! detail string names the offending values.

use jpegr_core::{
    limits, ColorTransfer, CompressedImage, Error, ImageIntent, PixelFormat, RawImage, Result,
};

/// Validate a raw attachment for the given intent.
pub fn validate_raw_image(img: &RawImage, intent: ImageIntent) -> Result<()> {
    if intent != ImageIntent::Hdr && intent != ImageIntent::Sdr {
        return Err(Error::InvalidParam(format!(
            "invalid intent {intent:?}, expects one of {{Hdr, Sdr}}"
        )));
    }
    if intent == ImageIntent::Hdr
        && !matches!(img.fmt, PixelFormat::P010 | PixelFormat::Rgba1010102)
    {
        return Err(Error::InvalidParam(format!(
            "unsupported input pixel format for hdr intent {:?}, expects one of {{P010, Rgba1010102}}",
            img.fmt
        )));
    }
    if intent == ImageIntent::Sdr
        && !matches!(img.fmt, PixelFormat::Yuv420 | PixelFormat::Rgba8888)
    {
        return Err(Error::InvalidParam(format!(
            "unsupported input pixel format for sdr intent {:?}, expects one of {{Yuv420, Rgba8888}}",
            img.fmt
        )));
    }
    if intent == ImageIntent::Hdr
        && !matches!(
            img.transfer,
            ColorTransfer::Hlg | ColorTransfer::Pq | ColorTransfer::Linear
        )
    {
        return Err(Error::InvalidParam(format!(
            "invalid input color transfer for hdr intent image {:?}, expects one of {{Hlg, Pq, Linear}}",
            img.transfer
        )));
    }
    if intent == ImageIntent::Sdr && img.transfer != ColorTransfer::Srgb {
        return Err(Error::InvalidParam(format!(
            "invalid input color transfer for sdr intent image {:?}, expects Srgb",
            img.transfer
        )));
    }
    if img.width % 2 != 0 || img.height % 2 != 0 {
        return Err(Error::InvalidParam(format!(
            "image dimensions cannot be odd, received image dimensions {}x{}",
            img.width, img.height
        )));
    }
    if img.width < limits::MIN_WIDTH || img.height < limits::MIN_HEIGHT {
        return Err(Error::InvalidParam(format!(
            "image dimensions cannot be less than {}x{}, received image dimensions {}x{}",
            limits::MIN_WIDTH,
            limits::MIN_HEIGHT,
            img.width,
            img.height
        )));
    }
    if img.width > limits::MAX_WIDTH || img.height > limits::MAX_HEIGHT {
        return Err(Error::InvalidParam(format!(
            "image dimensions cannot be larger than {}x{}, received image dimensions {}x{}",
            limits::MAX_WIDTH,
            limits::MAX_HEIGHT,
            img.width,
            img.height
        )));
    }
    Ok(())
}

/// Validate a compressed attachment.
pub fn validate_compressed_image(img: &CompressedImage) -> Result<()> {
    if img.is_empty() {
        return Err(Error::InvalidParam(
            "received compressed image with no data".into(),
        ));
    }
    if img.capacity() < img.len() {
        return Err(Error::InvalidParam(format!(
            "img capacity {} is less than img data size {}",
            img.capacity(),
            img.len()
        )));
    }
    Ok(())
}

/// Validate the intent of a compressed attachment.
pub fn validate_compressed_intent(intent: ImageIntent) -> Result<()> {
    if intent == ImageIntent::GainMap {
        return Err(Error::InvalidParam(format!(
            "invalid intent {intent:?}, expects one of {{Hdr, Sdr, Base}}"
        )));
    }
    Ok(())
}

/// Validate a quality factor.
pub fn validate_quality(quality: i32) -> Result<()> {
    if !(0..=100).contains(&quality) {
        return Err(Error::InvalidParam(format!(
            "invalid quality factor {quality}, expects in range [0-100]"
        )));
    }
    Ok(())
}

/// Validate a gain map scale factor.
pub fn validate_scale_factor(factor: i32) -> Result<()> {
    if !(1..=128).contains(&factor) {
        return Err(Error::InvalidParam(format!(
            "invalid gainmap scale factor {factor}, expects in range [1-128]"
        )));
    }
    Ok(())
}

/// Validate a rotation amount.
pub fn validate_rotation(degrees: i32) -> Result<()> {
    if !matches!(degrees, 90 | 180 | 270) {
        return Err(Error::InvalidParam(format!(
            "unsupported degrees {degrees}, expects one of {{90, 180, 270}}"
        )));
    }
    Ok(())
}

/// Validate a decoder display boost.
pub fn validate_display_boost(boost: f32) -> Result<()> {
    if boost < 1.0 {
        return Err(Error::InvalidParam(format!(
            "invalid display boost {boost}, expects to be >= 1.0"
        )));
    }
    Ok(())
}
