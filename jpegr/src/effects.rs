//! Dual-image effects pipelines.
//!
//! The encoder pipeline runs over the raw HDR intent and, when present, its
//! SDR counterpart; the decoder pipeline runs over the decoded surface and
//! the gain map with the gain map rectangle aspect-locked to the image.
//! Effects apply in insertion order and the first failure aborts the run.

use std::collections::HashMap;

use jpegr_core::color::convert::convert_raw_to_ycbcr;
use jpegr_core::effects::{apply_mirror, apply_resize, apply_rotate};
use jpegr_core::{Effect, Error, ImageIntent, RawImage, Result};

fn effect_error(effect: Effect) -> Error {
    Error::UnknownError(format!(
        "encountered unknown error while applying effect {effect}"
    ))
}

/// Run the effects list over the encoder's raw registry.
///
/// Crop adjusts the plane views in place and requires positive, even crop
/// extents. If the last effect is a crop and an SDR intent is present, the
/// SDR image is copied back into one contiguous allocation so its chroma
/// planes can be handed to the codec as a single buffer.
pub fn apply_encoder_effects(
    raw_images: &mut HashMap<ImageIntent, RawImage>,
    effects: &[Effect],
) -> Result<()> {
    for &effect in effects {
        match effect {
            Effect::Crop {
                left,
                right,
                top,
                bottom,
            } => {
                let (img_w, img_h) = {
                    let hdr = raw_images
                        .get(&ImageIntent::Hdr)
                        .ok_or_else(|| effect_error(effect))?;
                    (hdr.width, hdr.height)
                };
                let crop_left = left.max(0);
                let crop_right = right.min(img_w as i32);
                let crop_width = crop_right - crop_left;
                if crop_width <= 0 || crop_width % 2 != 0 {
                    return Err(Error::InvalidParam(format!(
                        "unexpected crop dimensions. crop width is expected to be > 0 and even, \
                         crop width is {crop_width}"
                    )));
                }
                let crop_top = top.max(0);
                let crop_bottom = bottom.min(img_h as i32);
                let crop_height = crop_bottom - crop_top;
                if crop_height <= 0 || crop_height % 2 != 0 {
                    return Err(Error::InvalidParam(format!(
                        "unexpected crop dimensions. crop height is expected to be > 0 and even, \
                         crop height is {crop_height}"
                    )));
                }
                if let Some(hdr) = raw_images.get_mut(&ImageIntent::Hdr) {
                    hdr.crop_in_place(
                        crop_left as u32,
                        crop_top as u32,
                        crop_width as u32,
                        crop_height as u32,
                    );
                }
                if let Some(sdr) = raw_images.get_mut(&ImageIntent::Sdr) {
                    sdr.crop_in_place(
                        crop_left as u32,
                        crop_top as u32,
                        crop_width as u32,
                        crop_height as u32,
                    );
                }
            }
            Effect::Resize { width, height } => {
                if width <= 0 || height <= 0 || width % 2 != 0 || height % 2 != 0 {
                    return Err(Error::InvalidParam(format!(
                        "destination dimension cannot be zero or odd. dest image width is \
                         {width}, dest image height is {height}"
                    )));
                }
                transform_pair(raw_images, effect, |img| {
                    apply_resize(img, width as u32, height as u32)
                })?;
            }
            Effect::Rotate { degrees } => {
                transform_pair(raw_images, effect, |img| apply_rotate(img, degrees))?;
            }
            Effect::Mirror { direction } => {
                transform_pair(raw_images, effect, |img| apply_mirror(img, direction))?;
            }
        }
    }

    // Crop only re-points plane views, so the chroma planes of a 4:2:0 SDR
    // buffer are no longer contiguous afterwards. The codec expects a single
    // allocation per image.
    if matches!(effects.last(), Some(Effect::Crop { .. })) {
        if let Some(sdr) = raw_images.get(&ImageIntent::Sdr) {
            let tight = convert_raw_to_ycbcr(sdr).map_err(|_| {
                Error::UnknownError(
                    "encountered unknown error during color space conversion".into(),
                )
            })?;
            raw_images.insert(ImageIntent::Sdr, tight);
        }
    }

    Ok(())
}

fn transform_pair(
    raw_images: &mut HashMap<ImageIntent, RawImage>,
    effect: Effect,
    op: impl Fn(&RawImage) -> Result<RawImage>,
) -> Result<()> {
    let hdr = raw_images
        .get(&ImageIntent::Hdr)
        .ok_or_else(|| effect_error(effect))?;
    let new_hdr = op(hdr).map_err(|_| effect_error(effect))?;
    let new_sdr = match raw_images.get(&ImageIntent::Sdr) {
        Some(sdr) => Some(op(sdr).map_err(|_| effect_error(effect))?),
        None => None,
    };
    raw_images.insert(ImageIntent::Hdr, new_hdr);
    if let Some(sdr) = new_sdr {
        raw_images.insert(ImageIntent::Sdr, sdr);
    }
    Ok(())
}

/// Run the effects list over the decoder's (image, gain map) pair.
///
/// The gain map rectangle is derived from the image rectangle through the
/// width/height ratios of the two surfaces, computed per effect.
pub fn apply_decoder_effects(
    image: &mut RawImage,
    gainmap: &mut RawImage,
    effects: &[Effect],
) -> Result<()> {
    for &effect in effects {
        match effect {
            Effect::Rotate { degrees } => {
                *image = apply_rotate(image, degrees).map_err(|_| effect_error(effect))?;
                *gainmap = apply_rotate(gainmap, degrees).map_err(|_| effect_error(effect))?;
            }
            Effect::Mirror { direction } => {
                *image = apply_mirror(image, direction).map_err(|_| effect_error(effect))?;
                *gainmap = apply_mirror(gainmap, direction).map_err(|_| effect_error(effect))?;
            }
            Effect::Crop {
                left,
                right,
                top,
                bottom,
            } => {
                let crop_left = left.max(0);
                let crop_right = right.min(image.width as i32);
                if crop_right <= crop_left {
                    return Err(Error::InvalidParam(format!(
                        "unexpected crop dimensions. crop right is <= crop left, after crop \
                         image width is {}",
                        crop_right - crop_left
                    )));
                }
                let crop_top = top.max(0);
                let crop_bottom = bottom.min(image.height as i32);
                if crop_bottom <= crop_top {
                    return Err(Error::InvalidParam(format!(
                        "unexpected crop dimensions. crop bottom is <= crop top, after crop \
                         image height is {}",
                        crop_bottom - crop_top
                    )));
                }

                let width_ratio = image.width as f32 / gainmap.width as f32;
                let height_ratio = image.height as f32 / gainmap.height as f32;
                let gm_left = (crop_left as f32 / width_ratio) as i32;
                let gm_right = (crop_right as f32 / width_ratio) as i32;
                if gm_right <= gm_left {
                    return Err(Error::InvalidParam(format!(
                        "unexpected crop dimensions. crop right is <= crop left for gainmap \
                         image, after crop gainmap image width is {}",
                        gm_right - gm_left
                    )));
                }
                let gm_top = (crop_top as f32 / height_ratio) as i32;
                let gm_bottom = (crop_bottom as f32 / height_ratio) as i32;
                if gm_bottom <= gm_top {
                    return Err(Error::InvalidParam(format!(
                        "unexpected crop dimensions. crop bottom is <= crop top for gainmap \
                         image, after crop gainmap image height is {}",
                        gm_bottom - gm_top
                    )));
                }

                image.crop_in_place(
                    crop_left as u32,
                    crop_top as u32,
                    (crop_right - crop_left) as u32,
                    (crop_bottom - crop_top) as u32,
                );
                gainmap.crop_in_place(
                    gm_left as u32,
                    gm_top as u32,
                    (gm_right - gm_left) as u32,
                    (gm_bottom - gm_top) as u32,
                );
            }
            Effect::Resize { width, height } => {
                let width_ratio = image.width as f32 / gainmap.width as f32;
                let height_ratio = image.height as f32 / gainmap.height as f32;
                let gm_width = (width as f32 / width_ratio) as i32;
                let gm_height = (height as f32 / height_ratio) as i32;
                if width <= 0 || height <= 0 || gm_width <= 0 || gm_height <= 0 {
                    return Err(Error::InvalidParam(format!(
                        "destination dimension cannot be zero. dest image width is {width}, \
                         dest image height is {height}, dest gainmap width is {gm_width}, \
                         dest gainmap height is {gm_height}"
                    )));
                }
                *image =
                    apply_resize(image, width as u32, height as u32).map_err(|_| effect_error(effect))?;
                *gainmap = apply_resize(gainmap, gm_width as u32, gm_height as u32)
                    .map_err(|_| effect_error(effect))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jpegr_core::effects::MirrorDirection;
    use jpegr_core::image::plane;
    use jpegr_core::{ColorGamut, ColorRange, ColorTransfer, ErrorCode, PixelFormat};

    fn registry(with_sdr: bool) -> HashMap<ImageIntent, RawImage> {
        let mut map = HashMap::new();
        map.insert(
            ImageIntent::Hdr,
            RawImage::new(
                PixelFormat::P010,
                ColorGamut::Bt2100,
                ColorTransfer::Hlg,
                ColorRange::Full,
                32,
                16,
            )
            .unwrap(),
        );
        if with_sdr {
            map.insert(
                ImageIntent::Sdr,
                RawImage::new(
                    PixelFormat::Yuv420,
                    ColorGamut::Bt709,
                    ColorTransfer::Srgb,
                    ColorRange::Full,
                    32,
                    16,
                )
                .unwrap(),
            );
        }
        map
    }

    #[test]
    fn rotate_applies_to_both_intents() {
        let mut reg = registry(true);
        apply_encoder_effects(&mut reg, &[Effect::Rotate { degrees: 90 }]).unwrap();
        let hdr = &reg[&ImageIntent::Hdr];
        let sdr = &reg[&ImageIntent::Sdr];
        assert_eq!((hdr.width, hdr.height), (16, 32));
        assert_eq!((sdr.width, sdr.height), (16, 32));
    }

    #[test]
    fn crop_rejects_odd_width() {
        let mut reg = registry(false);
        let err = apply_encoder_effects(
            &mut reg,
            &[Effect::Crop {
                left: 1,
                right: 10,
                top: 0,
                bottom: 8,
            }],
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParam);
        assert!(err.detail().contains("crop width is 9"), "{err}");
    }

    #[test]
    fn crop_clamped_to_empty_reports_extent() {
        let mut reg = registry(false);
        let err = apply_encoder_effects(
            &mut reg,
            &[Effect::Crop {
                left: 40,
                right: 60,
                top: 0,
                bottom: 8,
            }],
        )
        .unwrap_err();
        assert!(
            err.detail().contains("crop width is -8"),
            "post-clamp extent should be reported: {err}"
        );
    }

    #[test]
    fn trailing_crop_restores_sdr_contiguity() {
        let mut reg = registry(true);
        apply_encoder_effects(
            &mut reg,
            &[Effect::Crop {
                left: 4,
                right: 20,
                top: 4,
                bottom: 12,
            }],
        )
        .unwrap();
        let hdr = &reg[&ImageIntent::Hdr];
        let sdr = &reg[&ImageIntent::Sdr];
        assert_eq!((hdr.width, hdr.height), (16, 8));
        assert_eq!((sdr.width, sdr.height), (16, 8));
        // hdr keeps the cheap view, sdr was repacked for the codec
        assert!(!hdr.is_tight());
        assert!(sdr.is_tight());
    }

    #[test]
    fn effects_stop_at_first_failure() {
        let mut reg = registry(false);
        let err = apply_encoder_effects(
            &mut reg,
            &[
                Effect::Resize {
                    width: 0,
                    height: 8,
                },
                Effect::Rotate { degrees: 90 },
            ],
        )
        .unwrap_err();
        assert!(err.detail().contains("dest image width is 0"), "{err}");
        // the rotate after the failing resize never ran
        let hdr = &reg[&ImageIntent::Hdr];
        assert_eq!((hdr.width, hdr.height), (32, 16));
    }

    fn decoder_pair() -> (RawImage, RawImage) {
        let image = RawImage::new(
            PixelFormat::Rgba8888,
            ColorGamut::Bt709,
            ColorTransfer::Srgb,
            ColorRange::Full,
            32,
            32,
        )
        .unwrap();
        let gainmap = RawImage::new(
            PixelFormat::Gray8,
            ColorGamut::Bt709,
            ColorTransfer::Srgb,
            ColorRange::Full,
            8,
            8,
        )
        .unwrap();
        (image, gainmap)
    }

    #[test]
    fn decoder_crop_scales_gainmap_rectangle() {
        let (mut image, mut gainmap) = decoder_pair();
        apply_decoder_effects(
            &mut image,
            &mut gainmap,
            &[Effect::Crop {
                left: 8,
                right: 24,
                top: 8,
                bottom: 24,
            }],
        )
        .unwrap();
        assert_eq!((image.width, image.height), (16, 16));
        // ratio is 4, so the gain map rectangle is (2..6) x (2..6)
        assert_eq!((gainmap.width, gainmap.height), (4, 4));
        assert_eq!(gainmap.planes()[plane::Y].offset, 2 * 8 + 2);
    }

    #[test]
    fn decoder_crop_empty_gainmap_rectangle_rejected() {
        let (mut image, mut gainmap) = decoder_pair();
        let err = apply_decoder_effects(
            &mut image,
            &mut gainmap,
            &[Effect::Crop {
                left: 8,
                right: 10,
                top: 0,
                bottom: 32,
            }],
        )
        .unwrap_err();
        assert!(err.detail().contains("gainmap"), "{err}");
    }

    #[test]
    fn decoder_resize_keeps_aspect_lock() {
        let (mut image, mut gainmap) = decoder_pair();
        apply_decoder_effects(
            &mut image,
            &mut gainmap,
            &[Effect::Resize {
                width: 16,
                height: 16,
            }],
        )
        .unwrap();
        assert_eq!((image.width, image.height), (16, 16));
        assert_eq!((gainmap.width, gainmap.height), (4, 4));
    }

    #[test]
    fn decoder_mirror_applies_to_both() {
        let (mut image, mut gainmap) = decoder_pair();
        apply_decoder_effects(
            &mut image,
            &mut gainmap,
            &[Effect::Mirror {
                direction: MirrorDirection::Horizontal,
            }],
        )
        .unwrap();
        assert_eq!((image.width, image.height), (32, 32));
        assert_eq!((gainmap.width, gainmap.height), (8, 8));
    }
}
