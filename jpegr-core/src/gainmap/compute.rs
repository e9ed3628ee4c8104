//! Gain map computation from an (HDR, SDR) raw pair.

use enough::Stop;

use crate::color::convert::{rgb_to_luminance, sdr_linear_rgb, YuvCoefficients};
use crate::color::tonemap::hdr_linear_rgb;
use crate::image::RawImage;
use crate::types::{Error, GainMap, GainMapMetadata, Result};

/// Configuration for gain map computation.
#[derive(Debug, Clone)]
pub struct GainMapConfig {
    /// Integer downscale factor of the gain map relative to the image.
    pub scale_factor: u32,
    /// Gamma applied to the normalized gain map samples.
    pub gamma: f32,
    /// Encode independent R/G/B channels instead of a single luma channel.
    pub multi_channel: bool,
    /// Lower clamp for the encoded content boost.
    pub min_content_boost: f32,
    /// Upper clamp for the encoded content boost.
    pub max_content_boost: f32,
    /// Offset added to SDR values before the ratio is formed.
    pub offset_sdr: f32,
    /// Offset added to HDR values before the ratio is formed.
    pub offset_hdr: f32,
}

impl Default for GainMapConfig {
    fn default() -> Self {
        Self {
            scale_factor: 4,
            gamma: 1.0,
            multi_channel: false,
            min_content_boost: 1.0,
            max_content_boost: 64.0,
            offset_sdr: 1.0 / 64.0,
            offset_hdr: 1.0 / 64.0,
        }
    }
}

/// Compute a gain map for the pair, returning it with the metadata that
/// describes how to apply it.
///
/// Per gain-map cell the linear HDR/SDR ratio is averaged over the covered
/// block, then encoded as a normalized log2 value between the observed
/// boost bounds (clamped to the configured ones).
pub fn compute_gainmap(
    hdr: &RawImage,
    sdr: &RawImage,
    config: &GainMapConfig,
    stop: impl Stop,
) -> Result<(GainMap, GainMapMetadata)> {
    if hdr.width != sdr.width || hdr.height != sdr.height {
        return Err(Error::InvalidParam(format!(
            "image resolutions mismatch: hdr intent: {}x{}, sdr intent: {}x{}",
            hdr.width, hdr.height, sdr.width, sdr.height
        )));
    }
    let scale = config.scale_factor.max(1);
    let gm_w = hdr.width.div_ceil(scale);
    let gm_h = hdr.height.div_ceil(scale);
    let channels: usize = if config.multi_channel { 3 } else { 1 };
    let coeffs = YuvCoefficients::for_gamut(hdr.gamut);

    // first pass: per-cell linear ratios and the observed bounds
    let mut ratios = vec![0.0f32; gm_w as usize * gm_h as usize * channels];
    let mut observed_min = f32::MAX;
    let mut observed_max = f32::MIN;

    for cy in 0..gm_h {
        stop.check()?;
        for cx in 0..gm_w {
            let mut hdr_acc = [0.0f32; 3];
            let mut sdr_acc = [0.0f32; 3];
            let mut n = 0.0f32;
            for dy in 0..scale {
                for dx in 0..scale {
                    let x = cx * scale + dx;
                    let y = cy * scale + dy;
                    if x < hdr.width && y < hdr.height {
                        let hp = hdr_linear_rgb(hdr, x, y);
                        let sp = sdr_linear_rgb(sdr, x, y);
                        for c in 0..3 {
                            hdr_acc[c] += hp[c];
                            sdr_acc[c] += sp[c];
                        }
                        n += 1.0;
                    }
                }
            }
            for c in &mut hdr_acc {
                *c /= n;
            }
            for c in &mut sdr_acc {
                *c /= n;
            }

            let cell = (cy * gm_w + cx) as usize * channels;
            if config.multi_channel {
                for c in 0..3 {
                    let ratio = (hdr_acc[c] + config.offset_hdr)
                        / (sdr_acc[c] + config.offset_sdr);
                    observed_min = observed_min.min(ratio);
                    observed_max = observed_max.max(ratio);
                    ratios[cell + c] = ratio;
                }
            } else {
                let hdr_y = rgb_to_luminance(hdr_acc, coeffs);
                let sdr_y = rgb_to_luminance(sdr_acc, coeffs);
                let ratio = (hdr_y + config.offset_hdr) / (sdr_y + config.offset_sdr);
                observed_min = observed_min.min(ratio);
                observed_max = observed_max.max(ratio);
                ratios[cell] = ratio;
            }
        }
    }

    let min_boost = observed_min
        .clamp(config.min_content_boost, config.max_content_boost)
        .min(1.0);
    let max_boost = observed_max
        .clamp(config.min_content_boost, config.max_content_boost)
        .max(1.0);

    let log_min = min_boost.log2();
    let log_max = max_boost.log2();
    let log_range = (log_max - log_min).max(f32::EPSILON);

    // second pass: quantize
    let mut gainmap = GainMap::new(gm_w, gm_h, channels as u8)?;
    for (dst, &ratio) in gainmap.data.iter_mut().zip(ratios.iter()) {
        let normalized = ((ratio.max(f32::EPSILON).log2() - log_min) / log_range).clamp(0.0, 1.0);
        let encoded = if config.gamma != 1.0 {
            normalized.powf(config.gamma)
        } else {
            normalized
        };
        *dst = (encoded * 255.0).round() as u8;
    }

    let metadata = GainMapMetadata {
        max_content_boost: max_boost,
        min_content_boost: min_boost,
        gamma: config.gamma,
        offset_sdr: config.offset_sdr,
        offset_hdr: config.offset_hdr,
        hdr_capacity_min: 1.0,
        hdr_capacity_max: max_boost.max(1.0),
    };

    Ok((gainmap, metadata))
}
