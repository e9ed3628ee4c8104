//! Gain map application: SDR base + gain map → display-adapted output.

use enough::Stop;

use crate::color::convert::pack_rgba1010102;
use crate::color::transfer::{hlg_oetf, luminance, pq_oetf, srgb_eotf, HLG_SYSTEM_GAMMA};
use crate::image::{plane, RawImage};
use crate::types::{ColorRange, ColorTransfer, Error, GainMapMetadata, PixelFormat, Result};

/// Precomputed mapping from 8-bit gain map samples to linear gain factors.
///
/// Folding the gamma, the log2 range and the display weight into a 256-entry
/// table removes all transcendentals from the per-pixel loop.
struct GainLut {
    table: [f32; 256],
}

impl GainLut {
    fn new(metadata: &GainMapMetadata, weight: f32) -> Self {
        let log_min = metadata.min_content_boost.max(f32::MIN_POSITIVE).ln();
        let log_max = metadata.max_content_boost.max(f32::MIN_POSITIVE).ln();
        let mut table = [0.0f32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let normalized = i as f32 / 255.0;
            let linear = if metadata.gamma != 1.0 {
                normalized.powf(1.0 / metadata.gamma)
            } else {
                normalized
            };
            let log_gain = log_min + linear * (log_max - log_min);
            *entry = (log_gain * weight).exp();
        }
        Self { table }
    }

    #[inline(always)]
    fn lookup(&self, sample: u8) -> f32 {
        self.table[sample as usize]
    }
}

/// Fraction of the gain map to apply for a display with the given boost.
fn calculate_weight(display_boost: f32, metadata: &GainMapMetadata) -> f32 {
    let log_display = display_boost.max(1.0).ln();
    let log_min = metadata.hdr_capacity_min.max(1.0).ln();
    let log_max = metadata.hdr_capacity_max.max(1.0).ln();
    if log_max <= log_min {
        return 1.0;
    }
    ((log_display - log_min) / (log_max - log_min)).clamp(0.0, 1.0)
}

#[inline(always)]
fn bilinear(v00: f32, v10: f32, v01: f32, v11: f32, fx: f32, fy: f32) -> f32 {
    let top = v00 * (1.0 - fx) + v10 * fx;
    let bottom = v01 * (1.0 - fx) + v11 * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Sample the gain map at image coordinates with bilinear filtering.
fn sample_gain(
    gainmap: &RawImage,
    lut: &GainLut,
    x: u32,
    y: u32,
    img_w: u32,
    img_h: u32,
) -> f32 {
    let gm_x = x as f32 / img_w as f32 * gainmap.width as f32;
    let gm_y = y as f32 / img_h as f32 * gainmap.height as f32;

    let x0 = (gm_x.floor() as u32).min(gainmap.width - 1);
    let y0 = (gm_y.floor() as u32).min(gainmap.height - 1);
    let x1 = (x0 + 1).min(gainmap.width - 1);
    let y1 = (y0 + 1).min(gainmap.height - 1);
    let fx = gm_x - gm_x.floor();
    let fy = gm_y - gm_y.floor();

    let g00 = lut.lookup(gainmap.sample(plane::Y, x0, y0)[0]);
    let g10 = lut.lookup(gainmap.sample(plane::Y, x1, y0)[0]);
    let g01 = lut.lookup(gainmap.sample(plane::Y, x0, y1)[0]);
    let g11 = lut.lookup(gainmap.sample(plane::Y, x1, y1)[0]);
    bilinear(g00, g10, g01, g11, fx, fy)
}

/// Apply a gain map to an RGBA8888 SDR base, producing the requested HDR
/// output layout.
///
/// `display_boost` bounds how much of the gain map takes effect; outputs:
/// - `RgbaF16` + `Linear`: linear floats, 1.0 = SDR white
/// - `Rgba1010102` + `Pq` or `Hlg`: 10-bit encoded
pub fn apply_gainmap(
    sdr: &RawImage,
    gainmap: &RawImage,
    metadata: &GainMapMetadata,
    display_boost: f32,
    out_fmt: PixelFormat,
    out_transfer: ColorTransfer,
    stop: impl Stop,
) -> Result<RawImage> {
    if sdr.fmt != PixelFormat::Rgba8888 {
        return Err(Error::InvalidParam(format!(
            "gain map application expects an RGBA8888 base, received {:?}",
            sdr.fmt
        )));
    }
    if gainmap.fmt != PixelFormat::Gray8 {
        return Err(Error::InvalidParam(format!(
            "gain map application expects a Gray8 gain map, received {:?}",
            gainmap.fmt
        )));
    }

    let weight = calculate_weight(display_boost, metadata);
    let lut = GainLut::new(metadata, weight);

    let mut out = RawImage::new(
        out_fmt,
        sdr.gamut,
        out_transfer,
        ColorRange::Full,
        sdr.width,
        sdr.height,
    )?;

    for y in 0..sdr.height {
        stop.check()?;
        for x in 0..sdr.width {
            let s = sdr.sample(plane::PACKED, x, y);
            let gain = sample_gain(gainmap, &lut, x, y, sdr.width, sdr.height);
            let mut hdr = [0.0f32; 3];
            for c in 0..3 {
                let linear = srgb_eotf(s[c] as f32 / 255.0);
                hdr[c] = ((linear + metadata.offset_sdr) * gain - metadata.offset_hdr).max(0.0);
            }
            write_pixel(&mut out, x, y, hdr, out_fmt, out_transfer)?;
        }
    }
    Ok(out)
}

fn write_pixel(
    out: &mut RawImage,
    x: u32,
    y: u32,
    hdr: [f32; 3],
    out_fmt: PixelFormat,
    out_transfer: ColorTransfer,
) -> Result<()> {
    match (out_fmt, out_transfer) {
        (PixelFormat::RgbaF16, ColorTransfer::Linear) => {
            let xi = x as usize * 8;
            let row = out.row_mut(plane::PACKED, y);
            for c in 0..3 {
                let bits = half::f16::from_f32(hdr[c]).to_le_bytes();
                row[xi + c * 2..xi + c * 2 + 2].copy_from_slice(&bits);
            }
            row[xi + 6..xi + 8].copy_from_slice(&half::f16::from_f32(1.0).to_le_bytes());
        }
        (PixelFormat::Rgba1010102, ColorTransfer::Pq) => {
            let scale = luminance::SDR_WHITE_NITS / luminance::PQ_PEAK_NITS;
            let encoded = [
                pq_oetf(hdr[0] * scale),
                pq_oetf(hdr[1] * scale),
                pq_oetf(hdr[2] * scale),
            ];
            let xi = x as usize * 4;
            out.row_mut(plane::PACKED, y)[xi..xi + 4]
                .copy_from_slice(&pack_rgba1010102(encoded).to_le_bytes());
        }
        (PixelFormat::Rgba1010102, ColorTransfer::Hlg) => {
            let mut encoded = [0.0f32; 3];
            for c in 0..3 {
                // linear (SDR-white relative) → scene light on a 1000 nit display
                let display = hdr[c] * luminance::SDR_WHITE_NITS / luminance::HLG_PEAK_NITS;
                let scene = display.max(0.0).powf(1.0 / HLG_SYSTEM_GAMMA);
                encoded[c] = hlg_oetf(scene.min(1.0));
            }
            let xi = x as usize * 4;
            out.row_mut(plane::PACKED, y)[xi..xi + 4]
                .copy_from_slice(&pack_rgba1010102(encoded).to_le_bytes());
        }
        (fmt, ct) => {
            return Err(Error::InvalidParam(format!(
                "unsupported output pixel format and output color transfer pair {fmt:?}/{ct:?}"
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColorGamut;
    use enough::Never;

    fn sdr_solid(w: u32, h: u32, v: u8) -> RawImage {
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        for _ in 0..w * h {
            data.extend_from_slice(&[v, v, v, 255]);
        }
        RawImage::from_packed(
            PixelFormat::Rgba8888,
            ColorGamut::Bt709,
            ColorTransfer::Srgb,
            ColorRange::Full,
            w,
            h,
            data,
        )
        .unwrap()
    }

    fn gainmap_solid(w: u32, h: u32, v: u8) -> RawImage {
        RawImage::from_packed(
            PixelFormat::Gray8,
            ColorGamut::Bt709,
            ColorTransfer::Srgb,
            ColorRange::Full,
            w,
            h,
            vec![v; (w * h) as usize],
        )
        .unwrap()
    }

    fn metadata_boost(max: f32) -> GainMapMetadata {
        GainMapMetadata {
            max_content_boost: max,
            min_content_boost: 1.0,
            hdr_capacity_max: max,
            ..GainMapMetadata::default()
        }
    }

    fn f16_at(img: &RawImage, x: u32, y: u32, channel: usize) -> f32 {
        let s = img.sample(plane::PACKED, x, y);
        half::f16::from_le_bytes([s[channel * 2], s[channel * 2 + 1]]).to_f32()
    }

    #[test]
    fn full_gain_reaches_max_boost() {
        let sdr = sdr_solid(8, 8, 255);
        let gm = gainmap_solid(2, 2, 255);
        let meta = metadata_boost(4.0);
        let out = apply_gainmap(
            &sdr,
            &gm,
            &meta,
            4.0,
            PixelFormat::RgbaF16,
            ColorTransfer::Linear,
            Never,
        )
        .unwrap();
        let v = f16_at(&out, 4, 4, 0);
        // (1.0 + 1/64) * 4 - 1/64
        assert!((v - 4.03).abs() < 0.1, "got {v}");
    }

    #[test]
    fn sdr_capable_display_gets_no_boost() {
        let sdr = sdr_solid(8, 8, 128);
        let gm = gainmap_solid(2, 2, 255);
        let meta = metadata_boost(4.0);
        let out = apply_gainmap(
            &sdr,
            &gm,
            &meta,
            1.0,
            PixelFormat::RgbaF16,
            ColorTransfer::Linear,
            Never,
        )
        .unwrap();
        let expect = srgb_eotf(128.0 / 255.0);
        let v = f16_at(&out, 0, 0, 0);
        assert!((v - expect).abs() < 0.02, "got {v}, expected {expect}");
    }

    #[test]
    fn pq_output_is_packed_1010102() {
        let sdr = sdr_solid(8, 8, 200);
        let gm = gainmap_solid(2, 2, 128);
        let meta = metadata_boost(4.0);
        let out = apply_gainmap(
            &sdr,
            &gm,
            &meta,
            4.0,
            PixelFormat::Rgba1010102,
            ColorTransfer::Pq,
            Never,
        )
        .unwrap();
        assert_eq!(out.fmt, PixelFormat::Rgba1010102);
        let s = out.sample(plane::PACKED, 3, 3);
        let word = u32::from_le_bytes([s[0], s[1], s[2], s[3]]);
        assert_eq!(word >> 30, 3, "alpha bits must be opaque");
    }

    #[test]
    fn rejects_wrong_base_layout() {
        let sdr = gainmap_solid(8, 8, 0);
        let gm = gainmap_solid(2, 2, 0);
        let err = apply_gainmap(
            &sdr,
            &gm,
            &metadata_boost(2.0),
            2.0,
            PixelFormat::RgbaF16,
            ColorTransfer::Linear,
            Never,
        )
        .unwrap_err();
        assert!(err.detail().contains("RGBA8888"), "{err}");
    }
}
