//! HDR → SDR tone mapping for the synthesize-SDR encode path.

use enough::Stop;

use crate::color::convert::{hdr_encoded_rgb, rgb_to_ycbcr, YuvCoefficients};
use crate::color::transfer::{hlg_oetf_inv, luminance, pq_eotf, srgb_oetf, HLG_SYSTEM_GAMMA};
use crate::image::{plane, RawImage};
use crate::types::{ColorRange, ColorTransfer, Error, PixelFormat, Result};

/// White point of the extended Reinhard curve, in SDR-white multiples.
const TONEMAP_WHITE_POINT: f32 = 4.0;

/// Linear RGB of one HDR pixel, normalized so 1.0 = SDR white (203 nits).
pub fn hdr_linear_rgb(img: &RawImage, x: u32, y: u32) -> [f32; 3] {
    let encoded = hdr_encoded_rgb(img, x, y);
    let mut out = [0.0f32; 3];
    for c in 0..3 {
        out[c] = match img.transfer {
            ColorTransfer::Pq => {
                pq_eotf(encoded[c]) * luminance::PQ_PEAK_NITS / luminance::SDR_WHITE_NITS
            }
            ColorTransfer::Hlg => {
                // scene light through the nominal OOTF of a 1000 nit display
                let scene = hlg_oetf_inv(encoded[c]);
                scene.powf(HLG_SYSTEM_GAMMA) * luminance::HLG_PEAK_NITS
                    / luminance::SDR_WHITE_NITS
            }
            // linear inputs are already SDR-white relative
            _ => encoded[c],
        };
    }
    out
}

/// Extended Reinhard on maxRGB: hue-preserving compression of `[0, inf)`
/// into the SDR range, saturating at the configured white point.
#[inline]
fn compress_max_rgb(rgb: [f32; 3]) -> [f32; 3] {
    let m = rgb[0].max(rgb[1]).max(rgb[2]);
    if m <= 0.0 {
        return [0.0; 3];
    }
    let w2 = TONEMAP_WHITE_POINT * TONEMAP_WHITE_POINT;
    let mapped = m * (1.0 + m / w2) / (1.0 + m);
    let scale = (mapped / m).min(1.0);
    [rgb[0] * scale, rgb[1] * scale, rgb[2] * scale]
}

/// Tone map an HDR image (P010 or RGBA1010102) to an sRGB 4:2:0 SDR image.
///
/// The output keeps the source gamut; only the dynamic range is compressed.
pub fn tonemap_to_sdr(hdr: &RawImage, stop: impl Stop) -> Result<RawImage> {
    if !hdr.fmt.is_hdr() {
        return Err(Error::InvalidParam(format!(
            "tone mapping expects an hdr layout, received {:?}",
            hdr.fmt
        )));
    }

    let coeffs = YuvCoefficients::for_gamut(hdr.gamut);
    let mut out = RawImage::new(
        PixelFormat::Yuv420,
        hdr.gamut,
        ColorTransfer::Srgb,
        ColorRange::Full,
        hdr.width,
        hdr.height,
    )?;

    // sRGB-encoded full-resolution pixels, reused for chroma averaging
    let mut encoded = vec![[0.0f32; 3]; hdr.width as usize * hdr.height as usize];
    for y in 0..hdr.height {
        stop.check()?;
        for x in 0..hdr.width {
            let sdr_linear = compress_max_rgb(hdr_linear_rgb(hdr, x, y));
            let px = [
                srgb_oetf(sdr_linear[0].clamp(0.0, 1.0)),
                srgb_oetf(sdr_linear[1].clamp(0.0, 1.0)),
                srgb_oetf(sdr_linear[2].clamp(0.0, 1.0)),
            ];
            encoded[(y * hdr.width + x) as usize] = px;
            let luma = rgb_to_ycbcr(px, coeffs)[0];
            out.row_mut(plane::Y, y)[x as usize] =
                (luma * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }

    let cw = out.planes()[plane::U].width;
    let ch = out.planes()[plane::U].height;
    for cy in 0..ch {
        stop.check()?;
        for cx in 0..cw {
            let mut cb_acc = 0.0f32;
            let mut cr_acc = 0.0f32;
            let mut n = 0.0f32;
            for dy in 0..2 {
                for dx in 0..2 {
                    let px = cx * 2 + dx;
                    let py = cy * 2 + dy;
                    if px < hdr.width && py < hdr.height {
                        let [_, cb, cr] =
                            rgb_to_ycbcr(encoded[(py * hdr.width + px) as usize], coeffs);
                        cb_acc += cb;
                        cr_acc += cr;
                        n += 1.0;
                    }
                }
            }
            let q = |c: f32| ((c / n + 0.5) * 255.0).round().clamp(0.0, 255.0) as u8;
            out.row_mut(plane::U, cy)[cx as usize] = q(cb_acc);
            out.row_mut(plane::V, cy)[cx as usize] = q(cr_acc);
        }
    }

    Ok(out)
}
