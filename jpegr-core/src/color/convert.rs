//! RGB ↔ YCbCr conversions and raw-format normalization.
//!
//! Internally the encoder works on YCbCr representations: 8-bit 4:2:0 for
//! SDR intents and P010 for HDR intents. [`convert_raw_to_ycbcr`] is the
//! normalizing converter every raw attachment passes through; it also
//! re-materializes a tight single-allocation copy of an image whose plane
//! views were re-pointed by a crop.

use crate::image::{plane, RawImage};
use crate::types::{ColorGamut, ColorRange, Error, PixelFormat, Result};

/// YCbCr matrix coefficients.
#[derive(Debug, Clone, Copy)]
pub struct YuvCoefficients {
    /// Red contribution to luma.
    pub kr: f32,
    /// Blue contribution to luma.
    pub kb: f32,
}

impl YuvCoefficients {
    /// BT.601 (legacy SD).
    pub const BT601: Self = Self {
        kr: 0.299,
        kb: 0.114,
    };

    /// BT.709 (HD).
    pub const BT709: Self = Self {
        kr: 0.2126,
        kb: 0.0722,
    };

    /// BT.2020 (UHD/HDR).
    pub const BT2020: Self = Self {
        kr: 0.2627,
        kb: 0.0593,
    };

    /// Green contribution to luma.
    #[inline]
    pub fn kg(&self) -> f32 {
        1.0 - self.kr - self.kb
    }

    /// Coefficients matching a gamut's primaries.
    pub fn for_gamut(gamut: ColorGamut) -> Self {
        match gamut {
            ColorGamut::Bt709 => Self::BT709,
            // P3 content conventionally uses the BT.709 matrix
            ColorGamut::DisplayP3 => Self::BT709,
            ColorGamut::Bt2100 => Self::BT2020,
        }
    }
}

/// Full-range RGB `[0,1]` → YCbCr (Y `[0,1]`, Cb/Cr `[-0.5,0.5]`).
#[inline]
pub fn rgb_to_ycbcr(rgb: [f32; 3], coeffs: YuvCoefficients) -> [f32; 3] {
    let [r, g, b] = rgb;
    let y = coeffs.kr * r + coeffs.kg() * g + coeffs.kb * b;
    let cb = (b - y) / (2.0 * (1.0 - coeffs.kb));
    let cr = (r - y) / (2.0 * (1.0 - coeffs.kr));
    [y, cb, cr]
}

/// Full-range YCbCr → RGB `[0,1]`.
#[inline]
pub fn ycbcr_to_rgb(ycbcr: [f32; 3], coeffs: YuvCoefficients) -> [f32; 3] {
    let [y, cb, cr] = ycbcr;
    let r = y + 2.0 * (1.0 - coeffs.kr) * cr;
    let b = y + 2.0 * (1.0 - coeffs.kb) * cb;
    let g = (y - coeffs.kr * r - coeffs.kb * b) / coeffs.kg();
    [r, g, b]
}

/// Luminance of an RGB triple under the given coefficients.
#[inline]
pub fn rgb_to_luminance(rgb: [f32; 3], coeffs: YuvCoefficients) -> f32 {
    coeffs.kr * rgb[0] + coeffs.kg() * rgb[1] + coeffs.kb * rgb[2]
}

/// Unpack an RGBA1010102 word into encoded RGB `[0,1]` (alpha dropped).
#[inline]
pub fn unpack_rgba1010102(packed: u32) -> [f32; 3] {
    [
        (packed & 0x3FF) as f32 / 1023.0,
        ((packed >> 10) & 0x3FF) as f32 / 1023.0,
        ((packed >> 20) & 0x3FF) as f32 / 1023.0,
    ]
}

/// Pack encoded RGB `[0,1]` into an RGBA1010102 word with opaque alpha.
#[inline]
pub fn pack_rgba1010102(rgb: [f32; 3]) -> u32 {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 1023.0).round() as u32;
    q(rgb[0]) | (q(rgb[1]) << 10) | (q(rgb[2]) << 20) | (3 << 30)
}

#[inline]
fn expand_luma10(v: u16, range: ColorRange) -> f32 {
    match range {
        ColorRange::Full => v as f32 / 1023.0,
        ColorRange::Limited => ((v as f32 - 64.0) / 876.0).clamp(0.0, 1.0),
    }
}

#[inline]
fn expand_chroma10(v: u16, range: ColorRange) -> f32 {
    match range {
        ColorRange::Full => v as f32 / 1023.0 - 0.5,
        ColorRange::Limited => ((v as f32 - 512.0) / 896.0).clamp(-0.5, 0.5),
    }
}

/// Encoded (pre-EOTF) RGB of one pixel of an HDR-layout image.
pub fn hdr_encoded_rgb(img: &RawImage, x: u32, y: u32) -> [f32; 3] {
    let coeffs = YuvCoefficients::for_gamut(img.gamut);
    match img.fmt {
        PixelFormat::P010 => {
            let ys = img.sample(plane::Y, x, y);
            let y10 = u16::from_le_bytes([ys[0], ys[1]]) >> 6;
            let uv = img.sample(plane::UV, x / 2, y / 2);
            let cb10 = u16::from_le_bytes([uv[0], uv[1]]) >> 6;
            let cr10 = u16::from_le_bytes([uv[2], uv[3]]) >> 6;
            let ycbcr = [
                expand_luma10(y10, img.range),
                expand_chroma10(cb10, img.range),
                expand_chroma10(cr10, img.range),
            ];
            let rgb = ycbcr_to_rgb(ycbcr, coeffs);
            [
                rgb[0].clamp(0.0, 1.0),
                rgb[1].clamp(0.0, 1.0),
                rgb[2].clamp(0.0, 1.0),
            ]
        }
        PixelFormat::Rgba1010102 => {
            let s = img.sample(plane::PACKED, x, y);
            unpack_rgba1010102(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
        }
        _ => [0.0; 3],
    }
}

/// Copy an image into a fresh tight allocation, preserving its view contents.
pub fn copy_tight(img: &RawImage) -> Result<RawImage> {
    let mut out = RawImage::new(
        img.fmt,
        img.gamut,
        img.transfer,
        img.range,
        img.width,
        img.height,
    )?;
    for pi in 0..img.planes().len() {
        let h = img.planes()[pi].height;
        for y in 0..h {
            let row: Vec<u8> = img.row(pi, y).to_vec();
            out.row_mut(pi, y).copy_from_slice(&row);
        }
    }
    Ok(out)
}

/// Convert packed 8-bit RGBA into 8-bit YCbCr 4:2:0 (full range).
pub fn rgba8888_to_yuv420(img: &RawImage) -> Result<RawImage> {
    let coeffs = YuvCoefficients::for_gamut(img.gamut);
    let mut out = RawImage::new(
        PixelFormat::Yuv420,
        img.gamut,
        img.transfer,
        ColorRange::Full,
        img.width,
        img.height,
    )?;

    for y in 0..img.height {
        for x in 0..img.width {
            let s = img.sample(plane::PACKED, x, y);
            let rgb = [
                s[0] as f32 / 255.0,
                s[1] as f32 / 255.0,
                s[2] as f32 / 255.0,
            ];
            let luma = rgb_to_ycbcr(rgb, coeffs)[0];
            out.row_mut(plane::Y, y)[x as usize] = (luma * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }

    let cw = out.planes()[plane::U].width;
    let ch = out.planes()[plane::U].height;
    for cy in 0..ch {
        for cx in 0..cw {
            let mut cb_acc = 0.0f32;
            let mut cr_acc = 0.0f32;
            let mut n = 0.0f32;
            for dy in 0..2 {
                for dx in 0..2 {
                    let px = cx * 2 + dx;
                    let py = cy * 2 + dy;
                    if px < img.width && py < img.height {
                        let s = img.sample(plane::PACKED, px, py);
                        let rgb = [
                            s[0] as f32 / 255.0,
                            s[1] as f32 / 255.0,
                            s[2] as f32 / 255.0,
                        ];
                        let [_, cb, cr] = rgb_to_ycbcr(rgb, coeffs);
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

/// Convert packed RGBA1010102 into P010 (full range).
pub fn rgba1010102_to_p010(img: &RawImage) -> Result<RawImage> {
    let coeffs = YuvCoefficients::for_gamut(img.gamut);
    let mut out = RawImage::new(
        PixelFormat::P010,
        img.gamut,
        img.transfer,
        ColorRange::Full,
        img.width,
        img.height,
    )?;

    for y in 0..img.height {
        for x in 0..img.width {
            let rgb = hdr_encoded_rgb(img, x, y);
            let luma = rgb_to_ycbcr(rgb, coeffs)[0];
            let y16 = ((luma.clamp(0.0, 1.0) * 1023.0).round() as u16) << 6;
            let xi = x as usize * 2;
            out.row_mut(plane::Y, y)[xi..xi + 2].copy_from_slice(&y16.to_le_bytes());
        }
    }

    let cw = out.planes()[plane::UV].width;
    let ch = out.planes()[plane::UV].height;
    for cy in 0..ch {
        for cx in 0..cw {
            let mut cb_acc = 0.0f32;
            let mut cr_acc = 0.0f32;
            let mut n = 0.0f32;
            for dy in 0..2 {
                for dx in 0..2 {
                    let px = cx * 2 + dx;
                    let py = cy * 2 + dy;
                    if px < img.width && py < img.height {
                        let [_, cb, cr] = rgb_to_ycbcr(hdr_encoded_rgb(img, px, py), coeffs);
                        cb_acc += cb;
                        cr_acc += cr;
                        n += 1.0;
                    }
                }
            }
            let q = |c: f32| (((c / n + 0.5).clamp(0.0, 1.0) * 1023.0).round() as u16) << 6;
            let xi = cx as usize * 4;
            let row = out.row_mut(plane::UV, cy);
            row[xi..xi + 2].copy_from_slice(&q(cb_acc).to_le_bytes());
            row[xi + 2..xi + 4].copy_from_slice(&q(cr_acc).to_le_bytes());
        }
    }
    Ok(out)
}

/// The normalizing converter raw attachments pass through: YCbCr layouts are
/// re-copied tight, RGBA layouts are converted to the matching YCbCr layout.
pub fn convert_raw_to_ycbcr(img: &RawImage) -> Result<RawImage> {
    match img.fmt {
        PixelFormat::Yuv420 | PixelFormat::P010 | PixelFormat::Gray8 => copy_tight(img),
        PixelFormat::Rgba8888 => rgba8888_to_yuv420(img),
        PixelFormat::Rgba1010102 => rgba1010102_to_p010(img),
        PixelFormat::RgbaF16 => Err(Error::InvalidParam(format!(
            "unsupported input pixel format for color space conversion {:?}",
            img.fmt
        ))),
    }
}

/// Expand 8-bit YCbCr 4:2:0 to interleaved RGB8 (nearest chroma upsample).
pub fn yuv420_to_rgb8(img: &RawImage) -> Vec<u8> {
    let coeffs = YuvCoefficients::for_gamut(img.gamut);
    let mut rgb = Vec::with_capacity(img.width as usize * img.height as usize * 3);
    for y in 0..img.height {
        for x in 0..img.width {
            let luma = img.sample(plane::Y, x, y)[0] as f32 / 255.0;
            let cb = img.sample(plane::U, x / 2, y / 2)[0] as f32 / 255.0 - 0.5;
            let cr = img.sample(plane::V, x / 2, y / 2)[0] as f32 / 255.0 - 0.5;
            let px = ycbcr_to_rgb([luma, cb, cr], coeffs);
            for c in px {
                rgb.push((c.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
        }
    }
    rgb
}

/// Linear RGB of one SDR pixel (sRGB-encoded Yuv420 or RGBA8888 input).
pub fn sdr_linear_rgb(img: &RawImage, x: u32, y: u32) -> [f32; 3] {
    use crate::color::transfer::srgb_eotf;
    match img.fmt {
        PixelFormat::Yuv420 => {
            let coeffs = YuvCoefficients::for_gamut(img.gamut);
            let luma = img.sample(plane::Y, x, y)[0] as f32 / 255.0;
            let cb = img.sample(plane::U, x / 2, y / 2)[0] as f32 / 255.0 - 0.5;
            let cr = img.sample(plane::V, x / 2, y / 2)[0] as f32 / 255.0 - 0.5;
            let px = ycbcr_to_rgb([luma, cb, cr], coeffs);
            [
                srgb_eotf(px[0].clamp(0.0, 1.0)),
                srgb_eotf(px[1].clamp(0.0, 1.0)),
                srgb_eotf(px[2].clamp(0.0, 1.0)),
            ]
        }
        PixelFormat::Rgba8888 => {
            let s = img.sample(plane::PACKED, x, y);
            [
                srgb_eotf(s[0] as f32 / 255.0),
                srgb_eotf(s[1] as f32 / 255.0),
                srgb_eotf(s[2] as f32 / 255.0),
            ]
        }
        _ => [0.0; 3],
    }
}
