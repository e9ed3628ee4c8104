//! Geometric effect records and their per-plane kernels.
//!
//! Every supported layout is treated as a set of planes of fixed-size
//! samples, so one kernel per effect covers all formats. Rotate, mirror and
//! resize allocate a fresh image; crop is performed by the caller through
//! [`RawImage::crop_in_place`] and never copies.

use core::fmt;

use crate::image::RawImage;
use crate::types::{Error, Result};

/// Mirror axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorDirection {
    /// Flip left/right.
    Horizontal,
    /// Flip top/bottom.
    Vertical,
}

/// A geometric effect queued on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Clockwise rotation by 90, 180 or 270 degrees.
    Rotate {
        /// Clockwise degrees.
        degrees: i32,
    },
    /// Mirror along an axis.
    Mirror {
        /// Flip axis.
        direction: MirrorDirection,
    },
    /// Crop to the rectangle `[left, right) x [top, bottom)`.
    Crop {
        /// Left edge, inclusive.
        left: i32,
        /// Right edge, exclusive.
        right: i32,
        /// Top edge, inclusive.
        top: i32,
        /// Bottom edge, exclusive.
        bottom: i32,
    },
    /// Resample to the given destination size.
    Resize {
        /// Destination width.
        width: i32,
        /// Destination height.
        height: i32,
    },
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Rotate { degrees } => write!(f, "rotate({degrees})"),
            Effect::Mirror {
                direction: MirrorDirection::Horizontal,
            } => write!(f, "mirror(horizontal)"),
            Effect::Mirror {
                direction: MirrorDirection::Vertical,
            } => write!(f, "mirror(vertical)"),
            Effect::Crop {
                left,
                right,
                top,
                bottom,
            } => write!(f, "crop({left}, {right}, {top}, {bottom})"),
            Effect::Resize { width, height } => write!(f, "resize({width}, {height})"),
        }
    }
}

/// Rotate clockwise by 90, 180 or 270 degrees into a new image.
pub fn apply_rotate(src: &RawImage, degrees: i32) -> Result<RawImage> {
    if !matches!(degrees, 90 | 180 | 270) {
        return Err(Error::InvalidParam(format!(
            "unsupported degrees {degrees}, expects one of {{90, 180, 270}}"
        )));
    }
    let (dst_w, dst_h) = if degrees == 180 {
        (src.width, src.height)
    } else {
        (src.height, src.width)
    };
    let mut dst = RawImage::new(src.fmt, src.gamut, src.transfer, src.range, dst_w, dst_h)?;

    for pi in 0..src.planes().len() {
        let sp = src.planes()[pi];
        let ss = sp.sample_size;
        for y in 0..sp.height {
            for x in 0..sp.width {
                let (dx, dy) = match degrees {
                    90 => (sp.height - 1 - y, x),
                    180 => (sp.width - 1 - x, sp.height - 1 - y),
                    _ => (y, sp.width - 1 - x),
                };
                let sample: Vec<u8> = src.sample(pi, x, y).to_vec();
                let dst_row = dst.row_mut(pi, dy);
                dst_row[dx as usize * ss..(dx as usize + 1) * ss].copy_from_slice(&sample);
            }
        }
    }
    Ok(dst)
}

/// Mirror along an axis into a new image.
pub fn apply_mirror(src: &RawImage, direction: MirrorDirection) -> Result<RawImage> {
    let mut dst = RawImage::new(
        src.fmt,
        src.gamut,
        src.transfer,
        src.range,
        src.width,
        src.height,
    )?;

    for pi in 0..src.planes().len() {
        let sp = src.planes()[pi];
        let ss = sp.sample_size;
        for y in 0..sp.height {
            match direction {
                MirrorDirection::Vertical => {
                    let row: Vec<u8> = src.row(pi, y).to_vec();
                    dst.row_mut(pi, sp.height - 1 - y).copy_from_slice(&row);
                }
                MirrorDirection::Horizontal => {
                    let row: Vec<u8> = src.row(pi, y).to_vec();
                    let dst_row = dst.row_mut(pi, y);
                    for x in 0..sp.width as usize {
                        let rx = sp.width as usize - 1 - x;
                        dst_row[x * ss..(x + 1) * ss]
                            .copy_from_slice(&row[rx * ss..(rx + 1) * ss]);
                    }
                }
            }
        }
    }
    Ok(dst)
}

/// Nearest-neighbor resample into a new image of `dst_w` x `dst_h` pixels.
pub fn apply_resize(src: &RawImage, dst_w: u32, dst_h: u32) -> Result<RawImage> {
    let mut dst = RawImage::new(src.fmt, src.gamut, src.transfer, src.range, dst_w, dst_h)?;

    for pi in 0..src.planes().len() {
        let sp = src.planes()[pi];
        let dp = dst.planes()[pi];
        let ss = sp.sample_size;
        for y in 0..dp.height {
            let sy = (y as u64 * sp.height as u64 / dp.height as u64) as u32;
            let src_row: Vec<u8> = src.row(pi, sy).to_vec();
            let dst_row = dst.row_mut(pi, y);
            for x in 0..dp.width as usize {
                let sx = x * sp.width as usize / dp.width as usize;
                dst_row[x * ss..(x + 1) * ss].copy_from_slice(&src_row[sx * ss..(sx + 1) * ss]);
            }
        }
    }
    Ok(dst)
}
