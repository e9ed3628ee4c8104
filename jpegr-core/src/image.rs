//! Raw and compressed image buffers.
//!
//! A [`RawImage`] owns one contiguous allocation and layers per-plane views
//! over it. Cropping re-points the views without copying, so a cropped image
//! may stop being "tight" (planes packed back to back); [`RawImage::is_tight`]
//! reports this and the color converter can re-materialize a tight copy.

use crate::limits;
use crate::types::{ColorGamut, ColorRange, ColorTransfer, Error, PixelFormat, Result};

/// Named plane indices.
pub mod plane {
    /// Luma plane (planar formats) .
    pub const Y: usize = 0;
    /// Cb plane of 3-plane 4:2:0.
    pub const U: usize = 1;
    /// Cr plane of 3-plane 4:2:0.
    pub const V: usize = 2;
    /// Interleaved CbCr plane of P010.
    pub const UV: usize = 1;
    /// The single plane of packed formats.
    pub const PACKED: usize = 0;
}

/// View over one plane of a [`RawImage`] block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneDesc {
    /// Byte offset of the first sample in the backing block.
    pub offset: usize,
    /// Row pitch in samples.
    pub stride: u32,
    /// Plane width in samples.
    pub width: u32,
    /// Plane height in samples.
    pub height: u32,
    /// Bytes per sample (a P010 CbCr pair counts as one 4-byte sample).
    pub sample_size: usize,
}

/// Plane geometry for a format at the given image dimensions:
/// `(width, height, sample_size)` per plane.
fn plane_geometry(fmt: PixelFormat, w: u32, h: u32) -> Vec<(u32, u32, usize)> {
    let half_w = w.div_ceil(2);
    let half_h = h.div_ceil(2);
    match fmt {
        PixelFormat::Yuv420 => vec![(w, h, 1), (half_w, half_h, 1), (half_w, half_h, 1)],
        PixelFormat::P010 => vec![(w, h, 2), (half_w, half_h, 4)],
        PixelFormat::Rgba8888 | PixelFormat::Rgba1010102 => vec![(w, h, 4)],
        PixelFormat::RgbaF16 => vec![(w, h, 8)],
        PixelFormat::Gray8 => vec![(w, h, 1)],
    }
}

fn validate_alloc_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidParam(format!(
            "image dimensions cannot be zero, received image dimensions {width}x{height}"
        )));
    }
    if width > limits::MAX_WIDTH || height > limits::MAX_HEIGHT {
        return Err(Error::InvalidParam(format!(
            "image dimensions cannot be larger than {}x{}, received image dimensions {width}x{height}",
            limits::MAX_WIDTH,
            limits::MAX_HEIGHT
        )));
    }
    Ok(())
}

/// A raw (uncompressed) image: owned byte block plus per-plane views.
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Pixel layout.
    pub fmt: PixelFormat,
    /// Color gamut.
    pub gamut: ColorGamut,
    /// Transfer function.
    pub transfer: ColorTransfer,
    /// Sample range.
    pub range: ColorRange,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    block: Vec<u8>,
    planes: Vec<PlaneDesc>,
}

impl RawImage {
    /// Allocate a zeroed image with a tight plane layout.
    pub fn new(
        fmt: PixelFormat,
        gamut: ColorGamut,
        transfer: ColorTransfer,
        range: ColorRange,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        validate_alloc_dimensions(width, height)?;
        let geometry = plane_geometry(fmt, width, height);
        let mut planes = Vec::with_capacity(geometry.len());
        let mut offset = 0usize;
        for &(pw, ph, ss) in &geometry {
            planes.push(PlaneDesc {
                offset,
                stride: pw,
                width: pw,
                height: ph,
                sample_size: ss,
            });
            offset += pw as usize * ph as usize * ss;
        }
        Ok(Self {
            fmt,
            gamut,
            transfer,
            range,
            width,
            height,
            block: vec![0u8; offset],
            planes,
        })
    }

    /// Build an image from a single packed buffer (packed formats and Gray8).
    pub fn from_packed(
        fmt: PixelFormat,
        gamut: ColorGamut,
        transfer: ColorTransfer,
        range: ColorRange,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self> {
        if fmt.plane_count() != 1 {
            return Err(Error::InvalidParam(format!(
                "from_packed expects a single-plane format, received {fmt:?}"
            )));
        }
        validate_alloc_dimensions(width, height)?;
        let (_, _, ss) = plane_geometry(fmt, width, height)[0];
        let needed = width as usize * height as usize * ss;
        if data.len() < needed {
            return Err(Error::InvalidParam(format!(
                "packed buffer too small: expected at least {needed} bytes, received {}",
                data.len()
            )));
        }
        Ok(Self {
            fmt,
            gamut,
            transfer,
            range,
            width,
            height,
            block: data,
            planes: vec![PlaneDesc {
                offset: 0,
                stride: width,
                width,
                height,
                sample_size: ss,
            }],
        })
    }

    /// Build an image by copying caller-supplied planes into a tight layout.
    ///
    /// `strides` are row pitches in samples of each plane (a P010 CbCr pair
    /// is one sample). Strides smaller than the plane's row width are
    /// rejected with a detail string naming the plane.
    pub fn from_planes(
        fmt: PixelFormat,
        gamut: ColorGamut,
        transfer: ColorTransfer,
        range: ColorRange,
        width: u32,
        height: u32,
        planes: &[&[u8]],
        strides: &[u32],
    ) -> Result<Self> {
        validate_alloc_dimensions(width, height)?;
        let geometry = plane_geometry(fmt, width, height);
        if planes.len() != geometry.len() || strides.len() != geometry.len() {
            return Err(Error::InvalidParam(format!(
                "received {} plane(s) and {} stride(s) for {fmt:?}, expects {}",
                planes.len(),
                strides.len(),
                geometry.len()
            )));
        }

        for (i, &(pw, ph, ss)) in geometry.iter().enumerate() {
            let name = plane_name(fmt, i);
            let stride = strides[i];
            if stride < pw {
                let msg = if i == 0 {
                    format!(
                        "luma stride must not be smaller than width, stride={stride}, width={width}"
                    )
                } else {
                    format!(
                        "{name} stride must not be smaller than width / 2, stride={stride}, width={width}"
                    )
                };
                return Err(Error::InvalidParam(msg));
            }
            let needed = ((ph as usize - 1) * stride as usize + pw as usize) * ss;
            if planes[i].len() < needed {
                return Err(Error::InvalidParam(format!(
                    "{name} plane buffer too small: expected at least {needed} bytes, received {}",
                    planes[i].len()
                )));
            }
        }

        let mut img = Self::new(fmt, gamut, transfer, range, width, height)?;
        for (i, &(pw, ph, ss)) in geometry.iter().enumerate() {
            let src_pitch = strides[i] as usize * ss;
            let row_bytes = pw as usize * ss;
            for y in 0..ph as usize {
                let src = &planes[i][y * src_pitch..y * src_pitch + row_bytes];
                img.row_mut(i, y as u32).copy_from_slice(src);
            }
        }
        Ok(img)
    }

    /// Plane views.
    pub fn planes(&self) -> &[PlaneDesc] {
        &self.planes
    }

    /// The backing allocation.
    pub fn block(&self) -> &[u8] {
        &self.block
    }

    /// One row of a plane.
    pub fn row(&self, plane: usize, y: u32) -> &[u8] {
        let p = &self.planes[plane];
        let start = p.offset + y as usize * p.stride as usize * p.sample_size;
        &self.block[start..start + p.width as usize * p.sample_size]
    }

    /// One mutable row of a plane.
    pub fn row_mut(&mut self, plane: usize, y: u32) -> &mut [u8] {
        let p = self.planes[plane];
        let start = p.offset + y as usize * p.stride as usize * p.sample_size;
        &mut self.block[start..start + p.width as usize * p.sample_size]
    }

    /// One sample of a plane.
    pub fn sample(&self, plane: usize, x: u32, y: u32) -> &[u8] {
        let p = &self.planes[plane];
        let start =
            p.offset + (y as usize * p.stride as usize + x as usize) * p.sample_size;
        &self.block[start..start + p.sample_size]
    }

    /// Whether the planes still form the canonical packed single-allocation
    /// layout (false after an in-place crop).
    pub fn is_tight(&self) -> bool {
        let mut offset = 0usize;
        for (p, &(pw, ph, ss)) in self
            .planes
            .iter()
            .zip(plane_geometry(self.fmt, self.width, self.height).iter())
        {
            if p.offset != offset || p.stride != pw || p.width != pw || p.height != ph {
                return false;
            }
            offset += pw as usize * ph as usize * ss;
        }
        self.block.len() == offset
    }

    /// Crop by re-pointing the plane views; strides and the backing block are
    /// left untouched. The rectangle must already be validated against the
    /// image bounds.
    pub fn crop_in_place(&mut self, left: u32, top: u32, new_width: u32, new_height: u32) {
        for p in &mut self.planes {
            let (sub_x, sub_y) = (
                if p.width < self.width { 2 } else { 1 },
                if p.height < self.height { 2 } else { 1 },
            );
            let plane_left = left / sub_x;
            let plane_top = top / sub_y;
            p.offset +=
                (plane_top as usize * p.stride as usize + plane_left as usize) * p.sample_size;
            p.width = if sub_x == 2 {
                new_width.div_ceil(2)
            } else {
                new_width
            };
            p.height = if sub_y == 2 {
                new_height.div_ceil(2)
            } else {
                new_height
            };
        }
        self.width = new_width;
        self.height = new_height;
    }
}

fn plane_name(fmt: PixelFormat, idx: usize) -> &'static str {
    match (fmt, idx) {
        (PixelFormat::Yuv420, 1) => "chroma_u",
        (PixelFormat::Yuv420, 2) => "chroma_v",
        (PixelFormat::P010, 1) => "chroma_uv",
        _ => "luma",
    }
}

/// A compressed image: owned bytes plus color tags and a capacity bound.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    data: Vec<u8>,
    capacity: usize,
    /// Color gamut of the encoded image.
    pub gamut: ColorGamut,
    /// Transfer function of the encoded image.
    pub transfer: ColorTransfer,
    /// Sample range of the encoded image.
    pub range: ColorRange,
}

impl CompressedImage {
    /// Wrap existing bytes; capacity equals their length.
    pub fn new(
        data: Vec<u8>,
        gamut: ColorGamut,
        transfer: ColorTransfer,
        range: ColorRange,
    ) -> Self {
        let capacity = data.len();
        Self {
            data,
            capacity,
            gamut,
            transfer,
            range,
        }
    }

    /// An empty buffer bounded by `capacity` bytes.
    pub fn with_capacity(
        capacity: usize,
        gamut: ColorGamut,
        transfer: ColorTransfer,
        range: ColorRange,
    ) -> Self {
        Self {
            data: Vec::new(),
            capacity,
            gamut,
            transfer,
            range,
        }
    }

    /// The encoded bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length of the encoded bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no bytes are present.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The capacity bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Install encoded bytes, enforcing the capacity bound.
    pub fn set_data(&mut self, bytes: Vec<u8>) -> Result<()> {
        if bytes.len() > self.capacity {
            return Err(Error::MemError(
                "output buffer to store compressed data is too small".into(),
            ));
        }
        self.data = bytes;
        Ok(())
    }
}
