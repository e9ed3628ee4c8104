//! Assembly and probing engine behind the encoder/decoder sessions.
//!
//! The sessions decide *which* path runs; this module runs it: tone map,
//! gain map computation, base/gain-map JPEG encoding, container assembly on
//! the way in, and MPF probing, stream extraction and gain map application
//! on the way out.

use log::debug;

use jpegr_core::color::convert::yuv420_to_rgb8;
use jpegr_core::color::tonemap::tonemap_to_sdr;
use jpegr_core::gainmap::{apply_gainmap, compute_gainmap, GainMapConfig};
use jpegr_core::metadata::{mpf, xmp};
use jpegr_core::{
    ColorGamut, ColorRange, ColorTransfer, CompressedImage, Error, GainMap, GainMapMetadata,
    PixelFormat, RawImage, Result, Never,
};

use crate::jpeg::{codec, icc, markers};

/// Knobs the encoder session hands to the engine.
#[derive(Debug, Clone, Copy)]
pub struct EncodeParams<'a> {
    /// JPEG quality of the base image.
    pub base_quality: u8,
    /// JPEG quality of the gain map image.
    pub gainmap_quality: u8,
    /// Gain map downscale factor.
    pub scale_factor: u32,
    /// Encode per-channel gain maps.
    pub multi_channel: bool,
    /// EXIF block to stamp into the base image.
    pub exif: Option<&'a [u8]>,
}

/// Encode from raw intents: HDR only (the SDR rendition is synthesized by
/// tone mapping) or an HDR + SDR pair.
pub fn encode_from_raw(
    hdr: &RawImage,
    sdr: Option<&RawImage>,
    params: &EncodeParams<'_>,
) -> Result<(Vec<u8>, ColorGamut)> {
    let synthesized;
    let sdr = match sdr {
        Some(img) => img,
        None => {
            debug!("no sdr intent, synthesizing via tone mapping");
            synthesized = tonemap_to_sdr(hdr, Never)?;
            &synthesized
        }
    };

    let (gainmap, metadata) = compute(hdr, sdr, params)?;
    let base_jpeg = encode_base(sdr, params.base_quality)?;
    let gainmap_jpeg = encode_gainmap(&gainmap, params.gainmap_quality)?;
    let out = assemble(&base_jpeg, &gainmap_jpeg, &metadata, sdr.gamut, params.exif)?;
    Ok((out, sdr.gamut))
}

/// Encode against an already-compressed base stream. The gain map is
/// computed from the raw SDR intent when present, otherwise from the decoded
/// base stream itself.
pub fn encode_with_compressed_base(
    hdr: &RawImage,
    sdr: Option<&RawImage>,
    base: &CompressedImage,
    params: &EncodeParams<'_>,
) -> Result<(Vec<u8>, ColorGamut)> {
    let decoded;
    let sdr = match sdr {
        Some(img) => img,
        None => {
            let (rgb, w, h) = codec::decode_rgb8(base.data())?;
            decoded = RawImage::from_packed(
                PixelFormat::Rgba8888,
                base.gamut,
                ColorTransfer::Srgb,
                ColorRange::Full,
                w,
                h,
                rgb_to_rgba(&rgb),
            )?;
            &decoded
        }
    };

    let (gainmap, metadata) = compute(hdr, sdr, params)?;
    let gainmap_jpeg = encode_gainmap(&gainmap, params.gainmap_quality)?;
    let out = assemble(base.data(), &gainmap_jpeg, &metadata, base.gamut, params.exif)?;
    Ok((out, base.gamut))
}

/// Recompose a file from a compressed base + compressed gain map pair.
pub fn recompose(
    base: &CompressedImage,
    gainmap: &CompressedImage,
    metadata: &GainMapMetadata,
) -> Result<(Vec<u8>, ColorGamut)> {
    let out = assemble(base.data(), gainmap.data(), metadata, base.gamut, None)?;
    Ok((out, base.gamut))
}

fn compute(
    hdr: &RawImage,
    sdr: &RawImage,
    params: &EncodeParams<'_>,
) -> Result<(GainMap, GainMapMetadata)> {
    let config = GainMapConfig {
        scale_factor: params.scale_factor,
        multi_channel: params.multi_channel,
        ..GainMapConfig::default()
    };
    compute_gainmap(hdr, sdr, &config, Never)
}

fn encode_base(sdr: &RawImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = match sdr.fmt {
        PixelFormat::Yuv420 => yuv420_to_rgb8(sdr),
        PixelFormat::Rgba8888 => {
            let mut rgb = Vec::with_capacity(sdr.width as usize * sdr.height as usize * 3);
            for y in 0..sdr.height {
                for chunk in sdr.row(0, y).chunks_exact(4) {
                    rgb.extend_from_slice(&chunk[..3]);
                }
            }
            rgb
        }
        fmt => {
            return Err(Error::UnknownError(format!(
                "base image layout {fmt:?} cannot be handed to the jpeg codec"
            )))
        }
    };
    codec::encode_rgb8(&rgb, sdr.width, sdr.height, quality)
}

fn encode_gainmap(gainmap: &GainMap, quality: u8) -> Result<Vec<u8>> {
    if gainmap.channels == 1 {
        codec::encode_gray8(&gainmap.data, gainmap.width, gainmap.height, quality)
    } else {
        codec::encode_rgb8(&gainmap.data, gainmap.width, gainmap.height, quality)
    }
}

fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        rgba.extend_from_slice(px);
        rgba.push(255);
    }
    rgba
}

/// Glue base and gain map streams into one UltraHDR JPEG: gain map XMP into
/// the gain map image; EXIF, container XMP, ICC and the MPF index into the
/// base image; gain map appended after the base EOI.
fn assemble(
    base_jpeg: &[u8],
    gainmap_jpeg: &[u8],
    metadata: &GainMapMetadata,
    gamut: ColorGamut,
    exif: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let gm_xmp = xmp::generate_gainmap_xmp(metadata);
    let gainmap_full =
        markers::insert_segments_after_soi(gainmap_jpeg, &[markers::build_xmp_segment(&gm_xmp)])?;

    let mut segments = Vec::new();
    if let Some(exif) = exif {
        if markers::find_exif_payload(base_jpeg).is_some() {
            return Err(Error::InvalidOperation(
                "received exif from set_exif_data() while the base image intent already \
                 contains exif, unsure which one to use"
                    .into(),
            ));
        }
        segments.push(markers::build_exif_segment(exif));
    }
    segments.push(markers::build_xmp_segment(&xmp::generate_base_xmp(
        gainmap_full.len(),
    )));
    segments.extend(icc::build_icc_segments(&icc::profile_for_gamut(gamut)));
    let primary = markers::insert_segments_after_soi(base_jpeg, &segments)?;

    // MPF sits directly after SOI; its own length is part of the primary's
    let mpf_len = mpf::create_mpf_segment(0, 0, 2).len();
    let primary_len = primary.len() + mpf_len;
    let mpf_segment = mpf::create_mpf_segment(primary_len, gainmap_full.len(), 2);
    debug!(
        "assembling ultrahdr jpeg: primary {} bytes, gain map {} bytes",
        primary_len,
        gainmap_full.len()
    );

    let mut out = Vec::with_capacity(primary_len + gainmap_full.len());
    out.extend_from_slice(&primary[..2]);
    out.extend_from_slice(&mpf_segment);
    out.extend_from_slice(&primary[2..]);
    out.extend_from_slice(&gainmap_full);
    Ok(out)
}

/// Everything `probe()` learns about an UltraHDR file.
#[derive(Debug, Clone, Default)]
pub struct ProbeInfo {
    /// Base image width.
    pub image_width: u32,
    /// Base image height.
    pub image_height: u32,
    /// Gain map image width.
    pub gainmap_width: u32,
    /// Gain map image height.
    pub gainmap_height: u32,
    /// Base image EXIF payload (empty when absent).
    pub exif: Vec<u8>,
    /// Base image ICC profile (empty when absent).
    pub icc: Vec<u8>,
    /// Base image XMP packet (empty when absent).
    pub base_xmp: Vec<u8>,
    /// Gain map image XMP packet.
    pub gainmap_xmp: Vec<u8>,
    /// Metadata recovered from the gain map XMP.
    pub metadata: GainMapMetadata,
    /// `(offset, length)` of the primary stream.
    pub primary_range: (usize, usize),
    /// `(offset, length)` of the gain map stream.
    pub gainmap_range: (usize, usize),
}

/// Parse the MPF structure of an UltraHDR JPEG and extract sizes, metadata
/// and passthrough blocks.
pub fn probe_parts(data: &[u8]) -> Result<ProbeInfo> {
    let segments = markers::scan_segments(data)?;
    let mpf_segment = segments.iter().find(|s| s.is_mpf()).ok_or_else(|| {
        Error::UnknownError("input uhdr image does not contain gainmap image".into())
    })?;

    let images = mpf::parse_mpf_segment(&mpf_segment.data, mpf_segment.offset)?;
    if images.len() < 2 {
        return Err(Error::UnknownError(
            "input uhdr image does not contain gainmap image".into(),
        ));
    }
    for &(offset, length) in &images[..2] {
        if offset + length > data.len() {
            return Err(Error::UnknownError(format!(
                "mpf image entry [{offset}, {}) lies outside the {} byte stream",
                offset + length,
                data.len()
            )));
        }
    }

    let (primary_offset, primary_len) = images[0];
    let (gainmap_offset, gainmap_len) = images[1];
    let primary = &data[primary_offset..primary_offset + primary_len];
    let gainmap = &data[gainmap_offset..gainmap_offset + gainmap_len];

    let (image_width, image_height) = markers::sof_dimensions(primary)?;
    let (gainmap_width, gainmap_height) = markers::sof_dimensions(gainmap)?;

    let gainmap_xmp = markers::find_xmp_payload(gainmap)
        .ok_or_else(|| Error::UnknownError("encountered error while parsing metadata".into()))?;
    let metadata = xmp::parse_gainmap_xmp(&gainmap_xmp)
        .map_err(|_| Error::UnknownError("encountered error while parsing metadata".into()))?;

    debug!(
        "probe: image {image_width}x{image_height}, gain map {gainmap_width}x{gainmap_height}"
    );

    Ok(ProbeInfo {
        image_width,
        image_height,
        gainmap_width,
        gainmap_height,
        exif: markers::find_exif_payload(primary).unwrap_or_default(),
        icc: icc::extract_icc(primary).unwrap_or_default(),
        base_xmp: markers::find_xmp_payload(primary)
            .map(String::into_bytes)
            .unwrap_or_default(),
        gainmap_xmp: gainmap_xmp.into_bytes(),
        metadata,
        primary_range: (primary_offset, primary_len),
        gainmap_range: (gainmap_offset, gainmap_len),
    })
}

/// Decode the base and gain map streams and produce the requested output
/// surface plus the decoded gain map.
pub fn decode_streams(
    data: &[u8],
    probe: &ProbeInfo,
    out_fmt: PixelFormat,
    out_transfer: ColorTransfer,
    max_display_boost: f32,
) -> Result<(RawImage, RawImage, ColorGamut)> {
    let (po, pl) = probe.primary_range;
    let (go, gl) = probe.gainmap_range;

    let (rgb, w, h) = codec::decode_rgb8(&data[po..po + pl])?;
    let gamut = icc::detect_gamut(&probe.icc).unwrap_or(ColorGamut::Bt709);
    let base = RawImage::from_packed(
        PixelFormat::Rgba8888,
        gamut,
        ColorTransfer::Srgb,
        ColorRange::Full,
        w,
        h,
        rgb_to_rgba(&rgb),
    )?;

    let (gray, gw, gh) = codec::decode_gray8(&data[go..go + gl])?;
    let gainmap = RawImage::from_packed(
        PixelFormat::Gray8,
        gamut,
        ColorTransfer::Srgb,
        ColorRange::Full,
        gw,
        gh,
        gray,
    )?;

    let output = if out_fmt == PixelFormat::Rgba8888 && out_transfer == ColorTransfer::Srgb {
        base
    } else {
        apply_gainmap(
            &base,
            &gainmap,
            &probe.metadata,
            max_display_boost,
            out_fmt,
            out_transfer,
            Never,
        )?
    };

    Ok((output, gainmap, gamut))
}
