//! Multi-Picture Format (CIPA DC-007) index for the primary + gain map pair.
//!
//! The MPF APP2 segment holds a small TIFF-style IFD with three entries
//! (version, image count, MP entry array). Per DC-007, secondary image
//! offsets are measured from the MP header endian field, which sits 8 bytes
//! past the APP2 marker (`FF E2` + length + `"MPF\0"`).

use crate::types::{Error, Result};

/// APP2 payload identifier.
pub const MPF_IDENTIFIER: &[u8] = b"MPF\0";

/// MPF version value.
pub const MPF_VERSION: &[u8] = b"0100";

const TAG_VERSION: u16 = 0xB000;
const TAG_NUMBER_OF_IMAGES: u16 = 0xB001;
const TAG_MP_ENTRY: u16 = 0xB002;

const TYPE_UNDEFINED: u16 = 7;
const TYPE_LONG: u16 = 4;

/// Attribute flags: baseline MP primary image.
const ATTR_PRIMARY: u32 = 0x0003_0000;
/// Attribute flags: dependent child image (the gain map).
const ATTR_DEPENDENT: u32 = 0x0000_0000;

/// Byte distance from the APP2 marker to the MP header endian field.
const HEADER_SKEW: usize = 8;

/// Build the complete MPF APP2 segment for a two-image file.
///
/// `primary_length` is the total byte length of the primary image including
/// this segment; `marker_offset` is where the segment's `FF E2` will sit in
/// the file. The gain map is assumed to follow the primary immediately.
pub fn create_mpf_segment(
    primary_length: usize,
    gainmap_length: usize,
    marker_offset: usize,
) -> Vec<u8> {
    let gainmap_relative = primary_length.saturating_sub(marker_offset + HEADER_SKEW) as u32;

    let mut mpf = Vec::with_capacity(96);
    // big-endian TIFF header
    mpf.extend_from_slice(b"MM");
    mpf.extend_from_slice(&0x002Au16.to_be_bytes());
    // first IFD directly follows the 8-byte header
    mpf.extend_from_slice(&8u32.to_be_bytes());

    // IFD with 3 entries
    mpf.extend_from_slice(&3u16.to_be_bytes());
    write_ifd_entry(&mut mpf, TAG_VERSION, TYPE_UNDEFINED, 4, None);
    mpf.extend_from_slice(MPF_VERSION);
    write_ifd_entry(&mut mpf, TAG_NUMBER_OF_IMAGES, TYPE_LONG, 1, Some(2));
    // MP entries start after: header (8) + count (2) + 3 entries (36) + next-IFD (4)
    let mp_entry_offset = 8 + 2 + 3 * 12 + 4;
    write_ifd_entry(
        &mut mpf,
        TAG_MP_ENTRY,
        TYPE_UNDEFINED,
        2 * 16,
        Some(mp_entry_offset),
    );
    // no further IFD
    mpf.extend_from_slice(&0u32.to_be_bytes());

    write_mp_entry(&mut mpf, ATTR_PRIMARY, primary_length as u32, 0);
    write_mp_entry(&mut mpf, ATTR_DEPENDENT, gainmap_length as u32, gainmap_relative);

    let mut segment = Vec::with_capacity(4 + MPF_IDENTIFIER.len() + mpf.len());
    segment.push(0xFF);
    segment.push(0xE2);
    let length = 2 + MPF_IDENTIFIER.len() + mpf.len();
    segment.extend_from_slice(&(length as u16).to_be_bytes());
    segment.extend_from_slice(MPF_IDENTIFIER);
    segment.extend_from_slice(&mpf);
    segment
}

fn write_ifd_entry(buf: &mut Vec<u8>, tag: u16, type_id: u16, count: u32, value: Option<u32>) {
    buf.extend_from_slice(&tag.to_be_bytes());
    buf.extend_from_slice(&type_id.to_be_bytes());
    buf.extend_from_slice(&count.to_be_bytes());
    if let Some(v) = value {
        buf.extend_from_slice(&v.to_be_bytes());
    }
    // version tag stores its 4 bytes inline right after
}

fn write_mp_entry(buf: &mut Vec<u8>, attribute: u32, size: u32, offset: u32) {
    buf.extend_from_slice(&attribute.to_be_bytes());
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(&offset.to_be_bytes());
    // dependent image entry numbers, unused
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
}

/// Parse an MPF payload (bytes after the APP2 length field).
///
/// `marker_offset` is the absolute position of the segment's `FF E2` in the
/// file. Returns absolute `(offset, length)` per indexed image; the first
/// image is anchored at file offset 0.
pub fn parse_mpf_segment(payload: &[u8], marker_offset: usize) -> Result<Vec<(usize, usize)>> {
    let data = payload.strip_prefix(MPF_IDENTIFIER).unwrap_or(payload);
    if data.len() < 8 {
        return Err(Error::UnknownError("mpf payload too short".into()));
    }

    let big_endian = &data[0..2] == b"MM";
    if !big_endian && &data[0..2] != b"II" {
        return Err(Error::UnknownError(
            "bad endianness marker in mpf payload".into(),
        ));
    }

    let ifd_offset = read_u32(data, 4, big_endian)? as usize;
    let entry_count = read_u16(data, ifd_offset, big_endian)? as usize;

    let mut image_count = 0u32;
    let mut mp_entry_offset = 0usize;
    for i in 0..entry_count {
        let at = ifd_offset + 2 + i * 12;
        let tag = read_u16(data, at, big_endian)?;
        let value = read_u32(data, at + 8, big_endian)?;
        match tag {
            TAG_NUMBER_OF_IMAGES => image_count = value,
            TAG_MP_ENTRY => mp_entry_offset = value as usize,
            _ => {}
        }
    }

    if image_count == 0 || mp_entry_offset == 0 {
        return Err(Error::UnknownError(
            "mpf payload carries no image entries".into(),
        ));
    }

    let mut images = Vec::with_capacity(image_count as usize);
    for i in 0..image_count as usize {
        let at = mp_entry_offset + i * 16;
        let size = read_u32(data, at + 4, big_endian)? as usize;
        let offset = read_u32(data, at + 8, big_endian)? as usize;
        let absolute = if i == 0 {
            0
        } else {
            marker_offset + HEADER_SKEW + offset
        };
        images.push((absolute, size));
    }
    Ok(images)
}

fn read_u16(data: &[u8], at: usize, big_endian: bool) -> Result<u16> {
    let bytes: [u8; 2] = data
        .get(at..at + 2)
        .ok_or_else(|| Error::UnknownError("truncated mpf payload".into()))?
        .try_into()
        .unwrap();
    Ok(if big_endian {
        u16::from_be_bytes(bytes)
    } else {
        u16::from_le_bytes(bytes)
    })
}

fn read_u32(data: &[u8], at: usize, big_endian: bool) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(at..at + 4)
        .ok_or_else(|| Error::UnknownError("truncated mpf payload".into()))?
        .try_into()
        .unwrap();
    Ok(if big_endian {
        u32::from_be_bytes(bytes)
    } else {
        u32::from_le_bytes(bytes)
    })
}
