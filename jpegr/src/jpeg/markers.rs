//! JPEG marker-level utilities.
//!
//! Only the metadata shell of a JPEG is touched here: segments between SOI
//! and SOS. Entropy-coded data never passes through this module.

use jpegr_core::{Error, Result};

/// APP1 payload header for XMP packets.
pub const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// APP1 payload header for EXIF blocks.
pub const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// A marker segment: the marker byte and its payload (length field excluded).
#[derive(Debug, Clone)]
pub struct JpegSegment {
    /// Second marker byte (0xE1 for APP1, 0xC0 for SOF0, ...).
    pub marker: u8,
    /// Payload bytes.
    pub data: Vec<u8>,
    /// Absolute offset of the `FF` marker byte in the scanned buffer.
    pub offset: usize,
}

impl JpegSegment {
    /// Whether this is the MPF APP2 segment.
    pub fn is_mpf(&self) -> bool {
        self.marker == 0xE2 && self.data.starts_with(b"MPF\0")
    }

    /// Whether this is an XMP APP1 segment.
    pub fn is_xmp(&self) -> bool {
        self.marker == 0xE1 && self.data.starts_with(XMP_HEADER)
    }

    /// Whether this is an EXIF APP1 segment.
    pub fn is_exif(&self) -> bool {
        self.marker == 0xE1 && self.data.starts_with(EXIF_HEADER)
    }
}

fn has_length(marker: u8) -> bool {
    // SOI, EOI, TEM and RST0..RST7 are bare markers
    !matches!(marker, 0xD8 | 0xD9 | 0x01) && !(0xD0..=0xD7).contains(&marker)
}

/// Scan the segments between SOI and SOS.
pub fn scan_segments(data: &[u8]) -> Result<Vec<JpegSegment>> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(Error::UnknownError(
            "not a valid jpeg stream, missing start of image marker".into(),
        ));
    }

    let mut segments = Vec::new();
    let mut pos = 2usize;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return Err(Error::UnknownError(format!(
                "malformed jpeg stream, expected marker at offset {pos}"
            )));
        }
        // skip fill bytes
        while pos + 1 < data.len() && data[pos + 1] == 0xFF {
            pos += 1;
        }
        if pos + 1 >= data.len() {
            break;
        }
        let marker = data[pos + 1];
        if marker == 0xDA {
            break; // start of scan, entropy data follows
        }
        if !has_length(marker) {
            pos += 2;
            continue;
        }
        if pos + 4 > data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if length < 2 || pos + 2 + length > data.len() {
            return Err(Error::UnknownError(format!(
                "invalid segment length {length} at offset {pos}"
            )));
        }
        segments.push(JpegSegment {
            marker,
            data: data[pos + 4..pos + 2 + length].to_vec(),
            offset: pos,
        });
        pos += 2 + length;
    }
    Ok(segments)
}

/// Frame dimensions `(width, height)` from the SOF header.
pub fn sof_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    for seg in scan_segments(data)? {
        let is_sof = matches!(
            seg.marker,
            0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF
        );
        if is_sof && seg.data.len() >= 5 {
            let height = u16::from_be_bytes([seg.data[1], seg.data[2]]) as u32;
            let width = u16::from_be_bytes([seg.data[3], seg.data[4]]) as u32;
            return Ok((width, height));
        }
    }
    Err(Error::UnknownError(
        "no frame header found in jpeg stream".into(),
    ))
}

/// Insert segments immediately after SOI, in the given order.
pub fn insert_segments_after_soi(jpeg: &[u8], segments: &[JpegSegment]) -> Result<Vec<u8>> {
    if jpeg.len() < 2 || jpeg[0] != 0xFF || jpeg[1] != 0xD8 {
        return Err(Error::UnknownError(
            "not a valid jpeg stream, missing start of image marker".into(),
        ));
    }
    let extra: usize = segments.iter().map(|s| 4 + s.data.len()).sum();
    let mut out = Vec::with_capacity(jpeg.len() + extra);
    out.extend_from_slice(&jpeg[..2]);
    for seg in segments {
        out.push(0xFF);
        out.push(seg.marker);
        out.extend_from_slice(&((seg.data.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&seg.data);
    }
    out.extend_from_slice(&jpeg[2..]);
    Ok(out)
}

/// Build an APP1 XMP segment.
pub fn build_xmp_segment(xmp: &str) -> JpegSegment {
    let mut data = Vec::with_capacity(XMP_HEADER.len() + xmp.len());
    data.extend_from_slice(XMP_HEADER);
    data.extend_from_slice(xmp.as_bytes());
    JpegSegment {
        marker: 0xE1,
        data,
        offset: 0,
    }
}

/// Build an APP1 EXIF segment.
pub fn build_exif_segment(exif: &[u8]) -> JpegSegment {
    let mut data = Vec::with_capacity(EXIF_HEADER.len() + exif.len());
    data.extend_from_slice(EXIF_HEADER);
    data.extend_from_slice(exif);
    JpegSegment {
        marker: 0xE1,
        data,
        offset: 0,
    }
}

/// The XMP packet of a JPEG, if one is present.
pub fn find_xmp_payload(data: &[u8]) -> Option<String> {
    let segments = scan_segments(data).ok()?;
    let seg = segments.iter().find(|s| s.is_xmp())?;
    String::from_utf8(seg.data[XMP_HEADER.len()..].to_vec()).ok()
}

/// The EXIF payload of a JPEG, if one is present.
pub fn find_exif_payload(data: &[u8]) -> Option<Vec<u8>> {
    let segments = scan_segments(data).ok()?;
    let seg = segments.iter().find(|s| s.is_exif())?;
    Some(seg.data[EXIF_HEADER.len()..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_jpeg() -> Vec<u8> {
        let mut j = vec![0xFF, 0xD8];
        // APP0 JFIF
        j.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x07]);
        j.extend_from_slice(b"JFIF\0");
        // SOF0: precision 8, 4x6
        j.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x07, 8, 0x00, 0x04, 0x00, 0x06]);
        // SOS with trailing entropy bytes and EOI
        j.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0xFF, 0xD9]);
        j
    }

    #[test]
    fn scans_until_sos() {
        let jpeg = minimal_jpeg();
        let segments = scan_segments(&jpeg).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].marker, 0xE0);
        assert_eq!(segments[1].marker, 0xC0);
    }

    #[test]
    fn sof_parse_reads_dimensions() {
        let (w, h) = sof_dimensions(&minimal_jpeg()).unwrap();
        assert_eq!((w, h), (6, 4));
    }

    #[test]
    fn rejects_non_jpeg() {
        assert!(scan_segments(b"PNG\x89 definitely not").is_err());
        assert!(sof_dimensions(&[0xFF, 0xD8, 0xFF, 0xD9]).is_err());
    }

    #[test]
    fn inserted_xmp_is_found_again() {
        let jpeg = minimal_jpeg();
        let seg = build_xmp_segment("<x:xmpmeta>hello</x:xmpmeta>");
        let with_xmp = insert_segments_after_soi(&jpeg, &[seg]).unwrap();
        assert_eq!(&with_xmp[..2], &[0xFF, 0xD8]);
        let xmp = find_xmp_payload(&with_xmp).unwrap();
        assert!(xmp.contains("hello"));
        // original segments survive
        let (w, h) = sof_dimensions(&with_xmp).unwrap();
        assert_eq!((w, h), (6, 4));
    }

    #[test]
    fn exif_roundtrip() {
        let jpeg = minimal_jpeg();
        let payload = vec![0x4D, 0x4D, 0x00, 0x2A, 1, 2, 3];
        let with_exif =
            insert_segments_after_soi(&jpeg, &[build_exif_segment(&payload)]).unwrap();
        assert_eq!(find_exif_payload(&with_exif).unwrap(), payload);
    }
}
