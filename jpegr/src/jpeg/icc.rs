//! ICC profile transport.
//!
//! The encoder stamps a small matrix/TRC display profile matching the base
//! image's gamut; the decoder extracts whatever profile the file carries and
//! exposes it as opaque bytes.

use jpegr_core::ColorGamut;

use crate::jpeg::markers::JpegSegment;

/// APP2 payload header for ICC profile chunks.
pub const ICC_HEADER: &[u8] = b"ICC_PROFILE\0";

/// Largest profile chunk that fits one APP2 segment.
const MAX_CHUNK: usize = 65533 - ICC_HEADER.len() - 2;

/// Split a profile into APP2 `ICC_PROFILE` segments.
pub fn build_icc_segments(profile: &[u8]) -> Vec<JpegSegment> {
    let chunks: Vec<&[u8]> = profile.chunks(MAX_CHUNK).collect();
    let total = chunks.len() as u8;
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut data = Vec::with_capacity(ICC_HEADER.len() + 2 + chunk.len());
            data.extend_from_slice(ICC_HEADER);
            data.push(i as u8 + 1);
            data.push(total);
            data.extend_from_slice(chunk);
            JpegSegment {
                marker: 0xE2,
                data,
                offset: 0,
            }
        })
        .collect()
}

/// Reassemble the ICC profile of a JPEG, if one is present.
pub fn extract_icc(data: &[u8]) -> Option<Vec<u8>> {
    let segments = crate::jpeg::markers::scan_segments(data).ok()?;
    let mut profile = Vec::new();
    let mut found = false;
    for seg in segments {
        if seg.marker == 0xE2 && seg.data.starts_with(ICC_HEADER) {
            found = true;
            profile.extend_from_slice(&seg.data[ICC_HEADER.len() + 2..]);
        }
    }
    found.then_some(profile)
}

/// The display gamut a profile produced by [`profile_for_gamut`] encodes.
pub fn detect_gamut(profile: &[u8]) -> Option<ColorGamut> {
    [ColorGamut::Bt709, ColorGamut::DisplayP3, ColorGamut::Bt2100]
        .into_iter()
        .find(|&g| profile_for_gamut(g) == profile)
}

/// D50-adapted primaries and white point per gamut.
fn primaries(gamut: ColorGamut) -> ([f64; 3], [f64; 3], [f64; 3]) {
    match gamut {
        ColorGamut::Bt709 => (
            [0.43607, 0.22249, 0.01392],
            [0.38515, 0.71687, 0.09708],
            [0.14307, 0.06061, 0.71410],
        ),
        ColorGamut::DisplayP3 => (
            [0.51512, 0.24120, -0.00105],
            [0.29198, 0.69225, 0.04189],
            [0.15710, 0.06657, 0.78407],
        ),
        ColorGamut::Bt2100 => (
            [0.67340, 0.27903, -0.00193],
            [0.16557, 0.67534, 0.02998],
            [0.12521, 0.04563, 0.79687],
        ),
    }
}

fn description(gamut: ColorGamut) -> &'static str {
    match gamut {
        ColorGamut::Bt709 => "sRGB",
        ColorGamut::DisplayP3 => "Display P3",
        ColorGamut::Bt2100 => "BT.2100",
    }
}

fn s15f16(v: f64) -> [u8; 4] {
    (((v * 65536.0).round()) as i32).to_be_bytes()
}

fn xyz_tag(xyz: [f64; 3]) -> Vec<u8> {
    let mut t = Vec::with_capacity(20);
    t.extend_from_slice(b"XYZ ");
    t.extend_from_slice(&[0; 4]);
    for v in xyz {
        t.extend_from_slice(&s15f16(v));
    }
    t
}

fn curv_tag() -> Vec<u8> {
    let mut t = Vec::with_capacity(14);
    t.extend_from_slice(b"curv");
    t.extend_from_slice(&[0; 4]);
    t.extend_from_slice(&1u32.to_be_bytes());
    // gamma 2.2 in u8.8 fixed point
    t.extend_from_slice(&0x0233u16.to_be_bytes());
    t
}

fn mluc_tag(text: &str) -> Vec<u8> {
    let utf16: Vec<u8> = text.encode_utf16().flat_map(|c| c.to_be_bytes()).collect();
    let mut t = Vec::with_capacity(28 + utf16.len());
    t.extend_from_slice(b"mluc");
    t.extend_from_slice(&[0; 4]);
    t.extend_from_slice(&1u32.to_be_bytes()); // record count
    t.extend_from_slice(&12u32.to_be_bytes()); // record size
    t.extend_from_slice(b"enUS");
    t.extend_from_slice(&(utf16.len() as u32).to_be_bytes());
    t.extend_from_slice(&28u32.to_be_bytes()); // string offset
    t.extend_from_slice(&utf16);
    t
}

/// Build a minimal matrix/TRC display profile for the gamut.
pub fn profile_for_gamut(gamut: ColorGamut) -> Vec<u8> {
    let (r, g, b) = primaries(gamut);
    let curv = curv_tag();
    let tags: Vec<(&[u8; 4], Vec<u8>)> = vec![
        (b"desc", mluc_tag(description(gamut))),
        (b"wtpt", xyz_tag([0.96420, 1.0, 0.82491])),
        (b"rXYZ", xyz_tag(r)),
        (b"gXYZ", xyz_tag(g)),
        (b"bXYZ", xyz_tag(b)),
        (b"rTRC", curv.clone()),
        (b"gTRC", curv.clone()),
        (b"bTRC", curv),
    ];

    let mut header = vec![0u8; 128];
    header[8..12].copy_from_slice(&0x0430_0000u32.to_be_bytes()); // version 4.3
    header[12..16].copy_from_slice(b"mntr");
    header[16..20].copy_from_slice(b"RGB ");
    header[20..24].copy_from_slice(b"XYZ ");
    header[36..40].copy_from_slice(b"acsp");
    // PCS illuminant (D50)
    header[68..72].copy_from_slice(&0x0000_F6D6u32.to_be_bytes());
    header[72..76].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    header[76..80].copy_from_slice(&0x0000_D32Du32.to_be_bytes());

    let mut table = Vec::new();
    table.extend_from_slice(&(tags.len() as u32).to_be_bytes());
    let mut body = Vec::new();
    let body_base = 128 + 4 + tags.len() * 12;
    for (sig, data) in &tags {
        let offset = body_base + body.len();
        table.extend_from_slice(*sig);
        table.extend_from_slice(&(offset as u32).to_be_bytes());
        table.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
    }

    let mut profile = header;
    profile.extend_from_slice(&table);
    profile.extend_from_slice(&body);
    let size = (profile.len() as u32).to_be_bytes();
    profile[0..4].copy_from_slice(&size);
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::markers::insert_segments_after_soi;

    #[test]
    fn profile_has_icc_shape() {
        let p = profile_for_gamut(ColorGamut::Bt709);
        assert_eq!(
            u32::from_be_bytes([p[0], p[1], p[2], p[3]]) as usize,
            p.len()
        );
        assert_eq!(&p[36..40], b"acsp");
        assert_eq!(&p[12..16], b"mntr");
    }

    #[test]
    fn profiles_differ_per_gamut_and_detect() {
        for g in [ColorGamut::Bt709, ColorGamut::DisplayP3, ColorGamut::Bt2100] {
            assert_eq!(detect_gamut(&profile_for_gamut(g)), Some(g));
        }
        assert_eq!(detect_gamut(b"not a profile"), None);
    }

    #[test]
    fn chunked_transport_roundtrip() {
        let profile = profile_for_gamut(ColorGamut::DisplayP3);
        let mut jpeg = vec![0xFF, 0xD8];
        jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9]);
        let with_icc = insert_segments_after_soi(&jpeg, &build_icc_segments(&profile)).unwrap();
        assert_eq!(extract_icc(&with_icc).unwrap(), profile);
    }
}
