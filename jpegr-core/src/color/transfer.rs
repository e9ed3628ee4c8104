//! Opto-electronic transfer functions.
//!
//! Reference standards:
//! - sRGB: IEC 61966-2-1
//! - PQ: SMPTE ST 2084, ITU-R BT.2100
//! - HLG: ITU-R BT.2100, ARIB STD-B67

#![allow(clippy::excessive_precision)]

use crate::types::ColorTransfer;

/// sRGB OETF: linear `[0,1]` → encoded `[0,1]`.
#[inline]
pub fn srgb_oetf(linear: f32) -> f32 {
    if linear <= 0.0031308 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

/// sRGB EOTF: encoded `[0,1]` → linear `[0,1]`.
#[inline]
pub fn srgb_eotf(encoded: f32) -> f32 {
    if encoded <= 0.04045 {
        encoded / 12.92
    } else {
        ((encoded + 0.055) / 1.055).powf(2.4)
    }
}

const PQ_M1: f32 = 2610.0 / 16384.0;
const PQ_M2: f32 = 2523.0 / 4096.0 * 128.0;
const PQ_C1: f32 = 3424.0 / 4096.0;
const PQ_C2: f32 = 2413.0 / 4096.0 * 32.0;
const PQ_C3: f32 = 2392.0 / 4096.0 * 32.0;

/// PQ OETF: linear `[0,1]` (1.0 = 10000 nits) → encoded `[0,1]`.
#[inline]
pub fn pq_oetf(linear: f32) -> f32 {
    if linear <= 0.0 {
        return 0.0;
    }
    let y_m1 = linear.powf(PQ_M1);
    ((PQ_C1 + PQ_C2 * y_m1) / (1.0 + PQ_C3 * y_m1)).powf(PQ_M2)
}

/// PQ EOTF: encoded `[0,1]` → linear `[0,1]` (1.0 = 10000 nits).
#[inline]
pub fn pq_eotf(encoded: f32) -> f32 {
    if encoded <= 0.0 {
        return 0.0;
    }
    let e_inv_m2 = encoded.powf(1.0 / PQ_M2);
    let numerator = (e_inv_m2 - PQ_C1).max(0.0);
    let denominator = PQ_C2 - PQ_C3 * e_inv_m2;
    if denominator <= 0.0 {
        return 0.0;
    }
    (numerator / denominator).powf(1.0 / PQ_M1)
}

const HLG_A: f32 = 0.17883277;
const HLG_B: f32 = 0.28466892; // 1 - 4*a
const HLG_C: f32 = 0.55991073; // 0.5 - a*ln(4*a)

/// HLG OETF: scene linear `[0,1]` → encoded `[0,1]`.
#[inline]
pub fn hlg_oetf(linear: f32) -> f32 {
    if linear <= 0.0 {
        return 0.0;
    }
    if linear <= 1.0 / 12.0 {
        (3.0 * linear).sqrt()
    } else {
        HLG_A * (12.0 * linear - HLG_B).ln() + HLG_C
    }
}

/// HLG inverse OETF: encoded `[0,1]` → scene linear `[0,1]`.
#[inline]
pub fn hlg_oetf_inv(encoded: f32) -> f32 {
    if encoded <= 0.0 {
        return 0.0;
    }
    if encoded <= 0.5 {
        encoded * encoded / 3.0
    } else {
        ((encoded - HLG_C) / HLG_A).exp() / 12.0 + HLG_B / 12.0
    }
}

/// Nominal HLG system gamma for a 1000 nit reference display.
pub const HLG_SYSTEM_GAMMA: f32 = 1.2;

/// Reference luminances in nits.
pub mod luminance {
    /// SDR diffuse white.
    pub const SDR_WHITE_NITS: f32 = 203.0;
    /// HLG reference display peak.
    pub const HLG_PEAK_NITS: f32 = 1000.0;
    /// PQ peak.
    pub const PQ_PEAK_NITS: f32 = 10000.0;
}

/// Apply the OETF for `transfer` (linear → encoded).
#[inline]
pub fn apply_oetf(linear: f32, transfer: ColorTransfer) -> f32 {
    match transfer {
        ColorTransfer::Srgb => srgb_oetf(linear),
        ColorTransfer::Linear => linear,
        ColorTransfer::Pq => pq_oetf(linear),
        ColorTransfer::Hlg => hlg_oetf(linear),
    }
}

/// Apply the EOTF for `transfer` (encoded → linear).
#[inline]
pub fn apply_eotf(encoded: f32, transfer: ColorTransfer) -> f32 {
    match transfer {
        ColorTransfer::Srgb => srgb_eotf(encoded),
        ColorTransfer::Linear => encoded,
        ColorTransfer::Pq => pq_eotf(encoded),
        ColorTransfer::Hlg => hlg_oetf_inv(encoded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn srgb_roundtrip() {
        for v in [0.0, 0.01, 0.18, 0.5, 1.0] {
            assert!(close(srgb_eotf(srgb_oetf(v)), v, 1e-5));
        }
    }

    #[test]
    fn srgb_anchor_points() {
        assert!(close(srgb_oetf(0.0), 0.0, 1e-6));
        assert!(close(srgb_oetf(1.0), 1.0, 1e-5));
        // ~18% gray encodes near 0.46
        assert!(close(srgb_oetf(0.18), 0.4613, 2e-3));
    }

    #[test]
    fn pq_roundtrip_and_anchors() {
        for v in [0.0, 1e-4, 0.01, 0.1, 0.5, 1.0] {
            assert!(close(pq_eotf(pq_oetf(v)), v, 1e-4), "v={v}");
        }
        // 100 nits (0.01 of peak) encodes near 0.508
        assert!(close(pq_oetf(0.01), 0.508, 5e-3));
    }

    #[test]
    fn hlg_roundtrip_and_anchors() {
        for v in [0.0, 0.02, 1.0 / 12.0, 0.25, 0.75, 1.0] {
            assert!(close(hlg_oetf_inv(hlg_oetf(v)), v, 1e-4), "v={v}");
        }
        // HLG encodes scene 1/12 exactly at 0.5
        assert!(close(hlg_oetf(1.0 / 12.0), 0.5, 1e-5));
        assert!(close(hlg_oetf(1.0), 1.0, 1e-3));
    }
}
