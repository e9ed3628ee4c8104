//! Decoder session.
//!
//! Three phases: **fresh** (configurable), **probed** (headers and metadata
//! parsed, dimensions queryable) and **sealed** (decoded). `probe()` and
//! `decode()` are idempotent; their terminal statuses latch and replay.

use log::debug;

use jpegr_core::{
    ColorTransfer, CompressedImage, Effect, Error, GainMapMetadata, MirrorDirection, PixelFormat,
    RawImage, Result,
};

use crate::pipeline::{self, ProbeInfo};
use crate::{effects, validate};

const SEALED: &str = "an earlier call to probe() or decode() has switched the context from \
                      configurable state to end state. The context is no longer configurable. \
                      To reuse, call reset()";

/// UltraHDR decoder session.
pub struct Decoder {
    compressed: Option<CompressedImage>,
    effects: Vec<Effect>,
    output_format: PixelFormat,
    output_transfer: ColorTransfer,
    max_display_boost: f32,
    probed: bool,
    sealed: bool,
    probe_status: Result<()>,
    decode_status: Result<()>,
    info: ProbeInfo,
    decoded: Option<RawImage>,
    gainmap: Option<RawImage>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// A fresh session with default configuration: linear half-float output
    /// at unbounded display boost.
    pub fn new() -> Self {
        let mut decoder = Self {
            compressed: None,
            effects: Vec::new(),
            output_format: PixelFormat::RgbaF16,
            output_transfer: ColorTransfer::Linear,
            max_display_boost: f32::MAX,
            probed: false,
            sealed: false,
            probe_status: Ok(()),
            decode_status: Ok(()),
            info: ProbeInfo::default(),
            decoded: None,
            gainmap: None,
        };
        decoder.reset();
        decoder
    }

    fn ensure_configurable(&self) -> Result<()> {
        if self.probed {
            return Err(Error::InvalidOperation(SEALED.into()));
        }
        Ok(())
    }

    /// Attach the UltraHDR stream to decode. Bytes are copied into
    /// session-owned storage.
    pub fn set_image(&mut self, img: &CompressedImage) -> Result<()> {
        validate::validate_compressed_image(img)?;
        self.ensure_configurable()?;
        self.compressed = Some(img.clone());
        Ok(())
    }

    /// Select the output pixel format.
    pub fn set_out_image_format(&mut self, fmt: PixelFormat) -> Result<()> {
        if !matches!(
            fmt,
            PixelFormat::Rgba8888 | PixelFormat::Rgba1010102 | PixelFormat::RgbaF16
        ) {
            return Err(Error::InvalidParam(format!(
                "invalid output format {fmt:?}, expects one of {{Rgba8888, Rgba1010102, RgbaF16}}"
            )));
        }
        self.ensure_configurable()?;
        self.output_format = fmt;
        Ok(())
    }

    /// Select the output transfer function.
    pub fn set_out_color_transfer(&mut self, transfer: ColorTransfer) -> Result<()> {
        self.ensure_configurable()?;
        self.output_transfer = transfer;
        Ok(())
    }

    /// Bound the display boost the gain map is applied for (`>= 1`).
    pub fn set_out_max_display_boost(&mut self, boost: f32) -> Result<()> {
        validate::validate_display_boost(boost)?;
        self.ensure_configurable()?;
        self.max_display_boost = boost;
        Ok(())
    }

    /// Queue a clockwise rotation applied to the decoded pair.
    pub fn add_effect_rotate(&mut self, degrees: i32) -> Result<()> {
        validate::validate_rotation(degrees)?;
        self.ensure_sealed_free()?;
        self.effects.push(Effect::Rotate { degrees });
        Ok(())
    }

    /// Queue a mirror applied to the decoded pair.
    pub fn add_effect_mirror(&mut self, direction: MirrorDirection) -> Result<()> {
        self.ensure_sealed_free()?;
        self.effects.push(Effect::Mirror { direction });
        Ok(())
    }

    /// Queue a crop applied to the decoded pair.
    pub fn add_effect_crop(&mut self, left: i32, right: i32, top: i32, bottom: i32) -> Result<()> {
        self.ensure_sealed_free()?;
        self.effects.push(Effect::Crop {
            left,
            right,
            top,
            bottom,
        });
        Ok(())
    }

    /// Queue a resize applied to the decoded pair.
    pub fn add_effect_resize(&mut self, width: i32, height: i32) -> Result<()> {
        self.ensure_sealed_free()?;
        self.effects.push(Effect::Resize { width, height });
        Ok(())
    }

    // Effects are consumed by decode(), so they may still be queued while
    // the session is merely probed.
    fn ensure_sealed_free(&self) -> Result<()> {
        if self.sealed {
            return Err(Error::InvalidOperation(SEALED.into()));
        }
        Ok(())
    }

    /// Parse the MPF structure, extract dimensions, metadata and the
    /// EXIF/ICC/XMP blocks. Idempotent; the first status latches.
    pub fn probe(&mut self) -> Result<()> {
        if self.probed {
            return self.probe_status.clone();
        }
        self.probed = true;
        let status = self.run_probe();
        self.probe_status = status.clone();
        status
    }

    fn run_probe(&mut self) -> Result<()> {
        let img = self.compressed.as_ref().ok_or_else(|| {
            Error::InvalidOperation("did not receive any image for decoding".into())
        })?;
        self.info = pipeline::probe_parts(img.data())?;
        Ok(())
    }

    fn probed_ok(&self) -> bool {
        self.probed && self.probe_status.is_ok()
    }

    /// Base image width, or -1 before a successful probe.
    pub fn image_width(&self) -> i32 {
        if self.probed_ok() {
            self.info.image_width as i32
        } else {
            -1
        }
    }

    /// Base image height, or -1 before a successful probe.
    pub fn image_height(&self) -> i32 {
        if self.probed_ok() {
            self.info.image_height as i32
        } else {
            -1
        }
    }

    /// Gain map width, or -1 before a successful probe.
    pub fn gainmap_width(&self) -> i32 {
        if self.probed_ok() {
            self.info.gainmap_width as i32
        } else {
            -1
        }
    }

    /// Gain map height, or -1 before a successful probe.
    pub fn gainmap_height(&self) -> i32 {
        if self.probed_ok() {
            self.info.gainmap_height as i32
        } else {
            -1
        }
    }

    /// Base image EXIF payload.
    pub fn exif(&self) -> Option<&[u8]> {
        self.probed_ok().then(|| self.info.exif.as_slice())
    }

    /// Base image ICC profile.
    pub fn icc(&self) -> Option<&[u8]> {
        self.probed_ok().then(|| self.info.icc.as_slice())
    }

    /// Base image XMP packet.
    pub fn base_xmp(&self) -> Option<&[u8]> {
        self.probed_ok().then(|| self.info.base_xmp.as_slice())
    }

    /// Gain map image XMP packet.
    pub fn gainmap_xmp(&self) -> Option<&[u8]> {
        self.probed_ok().then(|| self.info.gainmap_xmp.as_slice())
    }

    /// Metadata recovered from the gain map XMP.
    pub fn gain_map_metadata(&self) -> Option<&GainMapMetadata> {
        self.probed_ok().then_some(&self.info.metadata)
    }

    /// Decode the base image and gain map, produce the requested output
    /// surface and run the queued effects over the decoded pair.
    ///
    /// Runs `probe()` first and returns its error verbatim on failure.
    /// Idempotent once sealed.
    pub fn decode(&mut self) -> Result<()> {
        if self.sealed {
            return self.decode_status.clone();
        }
        let probe_status = self.probe();
        if probe_status.is_err() {
            self.decode_status = probe_status.clone();
            return probe_status;
        }
        self.sealed = true;
        let status = self.run_decode();
        self.decode_status = status.clone();
        status
    }

    fn run_decode(&mut self) -> Result<()> {
        let supported = matches!(
            (self.output_transfer, self.output_format),
            (ColorTransfer::Hlg, PixelFormat::Rgba1010102)
                | (ColorTransfer::Pq, PixelFormat::Rgba1010102)
                | (ColorTransfer::Linear, PixelFormat::RgbaF16)
                | (ColorTransfer::Srgb, PixelFormat::Rgba8888)
        );
        if !supported {
            return Err(Error::InvalidParam(
                "unsupported output pixel format and output color transfer pair".into(),
            ));
        }

        debug!(
            "decode: output {:?}/{:?}, boost {}",
            self.output_format, self.output_transfer, self.max_display_boost
        );
        let data = self
            .compressed
            .as_ref()
            .ok_or_else(|| Error::UnknownError("compressed input vanished".into()))?;
        let (mut image, mut gainmap, gamut) = pipeline::decode_streams(
            data.data(),
            &self.info,
            self.output_format,
            self.output_transfer,
            self.max_display_boost,
        )?;

        if !self.effects.is_empty() {
            effects::apply_decoder_effects(&mut image, &mut gainmap, &self.effects)?;
        }

        image.gamut = gamut;
        self.decoded = Some(image);
        self.gainmap = Some(gainmap);
        Ok(())
    }

    /// Borrow the decoded surface. `None` until `decode()` has succeeded.
    pub fn decoded_image(&self) -> Option<&RawImage> {
        if !self.sealed || self.decode_status.is_err() {
            return None;
        }
        self.decoded.as_ref()
    }

    /// Borrow the decoded gain map. `None` until `decode()` has succeeded.
    pub fn gain_map_image(&self) -> Option<&RawImage> {
        if !self.sealed || self.decode_status.is_err() {
            return None;
        }
        self.gainmap.as_ref()
    }

    /// Whether the session has been probed.
    pub fn is_probed(&self) -> bool {
        self.probed
    }

    /// Whether the session is sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Return to the fresh phase: clear the input, decoded surfaces, probe
    /// extracts and effects, and restore default output preferences.
    pub fn reset(&mut self) {
        self.compressed = None;
        self.effects.clear();
        self.output_format = PixelFormat::RgbaF16;
        self.output_transfer = ColorTransfer::Linear;
        self.max_display_boost = f32::MAX;
        self.probed = false;
        self.sealed = false;
        self.probe_status = Ok(());
        self.decode_status = Ok(());
        self.info = ProbeInfo::default();
        self.decoded = None;
        self.gainmap = None;
    }
}
