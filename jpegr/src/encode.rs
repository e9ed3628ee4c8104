//! Encoder session.
//!
//! A session moves through two phases: **configurable**, where intents,
//! quality factors and effects accumulate, and **sealed**, entered by the
//! first `encode()` call. Once sealed the terminal status latches and every
//! further configuration call fails; `reset()` restores the defaults.

use std::collections::HashMap;

use log::debug;

use jpegr_core::color::convert::convert_raw_to_ycbcr;
use jpegr_core::{
    ColorGamut, ColorRange, ColorTransfer, CompressedImage, Effect, Error, GainMapMetadata,
    ImageIntent, MirrorDirection, RawImage, Result,
};

use crate::pipeline::{self, EncodeParams};
use crate::{effects, validate};

/// Default quality factor for every intent except the gain map.
pub const DEFAULT_QUALITY: u8 = 95;

/// Default quality factor for the gain map intent.
pub const DEFAULT_GAINMAP_QUALITY: u8 = 85;

/// Default gain map downscale factor.
pub const DEFAULT_GAINMAP_SCALE_FACTOR: u32 = 4;

/// Smallest output buffer the encoder provisions.
const MIN_OUTPUT_CAPACITY: usize = 8 * 1024;

const SEALED: &str = "an earlier call to encode() has switched the context from configurable \
                      state to end state. The context is no longer configurable. To reuse, \
                      call reset()";

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// UltraHDR JPEG.
    #[default]
    Jpeg,
    /// HEIF container (not implemented by this build).
    Heif,
    /// AVIF container (not implemented by this build).
    Avif,
}

/// UltraHDR encoder session.
pub struct Encoder {
    effects: Vec<Effect>,
    raw_images: HashMap<ImageIntent, RawImage>,
    compressed_images: HashMap<ImageIntent, CompressedImage>,
    quality: HashMap<ImageIntent, u8>,
    metadata: GainMapMetadata,
    exif: Vec<u8>,
    output_format: OutputFormat,
    gainmap_scale_factor: u32,
    use_multi_channel_gainmap: bool,
    sealed: bool,
    encode_status: Result<()>,
    output: Option<CompressedImage>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// A fresh session with default configuration.
    pub fn new() -> Self {
        let mut encoder = Self {
            effects: Vec::new(),
            raw_images: HashMap::new(),
            compressed_images: HashMap::new(),
            quality: HashMap::new(),
            metadata: GainMapMetadata::default(),
            exif: Vec::new(),
            output_format: OutputFormat::Jpeg,
            gainmap_scale_factor: DEFAULT_GAINMAP_SCALE_FACTOR,
            use_multi_channel_gainmap: false,
            sealed: false,
            encode_status: Ok(()),
            output: None,
        };
        encoder.reset();
        encoder
    }

    fn ensure_configurable(&self) -> Result<()> {
        if self.sealed {
            return Err(Error::InvalidOperation(SEALED.into()));
        }
        Ok(())
    }

    fn quality(&self, intent: ImageIntent) -> u8 {
        self.quality.get(&intent).copied().unwrap_or(match intent {
            ImageIntent::GainMap => DEFAULT_GAINMAP_QUALITY,
            _ => DEFAULT_QUALITY,
        })
    }

    /// Attach a raw image for the `Hdr` or `Sdr` intent.
    ///
    /// The input is validated, normalized through the YCbCr converter and
    /// copied into session-owned storage; the caller keeps its buffer.
    pub fn set_raw_image(&mut self, img: &RawImage, intent: ImageIntent) -> Result<()> {
        validate::validate_raw_image(img, intent)?;

        if intent == ImageIntent::Hdr {
            if let Some(sdr) = self.raw_images.get(&ImageIntent::Sdr) {
                if img.width != sdr.width || img.height != sdr.height {
                    return Err(Error::InvalidParam(format!(
                        "image resolutions mismatch: hdr intent: {}x{}, sdr intent: {}x{}",
                        img.width, img.height, sdr.width, sdr.height
                    )));
                }
            }
        }
        if intent == ImageIntent::Sdr {
            if let Some(hdr) = self.raw_images.get(&ImageIntent::Hdr) {
                if img.width != hdr.width || img.height != hdr.height {
                    return Err(Error::InvalidParam(format!(
                        "image resolutions mismatch: sdr intent: {}x{}, hdr intent: {}x{}",
                        img.width, img.height, hdr.width, hdr.height
                    )));
                }
            }
        }
        self.ensure_configurable()?;

        let entry = convert_raw_to_ycbcr(img).map_err(|_| {
            Error::UnknownError("encountered unknown error during color space conversion".into())
        })?;
        self.raw_images.insert(intent, entry);
        Ok(())
    }

    /// Attach a compressed image for the `Hdr`, `Sdr` or `Base` intent.
    /// The bytes are copied into session-owned storage.
    pub fn set_compressed_image(
        &mut self,
        img: &CompressedImage,
        intent: ImageIntent,
    ) -> Result<()> {
        validate::validate_compressed_intent(intent)?;
        validate::validate_compressed_image(img)?;
        self.ensure_configurable()?;
        self.compressed_images.insert(intent, img.clone());
        Ok(())
    }

    /// Attach a compressed gain map together with its metadata.
    pub fn set_gainmap_image(
        &mut self,
        img: &CompressedImage,
        metadata: &GainMapMetadata,
    ) -> Result<()> {
        metadata.validate()?;
        validate::validate_compressed_image(img)?;
        self.ensure_configurable()?;
        self.compressed_images
            .insert(ImageIntent::GainMap, img.clone());
        self.metadata = *metadata;
        Ok(())
    }

    /// Set the JPEG quality factor for an intent.
    pub fn set_quality(&mut self, quality: i32, intent: ImageIntent) -> Result<()> {
        validate::validate_quality(quality)?;
        self.ensure_configurable()?;
        self.quality.insert(intent, quality as u8);
        Ok(())
    }

    /// Attach an EXIF block to stamp into the base image.
    pub fn set_exif_data(&mut self, exif: &[u8]) -> Result<()> {
        if exif.is_empty() {
            return Err(Error::InvalidParam("received empty exif block".into()));
        }
        self.ensure_configurable()?;
        self.exif = exif.to_vec();
        Ok(())
    }

    /// Select the output container format. Only JPEG is implemented.
    pub fn set_output_format(&mut self, format: OutputFormat) -> Result<()> {
        if format != OutputFormat::Jpeg {
            return Err(Error::UnsupportedFeature(format!(
                "invalid output format {format:?}, expects {{Jpeg}}"
            )));
        }
        self.ensure_configurable()?;
        self.output_format = format;
        Ok(())
    }

    /// Set the gain map downscale factor.
    pub fn set_gainmap_scale_factor(&mut self, factor: i32) -> Result<()> {
        validate::validate_scale_factor(factor)?;
        self.ensure_configurable()?;
        self.gainmap_scale_factor = factor as u32;
        Ok(())
    }

    /// Encode per-channel gain maps instead of a single luma channel.
    pub fn set_using_multi_channel_gainmap(&mut self, enabled: bool) -> Result<()> {
        self.ensure_configurable()?;
        self.use_multi_channel_gainmap = enabled;
        Ok(())
    }

    /// Queue a clockwise rotation.
    pub fn add_effect_rotate(&mut self, degrees: i32) -> Result<()> {
        validate::validate_rotation(degrees)?;
        self.ensure_configurable()?;
        self.effects.push(Effect::Rotate { degrees });
        Ok(())
    }

    /// Queue a mirror.
    pub fn add_effect_mirror(&mut self, direction: MirrorDirection) -> Result<()> {
        self.ensure_configurable()?;
        self.effects.push(Effect::Mirror { direction });
        Ok(())
    }

    /// Queue a crop. The rectangle is validated when `encode()` runs.
    pub fn add_effect_crop(&mut self, left: i32, right: i32, top: i32, bottom: i32) -> Result<()> {
        self.ensure_configurable()?;
        self.effects.push(Effect::Crop {
            left,
            right,
            top,
            bottom,
        });
        Ok(())
    }

    /// Queue a resize. The destination is validated when `encode()` runs.
    pub fn add_effect_resize(&mut self, width: i32, height: i32) -> Result<()> {
        self.ensure_configurable()?;
        self.effects.push(Effect::Resize { width, height });
        Ok(())
    }

    /// Seal the session and produce the UltraHDR stream.
    ///
    /// Idempotent: after the first call the stored terminal status is
    /// returned, success or failure.
    pub fn encode(&mut self) -> Result<()> {
        if self.sealed {
            return self.encode_status.clone();
        }
        self.sealed = true;
        let status = self.run_encode();
        self.encode_status = status.clone();
        status
    }

    fn run_encode(&mut self) -> Result<()> {
        let has_base = self.compressed_images.contains_key(&ImageIntent::Base);
        let has_gainmap = self.compressed_images.contains_key(&ImageIntent::GainMap);
        let has_raw_hdr = self.raw_images.contains_key(&ImageIntent::Hdr);
        let has_raw_sdr = self.raw_images.contains_key(&ImageIntent::Sdr);
        let has_compressed_sdr = self.compressed_images.contains_key(&ImageIntent::Sdr);

        if has_base && has_gainmap {
            // recompose from pre-encoded parts
            if !self.effects.is_empty() {
                return Err(Error::InvalidOperation(
                    "image effects are not enabled for inputs with compressed intent".into(),
                ));
            }
            debug!("encode path: recompose compressed base + gain map");
            let (base, gainmap) = match (
                self.compressed_images.get(&ImageIntent::Base),
                self.compressed_images.get(&ImageIntent::GainMap),
            ) {
                (Some(base), Some(gainmap)) => (base, gainmap),
                _ => return Err(Error::UnknownError("compressed intents vanished".into())),
            };
            let capacity = (2 * (base.len() + gainmap.len())).max(MIN_OUTPUT_CAPACITY);
            let (bytes, gamut) = pipeline::recompose(base, gainmap, &self.metadata)?;
            return self.install_output(bytes, gamut, capacity);
        }

        if has_raw_hdr {
            let compressed_base_path = has_compressed_sdr && !has_raw_sdr;
            if compressed_base_path {
                if !self.effects.is_empty() {
                    return Err(Error::InvalidOperation(
                        "image effects are not enabled for inputs with compressed intent".into(),
                    ));
                }
            } else if !self.effects.is_empty() {
                effects::apply_encoder_effects(&mut self.raw_images, &self.effects)?;
            }

            let hdr = self
                .raw_images
                .get(&ImageIntent::Hdr)
                .ok_or_else(|| Error::UnknownError("hdr intent vanished".into()))?;
            let capacity =
                (hdr.width as usize * hdr.height as usize * 6).max(MIN_OUTPUT_CAPACITY);
            let params = EncodeParams {
                base_quality: self.quality(ImageIntent::Base),
                gainmap_quality: self.quality(ImageIntent::GainMap),
                scale_factor: self.gainmap_scale_factor,
                multi_channel: self.use_multi_channel_gainmap,
                exif: (!self.exif.is_empty()).then_some(self.exif.as_slice()),
            };

            let (bytes, gamut) = if has_compressed_sdr {
                debug!("encode path: raw hdr with compressed base");
                let base = self
                    .compressed_images
                    .get(&ImageIntent::Sdr)
                    .ok_or_else(|| Error::UnknownError("sdr intent vanished".into()))?;
                pipeline::encode_with_compressed_base(
                    hdr,
                    self.raw_images.get(&ImageIntent::Sdr),
                    base,
                    &params,
                )?
            } else {
                debug!(
                    "encode path: raw hdr{}",
                    if has_raw_sdr { " + raw sdr" } else { " only" }
                );
                pipeline::encode_from_raw(hdr, self.raw_images.get(&ImageIntent::Sdr), &params)?
            };
            return self.install_output(bytes, gamut, capacity);
        }

        Err(Error::InvalidOperation(
            "resources required for encode() operation are not present".into(),
        ))
    }

    fn install_output(&mut self, bytes: Vec<u8>, gamut: ColorGamut, capacity: usize) -> Result<()> {
        let mut out = CompressedImage::with_capacity(
            capacity,
            gamut,
            ColorTransfer::Srgb,
            ColorRange::Full,
        );
        out.set_data(bytes)?;
        self.output = Some(out);
        Ok(())
    }

    /// Borrow the encoded stream. `None` until `encode()` has succeeded.
    pub fn encoded_stream(&self) -> Option<&CompressedImage> {
        if !self.sealed || self.encode_status.is_err() {
            return None;
        }
        self.output.as_ref()
    }

    /// Whether the session is sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Return to the configurable phase with default settings: no
    /// attachments, no effects, quality 95 (gain map 85), JPEG output,
    /// default scale factor, single-channel gain map.
    pub fn reset(&mut self) {
        self.effects.clear();
        self.raw_images.clear();
        self.compressed_images.clear();
        self.quality.clear();
        self.quality.insert(ImageIntent::Hdr, DEFAULT_QUALITY);
        self.quality.insert(ImageIntent::Sdr, DEFAULT_QUALITY);
        self.quality.insert(ImageIntent::Base, DEFAULT_QUALITY);
        self.quality
            .insert(ImageIntent::GainMap, DEFAULT_GAINMAP_QUALITY);
        self.metadata = GainMapMetadata::default();
        self.exif.clear();
        self.output_format = OutputFormat::Jpeg;
        self.gainmap_scale_factor = DEFAULT_GAINMAP_SCALE_FACTOR;
        self.use_multi_channel_gainmap = false;
        self.sealed = false;
        self.encode_status = Ok(());
        self.output = None;
    }
}
