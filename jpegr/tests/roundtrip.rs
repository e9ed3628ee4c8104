//! Encode → decode round trips.

mod common;

use common::*;
use jpegr::{ColorTransfer, Decoder, Encoder, ImageIntent, PixelFormat};

fn decode_dimensions(stream: &[u8]) -> (i32, i32) {
    let mut decoder = Decoder::new();
    decoder.set_image(&compressed(stream.to_vec())).unwrap();
    decoder.probe().unwrap();
    (decoder.image_width(), decoder.image_height())
}

/// Dimensions survive the HDR-only path.
#[test]
fn hdr_only_dimensions_roundtrip() {
    let stream = encode_sample(16, 16, false);
    assert_eq!(decode_dimensions(&stream), (16, 16));
}

/// Dimensions survive the provided-SDR path.
#[test]
fn raw_pair_dimensions_roundtrip() {
    let stream = encode_sample(16, 16, true);
    assert_eq!(decode_dimensions(&stream), (16, 16));
}

/// An encoder-side rotation lands in the decoded dimensions.
#[test]
fn encoder_rotation_swaps_decoded_dimensions() {
    let mut encoder = Encoder::new();
    encoder
        .set_raw_image(&create_p010_solid(32, 16), ImageIntent::Hdr)
        .unwrap();
    encoder.add_effect_rotate(90).unwrap();
    encoder.encode().unwrap();
    let stream = encoder.encoded_stream().unwrap().data().to_vec();
    assert_eq!(decode_dimensions(&stream), (16, 32));
}

/// An encoder-side crop with an SDR intent present exercises the
/// contiguity repair and shrinks the decoded output.
#[test]
fn encoder_crop_shrinks_decoded_dimensions() {
    let mut encoder = Encoder::new();
    encoder
        .set_raw_image(&create_p010_solid(32, 32), ImageIntent::Hdr)
        .unwrap();
    encoder
        .set_raw_image(
            &create_yuv420_solid(32, 32, 180, jpegr::ColorGamut::Bt709),
            ImageIntent::Sdr,
        )
        .unwrap();
    encoder.add_effect_crop(8, 24, 8, 24).unwrap();
    encoder.encode().unwrap();
    let stream = encoder.encoded_stream().unwrap().data().to_vec();
    assert_eq!(decode_dimensions(&stream), (16, 16));
}

/// Metadata configured on the recompose path is recovered within float
/// tolerance by the decoder.
#[test]
fn configured_metadata_roundtrips() {
    let configured = sample_metadata();
    let mut encoder = Encoder::new();
    encoder
        .set_compressed_image(&compressed(create_plain_jpeg(16, 16)), ImageIntent::Base)
        .unwrap();
    encoder
        .set_gainmap_image(&compressed(create_gainmap_jpeg(4, 4)), &configured)
        .unwrap();
    encoder.encode().unwrap();

    let mut decoder = Decoder::new();
    decoder
        .set_image(&compressed(encoder.encoded_stream().unwrap().data().to_vec()))
        .unwrap();
    decoder.probe().unwrap();
    let recovered = decoder.gain_map_metadata().unwrap();

    let close = |a: f32, b: f32| (a - b).abs() <= 1e-3 * b.abs().max(1.0);
    assert!(close(recovered.max_content_boost, configured.max_content_boost));
    assert!(close(recovered.min_content_boost, configured.min_content_boost));
    assert!(close(recovered.gamma, configured.gamma));
    assert!(close(recovered.offset_sdr, configured.offset_sdr));
    assert!(close(recovered.offset_hdr, configured.offset_hdr));
    assert!(close(recovered.hdr_capacity_min, configured.hdr_capacity_min));
    assert!(close(recovered.hdr_capacity_max, configured.hdr_capacity_max));
}

/// SDR output reproduces the base tone; HDR output boosts it.
#[test]
fn sdr_and_hdr_outputs_differ_as_expected() {
    let stream = encode_sample(16, 16, true);

    // SDR: base image pixels, 8-bit
    let mut decoder = Decoder::new();
    decoder.set_image(&compressed(stream.clone())).unwrap();
    decoder.set_out_color_transfer(ColorTransfer::Srgb).unwrap();
    decoder
        .set_out_image_format(PixelFormat::Rgba8888)
        .unwrap();
    decoder.decode().unwrap();
    let sdr = decoder.decoded_image().unwrap();
    let sdr_sample = sdr.sample(0, 8, 8)[0];
    assert!((sdr_sample as i32 - 180).abs() <= 6, "got {sdr_sample}");

    // Linear HDR: the boosted value exceeds the SDR linearization
    let mut decoder = Decoder::new();
    decoder.set_image(&compressed(stream)).unwrap();
    decoder.set_out_max_display_boost(4.0).unwrap();
    decoder.decode().unwrap();
    let hdr = decoder.decoded_image().unwrap();
    let s = hdr.sample(0, 8, 8);
    let r = half::f16::from_le_bytes([s[0], s[1]]).to_f32();
    let sdr_linear = 0.456; // srgb_eotf(180/255)
    assert!(r > sdr_linear, "hdr sample {r} should exceed {sdr_linear}");
}
