//! Encoder session basics: path selection, sealing, defaults.

mod common;

use common::*;
use jpegr::{is_uhdr_image, Encoder, ErrorCode, ImageIntent, OutputFormat};

/// HDR-only input synthesizes the SDR rendition and produces a valid
/// UltraHDR JPEG.
#[test]
fn encode_hdr_only() {
    let mut encoder = Encoder::new();
    encoder
        .set_raw_image(&create_p010_solid(16, 16), ImageIntent::Hdr)
        .unwrap();
    encoder.encode().unwrap();

    let stream = encoder.encoded_stream().unwrap();
    assert_eq!(&stream.data()[..2], &[0xFF, 0xD8], "missing JPEG SOI");
    assert!(
        contains_bytes(stream.data(), b"MPF\0"),
        "missing MPF marker"
    );
    assert!(contains_bytes(stream.data(), b"hdrgm:Version"));
    assert!(is_uhdr_image(stream.data()));
}

/// HDR + SDR raw pair encodes through the provided-SDR path.
#[test]
fn encode_raw_pair() {
    let stream = encode_sample(16, 16, true);
    assert!(is_uhdr_image(&stream));
}

/// Raw HDR plus a pre-compressed SDR stream uses the stream as the base.
#[test]
fn encode_with_compressed_base() {
    let mut encoder = Encoder::new();
    encoder
        .set_raw_image(&create_p010_solid(16, 16), ImageIntent::Hdr)
        .unwrap();
    encoder
        .set_compressed_image(&compressed(create_plain_jpeg(16, 16)), ImageIntent::Sdr)
        .unwrap();
    encoder.encode().unwrap();
    assert!(is_uhdr_image(encoder.encoded_stream().unwrap().data()));
}

/// Raw HDR + raw SDR + compressed SDR: the raw pair drives the gain map,
/// the compressed stream becomes the base.
#[test]
fn encode_raw_pair_with_compressed_base() {
    let mut encoder = Encoder::new();
    encoder
        .set_raw_image(&create_p010_solid(16, 16), ImageIntent::Hdr)
        .unwrap();
    encoder
        .set_raw_image(
            &create_yuv420_solid(16, 16, 170, jpegr::ColorGamut::Bt709),
            ImageIntent::Sdr,
        )
        .unwrap();
    encoder
        .set_compressed_image(&compressed(create_plain_jpeg(16, 16)), ImageIntent::Sdr)
        .unwrap();
    encoder.encode().unwrap();
    assert!(is_uhdr_image(encoder.encoded_stream().unwrap().data()));
}

/// Compressed base + compressed gain map recompose without re-encoding.
#[test]
fn encode_recompose() {
    let mut encoder = Encoder::new();
    encoder
        .set_compressed_image(&compressed(create_plain_jpeg(16, 16)), ImageIntent::Base)
        .unwrap();
    encoder
        .set_gainmap_image(&compressed(create_gainmap_jpeg(4, 4)), &sample_metadata())
        .unwrap();
    encoder.encode().unwrap();

    let stream = encoder.encoded_stream().unwrap();
    assert!(is_uhdr_image(stream.data()));
}

/// No usable input shape at all.
#[test]
fn encode_without_inputs_is_invalid_operation() {
    let mut encoder = Encoder::new();
    let err = encoder.encode().unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidOperation);
    assert!(
        err.detail().contains("resources required"),
        "unexpected detail: {err}"
    );
}

/// encode() is idempotent: both terminal statuses replay.
#[test]
fn encode_latches_terminal_status() {
    // failure latches
    let mut encoder = Encoder::new();
    let first = encoder.encode().unwrap_err();
    let second = encoder.encode().unwrap_err();
    assert_eq!(first, second);

    // success latches too
    let mut encoder = Encoder::new();
    encoder
        .set_raw_image(&create_p010_solid(16, 16), ImageIntent::Hdr)
        .unwrap();
    encoder.encode().unwrap();
    encoder.encode().unwrap();
    assert!(encoder.encoded_stream().is_some());
}

/// Every configuration call on a sealed session fails with
/// InvalidOperation and leaves the stored result intact.
#[test]
fn sealed_session_rejects_configuration() {
    let mut encoder = Encoder::new();
    encoder
        .set_raw_image(&create_p010_solid(16, 16), ImageIntent::Hdr)
        .unwrap();
    encoder.encode().unwrap();
    let len_before = encoder.encoded_stream().unwrap().len();

    let hdr = create_p010_solid(16, 16);
    let sdr = create_yuv420_solid(16, 16, 100, jpegr::ColorGamut::Bt709);
    let results = [
        encoder.set_raw_image(&hdr, ImageIntent::Hdr),
        encoder.set_raw_image(&sdr, ImageIntent::Sdr),
        encoder.set_compressed_image(&compressed(create_plain_jpeg(16, 16)), ImageIntent::Base),
        encoder.set_gainmap_image(&compressed(create_gainmap_jpeg(4, 4)), &sample_metadata()),
        encoder.set_quality(80, ImageIntent::Base),
        encoder.set_exif_data(&[1, 2, 3]),
        encoder.set_output_format(OutputFormat::Jpeg),
        encoder.set_gainmap_scale_factor(2),
        encoder.set_using_multi_channel_gainmap(true),
        encoder.add_effect_rotate(90),
        encoder.add_effect_crop(0, 8, 0, 8),
    ];
    for result in results {
        let err = result.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOperation, "{err}");
    }
    assert_eq!(encoder.encoded_stream().unwrap().len(), len_before);
}

/// Non-JPEG output containers are recognized but unimplemented.
#[test]
fn non_jpeg_output_format_is_unsupported() {
    let mut encoder = Encoder::new();
    for format in [OutputFormat::Heif, OutputFormat::Avif] {
        let err = encoder.set_output_format(format).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedFeature);
    }
    encoder.set_output_format(OutputFormat::Jpeg).unwrap();
}

/// Out-of-range quality factors name the offending value.
#[test]
fn quality_out_of_range() {
    let mut encoder = Encoder::new();
    let err = encoder.set_quality(101, ImageIntent::Base).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParam);
    assert!(err.detail().contains("101"), "{err}");
    let err = encoder.set_quality(-5, ImageIntent::Sdr).unwrap_err();
    assert!(err.detail().contains("-5"), "{err}");

    encoder.set_quality(0, ImageIntent::GainMap).unwrap();
    encoder.set_quality(100, ImageIntent::Hdr).unwrap();
}

/// Gain map metadata bounds are enforced at attachment time.
#[test]
fn gainmap_metadata_bounds_checked_on_attach() {
    let mut encoder = Encoder::new();

    let mut bad = sample_metadata();
    bad.hdr_capacity_min = 0.5;
    let err = encoder
        .set_gainmap_image(&compressed(create_gainmap_jpeg(4, 4)), &bad)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParam);
    assert!(err.detail().contains("hdr capacity min"), "{err}");

    let mut bad = sample_metadata();
    bad.gamma = 0.0;
    let err = encoder
        .set_gainmap_image(&compressed(create_gainmap_jpeg(4, 4)), &bad)
        .unwrap_err();
    assert!(err.detail().contains("gamma"), "{err}");
}

/// The scale factor rejects non-positive values.
#[test]
fn gainmap_scale_factor_bounds() {
    let mut encoder = Encoder::new();
    assert!(encoder.set_gainmap_scale_factor(0).is_err());
    assert!(encoder.set_gainmap_scale_factor(129).is_err());
    encoder.set_gainmap_scale_factor(1).unwrap();
    encoder.set_gainmap_scale_factor(8).unwrap();
}

/// reset() restores the configurable phase and the defaults.
#[test]
fn reset_restores_defaults() {
    let mut encoder = Encoder::new();
    encoder
        .set_raw_image(&create_p010_solid(16, 16), ImageIntent::Hdr)
        .unwrap();
    encoder.set_quality(10, ImageIntent::Base).unwrap();
    encoder.add_effect_rotate(180).unwrap();
    encoder.encode().unwrap();
    assert!(encoder.is_sealed());

    encoder.reset();
    assert!(!encoder.is_sealed());
    assert!(encoder.encoded_stream().is_none());

    // configurable again, and the old attachments are gone
    let err = encoder.encode().unwrap_err();
    assert!(err.detail().contains("resources required"), "{err}");

    encoder.reset();
    encoder
        .set_raw_image(&create_p010_solid(16, 16), ImageIntent::Hdr)
        .unwrap();
    encoder.encode().unwrap();
    assert!(encoder.encoded_stream().is_some());
}

/// Multi-channel gain maps still produce a decodable stream.
#[test]
fn multi_channel_gainmap_roundtrips() {
    let mut encoder = Encoder::new();
    encoder
        .set_raw_image(&create_p010_solid(16, 16), ImageIntent::Hdr)
        .unwrap();
    encoder.set_using_multi_channel_gainmap(true).unwrap();
    encoder.encode().unwrap();
    assert!(is_uhdr_image(encoder.encoded_stream().unwrap().data()));
}
