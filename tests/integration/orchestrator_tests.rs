//! Conversion pipeline integration tests.
//!
//! Tests verify:
//! - One encode and one ordered result slot per requested format
//! - Repeated tags share a single encode
//! - Cache hits skip the encoder
//! - Per-format failures stay in their own slot
//! - Decode failures stop the whole request before any encode
//! - Usage stats track successful conversions

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use image::ImageFormat;

use tinyimg::codec::{EncodeOptions, ImageCodec, OutputFormat};
use tinyimg::convert::{
    ConversionOrchestrator, ConversionRequest, ImageAsset, MAX_REQUESTED_FORMATS,
};
use tinyimg::error::ConvertError;

use super::test_utils::{create_corrupt_png, create_test_png, is_format, MockCodec};

const BASE_URL: &str = "http://localhost:8080";

fn request(data: Vec<u8>, formats: &[&str]) -> ConversionRequest {
    let asset = ImageAsset::detect(Bytes::from(data)).expect("fixture should be an image");
    ConversionRequest::new(asset, formats.iter().map(|f| f.to_string()).collect()).unwrap()
}

// =============================================================================
// Fan-out
// =============================================================================

#[tokio::test]
async fn test_each_format_encoded_once_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new();
    let encodes = codec.encode_counter();
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let outcome = orchestrator
        .convert(request(create_test_png(), &["webp", "jpg", "png"]))
        .await
        .unwrap();

    assert_eq!(encodes.load(Ordering::SeqCst), 3);
    assert!(outcome.errors.is_empty());

    let formats: Vec<_> = outcome
        .results
        .iter()
        .map(|r| r.as_ref().unwrap().format.as_str())
        .collect();
    assert_eq!(formats, vec!["webp", "jpg", "png"]);

    assert_eq!(outcome.files.len(), 3);
    assert!(outcome.files[0].ends_with(".webp"));
    assert!(outcome.files[1].ends_with(".jpg"));
    assert!(outcome.files[2].ends_with(".png"));
}

#[tokio::test]
async fn test_order_preserved_when_first_format_is_slowest() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new().slow(OutputFormat::Jpeg, Duration::from_millis(150));
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let outcome = orchestrator
        .convert(request(create_test_png(), &["jpg", "webp"]))
        .await
        .unwrap();

    assert_eq!(outcome.results[0].as_ref().unwrap().format, "jpg");
    assert_eq!(outcome.results[1].as_ref().unwrap().format, "webp");
}

#[tokio::test]
async fn test_formats_encode_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let delay = Duration::from_millis(200);
    let codec = MockCodec::new()
        .slow(OutputFormat::Jpeg, delay)
        .slow(OutputFormat::Png, delay)
        .slow(OutputFormat::Webp, delay);
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let started = std::time::Instant::now();
    orchestrator
        .convert(request(create_test_png(), &["jpg", "png", "webp"]))
        .await
        .unwrap();

    // Sequential encoding would take at least 600ms
    assert!(started.elapsed() < Duration::from_millis(550));
}

#[tokio::test]
async fn test_saved_bytes_and_urls() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new();
    let webp_size = codec.output_size(OutputFormat::Webp) as i64;
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let png = create_test_png();
    let original = png.len() as i64;
    let outcome = orchestrator
        .convert(request(png, &["webp"]))
        .await
        .unwrap();

    let result = outcome.results[0].as_ref().unwrap();
    assert_eq!(result.saved_bytes, original - webp_size);
    assert_eq!(result.new_size as i64, webp_size);
    assert_eq!(
        result.image_url,
        format!("{}/image?f={}", BASE_URL, outcome.files[0])
    );
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_repeat_conversion_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new();
    let encodes = codec.encode_counter();
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let png = create_test_png();
    let first = orchestrator
        .convert(request(png.clone(), &["webp"]))
        .await
        .unwrap();
    let second = orchestrator
        .convert(request(png, &["webp"]))
        .await
        .unwrap();

    assert_eq!(encodes.load(Ordering::SeqCst), 1);
    assert_eq!(first.results, second.results);
    assert_eq!(first.files, second.files);
}

#[tokio::test]
async fn test_cache_shared_between_orchestrators() {
    let dir = tempfile::tempdir().unwrap();
    let first = ConversionOrchestrator::new(MockCodec::new(), dir.path(), BASE_URL);

    let codec = MockCodec::new();
    let encodes = codec.encode_counter();
    let second = ConversionOrchestrator::new(codec, dir.path(), BASE_URL)
        .with_cache(Arc::clone(first.cache()));

    let png = create_test_png();
    first.convert(request(png.clone(), &["png"])).await.unwrap();
    second.convert(request(png, &["png"])).await.unwrap();

    assert_eq!(encodes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_different_uploads_do_not_share_cache() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new();
    let encodes = codec.encode_counter();
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let a = super::test_utils::create_test_image(16, 16, ImageFormat::Png);
    let b = super::test_utils::create_test_image(24, 24, ImageFormat::Png);
    let first = orchestrator.convert(request(a, &["jpg"])).await.unwrap();
    let second = orchestrator.convert(request(b, &["jpg"])).await.unwrap();

    assert_eq!(encodes.load(Ordering::SeqCst), 2);
    assert_ne!(first.files, second.files);
}

// =============================================================================
// Partial Failure
// =============================================================================

#[tokio::test]
async fn test_unknown_format_fails_only_its_slot() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new();
    let encodes = codec.encode_counter();
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let outcome = orchestrator
        .convert(request(create_test_png(), &["jpg", "png", "bogus"]))
        .await
        .unwrap();

    assert_eq!(encodes.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.results[0].is_some());
    assert!(outcome.results[1].is_some());
    assert!(outcome.results[2].is_none());
    assert_eq!(outcome.files.len(), 2);

    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].index, 2);
    assert_eq!(outcome.errors[0].format, "bogus");
    assert_eq!(
        outcome.errors[0].error,
        ConvertError::UnsupportedFormat {
            format: "bogus".to_string()
        }
    );
    assert!(outcome.is_partial());
}

#[tokio::test]
async fn test_encode_failure_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new().failing(OutputFormat::Png);
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let outcome = orchestrator
        .convert(request(create_test_png(), &["png", "webp"]))
        .await
        .unwrap();

    assert!(outcome.results[0].is_none());
    assert!(outcome.results[1].is_some());
    assert!(matches!(
        outcome.errors[0].error,
        ConvertError::Encode { .. }
    ));
    assert_eq!(outcome.files.len(), 1);
    assert!(outcome.files[0].ends_with(".webp"));
}

#[tokio::test]
async fn test_failed_format_is_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = ConversionOrchestrator::new(
        MockCodec::new().failing(OutputFormat::Jpeg),
        dir.path(),
        BASE_URL,
    );

    orchestrator
        .convert(request(create_test_png(), &["jpg"]))
        .await
        .unwrap();

    assert!(orchestrator.cache().is_empty().await);
}

#[tokio::test]
async fn test_encode_timeout_fails_only_slow_format() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new().slow(OutputFormat::Png, Duration::from_secs(5));
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL)
        .with_encode_timeout(Duration::from_millis(100));

    let outcome = orchestrator
        .convert(request(create_test_png(), &["png", "jpg"]))
        .await
        .unwrap();

    assert!(outcome.results[0].is_none());
    assert!(outcome.results[1].is_some());
    assert_eq!(
        outcome.errors[0].error,
        ConvertError::Timeout {
            format: "png".to_string(),
            after_ms: 100
        }
    );
}

#[tokio::test]
async fn test_duplicate_formats_get_their_own_slots() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = ConversionOrchestrator::new(MockCodec::new(), dir.path(), BASE_URL);

    let outcome = orchestrator
        .convert(request(create_test_png(), &["webp", "webp"]))
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.files.len(), 2);
    assert_eq!(outcome.files[0], outcome.files[1]);

    let first = outcome.results[0].as_ref().unwrap();
    let second = outcome.results[1].as_ref().unwrap();
    assert_eq!(first.image_url, second.image_url);
    assert_eq!(first.new_size, second.new_size);
}

#[tokio::test]
async fn test_repeated_tags_encode_once() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new();
    let encodes = codec.encode_counter();
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let formats = vec!["png"; MAX_REQUESTED_FORMATS].join(",");
    let asset = ImageAsset::detect(Bytes::from(create_test_png())).unwrap();
    let request = ConversionRequest::from_format_list(asset, &formats).unwrap();

    let outcome = orchestrator.convert(request).await.unwrap();

    assert_eq!(encodes.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.results.len(), MAX_REQUESTED_FORMATS);
    assert!(outcome.results.iter().all(|r| r.is_some()));
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn test_jpeg_aliases_in_one_request_share_a_job() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new();
    let encodes = codec.encode_counter();
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let outcome = orchestrator
        .convert(request(create_test_png(), &["jpg", "webp", "jpeg"]))
        .await
        .unwrap();

    assert_eq!(encodes.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.results[0], outcome.results[2]);
    assert_eq!(outcome.files.len(), 3);
    assert_eq!(outcome.files[0], outcome.files[2]);
}

#[tokio::test]
async fn test_failed_repeated_tag_fails_every_slot() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new().failing(OutputFormat::Png);
    let encodes = codec.encode_counter();
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let outcome = orchestrator
        .convert(request(create_test_png(), &["png", "jpg", "png"]))
        .await
        .unwrap();

    assert_eq!(encodes.load(Ordering::SeqCst), 2);
    assert!(outcome.results[1].is_some());
    let failed: Vec<_> = outcome.errors.iter().map(|f| f.index).collect();
    assert_eq!(failed, vec![0, 2]);
}

#[test]
fn test_oversized_format_list_rejected() {
    let formats = vec!["png"; 200].join(",");
    let asset = ImageAsset::detect(Bytes::from(create_test_png())).unwrap();

    let result = ConversionRequest::from_format_list(asset, &formats);

    assert_eq!(
        result.unwrap_err(),
        ConvertError::TooManyFormats {
            requested: 200,
            max: MAX_REQUESTED_FORMATS,
        }
    );
}

// =============================================================================
// Decode Failure
// =============================================================================

#[tokio::test]
async fn test_corrupt_input_never_encodes() {
    let dir = tempfile::tempdir().unwrap();
    let codec = MockCodec::new();
    let encodes = codec.encode_counter();
    let decodes = codec.decode_counter();
    let orchestrator = ConversionOrchestrator::new(codec, dir.path(), BASE_URL);

    let result = orchestrator
        .convert(request(create_corrupt_png(), &["jpg", "png", "webp"]))
        .await;

    assert!(matches!(result, Err(ConvertError::Decode { .. })));
    assert_eq!(decodes.load(Ordering::SeqCst), 1);
    assert_eq!(encodes.load(Ordering::SeqCst), 0);
    assert_eq!(orchestrator.stats().snapshot().image_count, 0);
}

// =============================================================================
// Stats
// =============================================================================

#[tokio::test]
async fn test_image_count_tracks_successes() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = ConversionOrchestrator::new(
        MockCodec::new().failing(OutputFormat::Png),
        dir.path(),
        BASE_URL,
    );

    orchestrator
        .convert(request(create_test_png(), &["jpg", "png", "webp"]))
        .await
        .unwrap();
    assert_eq!(orchestrator.stats().snapshot().image_count, 2);

    // Cache hits still count; failures never do
    orchestrator
        .convert(request(create_test_png(), &["jpg", "png"]))
        .await
        .unwrap();
    assert_eq!(orchestrator.stats().snapshot().image_count, 3);
}

#[tokio::test]
async fn test_concurrent_requests_keep_stats_additive() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Arc::new(ConversionOrchestrator::new(
        MockCodec::new(),
        dir.path(),
        BASE_URL,
    ));

    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                let png = super::test_utils::create_test_image(8 + i, 8, ImageFormat::Png);
                orchestrator
                    .convert(request(png, &["jpg", "webp"]))
                    .await
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(orchestrator.stats().snapshot().image_count, 16);
}

// =============================================================================
// Real Codec
// =============================================================================

#[tokio::test]
async fn test_image_codec_produces_every_format() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator =
        ConversionOrchestrator::new(ImageCodec::new(EncodeOptions::default()), dir.path(), BASE_URL);

    let outcome = orchestrator
        .convert(request(create_test_png(), &["jpg", "png", "webp"]))
        .await
        .unwrap();

    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);

    let expected = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];
    for ((file, result), format) in outcome
        .files
        .iter()
        .zip(outcome.successes())
        .zip(expected)
    {
        let data = std::fs::read(dir.path().join(file)).unwrap();
        assert_eq!(data.len() as u64, result.new_size);
        assert!(is_format(&data, format), "{} should be {:?}", file, format);
    }
}
