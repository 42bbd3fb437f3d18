//! Basic pipeline tests: identity transforms, constant images, bounds
//! stamping, size limits.

use std::sync::Arc;

use super::*;
use crate::filter::Cubic;

fn nrgba_source(pix: &[u8], w: i32, h: i32) -> Source<'_> {
    Source::Nrgba8 {
        pix,
        stride: w as usize * 4,
        rect: Rect::of_size(w, h),
    }
}

fn checkered_nrgba(w: usize, h: usize) -> Vec<u8> {
    let mut pix = vec![0u8; w * h * 4];
    for y in 0..h {
        for x in 0..w {
            let p = (y * w + x) * 4;
            let v = if (x + y) % 2 == 0 { 40 } else { 210 };
            pix[p] = v;
            pix[p + 1] = 255 - v;
            pix[p + 2] = (x * 13 + y * 29) as u8;
            pix[p + 3] = 255;
        }
    }
    pix
}

#[test]
fn test_identity_resize_is_identity() {
    // Same-size resize, default Lanczos-2, no colour conversion: the
    // output matches the input to within one byte per channel.
    let (w, h) = (6, 5);
    let pix = checkered_nrgba(w, h);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, w as i32, h as i32));
    r.set_target_bounds(Rect::of_size(w as i32, h as i32));
    r.set_input_converter(None);
    r.set_output_converter(None);
    let out = r.resize_to_nrgba8().unwrap();
    for (a, b) in out.pix.iter().zip(pix.iter()) {
        assert!((*a as i32 - *b as i32).abs() <= 1, "{a} vs {b}");
    }
}

#[test]
fn test_identity_resize_with_srgb_round_trip() {
    let (w, h) = (7, 7);
    let pix = checkered_nrgba(w, h);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, w as i32, h as i32));
    r.set_target_bounds(Rect::of_size(w as i32, h as i32));
    let out = r.resize_to_nrgba8().unwrap();
    for (a, b) in out.pix.iter().zip(pix.iter()) {
        assert!((*a as i32 - *b as i32).abs() <= 2, "{a} vs {b}");
    }
}

#[test]
fn test_constant_image_resizes_to_constant() {
    // Weights are normalized, so a constant image stays constant through
    // any enlargement, including one with partial transparency.
    let pix: Vec<u8> = [50u8, 40, 60, 150].repeat(15 * 15);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 15, 15));
    r.set_target_bounds(Rect::of_size(100, 99));
    let out = r.resize_to_nrgba8().unwrap();
    assert_eq!(out.width(), 100);
    assert_eq!(out.height(), 99);

    // Every output pixel agrees with the first to within one code value
    // (weight sums differ only in the last float bit between samples).
    let first: [u8; 4] = out.pix[..4].try_into().unwrap();
    for (i, p) in out.pix.chunks_exact(4).enumerate() {
        for k in 0..4 {
            assert!(
                (p[k] as i32 - first[k] as i32).abs() <= 1,
                "pixel {i} channel {k}: {} vs {}",
                p[k],
                first[k]
            );
        }
    }
    for (k, want) in [50u8, 40, 60, 150].iter().enumerate() {
        assert!(
            (out.pix[k] as i32 - *want as i32).abs() <= 2,
            "channel {k}: {} vs {want}",
            out.pix[k]
        );
    }
}

#[test]
fn test_output_rect_equals_target_rect() {
    let pix = checkered_nrgba(8, 8);
    let rect = Rect::new(3, 4, 23, 24);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 8, 8));
    r.set_target_bounds(rect);
    let out = r.resize_to_nrgba8().unwrap();
    assert_eq!(out.rect, rect);
    assert_eq!(out.width(), 20);

    let float_out = r.resize().unwrap();
    assert_eq!(float_out.rect, rect);
}

#[test]
fn test_degenerate_target_grows_to_one_pixel() {
    let pix = checkered_nrgba(4, 4);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 4, 4));
    r.set_target_bounds(Rect::of_size(0, -3));
    let out = r.resize_to_nrgba8().unwrap();
    assert_eq!(out.width(), 1);
    assert_eq!(out.height(), 1);
}

#[test]
fn test_target_too_large_rejected_before_ingest() {
    let pix = checkered_nrgba(4, 4);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 4, 4));
    // 65536 * 8193 pixels is just past the 31-bit cap.
    r.set_target_bounds(Rect::of_size(65536, 8193));
    assert_eq!(r.resize_to_nrgba8().unwrap_err(), Error::TargetTooLarge);
    // The same resizer still works with a sane target.
    r.set_target_bounds(Rect::of_size(2, 2));
    assert!(r.resize_to_nrgba8().is_ok());
}

#[test]
fn test_source_too_large_rejected() {
    // The cap is checked before any pixel is touched, so an empty slice
    // with oversized claimed bounds is safe to pass.
    let mut r = Resizer::new();
    r.set_source(Source::Nrgba8 {
        pix: &[],
        stride: 0,
        rect: Rect::of_size(65536, 8193),
    });
    r.set_target_bounds(Rect::of_size(10, 10));
    assert_eq!(r.resize_to_nrgba8().unwrap_err(), Error::SourceTooLarge);
}

#[test]
fn test_repeated_resize_is_bit_identical() {
    // The ingested float image is cached; the resample and export stages
    // are deterministic, so repeating a resize reproduces every byte.
    let pix = checkered_nrgba(23, 19);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 23, 19));
    r.set_target_bounds(Rect::of_size(17, 17));
    r.set_filter(Arc::new(Cubic::catmull_rom()));
    r.set_input_converter(None);
    r.set_output_converter(None);
    let first = r.resize_to_nrgba16().unwrap();
    let second = r.resize_to_nrgba16().unwrap();
    assert_eq!(first.pix, second.pix);
    assert_eq!(first.format, RasterFormat::Nrgba16);
}

#[test]
fn test_downscale_averages_regions() {
    // Left half dark, right half bright; a 2x downscale keeps the halves
    // apart.
    let w = 16;
    let mut pix = vec![0u8; w * 8 * 4];
    for y in 0..8 {
        for x in 0..w {
            let p = (y * w + x) * 4;
            let v = if x < w / 2 { 30 } else { 220 };
            pix[p] = v;
            pix[p + 1] = v;
            pix[p + 2] = v;
            pix[p + 3] = 255;
        }
    }
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, w as i32, 8));
    r.set_target_bounds(Rect::of_size(8, 4));
    r.set_input_converter(None);
    r.set_output_converter(None);
    let out = r.resize_to_nrgba8().unwrap();
    assert!(out.pix[0] < 80, "left stays dark: {}", out.pix[0]);
    let right = out.pix[(8 - 1) * 4];
    assert!(right > 170, "right stays bright: {right}");
}

#[test]
fn test_blur_keeps_normalization() {
    let pix: Vec<u8> = [120u8, 120, 120, 255].repeat(12 * 12);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 12, 12));
    r.set_target_bounds(Rect::of_size(9, 14));
    r.set_blur(2.5);
    let out = r.resize_to_nrgba8().unwrap();
    for p in out.pix.chunks_exact(4) {
        assert!((p[0] as i32 - 120).abs() <= 2);
        assert_eq!(p[3], 255);
    }
}

#[test]
fn test_per_axis_filter_getter() {
    let pix: Vec<u8> = [90u8, 90, 90, 255].repeat(10 * 10);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 10, 10));
    r.set_target_bounds(Rect::of_size(15, 5));
    r.set_filter_getter(Box::new(|vertical, _scale| {
        if vertical {
            Arc::new(Cubic::mitchell()) as Arc<dyn Filter>
        } else {
            Arc::new(Lanczos::new(3)) as Arc<dyn Filter>
        }
    }));
    let out = r.resize_to_nrgba8().unwrap();
    for p in out.pix.chunks_exact(4) {
        assert!((p[0] as i32 - 90).abs() <= 2);
    }
}
