//! Advanced pipeline tests: alpha invariants, grayscale preservation,
//! advanced target mappings, filter round trips, automatic format
//! selection.

use std::sync::{Arc, Mutex};

use image::DynamicImage;

use super::*;
use crate::filter::Cubic;

fn nrgba_source(pix: &[u8], w: i32, h: i32) -> Source<'_> {
    Source::Nrgba8 {
        pix,
        stride: w as usize * 4,
        rect: Rect::of_size(w, h),
    }
}

#[test]
fn test_gray_source_rgb_output_stays_gray() {
    // Only the red lane of a grayscale source is resampled; the export
    // stage fills green and blue from it, so the output is gray
    // byte-for-byte.
    let pix: Vec<u8> = (0..12 * 12).map(|i| (i * 5 % 256) as u8).collect();
    let mut r = Resizer::new();
    r.set_source(Source::Gray8 {
        pix: &pix,
        stride: 12,
        rect: Rect::of_size(12, 12),
    });
    r.set_target_bounds(Rect::of_size(30, 20));
    let out = r.resize_to_nrgba8().unwrap();
    for p in out.pix.chunks_exact(4) {
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);
        assert_eq!(p[3], 255);
    }
}

#[test]
fn test_alpha_invariants_in_premultiplied_output() {
    // 15x15 with a bright centre pixel over a dim translucent field,
    // enlarged to 100x99 and exported premultiplied: alpha stays in range
    // and every colour sample stays at or below its alpha.
    let mut pix: Vec<u8> = [50u8, 40, 60, 150].repeat(15 * 15);
    let c = (7 * 15 + 7) * 4;
    pix[c..c + 4].copy_from_slice(&[230, 220, 210, 230]);

    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 15, 15));
    r.set_target_bounds(Rect::of_size(100, 99));
    let out = r.resize_to_rgba8().unwrap();
    assert_eq!(out.format, RasterFormat::Rgba8Pre);
    assert!(r.has_transparency());
    for p in out.pix.chunks_exact(4) {
        let a = p[3];
        assert!(p[0] <= a && p[1] <= a && p[2] <= a, "premul violated: {p:?}");
    }

    // The 16-bit premultiplied export upholds the same invariant.
    let out16 = r.resize_to_rgba16().unwrap();
    for y in 0..out16.height() {
        for x in 0..out16.width() {
            let s = out16.sample16(x, y);
            assert!(s[0] <= s[3] && s[1] <= s[3] && s[2] <= s[3]);
        }
    }
}

#[test]
fn test_fully_transparent_region_is_zero() {
    // Left half fully transparent with junk colour; after a downscale the
    // deep-transparent output pixels are zero in all channels.
    let w = 20;
    let h = 20;
    let mut pix = vec![0u8; w * h * 4];
    for y in 0..h {
        for x in 0..w {
            let p = (y * w + x) * 4;
            if x < w / 2 {
                pix[p..p + 4].copy_from_slice(&[200, 150, 90, 0]);
            } else {
                pix[p..p + 4].copy_from_slice(&[10, 200, 40, 255]);
            }
        }
    }
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, w as i32, h as i32));
    r.set_target_bounds(Rect::of_size(10, 10));
    let out = r.resize_to_nrgba8().unwrap();
    for y in 0..10 {
        for x in 0..2 {
            assert_eq!(out.sample16(x, y), [0, 0, 0, 0], "pixel ({x},{y})");
        }
    }
    // And alpha never exceeds full scale anywhere.
    for p in out.pix.chunks_exact(4) {
        assert!(p[3] == 0 || p[3] <= 255);
    }
}

#[test]
fn test_advanced_mapping_activates_virtual_pixels() {
    // An opaque source mapped onto a sub-rectangle of the canvas: the
    // uncovered canvas is transparent, so the resizer must report
    // transparency even though the source has none.
    let src_img = DynamicImage::new_rgb8(10, 10);
    let mut r = Resizer::new();
    r.set_source(Source::from_dynamic(&src_img));
    r.set_target_bounds_advanced(Rect::of_size(21, 22), 0.5, 2.0, 20.5, 21.0);
    r.set_filter(Arc::new(Lanczos::new(4)));
    assert!(!r.has_transparency());
    let out = r.resize_to_nrgba8().unwrap();
    assert!(r.has_transparency());
    assert_eq!(out.width(), 21);
    assert_eq!(out.height(), 22);

    // The topmost rows sit partly outside the mapped region: alpha < 255.
    assert!(out.pix[(10 * 4) + 3] < 255, "top edge should be translucent");
    // The centre is fully covered: alpha == 255.
    let centre = (11 * out.stride) + 10 * 4;
    assert_eq!(out.pix[centre + 3], 255);
    // The bottom-most row is beyond the mapped region's end (y2 = 21 of
    // 22): translucent again.
    let bottom = 21 * out.stride + 10 * 4;
    assert!(out.pix[bottom + 3] < 255);
}

#[test]
fn test_explicit_virtual_pixels_make_edges_translucent() {
    // With transparent virtual pixels, even a plain enlargement loses a
    // little alpha at the borders where the filter overhangs the edge.
    let pix: Vec<u8> = [100u8, 100, 100, 255].repeat(8 * 8);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 8, 8));
    r.set_target_bounds(Rect::of_size(24, 24));
    r.set_virtual_pixels(VirtualPixels::Transparent);
    let out = r.resize_to_nrgba8().unwrap();
    assert!(r.has_transparency());
    let corner_alpha = out.pix[3];
    let centre_alpha = out.pix[12 * out.stride + 12 * 4 + 3];
    assert!(corner_alpha < 255, "corner: {corner_alpha}");
    assert_eq!(centre_alpha, 255);
}

#[test]
fn test_no_conversion_16bit_resize_repeats_exactly() {
    let mut pix: Vec<u8> = [90u8, 60, 200, 255].repeat(23 * 19);
    // Scatter some translucency so the alpha lane is exercised.
    for i in (7..pix.len()).step_by(16) {
        pix[i] = 120;
    }
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 23, 19));
    r.set_target_bounds(Rect::of_size(17, 17));
    r.set_filter(Arc::new(Cubic::new(0.0, 0.5)));
    r.set_input_converter(None);
    r.set_output_converter(None);
    let a = r.resize_to_nrgba16().unwrap();
    let b = r.resize_to_nrgba16().unwrap();
    assert_eq!(a.pix, b.pix);
    for y in 0..a.height() {
        for x in 0..a.width() {
            let s = a.sample16(x, y);
            assert!(s[3] <= 65535);
        }
    }
}

#[test]
fn test_catmull_rom_round_trip_error_is_small() {
    // 100x100 -> 200x200 -> 100x100 with Catmull-Rom and no colour
    // conversion: mean squared error against the original stays below 2.5
    // in 8-bit units.
    let n = 100usize;
    let mut pix = vec![0u8; n * n * 4];
    for y in 0..n {
        for x in 0..n {
            let p = (y * n + x) * 4;
            let v = 127.5
                + 70.0 * (x as f64 * 0.23).sin()
                + 45.0 * (y as f64 * 0.17).cos();
            let v = v.clamp(0.0, 255.0) as u8;
            pix[p] = v;
            pix[p + 1] = 255 - v;
            pix[p + 2] = v / 2;
            pix[p + 3] = 255;
        }
    }

    let mut up = Resizer::new();
    up.set_source(nrgba_source(&pix, n as i32, n as i32));
    up.set_target_bounds(Rect::of_size(200, 200));
    up.set_filter(Arc::new(Cubic::catmull_rom()));
    up.set_input_converter(None);
    up.set_output_converter(None);
    let big = up.resize_to_nrgba8().unwrap();

    let mut down = Resizer::new();
    down.set_source(nrgba_source(&big.pix, 200, 200));
    down.set_target_bounds(Rect::of_size(n as i32, n as i32));
    down.set_filter(Arc::new(Cubic::catmull_rom()));
    down.set_input_converter(None);
    down.set_output_converter(None);
    let back = down.resize_to_nrgba8().unwrap();

    let mut sq_err = 0.0f64;
    let mut count = 0usize;
    for (a, b) in back.pix.chunks_exact(4).zip(pix.chunks_exact(4)) {
        for k in 0..3 {
            let d = a[k] as f64 - b[k] as f64;
            sq_err += d * d;
            count += 1;
        }
    }
    let mse = sq_err / count as f64;
    assert!(mse < 2.5, "round-trip MSE {mse}");
}

#[test]
fn test_resize_flags_select_output_format() {
    let pix: Vec<u8> = (0..16 * 16).map(|i| (i % 251) as u8).collect();
    let mut r = Resizer::new();
    r.set_source(Source::Gray8 {
        pix: &pix,
        stride: 16,
        rect: Rect::of_size(16, 16),
    });
    r.set_target_bounds(Rect::of_size(18, 18));

    let gray = r.resize_to_image(ResizeFlags { gray_ok: true, ..Default::default() }).unwrap();
    assert_eq!(gray.format, RasterFormat::Gray8);
    assert_eq!(gray.width(), 18);

    let deep_gray = r
        .resize_to_image(ResizeFlags { gray_ok: true, prefer_deep: true, ..Default::default() })
        .unwrap();
    assert_eq!(deep_gray.format, RasterFormat::Gray16);

    let rgba = r.resize_to_image(ResizeFlags::default()).unwrap();
    assert_eq!(rgba.format, RasterFormat::Nrgba8);
}

#[test]
fn test_resize_flags_alpha_formats() {
    let pix: Vec<u8> = [10u8, 20, 30, 128].repeat(8 * 8);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 8, 8));
    r.set_target_bounds(Rect::of_size(8, 8));

    let premul = r.resize_to_image(ResizeFlags::default()).unwrap();
    assert_eq!(premul.format, RasterFormat::Rgba8Pre);

    let unassoc = r
        .resize_to_image(ResizeFlags { prefer_unassociated: true, ..Default::default() })
        .unwrap();
    assert_eq!(unassoc.format, RasterFormat::Nrgba8);

    let deep = r
        .resize_to_image(ResizeFlags { prefer_deep: true, ..Default::default() })
        .unwrap();
    assert_eq!(deep.format, RasterFormat::Rgba16Pre);
}

#[test]
fn test_float_output_is_unassociated_and_clamped() {
    let pix: Vec<u8> = [200u8, 100, 50, 128].repeat(9 * 9);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 9, 9));
    r.set_target_bounds(Rect::of_size(13, 7));
    let out = r.resize().unwrap();
    for p in out.pix.chunks_exact(4) {
        for k in 0..4 {
            assert!((0.0..=1.0).contains(&p[k]), "sample out of range: {p:?}");
        }
    }
}

#[test]
fn test_opaque_source_exports_full_alpha() {
    let pix: Vec<u8> = [33u8, 66, 99, 255].repeat(10 * 10);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 10, 10));
    r.set_target_bounds(Rect::of_size(25, 4));
    let out = r.resize_to_nrgba8().unwrap();
    assert!(!r.has_transparency());
    for p in out.pix.chunks_exact(4) {
        assert_eq!(p[3], 255);
    }
}

#[test]
fn test_progress_callback_reports_phases() {
    let messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let pix: Vec<u8> = [1u8, 2, 3, 255].repeat(6 * 6);
    let mut r = Resizer::new();
    r.set_source(nrgba_source(&pix, 6, 6));
    r.set_target_bounds(Rect::of_size(12, 12));
    r.set_progress(move |msg| sink.lock().unwrap().push(msg.to_string()));
    r.resize_to_nrgba8().unwrap();

    let seen = messages.lock().unwrap();
    assert!(seen.iter().any(|m| m.contains("float format")));
    assert!(seen.iter().any(|m| m.contains("height")));
    assert!(seen.iter().any(|m| m.contains("width")));
    assert!(seen.iter().any(|m| m.contains("target format")));

    // A second resize reuses the ingested image: no ingest message again.
    messages.lock().unwrap().clear();
    r.resize_to_nrgba8().unwrap();
    let seen = messages.lock().unwrap();
    assert!(!seen.iter().any(|m| m.contains("float format")));
    assert!(seen.iter().any(|m| m.contains("width")));
}

#[test]
fn test_resize_output_can_be_resized_again() {
    // The float image implements the generic source capability, so a
    // resize result feeds straight back in.
    let pix: Vec<u8> = [80u8, 120, 160, 255].repeat(10 * 10);
    let mut first = Resizer::new();
    first.set_source(nrgba_source(&pix, 10, 10));
    first.set_target_bounds(Rect::of_size(20, 20));
    let mid = first.resize().unwrap();

    let mut second = Resizer::new();
    second.set_source(Source::Generic(&mid));
    second.set_target_bounds(Rect::of_size(5, 5));
    let out = second.resize_to_nrgba8().unwrap();
    assert_eq!(out.width(), 5);
    for p in out.pix.chunks_exact(4) {
        assert!((p[0] as i32 - 80).abs() <= 3, "{}", p[0]);
        assert!((p[1] as i32 - 120).abs() <= 3);
        assert!((p[2] as i32 - 160).abs() <= 3);
    }
}
