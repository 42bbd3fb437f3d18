//! Conversion of a source image into the canonical float representation:
//! linear light, premultiplied alpha, one row per work item.
//!
//! Each storage variant gets a specialised row converter; all of them
//! produce the same result up to rounding. Fully transparent pixels are
//! skipped entirely (the destination is already zero), fully opaque pixels
//! take the lookup-table path when a table was worth building, and partially
//! transparent pixels are converted at full precision because their
//! unassociated values do not land on table grid points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::buffer::FloatImage;
use crate::color::ColorConverter;
use crate::error::{Error, Result};
use crate::lut::input_lut;
use crate::source::{ycbcr_to_rgb, Source, SourcePixels, YCbCrPlanes};
use crate::threading::Workers;

pub(crate) struct Ingested {
    pub image: FloatImage,
    pub has_transparency: bool,
    pub is_gray: bool,
}

type Ccf<'c> = Option<&'c Arc<dyn ColorConverter>>;

pub(crate) fn ingest(src: &Source<'_>, ccf: Ccf<'_>, workers: &Workers) -> Result<Ingested> {
    let rect = src.bounds();
    let w = rect.width().max(0) as usize;
    let h = rect.height().max(0) as usize;
    let mut dst = FloatImage::alloc(w, h, Error::SourceTooLarge)?;
    let stride = dst.stride;
    let pixels = (w as u64) * (h as u64);
    let transparent = AtomicBool::new(false);

    match src {
        Source::Nrgba8 { pix, stride: sstride, .. } => {
            let lut = input_lut(ccf, 256, pixels, workers.count());
            workers.for_each_row(&mut dst.pix, stride, |j, row| {
                let src_row = &pix[j * sstride..j * sstride + 4 * w];
                row_nrgba8(src_row, row, ccf, lut.as_deref(), &transparent);
            });
        }
        Source::Rgba8Pre { pix, stride: sstride, .. } => {
            let lut = input_lut(ccf, 256, pixels, workers.count());
            workers.for_each_row(&mut dst.pix, stride, |j, row| {
                let src_row = &pix[j * sstride..j * sstride + 4 * w];
                row_rgba8_pre(src_row, row, ccf, lut.as_deref(), &transparent);
            });
        }
        Source::YCbCr8 { planes, .. } => {
            let lut = input_lut(ccf, 256, pixels, workers.count());
            workers.for_each_row(&mut dst.pix, stride, |j, row| {
                row_ycbcr8(planes, j, w, row, ccf, lut.as_deref());
            });
        }
        Source::Gray8 { pix, stride: sstride, .. } => {
            let lut = input_lut(ccf, 256, pixels, workers.count());
            workers.for_each_row(&mut dst.pix, stride, |j, row| {
                let src_row = &pix[j * sstride..j * sstride + w];
                for (s, d) in src_row.iter().zip(row.chunks_exact_mut(4)) {
                    let v = match &lut {
                        Some(lut) => lut[*s as usize],
                        None => convert_gray(*s as f32 / 255.0, ccf),
                    };
                    d[0] = v;
                    d[1] = v;
                    d[2] = v;
                    d[3] = 1.0;
                }
            });
        }
        Source::Gray16 { pix, stride: sstride, .. } => {
            let lut = input_lut(ccf, 65536, pixels, workers.count());
            workers.for_each_row(&mut dst.pix, stride, |j, row| {
                let src_row = &pix[j * sstride..j * sstride + w];
                for (s, d) in src_row.iter().zip(row.chunks_exact_mut(4)) {
                    let v = match &lut {
                        Some(lut) => lut[*s as usize],
                        None => convert_gray(*s as f32 / 65535.0, ccf),
                    };
                    d[0] = v;
                    d[1] = v;
                    d[2] = v;
                    d[3] = 1.0;
                }
            });
        }
        Source::Generic(img) => {
            let lut = input_lut(ccf, 65536, pixels, workers.count());
            workers.for_each_row(&mut dst.pix, stride, |j, row| {
                row_generic(*img, rect.x0, rect.y0 + j as i32, w, row, ccf, lut.as_deref(), &transparent);
            });
        }
    }

    Ok(Ingested {
        image: dst,
        has_transparency: transparent.load(Ordering::Relaxed),
        is_gray: src.is_gray(),
    })
}

/// 8-bit unassociated RGBA row: scale to [0,1], decode, then premultiply.
fn row_nrgba8(
    src_row: &[u8],
    dst_row: &mut [f32],
    ccf: Ccf<'_>,
    lut: Option<&[f32]>,
    transparent: &AtomicBool,
) {
    for (s, d) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
        let a = s[3];
        if a < 255 {
            transparent.store(true, Ordering::Relaxed);
            if a == 0 {
                // Already zero; colour correction is irrelevant here.
                continue;
            }
        }

        if let Some(lut) = lut {
            // Unassociated samples lie exactly on the table grid.
            d[0] = lut[s[0] as usize];
            d[1] = lut[s[1] as usize];
            d[2] = lut[s[2] as usize];
            d[3] = a as f32 / 255.0;
        } else {
            for k in 0..4 {
                d[k] = s[k] as f32 / 255.0;
            }
            if let Some(ccf) = ccf {
                ccf.convert(&mut d[..3]);
            }
        }

        if a != 255 {
            for k in 0..3 {
                d[k] *= d[3];
            }
        }
    }
}

/// 8-bit premultiplied RGBA row. The table only serves fully opaque pixels;
/// partially transparent ones are unassociated first and converted directly.
fn row_rgba8_pre(
    src_row: &[u8],
    dst_row: &mut [f32],
    ccf: Ccf<'_>,
    lut: Option<&[f32]>,
    transparent: &AtomicBool,
) {
    for (s, d) in src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4)) {
        let a = s[3];
        if a < 255 {
            transparent.store(true, Ordering::Relaxed);
            if a == 0 {
                continue;
            }
        }

        if a == 255 {
            if let Some(lut) = lut {
                d[0] = lut[s[0] as usize];
                d[1] = lut[s[1] as usize];
                d[2] = lut[s[2] as usize];
                d[3] = 1.0;
                continue;
            }
        }

        for k in 0..4 {
            d[k] = s[k] as f32 / 255.0;
        }
        let Some(ccf) = ccf else { continue };
        if a == 255 {
            ccf.convert(&mut d[..3]);
            continue;
        }

        // Restore unassociated values, convert, re-premultiply.
        for k in 0..3 {
            d[k] /= d[3];
        }
        ccf.convert(&mut d[..3]);
        for k in 0..3 {
            d[k] *= d[3];
        }
    }
}

/// Y'CbCr row: BT.601 to 8-bit RGB, then the opaque 8-bit treatment. These
/// images cannot have transparency; alpha is forced to 1 so the lane stays
/// valid even when transparent virtual pixels make it participate.
fn row_ycbcr8(
    planes: &YCbCrPlanes<'_>,
    j: usize,
    w: usize,
    dst_row: &mut [f32],
    ccf: Ccf<'_>,
    lut: Option<&[f32]>,
) {
    for (i, d) in dst_row.chunks_exact_mut(4).enumerate().take(w) {
        let yo = planes.y_offset(i, j);
        let co = planes.c_offset(i, j);
        let rgb = ycbcr_to_rgb(planes.y[yo], planes.cb[co], planes.cr[co]);

        if let Some(lut) = lut {
            for k in 0..3 {
                d[k] = lut[rgb[k] as usize];
            }
        } else {
            for k in 0..3 {
                d[k] = rgb[k] as f32 / 255.0;
            }
            if let Some(ccf) = ccf {
                ccf.convert(&mut d[..3]);
            }
        }
        d[3] = 1.0;
    }
}

/// Fallback row using only the universal per-pixel capability, which yields
/// 16-bit premultiplied samples.
#[allow(clippy::too_many_arguments)]
fn row_generic(
    img: &dyn SourcePixels,
    x0: i32,
    y: i32,
    w: usize,
    dst_row: &mut [f32],
    ccf: Ccf<'_>,
    lut: Option<&[f32]>,
    transparent: &AtomicBool,
) {
    for (i, d) in dst_row.chunks_exact_mut(4).enumerate().take(w) {
        let s = img.rgba16(x0 + i as i32, y);
        let a = s[3];
        if a < 65535 {
            transparent.store(true, Ordering::Relaxed);
        }

        if a == 0 {
            continue;
        }
        match ccf {
            None => {
                for k in 0..4 {
                    d[k] = s[k] as f32 / 65535.0;
                }
            }
            Some(ccf) if a == 65535 => {
                if let Some(lut) = lut {
                    for k in 0..3 {
                        d[k] = lut[s[k] as usize];
                    }
                } else {
                    for k in 0..3 {
                        d[k] = s[k] as f32 / 65535.0;
                    }
                    ccf.convert(&mut d[..3]);
                }
                d[3] = 1.0;
            }
            Some(ccf) => {
                // Partial transparency: unassociate before decoding. The
                // table would not be accurate here; these values do not
                // appear in it exactly.
                d[3] = a as f32;
                for k in 0..3 {
                    d[k] = s[k] as f32 / d[3];
                }
                d[3] /= 65535.0;
                ccf.convert(&mut d[..3]);
                for k in 0..3 {
                    d[k] *= d[3];
                }
            }
        }
    }
}

fn convert_gray(v: f32, ccf: Ccf<'_>) -> f32 {
    let Some(ccf) = ccf else { return v };
    if ccf.flags().whole_pixels {
        let mut t = [v, v, v];
        ccf.convert(&mut t);
        t[0]
    } else {
        let mut t = [v];
        ccf.convert(&mut t);
        t[0]
    }
}
