//! Conversion from the post-resampling float image to an output raster.
//!
//! After the second pass, samples are still linear-light premultiplied and
//! may sit outside [0,1]. Post-processing converts to unassociated alpha
//! (dividing before clamping, so colours of pixels whose alpha briefly
//! overshot 1 are not distorted), clamps, re-encodes through the output
//! converter, and packs. Processing is row-parallel; the float image is
//! consumed in place since it is about to be dropped.

use std::sync::Arc;

use crate::buffer::{FloatImage, Rect};
use crate::color::ColorConverter;
use crate::lut::{lut_index, output_lut_f32, output_lut_u8, OUTPUT_LUT_LEN};
use crate::raster::{Raster, RasterFormat};
use crate::threading::Workers;

type Ccf<'c> = Option<&'c Arc<dyn ColorConverter>>;

pub(crate) struct ExportCtx<'c> {
    pub ccf: Ccf<'c>,
    /// Whether the alpha lane carries meaning for this image.
    pub has_transparency: bool,
    /// Whether the G,B lanes carry meaning (false for grayscale sources,
    /// whose lanes were never resampled).
    pub has_color: bool,
}

/// Post-resampling normalization of one row: associated alpha, linear
/// light, possibly invalid samples in; unassociated alpha, all samples
/// valid and clamped to [0,1] out.
fn post_process_row(row: &mut [f32], ctx: &ExportCtx<'_>) {
    for p in row.chunks_exact_mut(4) {
        if !ctx.has_color {
            // Only the red lane was resampled; make green and blue valid.
            p[1] = p[0];
            p[2] = p[0];
        }

        if !ctx.has_transparency {
            for k in 0..3 {
                p[k] = p[k].clamp(0.0, 1.0);
            }
            p[3] = 1.0;
            continue;
        }
        if p[3] <= 0.0 {
            p.fill(0.0);
            continue;
        }

        // Unassociate first, clamp second.
        if p[3] != 1.0 {
            for k in 0..3 {
                p[k] /= p[3];
            }
        }
        for k in 0..4 {
            p[k] = p[k].clamp(0.0, 1.0);
        }
    }
}

#[inline]
fn to_byte(v: f32) -> u8 {
    (v * 255.0 + 0.5) as u8
}

#[inline]
fn put_u16_be(d: &mut [u8], v: u16) {
    d[0] = (v >> 8) as u8;
    d[1] = (v & 0xff) as u8;
}

/// Finishes the float image itself: unassociated alpha, clamped, output
/// colourspace. Conversion is in place.
pub(crate) fn export_float(img: &mut FloatImage, ctx: &ExportCtx<'_>, workers: &Workers) {
    let stride = img.stride;
    workers.for_each_row(&mut img.pix, stride, |_, row| {
        post_process_row(row, ctx);
        let Some(ccf) = ctx.ccf else { return };
        for p in row.chunks_exact_mut(4) {
            if ctx.has_transparency && p[3] <= 0.0 {
                continue;
            }
            ccf.convert(&mut p[..3]);
        }
    });
}

/// Packs the float image into the requested raster format.
pub(crate) fn export_raster(
    mut img: FloatImage,
    format: RasterFormat,
    ctx: &ExportCtx<'_>,
    workers: &Workers,
) -> Raster {
    // An opaque premultiplied target holds the same bytes as the
    // unassociated one, and that path is somewhat faster.
    let effective = match format {
        RasterFormat::Rgba8Pre if !ctx.has_transparency => RasterFormat::Nrgba8,
        RasterFormat::Rgba16Pre if !ctx.has_transparency => RasterFormat::Nrgba16,
        other => other,
    };

    let rect = img.rect;
    let mut out = Raster::alloc(format, Rect::of_size(rect.width(), rect.height()));
    let dst_pixels = rect.pixel_count();
    let src_stride = img.stride;
    let dst_stride = out.stride;

    match effective {
        RasterFormat::Nrgba8 => {
            let lut = output_lut_u8(ctx.ccf, OUTPUT_LUT_LEN, dst_pixels);
            workers.for_each_row_pair(
                &mut img.pix,
                src_stride,
                &mut out.pix,
                dst_stride,
                |_, src, dst| row_nrgba8(src, dst, ctx, lut.as_deref()),
            );
        }
        RasterFormat::Rgba8Pre => {
            // The pipeline still premultiplies after conversion, so the
            // table must return high-precision values; bytes would lose too
            // much in the shadows.
            let lut = output_lut_f32(ctx.ccf, OUTPUT_LUT_LEN, dst_pixels);
            workers.for_each_row_pair(
                &mut img.pix,
                src_stride,
                &mut out.pix,
                dst_stride,
                |_, src, dst| row_rgba8_pre(src, dst, ctx, lut.as_deref()),
            );
        }
        RasterFormat::Nrgba16 | RasterFormat::Rgba16Pre => {
            let premultiply = effective == RasterFormat::Rgba16Pre;
            workers.for_each_row_pair(
                &mut img.pix,
                src_stride,
                &mut out.pix,
                dst_stride,
                |_, src, dst| row_rgba16(src, dst, ctx, premultiply),
            );
        }
        RasterFormat::Gray8 => {
            let lut = output_lut_u8(ctx.ccf, OUTPUT_LUT_LEN, dst_pixels);
            workers.for_each_row_pair(
                &mut img.pix,
                src_stride,
                &mut out.pix,
                dst_stride,
                |_, src, dst| row_gray8(src, dst, ctx, lut.as_deref()),
            );
        }
        RasterFormat::Gray16 => {
            workers.for_each_row_pair(
                &mut img.pix,
                src_stride,
                &mut out.pix,
                dst_stride,
                |_, src, dst| row_gray16(src, dst, ctx),
            );
        }
    }

    out.rect = rect;
    out
}

fn row_nrgba8(src: &mut [f32], dst: &mut [u8], ctx: &ExportCtx<'_>, lut: Option<&[u8]>) {
    post_process_row(src, ctx);
    for (s, d) in src.chunks_exact_mut(4).zip(dst.chunks_exact_mut(4)) {
        d[3] = if !ctx.has_transparency { 255 } else { to_byte(s[3]) };

        if let Some(ccf) = ctx.ccf {
            if d[3] > 0 {
                if let Some(lut) = lut {
                    for k in 0..3 {
                        d[k] = lut[lut_index(s[k], OUTPUT_LUT_LEN)];
                    }
                    continue;
                }
                ccf.convert(&mut s[..3]);
            }
        }
        for k in 0..3 {
            d[k] = to_byte(s[k]);
        }
    }
}

fn row_rgba8_pre(src: &mut [f32], dst: &mut [u8], ctx: &ExportCtx<'_>, lut: Option<&[f32]>) {
    post_process_row(src, ctx);
    for (s, d) in src.chunks_exact_mut(4).zip(dst.chunks_exact_mut(4)) {
        d[3] = to_byte(s[3]);

        if let Some(ccf) = ctx.ccf {
            if d[3] > 0 {
                if let Some(lut) = lut {
                    for k in 0..3 {
                        s[k] = lut[lut_index(s[k], OUTPUT_LUT_LEN)];
                    }
                } else {
                    ccf.convert(&mut s[..3]);
                }
            }
        }
        for k in 0..3 {
            d[k] = to_byte(s[k] * s[3]);
        }
    }
}

fn row_rgba16(src: &mut [f32], dst: &mut [u8], ctx: &ExportCtx<'_>, premultiply: bool) {
    post_process_row(src, ctx);
    for (s, d) in src.chunks_exact_mut(4).zip(dst.chunks_exact_mut(8)) {
        let a = if !ctx.has_transparency {
            65535
        } else {
            (s[3] * 65535.0 + 0.5) as u16
        };

        if let Some(ccf) = ctx.ccf {
            if a > 0 {
                ccf.convert(&mut s[..3]);
            }
        }
        for k in 0..3 {
            let v = if premultiply { s[k] * s[3] } else { s[k] };
            put_u16_be(&mut d[k * 2..], (v * 65535.0 + 0.5) as u16);
        }
        put_u16_be(&mut d[6..], a);
    }
}

fn row_gray8(src: &mut [f32], dst: &mut [u8], ctx: &ExportCtx<'_>, lut: Option<&[u8]>) {
    for (s, d) in src.chunks_exact(4).zip(dst.iter_mut()) {
        // Only the red lane was resampled; the little post-processing a
        // gray image needs is this clamp.
        let v = s[0].clamp(0.0, 1.0);
        *d = match (ctx.ccf, lut) {
            (Some(_), Some(lut)) => lut[lut_index(v, OUTPUT_LUT_LEN)],
            (Some(ccf), None) => to_byte(convert_gray_sample(v, ccf.as_ref())),
            (None, _) => to_byte(v),
        };
    }
}

fn row_gray16(src: &mut [f32], dst: &mut [u8], ctx: &ExportCtx<'_>) {
    for (s, d) in src.chunks_exact(4).zip(dst.chunks_exact_mut(2)) {
        let mut v = s[0].clamp(0.0, 1.0);
        if let Some(ccf) = ctx.ccf {
            v = convert_gray_sample(v, ccf.as_ref());
        }
        put_u16_be(d, (v * 65535.0 + 0.5) as u16);
    }
}

fn convert_gray_sample(v: f32, ccf: &dyn ColorConverter) -> f32 {
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
