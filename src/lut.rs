//! Lookup tables for colour conversion.
//!
//! Tables are built by feeding an arithmetic ramp through a converter, and
//! only when the work they will speed up is large enough to amortize the
//! build. Converters that mix channels (`whole_pixels`) or opt out
//! (`no_cache`) are never tabulated. Tables live for a single ingest or
//! export and are dropped afterwards.

use std::sync::Arc;

use crate::color::ColorConverter;

/// Length of the output conversion tables, `ceil(255 * 12.92 * 3) + 1`.
///
/// The sRGB curve's slope near black is 12.92, so a table needs at least
/// around 256 * 12.92 entries for every 8-bit output value to be reachable;
/// the factor of 3 makes the dark values almost always round correctly.
/// Non-sRGB output curves with steeper slopes would need more.
pub const OUTPUT_LUT_LEN: usize = 9885;

/// Below this destination pixel count an output table costs more than it
/// saves.
pub const OUTPUT_LUT_MIN_PIXELS: u64 = 16384;

fn cacheable(ccf: Option<&Arc<dyn ColorConverter>>) -> Option<&Arc<dyn ColorConverter>> {
    let ccf = ccf?;
    let flags = ccf.flags();
    if flags.no_cache || flags.whole_pixels {
        return None;
    }
    Some(ccf)
}

/// Ramp `[0/(n-1), 1/(n-1), ..., 1]` passed through the converter.
fn converted_ramp(ccf: &Arc<dyn ColorConverter>, len: usize) -> Vec<f32> {
    let mut tbl: Vec<f32> = (0..len).map(|i| i as f32 / (len - 1) as f32).collect();
    ccf.convert(&mut tbl);
    tbl
}

/// Table mapping an integer sample in `0..len` to a converted float sample.
/// Used at ingest with `len` 256 or 65536. Skipped when the source is too
/// small for the build to pay off across the worker pool.
pub fn input_lut(
    ccf: Option<&Arc<dyn ColorConverter>>,
    len: usize,
    src_pixels: u64,
    num_workers: usize,
) -> Option<Vec<f32>> {
    let ccf = cacheable(ccf)?;
    if src_pixels < (len as u64 / 4) * num_workers as u64 {
        return None;
    }
    Some(converted_ramp(ccf, len))
}

/// Table mapping a clamped float sample (scaled to `0..len`) to a converted
/// float sample. Used when the pipeline still has to premultiply after
/// conversion, for which byte precision would be insufficient.
pub fn output_lut_f32(
    ccf: Option<&Arc<dyn ColorConverter>>,
    len: usize,
    dst_pixels: u64,
) -> Option<Vec<f32>> {
    let ccf = cacheable(ccf)?;
    if dst_pixels < OUTPUT_LUT_MIN_PIXELS {
        return None;
    }
    Some(converted_ramp(ccf, len))
}

/// Table mapping a clamped float sample (scaled to `0..len`) directly to an
/// output byte.
pub fn output_lut_u8(
    ccf: Option<&Arc<dyn ColorConverter>>,
    len: usize,
    dst_pixels: u64,
) -> Option<Vec<u8>> {
    let ccf = cacheable(ccf)?;
    if dst_pixels < OUTPUT_LUT_MIN_PIXELS {
        return None;
    }
    // Of the 256 available target values we really want the one nearest in
    // *linear* light; converting first and rounding in the target space can
    // leave a small share of samples one shade off, which is below the
    // visible threshold at 8 bits.
    Some(
        converted_ramp(ccf, len)
            .into_iter()
            .map(|v| (v * 255.0 + 0.5) as u8)
            .collect(),
    )
}

/// Index of the table entry for a clamped sample in [0,1].
#[inline]
pub fn lut_index(sample: f32, len: usize) -> usize {
    (sample * (len - 1) as f32 + 0.5) as usize
}
