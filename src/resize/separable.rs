//! The two resampling passes.
//!
//! Each pass reads one weight list and writes a freshly allocated,
//! zero-filled float image. Work items are whole destination rows, so the
//! shared inputs are immutable for the life of the pass and every output
//! sample has exactly one writer; per-sample accumulation runs in ascending
//! source order, which keeps repeated runs byte-identical.
//!
//! Virtual-pixel entries (`src == -1`) are skipped here: their effect was
//! already absorbed into normalization when the weight list was built.

use crate::buffer::FloatImage;
use crate::error::{Error, Result};
use crate::threading::Workers;

use super::weights::{dst_ranges, Weight};

/// Which of R,G,B,A actually need resampling. Skipping the alpha lane of an
/// opaque image and the G,B lanes of a grayscale image saves up to 75% of
/// the work.
#[derive(Clone, Copy, Debug)]
pub struct ChannelMask {
    pub channels: [bool; 4],
}

impl ChannelMask {
    pub fn new(process_color: bool, process_alpha: bool) -> ChannelMask {
        ChannelMask {
            channels: [true, process_color, process_color, process_alpha],
        }
    }

    fn active(&self) -> Vec<usize> {
        (0..4).filter(|&k| self.channels[k]).collect()
    }
}

/// Resamples along the vertical axis: the destination keeps the source
/// width and gets `dst_h` rows. One destination row accumulates the source
/// rows its weight group names.
pub fn resample_vertical(
    src: &FloatImage,
    dst_h: usize,
    weights: &[Weight],
    mask: ChannelMask,
    workers: &Workers,
) -> Result<FloatImage> {
    let w = src.width();
    let mut dst = FloatImage::alloc(w, dst_h, Error::TargetTooLarge)?;
    let dst_stride = dst.stride;
    let ranges = dst_ranges(weights, dst_h);
    let channels = mask.active();

    workers.for_each_row(&mut dst.pix, dst_stride, |j, row| {
        for e in &weights[ranges[j].clone()] {
            if e.src < 0 {
                continue;
            }
            let src_row = &src.pix[e.src as usize * src.stride..][..dst_stride];
            for x in 0..w {
                let b = x * 4;
                for &k in &channels {
                    row[b + k] += e.weight * src_row[b + k];
                }
            }
        }
    });

    Ok(dst)
}

/// Resamples along the horizontal axis: the destination keeps the source
/// height and gets `dst_w` columns. Every destination row walks the whole
/// weight list once.
pub fn resample_horizontal(
    src: &FloatImage,
    dst_w: usize,
    weights: &[Weight],
    mask: ChannelMask,
    workers: &Workers,
) -> Result<FloatImage> {
    let h = src.height();
    let mut dst = FloatImage::alloc(dst_w, h, Error::TargetTooLarge)?;
    let dst_stride = dst.stride;
    let channels = mask.active();

    workers.for_each_row(&mut dst.pix, dst_stride, |j, row| {
        let src_row = &src.pix[j * src.stride..][..src.width() * 4];
        for e in weights {
            if e.src < 0 {
                continue;
            }
            let sb = e.src as usize * 4;
            let db = e.dst as usize * 4;
            for &k in &channels {
                row[db + k] += e.weight * src_row[sb + k];
            }
        }
    });

    Ok(dst)
}
