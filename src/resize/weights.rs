//! Precomputed sparse weight lists for one resampling axis.
//!
//! A weight list is a flat ordered sequence of (source sample, destination
//! sample, weight) triples. Entries for a destination sample are contiguous
//! and normalized to sum to one; destination samples with no contributing
//! source sample are omitted entirely and their output stays zero.

use crate::filter::Filter;

/// Out-of-bounds handling for samples beyond the source edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VirtualPixels {
    /// Out-of-bounds samples contribute nothing at all.
    #[default]
    None,
    /// Out-of-bounds samples count as fully transparent: they take part in
    /// weight normalization but are skipped when the weights are applied.
    Transparent,
}

/// One triple of the sparse resampling matrix. A `src` of -1 marks a virtual
/// out-of-bounds sample that was only needed for normalization.
#[derive(Clone, Copy, Debug)]
pub struct Weight {
    pub src: i32,
    pub dst: i32,
    pub weight: f32,
}

/// How one axis of the source maps onto the target canvas.
#[derive(Clone, Copy, Debug)]
pub struct AxisMapping {
    /// Number of samples along the axis of the target canvas.
    pub canvas_len: usize,
    /// Length, in canvas samples, that the source actually maps onto. Equals
    /// `canvas_len` unless an advanced mapping was configured; may be
    /// fractional.
    pub target_len: f64,
    /// Offset of the mapped source start within the canvas, in samples.
    pub offset: f64,
}

impl AxisMapping {
    /// Source mapped exactly onto the canvas.
    pub fn simple(canvas_len: usize) -> AxisMapping {
        AxisMapping {
            canvas_len,
            target_len: canvas_len as f64,
            offset: 0.0,
        }
    }

    pub fn scale_factor(&self, src_len: usize) -> f64 {
        self.target_len / src_len as f64
    }
}

/// Builds the weight list for one axis.
pub fn build_weight_list(
    src_len: usize,
    mapping: AxisMapping,
    filter: &dyn Filter,
    blur: f64,
    virtual_pixels: VirtualPixels,
) -> Vec<Weight> {
    let src_n = src_len as f64;
    let target_n = mapping.target_len;
    let scale = target_n / src_n;

    // Width of one source sample as seen from a target sample.
    let mut reduction = if target_n < src_n { src_n / target_n } else { 1.0 };
    reduction *= blur;
    let span = filter.radius(scale) * reduction;
    let asymmetric = filter.is_asymmetric(scale);

    let cap = ((1.01 + 2.0 * span) * mapping.canvas_len as f64) as usize + 2;
    let mut list: Vec<Weight> = Vec::with_capacity(cap);

    for d in 0..mapping.canvas_len {
        // Fractional centre of this target sample in source coordinates.
        let pos = ((d as f64 + 0.5 - mapping.offset) / target_n) * src_n - 0.5;
        // The epsilons tolerate float drift at exact-integer boundaries.
        let first = (pos - span - 1e-4).ceil() as i64;
        let last = (pos + span + 1e-4).floor() as i64;

        let group_start = list.len();
        let mut sum = 0.0f64;

        for s in first..=last {
            let in_bounds = s >= 0 && s < src_len as i64;
            if !in_bounds && virtual_pixels == VirtualPixels::None {
                continue;
            }

            let mut arg = (s as f64 - pos) / reduction;
            if !asymmetric && arg < 0.0 {
                arg = -arg;
            }
            let v = filter.value(arg, scale);
            if v == 0.0 {
                continue;
            }
            sum += v;
            list.push(Weight {
                src: if in_bounds { s as i32 } else { -1 },
                dst: d as i32,
                weight: v as f32,
            });
        }

        if list.len() == group_start {
            continue;
        }
        if sum.abs() < 1e-6 {
            // Shouldn't happen with a sane filter; protects the division.
            sum = 1e-6;
        }
        for e in &mut list[group_start..] {
            e.weight /= sum as f32;
        }
    }

    list
}

/// Per-destination contiguous ranges into a weight list, for passes that
/// walk one destination lane group at a time.
pub(crate) fn dst_ranges(list: &[Weight], canvas_len: usize) -> Vec<std::ops::Range<usize>> {
    let mut ranges = vec![0..0; canvas_len];
    let mut i = 0;
    while i < list.len() {
        let d = list[i].dst as usize;
        let start = i;
        while i < list.len() && list[i].dst as usize == d {
            i += 1;
        }
        ranges[d] = start..i;
    }
    ranges
}
