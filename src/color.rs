//! Colour conversion between display and linear-light response curves.
//!
//! A converter is a pure function that rewrites a sequence of float samples
//! in place. The engine resamples in linear light, so by default input
//! samples are decoded from sRGB before filtering and re-encoded afterwards.

/// Capability flags carried by a [`ColorConverter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConverterFlags {
    /// The converter is cheap or stateful; never build a lookup table for it.
    pub no_cache: bool,
    /// The converter requires whole pixels: the sample count must be a
    /// multiple of three, in R,G,B,R,G,B,... order, because its channels may
    /// have different response curves. Such converters cannot be tabulated
    /// with a one-dimensional lookup table.
    pub whole_pixels: bool,
}

/// Rewrites a sequence of samples from one response curve to another,
/// in place.
pub trait ColorConverter: Send + Sync {
    fn convert(&self, samples: &mut [f32]);

    fn flags(&self) -> ConverterFlags {
        ConverterFlags::default()
    }
}

// Standard piecewise sRGB definition.
const SRGB_DECODE_THRESHOLD: f32 = 0.040_448_237;
const SRGB_ENCODE_THRESHOLD: f32 = 0.003_130_668_4;
const SRGB_LINEAR_SLOPE: f32 = 12.92;
const SRGB_SCALE: f32 = 1.055;
const SRGB_OFFSET: f32 = 0.055;
const SRGB_GAMMA: f32 = 2.4;

/// Convert a single sRGB sample (0-1) to linear light.
#[inline]
pub fn srgb_to_linear_single(s: f32) -> f32 {
    if s <= SRGB_DECODE_THRESHOLD {
        s / SRGB_LINEAR_SLOPE
    } else {
        ((s + SRGB_OFFSET) / SRGB_SCALE).powf(SRGB_GAMMA)
    }
}

/// Convert a single linear-light sample (0-1) to sRGB.
#[inline]
pub fn linear_to_srgb_single(s: f32) -> f32 {
    if s <= SRGB_ENCODE_THRESHOLD {
        s * SRGB_LINEAR_SLOPE
    } else {
        SRGB_SCALE * s.max(0.0).powf(1.0 / SRGB_GAMMA) - SRGB_OFFSET
    }
}

/// The standard input converter: sRGB to linear light.
#[derive(Clone, Copy, Debug, Default)]
pub struct SrgbToLinear;

impl ColorConverter for SrgbToLinear {
    fn convert(&self, samples: &mut [f32]) {
        for v in samples.iter_mut() {
            *v = srgb_to_linear_single(*v);
        }
    }
}

/// The standard output converter: linear light to sRGB.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearToSrgb;

impl ColorConverter for LinearToSrgb {
    fn convert(&self, samples: &mut [f32]) {
        for v in samples.iter_mut() {
            *v = linear_to_srgb_single(*v);
        }
    }
}

/// Adapter turning a closure into a [`ColorConverter`] with explicit flags.
pub struct ConverterFn<F> {
    f: F,
    flags: ConverterFlags,
}

impl<F: Fn(&mut [f32]) + Send + Sync> ConverterFn<F> {
    pub fn new(f: F, flags: ConverterFlags) -> ConverterFn<F> {
        ConverterFn { f, flags }
    }
}

impl<F: Fn(&mut [f32]) + Send + Sync> ColorConverter for ConverterFn<F> {
    fn convert(&self, samples: &mut [f32]) {
        (self.f)(samples)
    }

    fn flags(&self) -> ConverterFlags {
        self.flags
    }
}
