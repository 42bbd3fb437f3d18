//! The resize orchestrator.
//!
//! A [`Resizer`] holds the configuration, ingests its source once, and can
//! then produce any number of resized outputs from the cached float image.
//! Per resize call it builds one weight list per axis, runs the two
//! resampling passes, and hands the result to the chosen exporter.
//!
//! # Module structure
//! - `weights`: sparse weight-list precomputation
//! - `separable`: the two parallel resampling passes

pub mod separable;
pub mod weights;

#[cfg(test)]
mod tests_basic;
#[cfg(test)]
mod tests_advanced;

use std::sync::Arc;

use crate::buffer::{FloatImage, Rect, MAX_IMAGE_PIXELS};
use crate::color::{ColorConverter, LinearToSrgb, SrgbToLinear};
use crate::error::{Error, Result};
use crate::export::{export_float, export_raster, ExportCtx};
use crate::filter::{Filter, Lanczos};
use crate::ingest::ingest;
use crate::raster::{Raster, RasterFormat};
use crate::source::Source;
use crate::threading::Workers;

pub use separable::ChannelMask;
pub use weights::{build_weight_list, AxisMapping, VirtualPixels, Weight};

use separable::{resample_horizontal, resample_vertical};

/// Returns the filter for an axis; receives whether the axis is vertical
/// and the scale factor along it.
pub type FilterGetter = Box<dyn Fn(bool, f64) -> Arc<dyn Filter> + Send + Sync>;

/// Returns the blur (filter radius multiplier) for an axis.
pub type BlurGetter = Box<dyn Fn(bool, f64) -> f64 + Send + Sync>;

/// Output selection for [`Resizer::resize_to_image`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ResizeFlags {
    /// Allow a grayscale output when the source is grayscale.
    pub gray_ok: bool,
    /// Prefer unassociated over premultiplied alpha.
    pub prefer_unassociated: bool,
    /// Prefer 16-bit over 8-bit samples.
    pub prefer_deep: bool,
}

/// Tracks the state of a resize operation. There should be one `Resizer`
/// per source image; multiple target images may be produced from it.
pub struct Resizer<'a> {
    source: Option<Source<'a>>,

    src_fp: Option<FloatImage>,
    src_has_transparency: bool,
    src_is_gray: bool,

    dst_rect: Rect,
    /// Advanced mapping points (x1, y1, x2, y2) locating the source within
    /// the target canvas.
    mapping: Option<(f64, f64, f64, f64)>,

    filter_getter: Option<FilterGetter>,
    blur_getter: Option<BlurGetter>,

    input_ccf: Option<Arc<dyn ColorConverter>>,
    input_ccf_set: bool,
    output_ccf: Option<Arc<dyn ColorConverter>>,
    output_ccf_set: bool,

    virtual_pixels: VirtualPixels,
    virtual_pixels_set: bool,

    max_workers: usize,
    progress: Option<Box<dyn Fn(&str) + Send + Sync>>,

    has_transparency: bool,
}

impl Default for Resizer<'_> {
    fn default() -> Self {
        Resizer {
            source: None,
            src_fp: None,
            src_has_transparency: false,
            src_is_gray: false,
            dst_rect: Rect::default(),
            mapping: None,
            filter_getter: None,
            blur_getter: None,
            input_ccf: None,
            input_ccf_set: false,
            output_ccf: None,
            output_ccf_set: false,
            virtual_pixels: VirtualPixels::None,
            virtual_pixels_set: false,
            max_workers: 0,
            progress: None,
            has_transparency: false,
        }
    }
}

impl<'a> Resizer<'a> {
    pub fn new() -> Resizer<'a> {
        Resizer::default()
    }

    /// Sets the image to read. The reference is only held until the first
    /// resize ingests it; after that only the internal float copy remains.
    pub fn set_source(&mut self, source: Source<'a>) {
        self.source = Some(source);
        self.src_fp = None;
        self.src_has_transparency = false;
        self.src_is_gray = false;
    }

    /// Sets the size and origin of the resized image. The source maps
    /// exactly onto this rectangle.
    pub fn set_target_bounds(&mut self, rect: Rect) {
        self.dst_rect = rect;
        self.mapping = None;
    }

    /// Sets the target rectangle together with two points locating the
    /// source corners within it, which may be fractional. If the mapped
    /// region does not cover the whole canvas, the uncovered canvas becomes
    /// fully transparent (unless a virtual-pixel mode was set explicitly).
    pub fn set_target_bounds_advanced(
        &mut self,
        rect: Rect,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    ) {
        self.dst_rect = rect;
        self.mapping = Some((x1, y1, x2, y2));
    }

    /// Sets the filter used for both axes. If never called, Lanczos-2 is
    /// used.
    pub fn set_filter(&mut self, filter: Arc<dyn Filter>) {
        self.filter_getter = Some(Box::new(move |_, _| filter.clone()));
    }

    pub fn set_filter_getter(&mut self, getter: FilterGetter) {
        self.filter_getter = Some(getter);
    }

    /// Sets the blur. The default is 1.0; larger values blur more.
    pub fn set_blur(&mut self, blur: f64) {
        self.blur_getter = Some(Box::new(move |_, _| blur));
    }

    pub fn set_blur_getter(&mut self, getter: BlurGetter) {
        self.blur_getter = Some(getter);
    }

    /// Sets the converter applied to source samples at ingest, or `None`
    /// for no conversion. The default is sRGB to linear. Once a source has
    /// been ingested the setting has no further effect: the cached float
    /// image was produced under the converter active at ingest time.
    pub fn set_input_converter(&mut self, ccf: Option<Arc<dyn ColorConverter>>) {
        self.input_ccf = ccf;
        self.input_ccf_set = true;
    }

    /// Sets the converter applied when exporting, or `None` for no
    /// conversion. The default is linear to sRGB.
    pub fn set_output_converter(&mut self, ccf: Option<Arc<dyn ColorConverter>>) {
        self.output_ccf = ccf;
        self.output_ccf_set = true;
    }

    pub fn set_virtual_pixels(&mut self, mode: VirtualPixels) {
        self.virtual_pixels = mode;
        self.virtual_pixels_set = true;
    }

    /// Caps the number of parallel workers. 0 (the default) means "as many
    /// as the machine has"; the cap is floored at 1.
    pub fn set_max_workers(&mut self, cap: usize) {
        self.max_workers = cap;
    }

    /// Installs an observational callback invoked with a message at phase
    /// boundaries (ingest, each resampling pass, export).
    pub fn set_progress<F: Fn(&str) + Send + Sync + 'static>(&mut self, callback: F) {
        self.progress = Some(Box::new(callback));
    }

    /// Whether the (last) resized image carries meaningful transparency:
    /// the source had any, or transparent virtual pixels were in effect.
    pub fn has_transparency(&self) -> bool {
        self.has_transparency
    }

    fn progress_msg(&self, msg: &str) {
        log::debug!("{msg}");
        if let Some(cb) = &self.progress {
            cb(msg);
        }
    }

    /// Target canvas dimensions; a degenerate rectangle is grown to 1x1.
    fn canvas_dims(&self) -> (usize, usize) {
        (
            self.dst_rect.width().max(1) as usize,
            self.dst_rect.height().max(1) as usize,
        )
    }

    /// Runs the two resampling passes over the cached (or freshly ingested)
    /// float source, returning the linear-light premultiplied result with
    /// the target rectangle stamped on.
    fn run(&mut self, workers: &Workers) -> Result<FloatImage> {
        let (dst_w, dst_h) = self.canvas_dims();
        if (dst_w as u64) * (dst_h as u64) > MAX_IMAGE_PIXELS {
            // Checked before ingest so an oversized target never triggers
            // the (possibly expensive) source conversion.
            return Err(Error::TargetTooLarge);
        }

        if !self.input_ccf_set {
            self.set_input_converter(Some(Arc::new(SrgbToLinear)));
        }
        if !self.output_ccf_set {
            self.set_output_converter(Some(Arc::new(LinearToSrgb)));
        }

        if self.src_fp.is_none() {
            let source = match self.source.take() {
                Some(s) => s,
                None => panic!("resize called without a source image"),
            };
            self.progress_msg("Converting source image to float format");
            // The external reference is kept until ingest succeeds, then
            // dropped; only the float copy survives.
            let ingested = match ingest(&source, self.input_ccf.as_ref(), workers) {
                Ok(i) => i,
                Err(e) => {
                    self.source = Some(source);
                    return Err(e);
                }
            };
            self.src_has_transparency = ingested.has_transparency;
            self.src_is_gray = ingested.is_gray;
            self.src_fp = Some(ingested.image);
        }

        let (x1, y1, x2, y2) = self
            .mapping
            .unwrap_or((0.0, 0.0, dst_w as f64, dst_h as f64));
        if self.mapping.is_some() && !self.virtual_pixels_set {
            let covered = x1 <= 0.0 && y1 <= 0.0 && x2 >= dst_w as f64 && y2 >= dst_h as f64;
            if !covered {
                self.virtual_pixels = VirtualPixels::Transparent;
            }
        }
        self.has_transparency =
            self.src_has_transparency || self.virtual_pixels == VirtualPixels::Transparent;

        let src = match self.src_fp.as_ref() {
            Some(im) => im,
            None => unreachable!(),
        };
        let mask = ChannelMask::new(!self.src_is_gray, self.has_transparency);
        let h_mapping = AxisMapping { canvas_len: dst_w, target_len: x2 - x1, offset: x1 };
        let v_mapping = AxisMapping { canvas_len: dst_h, target_len: y2 - y1, offset: y1 };

        // When widening, the row-strided height pass runs while the image
        // is still narrow; when shrinking, the width pass shrinks it first.
        // Cache behaviour only; the output does not depend on the order.
        let mut dst = if dst_w > src.width() {
            let mid = self.run_pass(src, true, dst_h, v_mapping, mask, workers)?;
            self.run_pass(&mid, false, dst_w, h_mapping, mask, workers)?
        } else {
            let mid = self.run_pass(src, false, dst_w, h_mapping, mask, workers)?;
            self.run_pass(&mid, true, dst_h, v_mapping, mask, workers)?
        };

        dst.rect = Rect::new(
            self.dst_rect.x0,
            self.dst_rect.y0,
            self.dst_rect.x0 + dst_w as i32,
            self.dst_rect.y0 + dst_h as i32,
        );
        Ok(dst)
    }

    fn run_pass(
        &self,
        src: &FloatImage,
        vertical: bool,
        dst_len: usize,
        mapping: AxisMapping,
        mask: ChannelMask,
        workers: &Workers,
    ) -> Result<FloatImage> {
        let src_len = if vertical { src.height() } else { src.width() };
        let scale = mapping.scale_factor(src_len);

        let filter: Arc<dyn Filter> = match &self.filter_getter {
            Some(getter) => getter(vertical, scale),
            None => Arc::new(Lanczos::new(2)),
        };
        let blur = match &self.blur_getter {
            Some(getter) => getter(vertical, scale),
            None => 1.0,
        };

        self.progress_msg(if vertical { "Resizing height" } else { "Resizing width" });
        let weights =
            build_weight_list(src_len, mapping, filter.as_ref(), blur, self.virtual_pixels);
        if vertical {
            resample_vertical(src, dst_len, &weights, mask, workers)
        } else {
            resample_horizontal(src, dst_len, &weights, mask, workers)
        }
    }

    fn export_ctx(&self) -> ExportCtx<'_> {
        ExportCtx {
            ccf: self.output_ccf.as_ref(),
            has_transparency: self.has_transparency,
            has_color: !self.src_is_gray,
        }
    }

    /// Performs the resize and returns the internal float image:
    /// unassociated alpha, clamped, output colourspace.
    pub fn resize(&mut self) -> Result<FloatImage> {
        let workers = Workers::new(self.max_workers);
        let mut dst = self.run(&workers)?;
        self.progress_msg("Post-processing image");
        export_float(&mut dst, &self.export_ctx(), &workers);
        Ok(dst)
    }

    fn resize_to_raster(&mut self, format: RasterFormat) -> Result<Raster> {
        let workers = Workers::new(self.max_workers);
        let dst = self.run(&workers)?;
        self.progress_msg("Converting to target format");
        Ok(export_raster(dst, format, &self.export_ctx(), &workers))
    }

    /// Resizes to 8-bit unassociated RGBA.
    pub fn resize_to_nrgba8(&mut self) -> Result<Raster> {
        self.resize_to_raster(RasterFormat::Nrgba8)
    }

    /// Resizes to 8-bit premultiplied RGBA.
    pub fn resize_to_rgba8(&mut self) -> Result<Raster> {
        self.resize_to_raster(RasterFormat::Rgba8Pre)
    }

    /// Resizes to 16-bit unassociated RGBA (big-endian samples).
    pub fn resize_to_nrgba16(&mut self) -> Result<Raster> {
        self.resize_to_raster(RasterFormat::Nrgba16)
    }

    /// Resizes to 16-bit premultiplied RGBA (big-endian samples).
    pub fn resize_to_rgba16(&mut self) -> Result<Raster> {
        self.resize_to_raster(RasterFormat::Rgba16Pre)
    }

    /// Resizes to 8-bit grayscale. Only sensible for grayscale sources.
    pub fn resize_to_gray8(&mut self) -> Result<Raster> {
        self.resize_to_raster(RasterFormat::Gray8)
    }

    /// Resizes to 16-bit grayscale (big-endian samples).
    pub fn resize_to_gray16(&mut self) -> Result<Raster> {
        self.resize_to_raster(RasterFormat::Gray16)
    }

    /// Resizes and picks the output format from the flags and what is known
    /// about the image: gray sources may stay gray, transparent images get
    /// an alpha format (premultiplied unless unassociated is preferred).
    pub fn resize_to_image(&mut self, flags: ResizeFlags) -> Result<Raster> {
        let workers = Workers::new(self.max_workers);
        let dst = self.run(&workers)?;
        let format = if flags.gray_ok && self.src_is_gray && !self.has_transparency {
            if flags.prefer_deep {
                RasterFormat::Gray16
            } else {
                RasterFormat::Gray8
            }
        } else if self.has_transparency && !flags.prefer_unassociated {
            if flags.prefer_deep {
                RasterFormat::Rgba16Pre
            } else {
                RasterFormat::Rgba8Pre
            }
        } else if flags.prefer_deep {
            RasterFormat::Nrgba16
        } else {
            RasterFormat::Nrgba8
        };
        self.progress_msg("Converting to target format");
        Ok(export_raster(dst, format, &self.export_ctx(), &workers))
    }
}
