//! High-quality raster image resizing.
//!
//! `linscale` resizes images with a configurable separable resampling
//! filter (Lanczos-2 by default), correct alpha handling (filtering happens
//! on premultiplied samples), and correct colour handling (filtering
//! happens in linear light; sRGB decode/encode is applied at the edges of
//! the pipeline and accelerated with lookup tables when the image is large
//! enough to amortize them).
//!
//! # Usage sketch
//!
//! ```no_run
//! use linscale::{Rect, Resizer, Source};
//!
//! let decoded = image::open("in.png").unwrap();
//! let mut resizer = Resizer::new();
//! resizer.set_source(Source::from_dynamic(&decoded));
//! resizer.set_target_bounds(Rect::of_size(640, 480));
//! let out = resizer.resize_to_nrgba8().unwrap();
//! let rgba = out.to_rgba_image().unwrap();
//! rgba.save("out.png").unwrap();
//! ```
//!
//! The resizer ingests its source once; repeated resizes of the same
//! source only repeat the resampling and export stages.
//!
//! # Module structure
//! - `buffer`: the planar float image all stages work on
//! - `color`: colour converter interface and the sRGB pair
//! - `filter`: the filter interface and a catalogue of common filters
//! - `source`: source image variants and the generic per-pixel capability
//! - `resize`: weight lists, the two resampling passes, the orchestrator
//! - `raster`: byte-backed output images
//! - `error`: the two size errors

pub mod buffer;
pub mod color;
pub mod error;
pub mod filter;
pub mod raster;
pub mod resize;
pub mod source;

mod export;
mod ingest;
mod lut;
mod threading;

pub use buffer::{FloatImage, Rect, MAX_IMAGE_PIXELS};
pub use color::{ColorConverter, ConverterFlags, ConverterFn, LinearToSrgb, SrgbToLinear};
pub use error::{Error, Result};
pub use filter::{Cubic, Filter, Gaussian, Lanczos, PixelMixing, Triangle};
pub use lut::OUTPUT_LUT_LEN;
pub use raster::{Raster, RasterFormat};
pub use resize::{ResizeFlags, Resizer, VirtualPixels};
pub use source::{Source, SourcePixels, YCbCrPlanes, YCbCrSampling};
