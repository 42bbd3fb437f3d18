//! Source image variants consumed by the ingester.
//!
//! The ingester dispatches on the concrete storage of the source so each row
//! can take a specialised fast path; anything it does not recognise goes
//! through the universal [`SourcePixels`] capability, which reads one pixel
//! at a time as 16-bit premultiplied samples.

use image::{DynamicImage, GenericImageView};

use crate::buffer::{float_to_u16_clamped, FloatImage, Rect};

/// Minimal capability every source satisfies: bounds plus per-pixel reads
/// returning 16-bit **premultiplied** R,G,B,A samples.
pub trait SourcePixels: Sync {
    fn bounds(&self) -> Rect;

    /// Premultiplied 16-bit samples of the pixel at (x, y), coordinates in
    /// the bounds' coordinate system.
    fn rgba16(&self, x: i32, y: i32) -> [u16; 4];
}

/// Chroma subsampling layout of a Y'CbCr source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum YCbCrSampling {
    /// Full chroma resolution.
    Ratio444,
    /// Chroma halved horizontally.
    Ratio422,
    /// Chroma halved in both directions.
    Ratio420,
}

/// Borrowed Y'CbCr planes, as produced by a JPEG decoder.
#[derive(Clone, Copy, Debug)]
pub struct YCbCrPlanes<'a> {
    pub y: &'a [u8],
    pub cb: &'a [u8],
    pub cr: &'a [u8],
    pub y_stride: usize,
    pub c_stride: usize,
    pub sampling: YCbCrSampling,
}

impl YCbCrPlanes<'_> {
    #[inline]
    pub fn y_offset(&self, x: usize, y: usize) -> usize {
        y * self.y_stride + x
    }

    #[inline]
    pub fn c_offset(&self, x: usize, y: usize) -> usize {
        match self.sampling {
            YCbCrSampling::Ratio444 => y * self.c_stride + x,
            YCbCrSampling::Ratio422 => y * self.c_stride + x / 2,
            YCbCrSampling::Ratio420 => (y / 2) * self.c_stride + x / 2,
        }
    }
}

/// Full-range BT.601 conversion of one Y'CbCr sample to 8-bit RGB.
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let r = y + 1.402 * cr;
    let g = y - 0.344136 * cb - 0.714136 * cr;
    let b = y + 1.772 * cb;
    [
        (r + 0.5).clamp(0.0, 255.0) as u8,
        (g + 0.5).clamp(0.0, 255.0) as u8,
        (b + 0.5).clamp(0.0, 255.0) as u8,
    ]
}

/// A source image in one of the storage variants the ingester knows how to
/// read quickly, or the generic fallback.
pub enum Source<'a> {
    /// 8-bit unassociated RGBA, 4 bytes per pixel.
    Nrgba8 { pix: &'a [u8], stride: usize, rect: Rect },
    /// 8-bit premultiplied RGBA, 4 bytes per pixel.
    Rgba8Pre { pix: &'a [u8], stride: usize, rect: Rect },
    /// 8-bit Y'CbCr planes (always opaque).
    YCbCr8 { planes: YCbCrPlanes<'a>, rect: Rect },
    /// 8-bit grayscale, 1 byte per pixel.
    Gray8 { pix: &'a [u8], stride: usize, rect: Rect },
    /// 16-bit grayscale, 1 sample per pixel.
    Gray16 { pix: &'a [u16], stride: usize, rect: Rect },
    /// Anything else, read pixel by pixel.
    Generic(&'a dyn SourcePixels),
}

impl<'a> Source<'a> {
    pub fn bounds(&self) -> Rect {
        match self {
            Source::Nrgba8 { rect, .. }
            | Source::Rgba8Pre { rect, .. }
            | Source::YCbCr8 { rect, .. }
            | Source::Gray8 { rect, .. }
            | Source::Gray16 { rect, .. } => *rect,
            Source::Generic(src) => src.bounds(),
        }
    }

    /// Whether the storage itself guarantees a grayscale image.
    pub fn is_gray(&self) -> bool {
        matches!(self, Source::Gray8 { .. } | Source::Gray16 { .. })
    }

    /// Whether the storage itself guarantees a fully opaque image.
    pub fn is_opaque(&self) -> bool {
        matches!(
            self,
            Source::YCbCr8 { .. } | Source::Gray8 { .. } | Source::Gray16 { .. }
        )
    }

    /// Picks the best matching variant for a decoded [`DynamicImage`].
    /// Tightly packed 8-bit RGBA and 8/16-bit grayscale buffers are borrowed
    /// directly; every other layout goes through the generic per-pixel path.
    pub fn from_dynamic(img: &'a DynamicImage) -> Source<'a> {
        let (w, h) = img.dimensions();
        let rect = Rect::of_size(w as i32, h as i32);
        match img {
            DynamicImage::ImageRgba8(buf) => Source::Nrgba8 {
                pix: buf.as_raw(),
                stride: w as usize * 4,
                rect,
            },
            DynamicImage::ImageLuma8(buf) => Source::Gray8 {
                pix: buf.as_raw(),
                stride: w as usize,
                rect,
            },
            DynamicImage::ImageLuma16(buf) => Source::Gray16 {
                pix: buf.as_raw(),
                stride: w as usize,
                rect,
            },
            _ => Source::Generic(img),
        }
    }
}

#[inline]
fn premultiply16(v: u16, a: u16) -> u16 {
    ((v as u32 * a as u32) / 65535) as u16
}

/// Generic capability for any decoded image. 8-bit samples are widened with
/// the usual `* 257` replication; everything is premultiplied on the way
/// out, matching the trait contract.
impl SourcePixels for DynamicImage {
    fn bounds(&self) -> Rect {
        let (w, h) = self.dimensions();
        Rect::of_size(w as i32, h as i32)
    }

    fn rgba16(&self, x: i32, y: i32) -> [u16; 4] {
        let (x, y) = (x as u32, y as u32);
        let [r, g, b, a] = match self {
            DynamicImage::ImageRgb16(buf) => {
                let p = buf.get_pixel(x, y).0;
                [p[0], p[1], p[2], 65535]
            }
            DynamicImage::ImageRgba16(buf) => buf.get_pixel(x, y).0,
            DynamicImage::ImageLuma16(buf) => {
                let p = buf.get_pixel(x, y).0;
                [p[0], p[0], p[0], 65535]
            }
            DynamicImage::ImageLumaA16(buf) => {
                let p = buf.get_pixel(x, y).0;
                [p[0], p[0], p[0], p[1]]
            }
            _ => {
                let p = self.get_pixel(x, y).0;
                [
                    p[0] as u16 * 257,
                    p[1] as u16 * 257,
                    p[2] as u16 * 257,
                    p[3] as u16 * 257,
                ]
            }
        };
        [
            premultiply16(r, a),
            premultiply16(g, a),
            premultiply16(b, a),
            a,
        ]
    }
}

/// A resized float image can itself be resampled again through the generic
/// path. Samples are unassociated post-export floats; reads premultiply and
/// clamp on the way out.
impl SourcePixels for FloatImage {
    fn bounds(&self) -> Rect {
        self.rect
    }

    fn rgba16(&self, x: i32, y: i32) -> [u16; 4] {
        let x = (x - self.rect.x0) as usize;
        let y = (y - self.rect.y0) as usize;
        let [r, g, b, a] = self.pixel(x, y);
        let a16 = float_to_u16_clamped(a, 65535);
        [
            float_to_u16_clamped(r * a, a16),
            float_to_u16_clamped(g * a, a16),
            float_to_u16_clamped(b * a, a16),
            a16,
        ]
    }
}
