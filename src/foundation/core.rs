use crate::foundation::error::{SpotMergeError, SpotMergeResult};

pub use kurbo::Rect;

/// Document geometry is expressed in 96-dpi units; raster sizing converts
/// from these units to pixels at the target resolution.
pub const DOCUMENT_UNITS_PER_INCH: f64 = 96.0;

/// A process-color value with four CMYK channels, each normalized to [0, 1].
///
/// `repr(C)` + `Pod` so tables of colors can be viewed as raw texel bytes
/// for texture upload without copies.
#[repr(C)]
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    bytemuck::Pod,
    bytemuck::Zeroable,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct ProcessColor {
    /// Cyan.
    pub c: f32,
    /// Magenta.
    pub m: f32,
    /// Yellow.
    pub y: f32,
    /// Black (key).
    pub k: f32,
}

impl ProcessColor {
    /// Unmarked paper: all four channels at zero.
    pub const WHITE: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a process color from channel values.
    pub const fn new(c: f32, m: f32, y: f32, k: f32) -> Self {
        Self { c, m, y, k }
    }

    /// Channel values in CMYK order.
    pub const fn to_array(self) -> [f32; 4] {
        [self.c, self.m, self.y, self.k]
    }

    /// Build from channel values in CMYK order.
    pub const fn from_array(ch: [f32; 4]) -> Self {
        Self::new(ch[0], ch[1], ch[2], ch[3])
    }
}

/// Target process color space of a render or encode operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ColorSpace {
    /// Device CMYK, 4 channels, 8 bits per channel in raster buffers.
    DeviceCmyk,
}

impl ColorSpace {
    /// Bytes per pixel in an 8-bit raster buffer of this space.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::DeviceCmyk => 4,
        }
    }

    /// Number of color channels.
    pub const fn channels(self) -> u32 {
        match self {
            Self::DeviceCmyk => 4,
        }
    }
}

/// Validated output raster dimensions for one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RasterDims {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl RasterDims {
    /// Compute raster dimensions for a page of `width` x `height` 96-dpi
    /// units at `dpi`, rounding to the nearest pixel.
    ///
    /// Rounding (rather than truncating) keeps fractional unit-to-pixel
    /// ratios from systematically under-sizing the raster. Non-finite or
    /// non-positive inputs, and any result that rounds to zero pixels, are
    /// rejected.
    pub fn of(width: f64, height: f64, dpi: f64) -> SpotMergeResult<Self> {
        if !dpi.is_finite() || dpi <= 0.0 {
            return Err(SpotMergeError::geometry(format!(
                "target resolution must be finite and positive, got {dpi}"
            )));
        }
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return Err(SpotMergeError::geometry(format!(
                "page content size must be finite and positive, got {width}x{height}"
            )));
        }

        let w = (width / DOCUMENT_UNITS_PER_INCH * dpi).round();
        let h = (height / DOCUMENT_UNITS_PER_INCH * dpi).round();
        if w < 1.0 || h < 1.0 || w > f64::from(u32::MAX) || h > f64::from(u32::MAX) {
            return Err(SpotMergeError::geometry(format!(
                "page rasterizes to a degenerate {w}x{h} pixel grid at {dpi} dpi"
            )));
        }

        Ok(Self {
            width: w as u32,
            height: h as u32,
        })
    }

    /// Row stride in bytes for an 8-bit buffer in `space`.
    pub const fn stride_bytes(self, space: ColorSpace) -> usize {
        self.width as usize * space.bytes_per_pixel()
    }

    /// Total buffer size in bytes for an 8-bit buffer in `space`.
    pub const fn buffer_len(self, space: ColorSpace) -> usize {
        self.stride_bytes(space) * self.height as usize
    }
}
