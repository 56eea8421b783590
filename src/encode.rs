//! Raster stream encoding: the scanline sink contract and the TIFF
//! implementation behind it.

pub mod sink;
pub mod tiff;
