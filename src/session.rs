//! Session-oriented page raster driver.

pub mod driver;
