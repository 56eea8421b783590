//! Spotmerge rasterizes paginated documents to process CMYK while merging
//! named spot colorants through a programmable post-process stage.
//!
//! The pipeline is built from immutable artifacts plus a per-page loop:
//!
//! - Build a [`SpotLut`] per colorant and upload each as a texture
//! - Load a compiled fragment shader with [`load_fragment_shader`]
//! - Bind colorants, textures, and the shader into a [`SpotMergeSpec`]
//! - Drive pages with a [`RasterSession`], which sizes each raster, invokes
//!   the rendering service, and streams scanlines into a [`ScanlineSink`]
//!
//! Document access, rendering, and image encoding are trait boundaries;
//! [`CpuRenderService`] and [`TiffSink`] are the bundled reference
//! implementations.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod doc;
pub mod encode;
mod foundation;
pub mod merge;
pub mod render;
pub mod session;

pub use crate::foundation::core::{ColorSpace, ProcessColor, RasterDims, Rect};
pub use crate::foundation::error::{SpotMergeError, SpotMergeResult};

pub use crate::doc::assembly::{Assembly, Document, InMemoryAssembly, InMemoryDocument, Page};
pub use crate::doc::model::{PageContent, SpotFill};
pub use crate::encode::sink::{
    CapturedPage, InMemorySink, InMemorySinkFactory, OutputPattern, ScanlineSink, SinkConfig,
    SinkFactory, encode_raster,
};
pub use crate::encode::tiff::{TiffSink, TiffSinkFactory};
pub use crate::merge::lut::{LUT_SIZE, SpotLut, cyan_yellow_ramp, white_green_red_ramp};
pub use crate::merge::shader::load_fragment_shader;
pub use crate::merge::spec::{MAX_SPOTS_PER_PASS, SpotBinding, SpotMergeSpec};
pub use crate::render::cpu::CpuRenderService;
pub use crate::render::service::{RenderService, RenderSpec, ShaderHandle, TextureHandle};
pub use crate::session::driver::{RasterSession, RasterSessionOpts, RenderStats};
