//! The rendering service trait boundary and texture handle types.

use crate::doc::model::PageContent;
use crate::foundation::core::{ColorSpace, Rect};
use crate::foundation::error::SpotMergeResult;
use crate::merge::spec::SpotMergeSpec;

/// Handle to a texture resource owned by a rendering service.
///
/// Handles are plain ids; the resource itself lives inside the service that
/// minted it and is released when the service is dropped. That ordering is
/// structural: no handle can keep a texture alive past its service, and the
/// service tears down its resources exactly once, on any exit path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(u32);

impl TextureHandle {
    /// Build a handle from a raw service-assigned id.
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// The raw service-assigned id.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Handle to a compiled fragment-shader program owned by a rendering service.
///
/// Same ownership model as [`TextureHandle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderHandle(u32);

impl ShaderHandle {
    /// Build a handle from a raw service-assigned id.
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// The raw service-assigned id.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Per-page render request.
///
/// Built fresh for every page, borrows the page's raster buffer for the
/// duration of one render call and is discarded afterwards. The buffer and
/// spec must not be touched concurrently with an in-flight render.
#[derive(Debug)]
pub struct RenderSpec<'a> {
    /// Target raster width in pixels.
    pub width: u32,
    /// Target raster height in pixels.
    pub height: u32,
    /// Source rectangle in document units (normally the full page extent).
    pub source_rect: Rect,
    /// Target process color space.
    pub process_space: ColorSpace,
    /// Destination buffer of at least `row_stride * height` bytes.
    pub buffer: &'a mut [u8],
    /// Row stride in bytes; at least `width * bytes_per_pixel`.
    pub row_stride: usize,
    /// Post-process merge stages applied during composition, in order.
    pub post_processes: &'a [SpotMergeSpec],
}

/// Rendering service boundary.
///
/// Resource creation (`upload_image`, `create_fragment_shader`) happens in a
/// setup phase and takes `&mut self`; rendering takes `&self`, so a fully
/// set-up service can be shared read-only across sequential page loops or
/// parallel page tasks.
pub trait RenderService: Sync {
    /// Upload an image resource and return its handle.
    ///
    /// `bytes` holds `width * height * channels` texels at `bits_per_channel`
    /// bits each. Upload failure is fatal to the run.
    fn upload_image(
        &mut self,
        bytes: &[u8],
        channels: u32,
        width: u32,
        height: u32,
        bits_per_channel: u32,
    ) -> SpotMergeResult<TextureHandle>;

    /// Compile a fragment-shader program from its binary form.
    fn create_fragment_shader(&mut self, bytes: &[u8]) -> SpotMergeResult<ShaderHandle>;

    /// Render `content` into the buffer described by `spec`.
    ///
    /// Synchronous; a failure has no partial-success state and must abort the
    /// caller's run.
    fn render(&self, content: &PageContent, spec: &mut RenderSpec<'_>) -> SpotMergeResult<()>;
}
