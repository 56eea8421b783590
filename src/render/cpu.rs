//! CPU reference implementation of the rendering service.

use crate::doc::model::PageContent;
use crate::foundation::core::ColorSpace;
use crate::foundation::error::{SpotMergeError, SpotMergeResult};
use crate::merge::spec::SpotMergeSpec;
use crate::render::service::{RenderService, RenderSpec, ShaderHandle, TextureHandle};

/// Magic word opening a SPIR-V module, used to vet shader program bytes.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Render failure: the render spec's buffer, stride, or dimensions disagree.
pub const RENDER_ERR_BAD_SPEC: u32 = 1;
/// Render failure: unsupported target process color space.
pub const RENDER_ERR_COLOR_SPACE: u32 = 2;
/// Render failure: a texture or shader handle does not name a live resource.
pub const RENDER_ERR_STALE_HANDLE: u32 = 3;
/// Render failure: a merge texture is not a 256x1 four-channel LUT.
pub const RENDER_ERR_LUT_SHAPE: u32 = 4;
/// Render failure: degenerate source rectangle.
pub const RENDER_ERR_SOURCE_RECT: u32 = 5;

struct TextureResource {
    width: u32,
    height: u32,
    channels: u32,
    texels: Vec<f32>,
}

/// CPU reference implementation of the rendering service.
///
/// Textures and shader programs are owned by the service and live until it
/// is dropped, which is what lets plain-id handles stand in for them. The
/// merge pass executes the same semantics the fragment shader encodes for
/// GPU execution: each spot fill samples its slot's LUT at the fill tint and
/// the result is merged into the process channels with a multiply-style
/// composite, `out = 1 - (1 - process) * (1 - lut)`.
#[derive(Default)]
pub struct CpuRenderService {
    textures: Vec<TextureResource>,
    shaders: Vec<Vec<u8>>,
}

impl CpuRenderService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    fn texture(&self, handle: TextureHandle) -> SpotMergeResult<&TextureResource> {
        self.textures.get(handle.raw() as usize).ok_or_else(|| {
            SpotMergeError::render(
                RENDER_ERR_STALE_HANDLE,
                format!("texture handle {} does not name a live resource", handle.raw()),
            )
        })
    }

    fn require_shader(&self, handle: ShaderHandle) -> SpotMergeResult<()> {
        if self.shaders.get(handle.raw() as usize).is_none() {
            return Err(SpotMergeError::render(
                RENDER_ERR_STALE_HANDLE,
                format!("shader handle {} does not name a live program", handle.raw()),
            ));
        }
        Ok(())
    }

    fn validate_post_processes(&self, specs: &[SpotMergeSpec]) -> SpotMergeResult<()> {
        for spec in specs {
            self.require_shader(spec.shader())?;
            for binding in spec.bindings() {
                let tex = self.texture(binding.texture)?;
                if tex.width != 256 || tex.height != 1 || tex.channels != 4 {
                    return Err(SpotMergeError::render(
                        RENDER_ERR_LUT_SHAPE,
                        format!(
                            "texture for spot '{}' is {}x{}x{}, expected a 256x1 four-channel LUT",
                            binding.colorant, tex.width, tex.height, tex.channels
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Resolve a colorant to its merge stage and slot, first match wins.
fn resolve_slot<'a>(
    specs: &'a [SpotMergeSpec],
    colorant: &str,
) -> Option<(&'a SpotMergeSpec, usize)> {
    specs
        .iter()
        .find_map(|s| s.colorant_slot(colorant).map(|slot| (s, slot)))
}

fn quantize(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn sample_lut(tex: &TextureResource, tint: f64) -> [f32; 4] {
    let last = (tex.width - 1) as f64;
    let idx = (tint.clamp(0.0, 1.0) * last).round() as usize;
    let base = idx * tex.channels as usize;
    [
        tex.texels[base],
        tex.texels[base + 1],
        tex.texels[base + 2],
        tex.texels[base + 3],
    ]
}

impl RenderService for CpuRenderService {
    fn upload_image(
        &mut self,
        bytes: &[u8],
        channels: u32,
        width: u32,
        height: u32,
        bits_per_channel: u32,
    ) -> SpotMergeResult<TextureHandle> {
        if bits_per_channel != 32 {
            return Err(SpotMergeError::texture_upload(format!(
                "only 32-bit float texels are supported, got {bits_per_channel} bits"
            )));
        }
        if width == 0 || height == 0 || channels == 0 || channels > 4 {
            return Err(SpotMergeError::texture_upload(format!(
                "invalid texture shape {width}x{height}x{channels}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize * 4;
        if bytes.len() != expected {
            return Err(SpotMergeError::texture_upload(format!(
                "texture byte length {} does not match {width}x{height}x{channels} at 32 bits \
                 (expected {expected})",
                bytes.len()
            )));
        }

        let texels = bytes
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let handle = TextureHandle::from_raw(self.textures.len() as u32);
        self.textures.push(TextureResource {
            width,
            height,
            channels,
            texels,
        });
        tracing::debug!(id = handle.raw(), width, height, channels, "uploaded texture");
        Ok(handle)
    }

    fn create_fragment_shader(&mut self, bytes: &[u8]) -> SpotMergeResult<ShaderHandle> {
        if bytes.len() < 4 || !bytes.len().is_multiple_of(4) {
            return Err(SpotMergeError::shader_compile(format!(
                "program length {} is not a positive multiple of 4",
                bytes.len()
            )));
        }
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != SPIRV_MAGIC {
            return Err(SpotMergeError::shader_compile(format!(
                "program does not start with the SPIR-V magic word (got {magic:#010x})"
            )));
        }

        let handle = ShaderHandle::from_raw(self.shaders.len() as u32);
        self.shaders.push(bytes.to_vec());
        tracing::debug!(id = handle.raw(), len = bytes.len(), "compiled fragment shader");
        Ok(handle)
    }

    fn render(&self, content: &PageContent, spec: &mut RenderSpec<'_>) -> SpotMergeResult<()> {
        if spec.process_space != ColorSpace::DeviceCmyk {
            return Err(SpotMergeError::render(
                RENDER_ERR_COLOR_SPACE,
                "this service renders device CMYK only",
            ));
        }
        let bpp = spec.process_space.bytes_per_pixel();
        let w = spec.width as usize;
        let h = spec.height as usize;
        if w == 0 || h == 0 || spec.row_stride < w * bpp {
            return Err(SpotMergeError::render(
                RENDER_ERR_BAD_SPEC,
                format!(
                    "raster {w}x{h} with row stride {} is unusable",
                    spec.row_stride
                ),
            ));
        }
        if spec.buffer.len() < spec.row_stride * h {
            return Err(SpotMergeError::render(
                RENDER_ERR_BAD_SPEC,
                format!(
                    "buffer holds {} bytes, render needs {}",
                    spec.buffer.len(),
                    spec.row_stride * h
                ),
            ));
        }
        let src = spec.source_rect;
        if !src.width().is_finite()
            || !src.height().is_finite()
            || src.width() <= 0.0
            || src.height() <= 0.0
        {
            return Err(SpotMergeError::render(
                RENDER_ERR_SOURCE_RECT,
                format!("source rectangle {src:?} is degenerate"),
            ));
        }
        self.validate_post_processes(spec.post_processes)?;

        // Base coat: the page's process color over the full raster. Only the
        // leading width*bpp bytes of each row are touched; trailing stride
        // padding stays as the caller provided it.
        let base = content.base.to_array().map(quantize);
        for y in 0..h {
            let row = &mut spec.buffer[y * spec.row_stride..y * spec.row_stride + w * bpp];
            for px in row.chunks_exact_mut(bpp) {
                px.copy_from_slice(&base);
            }
        }

        let sx = w as f64 / src.width();
        let sy = h as f64 / src.height();
        for fill in &content.spot_fills {
            let Some((stage, slot)) = resolve_slot(spec.post_processes, &fill.colorant) else {
                tracing::debug!(colorant = %fill.colorant, "no merge stage for spot, skipping");
                continue;
            };
            let tex = self.texture(stage.bindings()[slot].texture)?;
            let lut = sample_lut(tex, fill.tint);

            let x0 = (((fill.rect.x0 - src.x0) * sx).round().max(0.0) as usize).min(w);
            let x1 = (((fill.rect.x1 - src.x0) * sx).round().max(0.0) as usize).min(w);
            let y0 = (((fill.rect.y0 - src.y0) * sy).round().max(0.0) as usize).min(h);
            let y1 = (((fill.rect.y1 - src.y0) * sy).round().max(0.0) as usize).min(h);

            for y in y0..y1 {
                let row = &mut spec.buffer[y * spec.row_stride..y * spec.row_stride + w * bpp];
                for px in row[x0 * bpp..x1 * bpp].chunks_exact_mut(bpp) {
                    for (ch, lut_ch) in px.iter_mut().zip(lut) {
                        let p = f32::from(*ch) / 255.0;
                        *ch = quantize(1.0 - (1.0 - p) * (1.0 - lut_ch));
                    }
                }
            }
        }

        Ok(())
    }
}
