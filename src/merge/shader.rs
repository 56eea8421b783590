//! Compiled fragment shader loading for the merge post-process.

use std::path::Path;

use crate::foundation::error::{SpotMergeError, SpotMergeResult};
use crate::render::service::{RenderService, ShaderHandle};

/// Load a compiled fragment-shader program from disk and hand it to the
/// rendering service's program compiler.
///
/// The whole file is read into memory, its length checked against the
/// `u32` byte counts the service APIs address, and the exact byte range
/// passed to [`RenderService::create_fragment_shader`]. The returned handle
/// is immutable and is reused by every render that references it.
pub fn load_fragment_shader(
    path: &Path,
    svc: &mut dyn RenderService,
) -> SpotMergeResult<ShaderHandle> {
    let bytes = std::fs::read(path).map_err(|e| {
        SpotMergeError::resource_read(format!("read shader program '{}': {e}", path.display()))
    })?;
    if bytes.len() > u32::MAX as usize {
        return Err(SpotMergeError::resource_too_large(format!(
            "shader program '{}' is {} bytes; byte counts are addressed as u32",
            path.display(),
            bytes.len()
        )));
    }
    svc.create_fragment_shader(&bytes)
}
