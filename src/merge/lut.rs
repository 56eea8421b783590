//! Spot-colorant lookup tables and their texture upload.

use crate::foundation::core::ProcessColor;
use crate::foundation::error::{SpotMergeError, SpotMergeResult};
use crate::render::service::{RenderService, TextureHandle};

/// Number of quantized tint steps in a spot LUT.
pub const LUT_SIZE: usize = 256;

/// Bit depth of one LUT texel channel (32-bit float).
pub const LUT_BITS_PER_CHANNEL: u32 = 32;

/// Lookup table mapping a quantized tint fraction to a process-color
/// contribution for one spot colorant.
///
/// Immutable once built; evaluated at `round(tint * 255)`. The table is
/// uploaded once per run as a 256x1 four-channel float texture and the
/// resulting handle is reused by every page render.
#[derive(Clone, Debug, PartialEq)]
pub struct SpotLut {
    entries: [ProcessColor; LUT_SIZE],
}

impl SpotLut {
    /// Build a LUT by sampling `ramp` at every tint index `0..=255`.
    ///
    /// Each sampled channel must already be normalized to [0, 1]; a ramp
    /// producing values outside that range is a caller bug and is rejected.
    pub fn from_ramp(ramp: impl Fn(usize) -> ProcessColor) -> SpotMergeResult<Self> {
        let mut entries = [ProcessColor::WHITE; LUT_SIZE];
        for (i, entry) in entries.iter_mut().enumerate() {
            let color = ramp(i);
            for ch in color.to_array() {
                if !(0.0..=1.0).contains(&ch) || !ch.is_finite() {
                    return Err(SpotMergeError::validation(format!(
                        "ramp produced out-of-range channel value {ch} at tint index {i}"
                    )));
                }
            }
            *entry = color;
        }
        Ok(Self { entries })
    }

    /// Table entries in tint-index order.
    pub fn entries(&self) -> &[ProcessColor; LUT_SIZE] {
        &self.entries
    }

    /// Evaluate the table at a tint fraction, clamped to [0, 1].
    pub fn sample(&self, tint: f64) -> ProcessColor {
        let idx = (tint.clamp(0.0, 1.0) * (LUT_SIZE - 1) as f64).round() as usize;
        self.entries[idx]
    }

    /// Raw texel bytes in table order, four floats per entry.
    pub fn texel_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.entries)
    }

    /// Upload the table as a 256x1 four-channel float texture.
    ///
    /// The returned handle is this builder's sole externally visible output;
    /// an upload failure is fatal to the run.
    pub fn upload(&self, svc: &mut dyn RenderService) -> SpotMergeResult<TextureHandle> {
        svc.upload_image(
            self.texel_bytes(),
            4,
            LUT_SIZE as u32,
            1,
            LUT_BITS_PER_CHANNEL,
        )
    }
}

/// Ramp running white through green to red as the tint reaches solid.
///
/// Cyan rises to its midpoint and falls back; magenta kicks in from the
/// midpoint and saturates one step before solid; yellow reaches full
/// strength by the midpoint and holds. Black stays at zero.
pub fn white_green_red_ramp(i: usize) -> ProcessColor {
    let f = i as f32;
    let c = if i < 128 {
        f / 255.0
    } else {
        (255.0 - f) / 255.0
    };
    let m = if i >= 128 {
        ((f - 127.0) / 127.0).min(1.0)
    } else {
        0.0
    };
    let y = if i < 128 { f / 127.0 } else { 1.0 };
    ProcessColor::new(c, m, y, 0.0)
}

/// Ramp running cyan to yellow as the tint reaches solid.
///
/// Cyan rises and falls like [`white_green_red_ramp`]; yellow starts ramping
/// from the midpoint. Magenta and black stay at zero.
pub fn cyan_yellow_ramp(i: usize) -> ProcessColor {
    let f = i as f32;
    let c = if i < 128 {
        f / 255.0
    } else {
        (255.0 - f) / 255.0
    };
    let y = if i >= 128 {
        ((f - 127.0) / 127.0).min(1.0)
    } else {
        0.0
    };
    ProcessColor::new(c, 0.0, y, 0.0)
}
