//! The spot-merge post-process descriptor binding colorants, textures, and shader.

use smallvec::SmallVec;

use crate::foundation::error::{SpotMergeError, SpotMergeResult};
use crate::render::service::{ShaderHandle, TextureHandle};

/// Upper bound on spot colorants handled by one merge pass.
///
/// The shader stage batches spots four at a time; a page with more spot
/// groups attaches additional [`SpotMergeSpec`] values to the render spec.
pub const MAX_SPOTS_PER_PASS: usize = 4;

/// One spot colorant bound to its LUT texture.
///
/// The pairing is the whole point of this type: the shader receives textures
/// positionally, so names and textures must stay in the same order. Pairing
/// them in a single value makes a length or order mismatch unrepresentable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpotBinding {
    /// Spot colorant name as it appears in page content.
    pub colorant: String,
    /// LUT texture evaluated for this colorant's tints.
    pub texture: TextureHandle,
}

impl SpotBinding {
    /// Create a binding.
    pub fn new(colorant: impl Into<String>, texture: TextureHandle) -> Self {
        Self {
            colorant: colorant.into(),
            texture,
        }
    }
}

/// A post-process merge stage: an ordered set of spot bindings, the shader
/// program to run, and optional uniform parameter bytes for it.
///
/// Stateless and immutable; built once at startup and attached to every
/// page's render spec.
#[derive(Clone, Debug)]
pub struct SpotMergeSpec {
    bindings: SmallVec<[SpotBinding; MAX_SPOTS_PER_PASS]>,
    shader: ShaderHandle,
    params: Vec<u8>,
}

impl SpotMergeSpec {
    /// Bind spot colorants to their LUT textures and a shader program.
    ///
    /// `bindings` must hold between 1 and [`MAX_SPOTS_PER_PASS`] entries
    /// with distinct colorant names; slot order is the order given here.
    pub fn new(
        bindings: Vec<SpotBinding>,
        shader: ShaderHandle,
        params: impl Into<Vec<u8>>,
    ) -> SpotMergeResult<Self> {
        if bindings.is_empty() {
            return Err(SpotMergeError::validation(
                "a merge spec needs at least one spot binding",
            ));
        }
        if bindings.len() > MAX_SPOTS_PER_PASS {
            return Err(SpotMergeError::validation(format!(
                "a merge spec handles at most {MAX_SPOTS_PER_PASS} spots per pass, got {}",
                bindings.len()
            )));
        }
        for (i, binding) in bindings.iter().enumerate() {
            if bindings[..i].iter().any(|b| b.colorant == binding.colorant) {
                return Err(SpotMergeError::validation(format!(
                    "duplicate spot colorant '{}' in merge spec",
                    binding.colorant
                )));
            }
        }

        Ok(Self {
            bindings: SmallVec::from_vec(bindings),
            shader,
            params: params.into(),
        })
    }

    /// Bindings in shader slot order.
    pub fn bindings(&self) -> &[SpotBinding] {
        &self.bindings
    }

    /// The shader program to invoke.
    pub fn shader(&self) -> ShaderHandle {
        self.shader
    }

    /// Auxiliary uniform parameter bytes forwarded to the shader stage.
    pub fn params(&self) -> &[u8] {
        &self.params
    }

    /// Slot index of `colorant`, if this spec merges it.
    pub fn colorant_slot(&self, colorant: &str) -> Option<usize> {
        self.bindings.iter().position(|b| b.colorant == colorant)
    }
}
