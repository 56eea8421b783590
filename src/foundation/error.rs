/// Convenience result type used across spotmerge.
pub type SpotMergeResult<T> = Result<T, SpotMergeError>;

/// Top-level error taxonomy used by pipeline APIs.
///
/// No stage recovers locally; every failure propagates to the caller, and the
/// CLI maps it to a description on stderr plus a non-zero exit status.
#[derive(thiserror::Error, Debug)]
pub enum SpotMergeError {
    /// Invalid caller-provided arguments or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure reading a file-backed resource such as a shader program.
    #[error("resource read error: {0}")]
    ResourceRead(String),

    /// A resource length exceeds the addressable bound of the consuming API.
    #[error("resource too large: {0}")]
    ResourceTooLarge(String),

    /// The rendering service rejected a shader program.
    #[error("shader compile error: {0}")]
    ShaderCompile(String),

    /// The rendering service rejected a texture upload.
    #[error("texture upload error: {0}")]
    TextureUpload(String),

    /// Opaque failure reported by the rendering service.
    #[error("render error {code}: {description}")]
    Render {
        /// Service-specific failure code.
        code: u32,
        /// Human-readable failure description.
        description: String,
    },

    /// Scanline write or finalize failure from the image encoder.
    #[error("encode error: {0}")]
    Encode(String),

    /// Degenerate or non-finite page geometry.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpotMergeError {
    /// Build a [`SpotMergeError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`SpotMergeError::ResourceRead`] value.
    pub fn resource_read(msg: impl Into<String>) -> Self {
        Self::ResourceRead(msg.into())
    }

    /// Build a [`SpotMergeError::ResourceTooLarge`] value.
    pub fn resource_too_large(msg: impl Into<String>) -> Self {
        Self::ResourceTooLarge(msg.into())
    }

    /// Build a [`SpotMergeError::ShaderCompile`] value.
    pub fn shader_compile(msg: impl Into<String>) -> Self {
        Self::ShaderCompile(msg.into())
    }

    /// Build a [`SpotMergeError::TextureUpload`] value.
    pub fn texture_upload(msg: impl Into<String>) -> Self {
        Self::TextureUpload(msg.into())
    }

    /// Build a [`SpotMergeError::Render`] value.
    pub fn render(code: u32, description: impl Into<String>) -> Self {
        Self::Render {
            code,
            description: description.into(),
        }
    }

    /// Build a [`SpotMergeError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build a [`SpotMergeError::Geometry`] value.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            SpotMergeError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            SpotMergeError::resource_read("x")
                .to_string()
                .contains("resource read error:")
        );
        assert!(
            SpotMergeError::resource_too_large("x")
                .to_string()
                .contains("resource too large:")
        );
        assert!(
            SpotMergeError::shader_compile("x")
                .to_string()
                .contains("shader compile error:")
        );
        assert!(
            SpotMergeError::texture_upload("x")
                .to_string()
                .contains("texture upload error:")
        );
        assert!(
            SpotMergeError::encode("x")
                .to_string()
                .contains("encode error:")
        );
        assert!(
            SpotMergeError::geometry("x")
                .to_string()
                .contains("geometry error:")
        );
    }

    #[test]
    fn render_error_carries_code_and_description() {
        let err = SpotMergeError::render(7, "spot texture slot is stale");
        assert_eq!(
            err.to_string(),
            "render error 7: spot texture slot is stale"
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = SpotMergeError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
