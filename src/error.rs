// Error types for the Vulkan context
//
// Every failure in the bootstrap path and the resource registry is terminal
// to the operation that hit it and is handed back to the caller as a value.

use ash::vk;
use thiserror::Error;

use crate::backend::descriptor::DataType;
use crate::backend::registry::ResourceKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("No suitable GPU found")]
    NoSuitableDevice,

    #[error("Failed to create {what}: {result}")]
    NativeCreation { what: &'static str, result: vk::Result },

    #[error("Failed to query {what}: {result}")]
    Query { what: &'static str, result: vk::Result },

    #[error("Unresolved {kind} handle {index}")]
    UnresolvedHandle { kind: ResourceKind, index: usize },

    #[error("Unsupported vertex format: {elements} x {data_type:?}")]
    UnsupportedVertexFormat { data_type: DataType, elements: u8 },

    #[error("Unsupported window system: {0}")]
    UnsupportedWindowSystem(String),

    #[error("Presentation requested without a native window")]
    MissingWindow,

    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Shader compilation from source is not available")]
    ShaderCompilationUnavailable,

    #[error("Invalid SPIR-V: {0}")]
    InvalidSpirv(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attaches the name of the object being created to a failed native call.
pub(crate) trait VkResultExt<T> {
    fn creating(self, what: &'static str) -> Result<T>;
    fn querying(self, what: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for std::result::Result<T, vk::Result> {
    fn creating(self, what: &'static str) -> Result<T> {
        self.map_err(|result| Error::NativeCreation { what, result })
    }

    fn querying(self, what: &'static str) -> Result<T> {
        self.map_err(|result| Error::Query { what, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creating_wraps_native_result() {
        let failed: std::result::Result<(), vk::Result> =
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);

        match failed.creating("depth image") {
            Err(Error::NativeCreation { what, result }) => {
                assert_eq!(what, "depth image");
                assert_eq!(result, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_error_messages() {
        let err = Error::UnresolvedHandle {
            kind: ResourceKind::RenderPass,
            index: 3,
        };
        assert_eq!(err.to_string(), "Unresolved render pass handle 3");

        let err = Error::UnsupportedVertexFormat {
            data_type: DataType::Float32,
            elements: 5,
        };
        assert_eq!(err.to_string(), "Unsupported vertex format: 5 x Float32");
    }
}
