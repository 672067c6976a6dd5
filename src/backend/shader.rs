// Shader module loading
//
// Vulkan consumes SPIR-V words. Compiling shader source is not done here;
// `compile_source` is the hook where a compiler would plug in.

use ash::vk;
use std::io::Cursor;

use crate::error::{Error, Result, VkResultExt};

/// Create a shader module from SPIR-V words
pub fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    if code.is_empty() {
        return Err(Error::InvalidDescriptor("empty SPIR-V code".to_string()));
    }

    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

    unsafe { device.create_shader_module(&create_info, None) }.creating("shader module")
}

/// Reinterpret SPIR-V bytes as words, fixing endianness if needed.
///
/// Unlike a raw pointer cast this copes with unaligned input.
pub fn spirv_from_bytes(bytes: &[u8]) -> Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(Error::InvalidSpirv)
}

/// Textual shader compilation. No compiler is wired in, so this always fails.
pub fn compile_source(_source: &str) -> Result<Vec<u32>> {
    Err(Error::ShaderCompilationUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn test_spirv_bytes_to_words() {
        let bytes: Vec<u8> = [SPIRV_MAGIC, 0x0001_0000, 42]
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect();

        let words = spirv_from_bytes(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000, 42]);
    }

    #[test]
    fn test_spirv_byte_swapped_input() {
        let bytes: Vec<u8> = [SPIRV_MAGIC, 7]
            .iter()
            .flat_map(|word| word.to_be_bytes())
            .collect();

        let words = spirv_from_bytes(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 7]);
    }

    #[test]
    fn test_spirv_length_not_multiple_of_four() {
        let result = spirv_from_bytes(&[0x03, 0x02, 0x23, 0x07, 0x00]);
        assert!(matches!(result, Err(Error::InvalidSpirv(_))));
    }

    #[test]
    fn test_source_compilation_unavailable() {
        let result = compile_source("#version 450\nvoid main() {}");
        assert!(matches!(result, Err(Error::ShaderCompilationUnavailable)));
    }
}
