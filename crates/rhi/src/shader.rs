//! Shader module management.
//!
//! [`Shader`] wraps a VkShaderModule built from SPIR-V bytes, together with
//! its stage and entry point. Reading the bytes from disk is left to the
//! caller.

use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// SPIR-V magic number, first word of every module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Programmable stages used by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Converts to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Returns a human-readable name for the stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decodes little-endian SPIR-V bytes into code words.
///
/// Rejects input that is empty, not a whole number of words, or that does not
/// start with the SPIR-V magic number.
pub fn spirv_words(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if bytes.is_empty() || !bytes.len().is_multiple_of(4) {
        return Err(RhiError::ShaderError(format!(
            "SPIR-V code must be a non-empty multiple of 4 bytes, got {} bytes",
            bytes.len()
        )));
    }

    let code: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if code.first() != Some(&SPIRV_MAGIC) {
        return Err(RhiError::ShaderError(
            "Missing SPIR-V magic number".to_string(),
        ));
    }

    Ok(code)
}

/// Vulkan shader module wrapper.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: CString,
}

impl Shader {
    /// Creates a shader module from SPIR-V bytes.
    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        let code = spirv_words(bytes)?;

        let entry_point_cstring = CString::new(entry_point)
            .map_err(|e| RhiError::ShaderError(format!("Invalid entry point name: {}", e)))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);

        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        info!(
            "Created {} shader module with entry point '{}'",
            stage, entry_point
        );

        Ok(Self {
            device,
            module,
            stage,
            entry_point: entry_point_cstring,
        })
    }

    /// Returns the Vulkan shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Returns the shader stage.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Stage description for pipeline creation. Borrows the entry point name.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
        debug!("Destroyed {} shader module", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_stage_to_vk_stage() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_shader_stage_display() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
    }

    #[test]
    fn test_spirv_words_decodes_little_endian() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0300u32.to_le_bytes());

        let words = spirv_words(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0300]);
    }

    #[test]
    fn test_spirv_words_rejects_misaligned() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.push(0);
        assert!(matches!(
            spirv_words(&bytes),
            Err(RhiError::ShaderError(_))
        ));
    }

    #[test]
    fn test_spirv_words_rejects_empty_and_bad_magic() {
        assert!(spirv_words(&[]).is_err());
        assert!(spirv_words(&[0, 0, 0, 0]).is_err());
    }
}
