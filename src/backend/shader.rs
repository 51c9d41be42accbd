// Shader module loading
//
// SPIR-V is compiled by build.rs and embedded in the binary; nothing is
// compiled at runtime.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;

use super::DeviceContext;

pub const TRIANGLE_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.vert.spv"));
pub const TRIANGLE_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.frag.spv"));

/// Load SPIR-V shader from bytes and create a shader module
pub fn create_shader_module(device: &DeviceContext, code: &[u8]) -> Result<vk::ShaderModule> {
    if code.is_empty() {
        anyhow::bail!("Shader bytecode is empty; was glslc available at build time?");
    }

    // include_bytes! gives no alignment guarantee, read_spv copies into u32 words
    let words = ash::util::read_spv(&mut Cursor::new(code)).context("Invalid SPIR-V bytecode")?;

    let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);

    unsafe {
        device
            .device
            .create_shader_module(&create_info, None)
            .context("Failed to create shader module")
    }
}
