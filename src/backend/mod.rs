// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash, one owner per Vulkan object
// The device context outlives everything built on top of it (held via Arc)

pub mod device;
pub mod exclusive;
pub mod frame;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;

pub use device::DeviceContext;
