// Render pass and graphics pipeline for the triangle
//
// The pipeline has no vertex input (positions come from gl_VertexIndex) and
// keeps viewport/scissor dynamic, so it survives every swapchain rebuild.
// Only the framebuffers are per-chain.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::shader::{self, TRIANGLE_FRAG, TRIANGLE_VERT};
use super::DeviceContext;

pub struct TrianglePipeline {
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    device: Arc<DeviceContext>,
}

impl TrianglePipeline {
    pub fn new(device: Arc<DeviceContext>, format: vk::Format) -> Result<Self> {
        let render_pass = create_render_pass(&device, format)?;

        let (pipeline, layout) = match create_pipeline(&device, render_pass) {
            Ok(created) => created,
            Err(e) => {
                unsafe { device.device.destroy_render_pass(render_pass, None) };
                return Err(e);
            }
        };

        Ok(Self {
            render_pass,
            layout,
            pipeline,
            device,
        })
    }
}

impl Drop for TrianglePipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device.device.destroy_pipeline_layout(self.layout, None);
            self.device.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Create a render pass with a single cleared color attachment
pub fn create_render_pass(device: &DeviceContext, format: vk::Format) -> Result<vk::RenderPass> {
    // Color attachment (the swapchain image)
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let color_attachment_ref = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();

    let color_attachments = &[color_attachment_ref];
    let subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(color_attachments)
        .build();

    // The image-available semaphore is waited at COLOR_ATTACHMENT_OUTPUT,
    // so the layout transition has to wait there too
    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        )
        .build();

    let attachments = &[color_attachment];
    let subpasses = &[subpass];
    let dependencies = &[dependency];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(attachments)
        .subpasses(subpasses)
        .dependencies(dependencies);

    unsafe {
        device
            .device
            .create_render_pass(&render_pass_info, None)
            .context("Failed to create render pass")
    }
}

/// Create the framebuffer for one swapchain image view
pub fn create_framebuffer(
    device: &DeviceContext,
    image_view: vk::ImageView,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
) -> Result<vk::Framebuffer> {
    let attachments = &[image_view];
    let framebuffer_info = vk::FramebufferCreateInfo::builder()
        .render_pass(render_pass)
        .attachments(attachments)
        .width(extent.width)
        .height(extent.height)
        .layers(1);

    unsafe {
        device
            .device
            .create_framebuffer(&framebuffer_info, None)
            .context("Failed to create framebuffer")
    }
}

/// Create the triangle pipeline and its (empty) layout
pub fn create_pipeline(
    device: &DeviceContext,
    render_pass: vk::RenderPass,
) -> Result<(vk::Pipeline, vk::PipelineLayout)> {
    let vert_module = shader::create_shader_module(device, TRIANGLE_VERT)?;
    let frag_module = match shader::create_shader_module(device, TRIANGLE_FRAG) {
        Ok(module) => module,
        Err(e) => {
            unsafe { device.device.destroy_shader_module(vert_module, None) };
            return Err(e);
        }
    };

    let result = create_pipeline_with_modules(device, render_pass, vert_module, frag_module);

    // Modules are only needed during pipeline creation
    unsafe {
        device.device.destroy_shader_module(vert_module, None);
        device.device.destroy_shader_module(frag_module, None);
    }

    result
}

fn create_pipeline_with_modules(
    device: &DeviceContext,
    render_pass: vk::RenderPass,
    vert_module: vk::ShaderModule,
    frag_module: vk::ShaderModule,
) -> Result<(vk::Pipeline, vk::PipelineLayout)> {
    let shader_stages = &[
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert_module)
            .name(c"main")
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag_module)
            .name(c"main")
            .build(),
    ];

    // No vertex buffers
    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder();

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Viewport and scissor are set per frame
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder();

    let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
        .build();

    let color_blend_attachments = &[color_blend_attachment];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(color_blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder()
        .dynamic_states(&dynamic_states);

    let layout_info = vk::PipelineLayoutCreateInfo::builder();

    let pipeline_layout = unsafe {
        device
            .device
            .create_pipeline_layout(&layout_info, None)
            .context("Failed to create pipeline layout")?
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(shader_stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(pipeline_layout)
        .render_pass(render_pass)
        .subpass(0)
        .build();

    let pipelines = unsafe {
        device
            .device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
            .map_err(|(_, e)| e)
    };

    match pipelines {
        Ok(pipelines) => Ok((pipelines[0], pipeline_layout)),
        Err(e) => {
            unsafe { device.device.destroy_pipeline_layout(pipeline_layout, None) };
            Err(e).context("Failed to create graphics pipeline")
        }
    }
}
