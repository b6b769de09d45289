use std::mem::size_of;

use anyhow::{anyhow, Result};
use vulkanalia::{
    vk::{self, DeviceV1_0, Handle, HasBuilder},
    Device,
};

use super::{
    constants,
    context::VulkanContext,
    device::{QueueFamilyIndices, VulkanDevice},
    instance::VulkanInstance,
    mesh::MeshModel,
    texture::TextureNotFound,
};
use crate::Mat4;

#[derive(Debug)]
pub struct VulkanCommandBuffer;

impl VulkanCommandBuffer {
    pub unsafe fn create_command_pool(
        instance: &VulkanInstance,
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let indices = QueueFamilyIndices::get(instance, context, context.physical_device)?;

        // Buffers are re-recorded every frame, so they must be resettable.
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(indices.graphics);

        context.command_pool = device.vk_device.create_command_pool(&info, None)?;

        Ok(())
    }

    pub unsafe fn create_command_buffers(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(context.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(context.framebuffers.len() as u32);

        context.command_buffers = device.vk_device.allocate_command_buffers(&allocate_info)?;

        Ok(())
    }

    /// Rebuilds the draw stream for one swapchain image from the current
    /// model list. Implicitly resets the buffer on begin.
    pub unsafe fn record(
        device: &VulkanDevice,
        context: &VulkanContext,
        models: &[MeshModel],
        image_index: usize,
    ) -> Result<()> {
        let command_buffer = context.command_buffers[image_index];

        let begin_info = vk::CommandBufferBeginInfo::builder();
        device
            .vk_device
            .begin_command_buffer(command_buffer, &begin_info)?;

        let render_area = vk::Rect2D::builder()
            .offset(vk::Offset2D::default())
            .extent(context.swapchain_extent);

        let color_clear_value = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: constants::BACKGROUND_CLEAR_COLOR,
            },
        };
        let depth_clear_value = vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        };

        let clear_values = &[color_clear_value, depth_clear_value];
        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(context.render_pass)
            .framebuffer(context.framebuffers[image_index])
            .render_area(render_area)
            .clear_values(clear_values);

        device
            .vk_device
            .cmd_begin_render_pass(command_buffer, &info, vk::SubpassContents::INLINE);

        device.vk_device.cmd_bind_pipeline(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            context.pipeline,
        );

        for model in models {
            let transform = model.transform();
            let push_bytes = std::slice::from_raw_parts(
                transform.as_ptr().cast::<u8>(),
                size_of::<Mat4>(),
            );
            device.vk_device.cmd_push_constants(
                command_buffer,
                context.pipeline_layout,
                vk::ShaderStageFlags::VERTEX,
                0,
                push_bytes,
            );

            for mesh in model.meshes() {
                device.vk_device.cmd_bind_vertex_buffers(
                    command_buffer,
                    0,
                    &[mesh.vertex_buffer()],
                    &[0],
                );
                device.vk_device.cmd_bind_index_buffer(
                    command_buffer,
                    mesh.index_buffer(),
                    0,
                    vk::IndexType::UINT32,
                );

                let sampler_set = context
                    .sampler_descriptor_sets
                    .get(mesh.tex_id())
                    .copied()
                    .ok_or_else(|| anyhow!(TextureNotFound(mesh.tex_id())))?;
                let descriptor_sets = [context.vp_descriptor_sets[image_index], sampler_set];
                device.vk_device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    context.pipeline_layout,
                    0,
                    &descriptor_sets,
                    &[],
                );

                device.vk_device.cmd_draw_indexed(
                    command_buffer,
                    mesh.index_count() as u32,
                    1,
                    0,
                    0,
                    0,
                );
            }
        }

        device.vk_device.cmd_end_render_pass(command_buffer);
        device.vk_device.end_command_buffer(command_buffer)?;

        Ok(())
    }

    pub unsafe fn begin_single_time(
        device: &Device,
        command_pool: vk::CommandPool,
    ) -> Result<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::builder()
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_pool(command_pool)
            .command_buffer_count(1);

        let command_buffer = device.allocate_command_buffers(&info)?[0];

        let info =
            vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device.begin_command_buffer(command_buffer, &info)?;

        Ok(command_buffer)
    }

    /// Submits the one-shot buffer and blocks until the queue drains, so the
    /// caller may free any staging resources immediately after.
    pub unsafe fn end_single_time(
        device: &Device,
        command_pool: vk::CommandPool,
        queue: vk::Queue,
        command_buffer: vk::CommandBuffer,
    ) -> Result<()> {
        device.end_command_buffer(command_buffer)?;

        let command_buffers = &[command_buffer];
        let info = vk::SubmitInfo::builder().command_buffers(command_buffers);

        device.queue_submit(queue, &[info], vk::Fence::null())?;
        device.queue_wait_idle(queue)?;

        device.free_command_buffers(command_pool, command_buffers);

        Ok(())
    }
}
