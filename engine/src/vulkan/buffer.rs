use std::mem::size_of;
use std::ptr::copy_nonoverlapping as memcpy;

use anyhow::{anyhow, Result};
use vulkanalia::{
    vk::{self, DeviceV1_0, HasBuilder, InstanceV1_0},
    Device, Instance,
};

use super::command_buffer::VulkanCommandBuffer;
use super::context::VulkanContext;
use super::device::VulkanDevice;
use super::instance::VulkanInstance;
use crate::Mat4;

/// Per-frame camera matrices, laid out to match the vertex stage uniform.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct UboViewProjection {
    pub projection: Mat4,
    pub view: Mat4,
}

#[derive(Debug)]
pub struct VulkanBuffer;

impl VulkanBuffer {
    pub unsafe fn create_buffer(
        instance: &Instance,
        device: &Device,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = device.create_buffer(&buffer_info, None)?;

        let requirements = device.get_buffer_memory_requirements(buffer);
        let memory_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(Self::memory_type_index(
                instance,
                physical_device,
                properties,
                requirements,
            )?);

        let buffer_memory = device.allocate_memory(&memory_info, None)?;
        device.bind_buffer_memory(buffer, buffer_memory, 0)?;

        Ok((buffer, buffer_memory))
    }

    pub unsafe fn copy_buffer(
        device: &Device,
        command_pool: vk::CommandPool,
        queue: vk::Queue,
        source: vk::Buffer,
        destination: vk::Buffer,
        size: vk::DeviceSize,
    ) -> Result<()> {
        let command_buffer = VulkanCommandBuffer::begin_single_time(device, command_pool)?;

        let regions = vk::BufferCopy::builder().size(size);
        device.cmd_copy_buffer(command_buffer, source, destination, &[regions]);

        VulkanCommandBuffer::end_single_time(device, command_pool, queue, command_buffer)?;

        Ok(())
    }

    pub unsafe fn memory_type_index(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        properties: vk::MemoryPropertyFlags,
        requirements: vk::MemoryRequirements,
    ) -> Result<u32> {
        let memory = instance.get_physical_device_memory_properties(physical_device);
        (0..memory.memory_type_count)
            .find(|i| {
                let suitable = (requirements.memory_type_bits & (1 << i)) != 0;
                let memory_type = memory.memory_types[*i as usize];
                suitable && memory_type.property_flags.contains(properties)
            })
            .ok_or_else(|| anyhow!("Failed to find suitable memory type."))
    }

    /// One host-visible view-projection buffer per swapchain image.
    pub unsafe fn create_vp_uniform_buffers(
        instance: &VulkanInstance,
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        context.vp_uniform_buffers.clear();
        context.vp_uniform_memories.clear();

        for _ in 0..context.swapchain_images.len() {
            let (buffer, memory) = Self::create_buffer(
                &instance.vk_instance,
                &device.vk_device,
                context.physical_device,
                size_of::<UboViewProjection>() as vk::DeviceSize,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;

            context.vp_uniform_buffers.push(buffer);
            context.vp_uniform_memories.push(memory);
        }

        Ok(())
    }

    pub unsafe fn update_vp_uniform(
        device: &VulkanDevice,
        context: &VulkanContext,
        image_index: usize,
        ubo: &UboViewProjection,
    ) -> Result<()> {
        let memory = device.vk_device.map_memory(
            context.vp_uniform_memories[image_index],
            0,
            size_of::<UboViewProjection>() as vk::DeviceSize,
            vk::MemoryMapFlags::empty(),
        )?;

        memcpy(ubo, memory.cast(), 1);

        device
            .vk_device
            .unmap_memory(context.vp_uniform_memories[image_index]);

        Ok(())
    }
}
