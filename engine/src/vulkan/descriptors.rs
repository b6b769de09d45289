use std::mem::size_of;

use anyhow::Result;
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};

use super::{buffer::UboViewProjection, constants, context::VulkanContext, device::VulkanDevice};

#[derive(Debug)]
pub struct VulkanDescriptors;

impl VulkanDescriptors {
    /// Two layouts: the per-frame view-projection uniform and the per-draw
    /// texture sampler. Keeping them apart lets texture sets swap between
    /// draws while the view-projection set stays bound.
    pub unsafe fn create_set_layouts(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let vp_binding = vk::DescriptorSetLayoutBinding::builder()
            .binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX);

        let vp_bindings = &[vp_binding];
        let vp_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(vp_bindings);
        context.vp_set_layout = device
            .vk_device
            .create_descriptor_set_layout(&vp_info, None)?;

        let sampler_binding = vk::DescriptorSetLayoutBinding::builder()
            .binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT);

        let sampler_bindings = &[sampler_binding];
        let sampler_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(sampler_bindings);
        context.sampler_set_layout = device
            .vk_device
            .create_descriptor_set_layout(&sampler_info, None)?;

        Ok(())
    }

    pub unsafe fn create_vp_descriptor_pool(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let image_count = context.swapchain_images.len() as u32;

        let vp_pool_size = vk::DescriptorPoolSize::builder()
            .type_(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(image_count);

        let pool_sizes = &[vp_pool_size];
        let info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(pool_sizes)
            .max_sets(image_count);

        context.vp_descriptor_pool = device.vk_device.create_descriptor_pool(&info, None)?;

        Ok(())
    }

    pub unsafe fn create_vp_descriptor_sets(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let layouts = vec![context.vp_set_layout; context.swapchain_images.len()];
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(context.vp_descriptor_pool)
            .set_layouts(&layouts);

        context.vp_descriptor_sets = device.vk_device.allocate_descriptor_sets(&info)?;

        for (set, buffer) in context
            .vp_descriptor_sets
            .iter()
            .zip(context.vp_uniform_buffers.iter())
        {
            let buffer_info = vk::DescriptorBufferInfo::builder()
                .buffer(*buffer)
                .offset(0)
                .range(size_of::<UboViewProjection>() as vk::DeviceSize);

            let buffer_infos = &[buffer_info];
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(*set)
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(buffer_infos);

            device
                .vk_device
                .update_descriptor_sets(&[write], &[] as &[vk::CopyDescriptorSet]);
        }

        Ok(())
    }

    /// Dedicated pool for texture sampler sets, sized for the texture store.
    pub unsafe fn create_sampler_descriptor_pool(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let sampler_pool_size = vk::DescriptorPoolSize::builder()
            .type_(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(constants::MAX_TEXTURES);

        let pool_sizes = &[sampler_pool_size];
        let info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(pool_sizes)
            .max_sets(constants::MAX_TEXTURES);

        context.sampler_descriptor_pool = device.vk_device.create_descriptor_pool(&info, None)?;

        Ok(())
    }
}
