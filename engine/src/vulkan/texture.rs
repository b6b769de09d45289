use std::mem::size_of_val;
use std::path::Path;
use std::ptr::copy_nonoverlapping as memcpy;

use anyhow::{Context, Result};
use log::*;
use thiserror::Error;
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};

use super::{
    buffer::VulkanBuffer, constants, context::VulkanContext, device::VulkanDevice,
    image::VulkanImage, instance::VulkanInstance,
};

#[derive(Debug, Error)]
#[error("Texture {0} does not exist.")]
pub struct TextureNotFound(pub usize);

/// Pixels for the texture every untextured mesh falls back to.
pub(crate) const FALLBACK_TEXTURE_PIXELS: [u8; 4] = [255, 255, 255, 255];

#[derive(Debug)]
pub struct VulkanTexture;

impl VulkanTexture {
    pub unsafe fn create_sampler(device: &VulkanDevice, context: &mut VulkanContext) -> Result<()> {
        let info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .anisotropy_enable(true)
            .max_anisotropy(16.0)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0);

        context.texture_sampler = device.vk_device.create_sampler(&info, None)?;

        Ok(())
    }

    /// Uploaded unconditionally at startup so any mesh without a material
    /// texture resolves to id 0.
    pub unsafe fn create_fallback_texture(
        instance: &VulkanInstance,
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<usize> {
        Self::create_texture_from_pixels(instance, device, context, &FALLBACK_TEXTURE_PIXELS, 1, 1)
    }

    /// Decodes an image under the texture directory and uploads it, returning
    /// the id used to reference it from meshes.
    pub unsafe fn create_texture(
        instance: &VulkanInstance,
        device: &VulkanDevice,
        context: &mut VulkanContext,
        file_name: &str,
    ) -> Result<usize> {
        let path = Path::new(constants::TEXTURE_DIR).join(file_name);
        let pixels = image::open(&path)
            .with_context(|| format!("Failed to decode texture image {}", path.display()))?
            .to_rgba8();
        let (width, height) = pixels.dimensions();

        let id = Self::create_texture_from_pixels(
            instance,
            device,
            context,
            pixels.as_raw(),
            width,
            height,
        )?;

        debug!("Loaded texture `{}` as id {}.", file_name, id);

        Ok(id)
    }

    unsafe fn create_texture_from_pixels(
        instance: &VulkanInstance,
        device: &VulkanDevice,
        context: &mut VulkanContext,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<usize> {
        let size = size_of_val(pixels) as vk::DeviceSize;

        let (staging_buffer, staging_buffer_memory) = VulkanBuffer::create_buffer(
            &instance.vk_instance,
            &device.vk_device,
            context.physical_device,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let memory = device.vk_device.map_memory(
            staging_buffer_memory,
            0,
            size,
            vk::MemoryMapFlags::empty(),
        )?;
        memcpy(pixels.as_ptr(), memory.cast(), pixels.len());
        device.vk_device.unmap_memory(staging_buffer_memory);

        let (texture_image, texture_image_memory) = VulkanImage::create_image(
            &instance.vk_instance,
            &device.vk_device,
            context.physical_device,
            width,
            height,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        VulkanImage::transition_image_layout(
            &device.vk_device,
            context.command_pool,
            context.graphics_queue,
            texture_image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        VulkanImage::copy_buffer_to_image(
            &device.vk_device,
            context.command_pool,
            context.graphics_queue,
            staging_buffer,
            texture_image,
            width,
            height,
        )?;
        VulkanImage::transition_image_layout(
            &device.vk_device,
            context.command_pool,
            context.graphics_queue,
            texture_image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        device.vk_device.destroy_buffer(staging_buffer, None);
        device.vk_device.free_memory(staging_buffer_memory, None);

        let view = VulkanImage::create_image_view(
            &device.vk_device,
            texture_image,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageAspectFlags::COLOR,
        )?;

        context.texture_images.push(texture_image);
        context.texture_image_memories.push(texture_image_memory);
        context.texture_image_views.push(view);

        Self::create_texture_descriptor_set(device, context, view)
    }

    /// Writes the sampler binding once; the set's position in the flat list
    /// is the texture id handed back to callers.
    unsafe fn create_texture_descriptor_set(
        device: &VulkanDevice,
        context: &mut VulkanContext,
        view: vk::ImageView,
    ) -> Result<usize> {
        let layouts = &[context.sampler_set_layout];
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(context.sampler_descriptor_pool)
            .set_layouts(layouts);

        let set = device.vk_device.allocate_descriptor_sets(&info)?[0];

        let image_info = vk::DescriptorImageInfo::builder()
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_view(view)
            .sampler(context.texture_sampler);

        let image_infos = &[image_info];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(0)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(image_infos);

        device
            .vk_device
            .update_descriptor_sets(&[write], &[] as &[vk::CopyDescriptorSet]);

        context.sampler_descriptor_sets.push(set);

        Ok(context.sampler_descriptor_sets.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_texture_is_a_single_opaque_white_pixel() {
        assert_eq!(FALLBACK_TEXTURE_PIXELS.len(), 4);
        assert!(FALLBACK_TEXTURE_PIXELS.iter().all(|c| *c == 255));
    }
}
