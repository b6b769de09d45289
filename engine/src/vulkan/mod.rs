use std::collections::HashMap;

use anyhow::{anyhow, Result};
use log::*;
use nalgebra::{Perspective3, Point3, Vector3};
use vulkanalia::{
    loader::{LibloadingLoader, LIBRARY},
    vk::{self, DeviceV1_0, Handle, HasBuilder, KhrSwapchainExtension},
    Entry,
};
use winit::window::Window;

use buffer::{UboViewProjection, VulkanBuffer};
use command_buffer::VulkanCommandBuffer;
use context::VulkanContext;
use descriptors::VulkanDescriptors;
use device::VulkanDevice;
use framebuffer::VulkanFramebuffer;
use instance::VulkanInstance;
use mesh::{MeshModel, ModelNotFound};
use pipeline::VulkanPipeline;
use render_pass::VulkanRenderPass;
use swapchain::VulkanSwapchain;
use texture::VulkanTexture;

use crate::config::Config;
use crate::Mat4;

mod buffer;
mod command_buffer;
mod constants;
mod context;
mod descriptors;
mod device;
mod framebuffer;
mod image;
mod instance;
mod mesh;
mod pipeline;
mod render_pass;
mod swapchain;
mod texture;

fn next_frame(frame: usize) -> usize {
    (frame + 1) % constants::MAX_FRAMES_IN_FLIGHT
}

#[derive(Debug)]
pub struct VulkanRenderer {
    entry: Entry,
    pub instance: VulkanInstance,
    pub device: VulkanDevice,
    context: VulkanContext,
    models: Vec<MeshModel>,
    texture_ids: HashMap<String, usize>,
    ubo_view_projection: UboViewProjection,
    frame: usize,
    destroyed: bool,
}

impl VulkanRenderer {
    pub unsafe fn new(window: &Window, config: &Config) -> Result<VulkanRenderer> {
        let loader = LibloadingLoader::new(LIBRARY)?;
        let entry = Entry::new(loader).map_err(|b| anyhow!("{}", b))?;

        let mut context = VulkanContext::default();
        let instance = VulkanInstance::new(window, &entry, config, &mut context)?;
        let device = VulkanDevice::new(&entry, &instance, config, &mut context)?;

        VulkanSwapchain::create(window, &instance, &device, &mut context)?;
        VulkanSwapchain::create_image_views(&device, &mut context)?;

        VulkanRenderPass::create(&device, &mut context)?;
        VulkanDescriptors::create_set_layouts(&device, &mut context)?;
        VulkanPipeline::create(&device, &mut context)?;

        VulkanSwapchain::create_depth_objects(&instance, &device, &mut context)?;
        VulkanFramebuffer::create(&device, &mut context)?;

        VulkanCommandBuffer::create_command_pool(&instance, &device, &mut context)?;
        VulkanCommandBuffer::create_command_buffers(&device, &mut context)?;

        VulkanBuffer::create_vp_uniform_buffers(&instance, &device, &mut context)?;
        VulkanDescriptors::create_vp_descriptor_pool(&device, &mut context)?;
        VulkanDescriptors::create_vp_descriptor_sets(&device, &mut context)?;

        VulkanTexture::create_sampler(&device, &mut context)?;
        VulkanDescriptors::create_sampler_descriptor_pool(&device, &mut context)?;
        let fallback_id = VulkanTexture::create_fallback_texture(&instance, &device, &mut context)?;
        debug_assert_eq!(fallback_id, 0);

        VulkanRenderer::create_sync_objects(&device, &mut context)?;

        let ubo_view_projection = initial_view_projection(
            context.swapchain_extent.width as f32 / context.swapchain_extent.height as f32,
        );

        Ok(VulkanRenderer {
            entry,
            instance,
            device,
            context,
            models: Vec::new(),
            texture_ids: HashMap::new(),
            ubo_view_projection,
            frame: 0,
            destroyed: false,
        })
    }

    /// One synchronization triple per frame slot, independent of how many
    /// images the swapchain ended up with.
    unsafe fn create_sync_objects(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        for _ in 0..constants::MAX_FRAMES_IN_FLIGHT {
            context
                .image_available_semaphores
                .push(device.vk_device.create_semaphore(&semaphore_info, None)?);
            context
                .render_finished_semaphores
                .push(device.vk_device.create_semaphore(&semaphore_info, None)?);
            context
                .draw_fences
                .push(device.vk_device.create_fence(&fence_info, None)?);
        }

        context.images_in_flight = context
            .swapchain_images
            .iter()
            .map(|_| vk::Fence::null())
            .collect();

        Ok(())
    }

    /// Loads a model file, uploading its textures and meshes, and returns the
    /// id to address it with in `update_model`.
    pub unsafe fn create_mesh_model(&mut self, path: &str) -> Result<usize> {
        let (obj_models, obj_materials) = MeshModel::load_obj(path)?;
        let texture_files = MeshModel::load_materials(&obj_materials);

        let mut mat_to_tex = Vec::with_capacity(texture_files.len());
        for file in &texture_files {
            let tex_id = match file {
                Some(name) => match self.texture_ids.get(name).copied() {
                    Some(id) => id,
                    None => {
                        let id = VulkanTexture::create_texture(
                            &self.instance,
                            &self.device,
                            &mut self.context,
                            name,
                        )?;
                        self.texture_ids.insert(name.clone(), id);
                        id
                    }
                },
                None => 0,
            };
            mat_to_tex.push(tex_id);
        }

        let meshes = MeshModel::load_meshes(
            &self.instance.vk_instance,
            &self.device.vk_device,
            self.context.physical_device,
            self.context.graphics_queue,
            self.context.command_pool,
            &obj_models,
            &mat_to_tex,
        )?;

        info!("Loaded model `{}` with {} meshes.", path, meshes.len());

        self.models.push(MeshModel::new(meshes));
        Ok(self.models.len() - 1)
    }

    pub fn update_model(&mut self, model_id: usize, transform: Mat4) -> Result<()> {
        let model = self
            .models
            .get_mut(model_id)
            .ok_or_else(|| anyhow!(ModelNotFound(model_id)))?;
        model.set_transform(transform);
        Ok(())
    }

    pub unsafe fn draw(&mut self) -> Result<()> {
        let device = &self.device.vk_device;

        // The slot fence proves the GPU is done with this slot's previous
        // submission before its command buffer is touched again.
        device.wait_for_fences(&[self.context.draw_fences[self.frame]], true, u64::MAX)?;

        let image_index = device
            .acquire_next_image_khr(
                self.context.swapchain,
                u64::MAX,
                self.context.image_available_semaphores[self.frame],
                vk::Fence::null(),
            )?
            .0 as usize;

        // The image index walks its own axis; whichever slot last rendered
        // to this image must also have drained before its per-image
        // resources are rewritten.
        if !self.context.images_in_flight[image_index].is_null() {
            device.wait_for_fences(
                &[self.context.images_in_flight[image_index]],
                true,
                u64::MAX,
            )?;
        }
        self.context.images_in_flight[image_index] = self.context.draw_fences[self.frame];

        VulkanCommandBuffer::record(&self.device, &self.context, &self.models, image_index)?;
        VulkanBuffer::update_vp_uniform(
            &self.device,
            &self.context,
            image_index,
            &self.ubo_view_projection,
        )?;

        device.reset_fences(&[self.context.draw_fences[self.frame]])?;

        let wait_semaphores = &[self.context.image_available_semaphores[self.frame]];
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[self.context.command_buffers[image_index]];
        let signal_semaphores = &[self.context.render_finished_semaphores[self.frame]];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        device.queue_submit(
            self.context.graphics_queue,
            &[submit_info],
            self.context.draw_fences[self.frame],
        )?;

        let swapchains = &[self.context.swapchain];
        let image_indices = &[image_index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(signal_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        device.queue_present_khr(self.context.present_queue, &present_info)?;

        self.frame = next_frame(self.frame);

        Ok(())
    }

    pub unsafe fn device_wait_idle(&self) {
        if let Err(error) = self.device.vk_device.device_wait_idle() {
            warn!("Device wait idle failed: {}", error);
        }
    }

    /// Tears everything down in reverse dependency order. Safe to call more
    /// than once; also runs on drop.
    pub unsafe fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        self.device_wait_idle();

        let device = &self.device.vk_device;

        device.destroy_descriptor_pool(self.context.sampler_descriptor_pool, None);
        device.destroy_descriptor_pool(self.context.vp_descriptor_pool, None);

        self.context
            .vp_uniform_buffers
            .iter()
            .for_each(|b| device.destroy_buffer(*b, None));
        self.context
            .vp_uniform_memories
            .iter()
            .for_each(|m| device.free_memory(*m, None));

        device.destroy_sampler(self.context.texture_sampler, None);

        self.context
            .texture_image_views
            .iter()
            .for_each(|v| device.destroy_image_view(*v, None));
        self.context
            .texture_images
            .iter()
            .for_each(|i| device.destroy_image(*i, None));
        self.context
            .texture_image_memories
            .iter()
            .for_each(|m| device.free_memory(*m, None));

        for model in &mut self.models {
            model.destroy(device);
        }
        self.models.clear();

        self.context
            .draw_fences
            .iter()
            .for_each(|f| device.destroy_fence(*f, None));
        self.context
            .render_finished_semaphores
            .iter()
            .for_each(|s| device.destroy_semaphore(*s, None));
        self.context
            .image_available_semaphores
            .iter()
            .for_each(|s| device.destroy_semaphore(*s, None));

        device.destroy_command_pool(self.context.command_pool, None);

        self.context
            .framebuffers
            .iter()
            .for_each(|f| device.destroy_framebuffer(*f, None));

        device.destroy_pipeline(self.context.pipeline, None);
        device.destroy_pipeline_layout(self.context.pipeline_layout, None);
        device.destroy_descriptor_set_layout(self.context.sampler_set_layout, None);
        device.destroy_descriptor_set_layout(self.context.vp_set_layout, None);
        device.destroy_render_pass(self.context.render_pass, None);

        device.destroy_image_view(self.context.depth_image_view, None);
        device.destroy_image(self.context.depth_image, None);
        device.free_memory(self.context.depth_image_memory, None);

        self.context
            .swapchain_image_views
            .iter()
            .for_each(|v| device.destroy_image_view(*v, None));
        device.destroy_swapchain_khr(self.context.swapchain, None);

        self.instance.destroy_surface(&mut self.context);
        self.device.destroy();
        self.instance.destroy(&mut self.context);
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        unsafe {
            self.destroy();
        }
    }
}

fn initial_view_projection(aspect: f32) -> UboViewProjection {
    let mut projection =
        Perspective3::new(aspect, 45.0f32.to_radians(), 0.1, 100.0).to_homogeneous();
    // Vulkan's clip-space Y points down.
    projection[(1, 1)] *= -1.0;

    let view = Mat4::look_at_rh(
        &Point3::new(0.0, 1.0, 4.0),
        &Point3::new(0.0, 0.0, -2.5),
        &Vector3::new(0.0, 1.0, 0.0),
    );

    UboViewProjection { projection, view }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_slots_cycle_independently_of_image_count() {
        assert_eq!(constants::MAX_FRAMES_IN_FLIGHT, 2);

        let mut frame = 0;
        let visited: Vec<usize> = (0..5)
            .map(|_| {
                let current = frame;
                frame = next_frame(frame);
                current
            })
            .collect();
        assert_eq!(visited, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn projection_flips_y_for_vulkan_clip_space() {
        let ubo = initial_view_projection(16.0 / 9.0);
        assert!(ubo.projection[(1, 1)] < 0.0);
    }
}
