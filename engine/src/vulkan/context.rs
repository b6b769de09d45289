use vulkanalia::vk;

/// The Vulkan handles and associated properties used by our renderer.
///
/// Per-frame lists start empty; creation fills them in dependency order and
/// teardown walks them in reverse.
#[derive(Clone, Debug, Default)]
pub struct VulkanContext {
    pub messenger: vk::DebugUtilsMessengerEXT,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,

    // Swapchain and frame targets
    pub swapchain: vk::SwapchainKHR,
    pub swapchain_format: vk::Format,
    pub swapchain_extent: vk::Extent2D,
    pub swapchain_images: Vec<vk::Image>,
    pub swapchain_image_views: Vec<vk::ImageView>,
    pub depth_format: vk::Format,
    pub depth_image: vk::Image,
    pub depth_image_memory: vk::DeviceMemory,
    pub depth_image_view: vk::ImageView,
    pub framebuffers: Vec<vk::Framebuffer>,

    // Pipeline
    pub render_pass: vk::RenderPass,
    pub vp_set_layout: vk::DescriptorSetLayout,
    pub sampler_set_layout: vk::DescriptorSetLayout,
    pub pipeline_layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,

    // Commands
    pub command_pool: vk::CommandPool,
    pub command_buffers: Vec<vk::CommandBuffer>,

    // Frame slot synchronization, indexed by frame-in-flight, plus the
    // fence last submitted against each swapchain image.
    pub image_available_semaphores: Vec<vk::Semaphore>,
    pub render_finished_semaphores: Vec<vk::Semaphore>,
    pub draw_fences: Vec<vk::Fence>,
    pub images_in_flight: Vec<vk::Fence>,

    // View-projection descriptors, indexed by swapchain image
    pub vp_uniform_buffers: Vec<vk::Buffer>,
    pub vp_uniform_memories: Vec<vk::DeviceMemory>,
    pub vp_descriptor_pool: vk::DescriptorPool,
    pub vp_descriptor_sets: Vec<vk::DescriptorSet>,

    // Texture store, indexed by texture id
    pub texture_sampler: vk::Sampler,
    pub sampler_descriptor_pool: vk::DescriptorPool,
    pub sampler_descriptor_sets: Vec<vk::DescriptorSet>,
    pub texture_images: Vec<vk::Image>,
    pub texture_image_memories: Vec<vk::DeviceMemory>,
    pub texture_image_views: Vec<vk::ImageView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_has_empty_per_frame_lists() {
        let context = VulkanContext::default();
        assert!(context.image_available_semaphores.is_empty());
        assert!(context.render_finished_semaphores.is_empty());
        assert!(context.draw_fences.is_empty());
        assert!(context.images_in_flight.is_empty());
        assert!(context.command_buffers.is_empty());
    }
}
