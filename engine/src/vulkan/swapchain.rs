use anyhow::Result;
use log::*;
use vulkanalia::{
    vk::{self, Handle, HasBuilder, KhrSurfaceExtension, KhrSwapchainExtension},
    Instance,
};
use winit::window::Window;

use super::{
    constants,
    context::VulkanContext,
    device::{QueueFamilyIndices, VulkanDevice},
    image::VulkanImage,
    instance::VulkanInstance,
};

/// Surface properties a swapchain has to be built against.
#[derive(Clone, Debug)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn get(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        Ok(Self {
            capabilities: instance
                .get_physical_device_surface_capabilities_khr(physical_device, surface)?,
            formats: instance
                .get_physical_device_surface_formats_khr(physical_device, surface)?,
            present_modes: instance
                .get_physical_device_surface_present_modes_khr(physical_device, surface)?,
        })
    }
}

const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// A lone `UNDEFINED` entry means the surface accepts any format, so the
/// preferred one is synthesized outright.
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        return PREFERRED_FORMAT;
    }

    formats
        .iter()
        .cloned()
        .find(|f| {
            f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
        })
        .unwrap_or(formats[0])
}

/// FIFO is the guaranteed fallback; mailbox is taken when offered.
pub(crate) fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .cloned()
        .find(|m| *m == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub(crate) fn choose_extent(
    framebuffer_width: u32,
    framebuffer_height: u32,
    capabilities: &vk::SurfaceCapabilitiesKHR,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: framebuffer_width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: framebuffer_height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

#[derive(Debug)]
pub struct VulkanSwapchain;

impl VulkanSwapchain {
    pub unsafe fn create(
        window: &Window,
        instance: &VulkanInstance,
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let support = SwapchainSupport::get(
            &instance.vk_instance,
            context.surface,
            context.physical_device,
        )?;

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let size = window.inner_size();
        let extent = choose_extent(size.width, size.height, &support.capabilities);

        context.swapchain_format = surface_format.format;
        context.swapchain_extent = extent;

        // One more image than the minimum keeps the presentation engine fed.
        let mut image_count = support.capabilities.min_image_count + 1;
        if support.capabilities.max_image_count != 0
            && image_count > support.capabilities.max_image_count
        {
            image_count = support.capabilities.max_image_count;
        }

        let indices = QueueFamilyIndices::get(instance, context, context.physical_device)?;
        let mut queue_family_indices = vec![];
        let image_sharing_mode = if indices.graphics != indices.present {
            queue_family_indices.push(indices.graphics);
            queue_family_indices.push(indices.present);
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(image_sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        context.swapchain = device.vk_device.create_swapchain_khr(&info, None)?;
        context.swapchain_images = device
            .vk_device
            .get_swapchain_images_khr(context.swapchain)?;

        // The depth target is sized against the same extent, so its format is
        // settled here and its image is rebuilt with the chain.
        context.depth_format = VulkanImage::get_supported_format(
            &instance.vk_instance,
            context.physical_device,
            constants::DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        info!(
            "Created swapchain with {} images at {}x{}.",
            context.swapchain_images.len(),
            extent.width,
            extent.height
        );

        Ok(())
    }

    pub unsafe fn create_image_views(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        context.swapchain_image_views = context
            .swapchain_images
            .iter()
            .map(|i| {
                VulkanImage::create_image_view(
                    &device.vk_device,
                    *i,
                    context.swapchain_format,
                    vk::ImageAspectFlags::COLOR,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(())
    }

    pub unsafe fn create_depth_objects(
        instance: &VulkanInstance,
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let (depth_image, depth_image_memory) = VulkanImage::create_image(
            &instance.vk_instance,
            &device.vk_device,
            context.physical_device,
            context.swapchain_extent.width,
            context.swapchain_extent.height,
            context.depth_format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        context.depth_image = depth_image;
        context.depth_image_memory = depth_image_memory;
        context.depth_image_view = VulkanImage::create_image_view(
            &device.vk_device,
            depth_image,
            context.depth_format,
            vk::ImageAspectFlags::DEPTH,
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn prefers_srgb_format_when_listed() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn synthesizes_preferred_format_for_lone_undefined() {
        let formats = [format(vk::Format::UNDEFINED, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn falls_back_to_first_listed_format() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R5G6B5_UNORM_PACK16, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn prefers_mailbox_present_mode() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn falls_back_to_fifo_present_mode() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn uses_reported_extent_when_not_sentinel() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        let extent = choose_extent(1920, 1080, &capabilities);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn clamps_framebuffer_size_into_surface_bounds() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 200,
                height: 200,
            },
            max_image_extent: vk::Extent2D {
                width: 1600,
                height: 900,
            },
            ..Default::default()
        };

        let clamped = choose_extent(1920, 100, &capabilities);
        assert_eq!((clamped.width, clamped.height), (1600, 200));

        let in_bounds = choose_extent(1024, 768, &capabilities);
        assert_eq!((in_bounds.width, in_bounds.height), (1024, 768));
    }
}
