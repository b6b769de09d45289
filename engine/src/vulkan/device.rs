use anyhow::{anyhow, Result};
use log::*;
use std::collections::HashSet;
use thiserror::Error;
use vulkanalia::{
    vk::{self, DeviceV1_0, HasBuilder, InstanceV1_0, KhrSurfaceExtension},
    Device, Entry, Instance,
};

use super::{constants, context::VulkanContext, instance::VulkanInstance};
use crate::config::Config;

#[derive(Debug)]
pub struct VulkanDevice {
    pub vk_device: Device,
}

#[derive(Debug, Error)]
#[error("Missing {0}.")]
pub struct SuitabilityError(pub &'static str);

/// What a single queue family offers for our surface.
#[derive(Copy, Clone, Debug)]
pub(crate) struct QueueFamilySupport {
    pub graphics: bool,
    pub present: bool,
}

/// A plain snapshot of everything device selection cares about.
#[derive(Clone, Debug)]
pub(crate) struct PhysicalDeviceInfo {
    pub queue_families: Vec<QueueFamilySupport>,
    pub has_required_extensions: bool,
    pub surface_format_count: usize,
    pub present_mode_count: usize,
    pub sampler_anisotropy: bool,
}

/// First queue family index offering each capability, searched in order.
pub(crate) fn pick_queue_families(
    families: &[QueueFamilySupport],
) -> (Option<u32>, Option<u32>) {
    let graphics = families
        .iter()
        .position(|f| f.graphics)
        .map(|i| i as u32);
    let present = families.iter().position(|f| f.present).map(|i| i as u32);

    (graphics, present)
}

pub(crate) fn check_suitability(info: &PhysicalDeviceInfo) -> Result<(), SuitabilityError> {
    let (graphics, present) = pick_queue_families(&info.queue_families);
    if graphics.is_none() || present.is_none() {
        return Err(SuitabilityError("required queue families"));
    }

    if !info.has_required_extensions {
        return Err(SuitabilityError("required device extensions"));
    }

    if info.surface_format_count == 0 || info.present_mode_count == 0 {
        return Err(SuitabilityError("surface formats or present modes"));
    }

    if !info.sampler_anisotropy {
        return Err(SuitabilityError("sampler anisotropy feature"));
    }

    Ok(())
}

impl VulkanDevice {
    unsafe fn query_device_info(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Result<PhysicalDeviceInfo> {
        let properties = instance.get_physical_device_queue_family_properties(physical_device);

        let mut queue_families = Vec::with_capacity(properties.len());
        for (index, family) in properties.iter().enumerate() {
            queue_families.push(QueueFamilySupport {
                graphics: family.queue_count > 0
                    && family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                present: instance.get_physical_device_surface_support_khr(
                    physical_device,
                    index as u32,
                    surface,
                )?,
            });
        }

        let extensions = instance
            .enumerate_device_extension_properties(physical_device, None)?
            .iter()
            .map(|e| e.extension_name)
            .collect::<HashSet<_>>();
        let has_required_extensions = constants::DEVICE_EXTENSIONS
            .iter()
            .all(|e| extensions.contains(e));

        let surface_format_count = instance
            .get_physical_device_surface_formats_khr(physical_device, surface)?
            .len();
        let present_mode_count = instance
            .get_physical_device_surface_present_modes_khr(physical_device, surface)?
            .len();

        let features = instance.get_physical_device_features(physical_device);

        Ok(PhysicalDeviceInfo {
            queue_families,
            has_required_extensions,
            surface_format_count,
            present_mode_count,
            sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
        })
    }

    unsafe fn pick_physical_device(
        instance: &VulkanInstance,
        context: &mut VulkanContext,
    ) -> Result<()> {
        for physical_device in instance.vk_instance.enumerate_physical_devices()? {
            let properties = instance
                .vk_instance
                .get_physical_device_properties(physical_device);

            let info = VulkanDevice::query_device_info(
                &instance.vk_instance,
                context.surface,
                physical_device,
            )?;

            if let Err(error) = check_suitability(&info) {
                warn!(
                    "Skipping physical device (`{}`): {}",
                    properties.device_name, error
                );
            } else {
                info!("Selected physical device (`{}`).", properties.device_name);
                context.physical_device = physical_device;
                return Ok(());
            }
        }
        Err(anyhow!("Failed to find suitable physical device."))
    }

    pub unsafe fn new(
        entry: &Entry,
        instance: &VulkanInstance,
        config: &Config,
        context: &mut VulkanContext,
    ) -> Result<VulkanDevice> {
        VulkanDevice::pick_physical_device(instance, context)?;

        let indices = QueueFamilyIndices::get(instance, context, context.physical_device)?;

        // One queue per distinct family; graphics and presentation may share.
        let mut unique_indices = HashSet::new();
        unique_indices.insert(indices.graphics);
        unique_indices.insert(indices.present);

        let queue_priorities = &[1.0];
        let queue_infos = unique_indices
            .iter()
            .map(|i| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(*i)
                    .queue_priorities(queue_priorities)
            })
            .collect::<Vec<_>>();

        let layers = if config.validation_enabled {
            vec![constants::VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let mut extensions = constants::DEVICE_EXTENSIONS
            .iter()
            .map(|n| n.as_ptr())
            .collect::<Vec<_>>();

        // Required by Vulkan SDK on macOS since 1.3.216.
        if cfg!(target_os = "macos") && entry.version()? >= constants::PORTABILITY_MACOS_VERSION {
            extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
        }

        let features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true);

        let info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = instance
            .vk_instance
            .create_device(context.physical_device, &info, None)?;

        context.graphics_queue = device.get_device_queue(indices.graphics, 0);
        context.present_queue = device.get_device_queue(indices.present, 0);

        Ok(VulkanDevice { vk_device: device })
    }

    pub unsafe fn destroy(&mut self) {
        self.vk_device.destroy_device(None);
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    pub unsafe fn get(
        instance: &VulkanInstance,
        context: &VulkanContext,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let info = VulkanDevice::query_device_info(
            &instance.vk_instance,
            context.surface,
            physical_device,
        )?;

        if let (Some(graphics), Some(present)) = pick_queue_families(&info.queue_families) {
            Ok(Self { graphics, present })
        } else {
            Err(anyhow!(SuitabilityError("required queue families")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(graphics: bool, present: bool) -> QueueFamilySupport {
        QueueFamilySupport { graphics, present }
    }

    fn capable_device() -> PhysicalDeviceInfo {
        PhysicalDeviceInfo {
            queue_families: vec![family(true, true)],
            has_required_extensions: true,
            surface_format_count: 3,
            present_mode_count: 2,
            sampler_anisotropy: true,
        }
    }

    #[test]
    fn picks_first_family_satisfying_each_capability() {
        let families = [family(false, true), family(true, false), family(true, true)];
        assert_eq!(pick_queue_families(&families), (Some(1), Some(0)));
    }

    #[test]
    fn graphics_and_present_may_resolve_to_same_family() {
        let families = [family(true, true)];
        assert_eq!(pick_queue_families(&families), (Some(0), Some(0)));
    }

    #[test]
    fn no_capable_family_yields_none() {
        let families = [family(false, false)];
        assert_eq!(pick_queue_families(&families), (None, None));
    }

    #[test]
    fn suitable_device_passes_all_checks() {
        assert!(check_suitability(&capable_device()).is_ok());
    }

    #[test]
    fn missing_capability_fails_suitability() {
        let mut no_present = capable_device();
        no_present.queue_families = vec![family(true, false)];
        assert!(check_suitability(&no_present).is_err());

        let mut no_extensions = capable_device();
        no_extensions.has_required_extensions = false;
        assert!(check_suitability(&no_extensions).is_err());

        let mut no_formats = capable_device();
        no_formats.surface_format_count = 0;
        assert!(check_suitability(&no_formats).is_err());

        let mut no_anisotropy = capable_device();
        no_anisotropy.sampler_anisotropy = false;
        assert!(check_suitability(&no_anisotropy).is_err());
    }

    #[test]
    fn first_suitable_device_wins() {
        let mut unsuitable = capable_device();
        unsuitable.present_mode_count = 0;

        let devices = [unsuitable.clone(), capable_device(), unsuitable];
        let selected = devices
            .iter()
            .position(|info| check_suitability(info).is_ok());
        assert_eq!(selected, Some(1));
    }
}
