// Vulkan Device - Logical device and queues
//
// Responsibilities:
// - Logical device creation on the selected GPU
// - One queue per distinct family (graphics, presentation)
// - Swapchain loader when presentation is enabled

use ash::vk;

use super::selector::{Requirements, SelectedDevice};
use crate::error::{Result, VkResultExt};

/// Logical device wrapper, destroyed on drop.
///
/// Everything created from `device` must be destroyed before this is dropped.
pub struct LogicalDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,

    // Queue handles
    pub graphics_family: u32,
    pub graphics_queue: Option<vk::Queue>,
    pub present_family: Option<u32>,
    pub present_queue: Option<vk::Queue>,

    pub swapchain_loader: Option<ash::extensions::khr::Swapchain>,
}

impl LogicalDevice {
    pub fn new(
        instance: &ash::Instance,
        selected: &SelectedDevice,
        requirements: &Requirements,
    ) -> Result<Self> {
        let physical_device = selected.candidate.handle;
        let families = queue_families(selected.graphics_family, selected.present_family);

        let queue_priorities = [1.0];
        let queue_create_infos: Vec<_> = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        // Required device extensions
        let mut extensions = Vec::new();
        if requirements.needs_presentation {
            extensions.push(ash::extensions::khr::Swapchain::name().as_ptr());
        }

        // Everything the device reports is turned on
        let features = selected.candidate.features;

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .creating("logical device")?;

        let graphics_queue = requirements
            .needs_graphics_queue
            .then(|| unsafe { device.get_device_queue(selected.graphics_family, 0) });
        let present_queue = selected
            .present_family
            .map(|family| unsafe { device.get_device_queue(family, 0) });

        let swapchain_loader = requirements
            .needs_presentation
            .then(|| ash::extensions::khr::Swapchain::new(instance, &device));

        log::info!(
            "Created logical device with {} queue famil{}",
            families.len(),
            if families.len() == 1 { "y" } else { "ies" }
        );

        Ok(Self {
            device,
            physical_device,
            memory_properties: selected.candidate.memory_properties,
            graphics_family: selected.graphics_family,
            graphics_queue,
            present_family: selected.present_family,
            present_queue,
            swapchain_loader,
        })
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.querying("device idle")
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        log::info!("Destroying logical device...");

        let _ = self.wait_idle();
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

/// Distinct families that need a queue, graphics first
fn queue_families(graphics: u32, present: Option<u32>) -> Vec<u32> {
    let mut families = vec![graphics];
    if let Some(present) = present {
        if present != graphics {
            families.push(present);
        }
    }
    families
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_family_gets_one_queue() {
        assert_eq!(queue_families(0, Some(0)), vec![0]);
    }

    #[test]
    fn test_separate_present_family() {
        assert_eq!(queue_families(0, Some(2)), vec![0, 2]);
        assert_eq!(queue_families(1, None), vec![1]);
    }
}
