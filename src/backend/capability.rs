// Capability inspection - Snapshot of one physical device
//
// Reads properties, features, queue families, memory layout and extensions
// of a physical device into plain data. Read-only: nothing here creates or
// mutates Vulkan state, and empty or failed queries become empty lists.

use ash::vk;
use std::ffi::CStr;

/// Which kinds of work a queue family accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCapabilities {
    pub graphics: bool,
    pub compute: bool,
    pub transfer: bool,
}

impl From<vk::QueueFlags> for QueueCapabilities {
    fn from(flags: vk::QueueFlags) -> Self {
        Self {
            graphics: flags.contains(vk::QueueFlags::GRAPHICS),
            compute: flags.contains(vk::QueueFlags::COMPUTE),
            transfer: flags.contains(vk::QueueFlags::TRANSFER),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamily {
    pub index: u32,
    pub capabilities: QueueCapabilities,
    pub queue_count: u32,
}

impl QueueFamily {
    pub fn has_graphics(&self) -> bool {
        self.capabilities.graphics && self.queue_count > 0
    }
}

/// The scalar limits used for device scoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceLimits {
    pub color_sample_counts: u32,
    pub depth_sample_counts: u32,
    pub max_image_dimension_1d: u32,
    pub max_image_dimension_2d: u32,
    pub max_image_dimension_3d: u32,
}

impl From<&vk::PhysicalDeviceLimits> for DeviceLimits {
    fn from(limits: &vk::PhysicalDeviceLimits) -> Self {
        Self {
            color_sample_counts: limits.framebuffer_color_sample_counts.as_raw(),
            depth_sample_counts: limits.framebuffer_depth_sample_counts.as_raw(),
            max_image_dimension_1d: limits.max_image_dimension1_d,
            max_image_dimension_2d: limits.max_image_dimension2_d,
            max_image_dimension_3d: limits.max_image_dimension3_d,
        }
    }
}

/// Read-only snapshot of a physical device, taken once per enumeration
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub limits: DeviceLimits,
    pub features: vk::PhysicalDeviceFeatures,
    pub queue_families: Vec<QueueFamily>,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub extensions: Vec<String>,
}

impl DeviceCandidate {
    pub fn supports_graphics_queue(&self) -> bool {
        self.queue_families.iter().any(QueueFamily::has_graphics)
    }

    pub fn supports_compute_queue(&self) -> bool {
        self.queue_families
            .iter()
            .any(|family| family.capabilities.compute && family.queue_count > 0)
    }

    pub fn supports_transfer_queue(&self) -> bool {
        self.queue_families
            .iter()
            .any(|family| family.capabilities.transfer && family.queue_count > 0)
    }

    pub fn supports_extension(&self, name: &CStr) -> bool {
        let name = name.to_string_lossy();
        self.extensions.iter().any(|ext| *ext == name)
    }
}

/// Query everything the selector needs to know about `physical_device`
pub fn inspect(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> DeviceCandidate {
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    let features = unsafe { instance.get_physical_device_features(physical_device) };
    let memory_properties =
        unsafe { instance.get_physical_device_memory_properties(physical_device) };

    let queue_families = unsafe {
        instance.get_physical_device_queue_family_properties(physical_device)
    }
    .iter()
    .enumerate()
    .map(|(index, props)| QueueFamily {
        index: index as u32,
        capabilities: props.queue_flags.into(),
        queue_count: props.queue_count,
    })
    .collect();

    let extensions = match unsafe {
        instance.enumerate_device_extension_properties(physical_device)
    } {
        Ok(extensions) => extensions
            .iter()
            .map(|ext| {
                unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }
                    .to_string_lossy()
                    .into_owned()
            })
            .collect(),
        Err(e) => {
            log::warn!("Failed to enumerate device extensions: {}", e);
            Vec::new()
        }
    };

    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    log::debug!(
        "Found GPU: {} ({:?}, API {}.{}.{})",
        name,
        properties.device_type,
        vk::api_version_major(properties.api_version),
        vk::api_version_minor(properties.api_version),
        vk::api_version_patch(properties.api_version)
    );

    DeviceCandidate {
        handle: physical_device,
        name,
        device_type: properties.device_type,
        api_version: properties.api_version,
        limits: DeviceLimits::from(&properties.limits),
        features,
        queue_families,
        memory_properties,
        extensions,
    }
}
