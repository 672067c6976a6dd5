// Vulkan Instance - Library loading, instance and debug messenger
//
// Responsibilities:
// - Load the Vulkan loader
// - Instance creation with validation layers and surface extensions
// - Route validation messages into the `log` facade
// - Enumerate physical devices for the capability inspector

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use std::ffi::{CStr, CString};

use super::capability::{self, DeviceCandidate};
use crate::error::{Error, Result, VkResultExt};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

type Messenger = (DebugUtils, vk::DebugUtilsMessengerEXT);

/// Loaded library + instance, destroyed on drop
pub struct VulkanInstance {
    messenger: Option<Messenger>,
    pub instance: ash::Instance,
    pub entry: Entry,
}

impl VulkanInstance {
    /// Load Vulkan and create the instance. `surface_extensions` is empty
    /// for a headless context. Validation is silently skipped (with a
    /// warning) when the layer is not installed.
    pub fn new(
        app_name: &str,
        surface_extensions: &[&CStr],
        enable_validation: bool,
    ) -> Result<Self> {
        log::info!("Creating Vulkan instance: {}", app_name);

        let entry = unsafe { Entry::load() }?;

        let validation = enable_validation && Self::validation_available(&entry);
        if enable_validation && !validation {
            log::warn!("Validation layers requested but not installed");
        }

        let app_name_cstr = CString::new(app_name).map_err(|_| {
            Error::InvalidDescriptor(format!("application name {:?} contains NUL", app_name))
        })?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"vulkan-context")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions: Vec<*const std::ffi::c_char> =
            surface_extensions.iter().map(|ext| ext.as_ptr()).collect();
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .creating("Vulkan instance")?;

        let messenger = if validation {
            match Self::create_messenger(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            messenger,
            instance,
            entry,
        })
    }

    fn validation_available(entry: &Entry) -> bool {
        match entry.enumerate_instance_layer_properties() {
            Ok(layers) => layers.iter().any(|layer| {
                let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                name == VALIDATION_LAYER
            }),
            Err(e) => {
                log::warn!("Failed to enumerate instance layers: {}", e);
                false
            }
        }
    }

    fn create_messenger(entry: &Entry, instance: &ash::Instance) -> Result<Messenger> {
        let debug_utils = DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(forward_to_log));

        let messenger = unsafe {
            debug_utils.create_debug_utils_messenger(&create_info, None)
        }
        .creating("debug messenger")?;

        Ok((debug_utils, messenger))
    }

    /// Snapshot every physical device, in enumeration order
    pub fn enumerate_candidates(&self) -> Result<Vec<DeviceCandidate>> {
        let devices = unsafe { self.instance.enumerate_physical_devices() }
            .querying("physical devices")?;

        log::info!("Found {} Vulkan device(s)", devices.len());

        Ok(devices
            .into_iter()
            .map(|device| capability::inspect(&self.instance, device))
            .collect())
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan instance...");

        unsafe {
            if let Some((debug_utils, messenger)) = self.messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Level a validation message is logged at
fn log_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::Level::Debug
    } else {
        log::Level::Trace
    }
}

/// Routes layer messages into `log`, tagged with the message type
unsafe extern "system" fn forward_to_log(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }

    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();
    log::log!(target: "vulkan", log_level(severity), "[{:?}] {}", message_type, message);

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_severity_levels() {
        type Severity = vk::DebugUtilsMessageSeverityFlagsEXT;

        assert_eq!(log_level(Severity::ERROR), log::Level::Error);
        assert_eq!(log_level(Severity::WARNING), log::Level::Warn);
        assert_eq!(log_level(Severity::INFO), log::Level::Debug);
        assert_eq!(log_level(Severity::VERBOSE), log::Level::Trace);
    }
}
