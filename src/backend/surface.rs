// Surface - Window connection and swapchain parameter negotiation
//
// Turns the windowing collaborator's native handles into a VkSurfaceKHR and
// decides which format, present mode and extent the swapchain will use.

use ash::extensions::khr;
use ash::{vk, Entry};
use raw_window_handle::{
    HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};
use std::ffi::CStr;

use super::capability::DeviceCandidate;
use super::selector::PresentationSupport;
use crate::error::{Error, Result, VkResultExt};

/// The format we ask for whenever the surface lets us choose
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::R8G8B8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Platform window token supplied by the windowing layer.
///
/// The window itself stays owned by the caller; it must outlive the context.
#[derive(Debug, Clone, Copy)]
pub struct NativeWindow {
    pub display: RawDisplayHandle,
    pub window: RawWindowHandle,
}

impl NativeWindow {
    pub fn from_window<W: HasWindowHandle + HasDisplayHandle>(window: &W) -> Result<Self> {
        let display = window
            .display_handle()
            .map_err(|e| Error::UnsupportedWindowSystem(e.to_string()))?
            .as_raw();
        let window = window
            .window_handle()
            .map_err(|e| Error::UnsupportedWindowSystem(e.to_string()))?
            .as_raw();

        Ok(Self { display, window })
    }
}

/// Instance extensions needed to create a surface for `display`
pub fn required_instance_extensions(display: RawDisplayHandle) -> Result<Vec<&'static CStr>> {
    let platform = match display {
        RawDisplayHandle::Windows(_) => khr::Win32Surface::name(),
        RawDisplayHandle::Xlib(_) => khr::XlibSurface::name(),
        RawDisplayHandle::Xcb(_) => khr::XcbSurface::name(),
        RawDisplayHandle::Wayland(_) => khr::WaylandSurface::name(),
        other => {
            return Err(Error::UnsupportedWindowSystem(format!("{:?}", other)));
        }
    };

    Ok(vec![khr::Surface::name(), platform])
}

/// A created VkSurfaceKHR, destroyed on drop
pub struct PresentationSurface {
    pub loader: khr::Surface,
    pub raw: vk::SurfaceKHR,
}

impl PresentationSurface {
    /// Create the platform surface for `window`.
    ///
    /// The instance must have been created with
    /// [`required_instance_extensions`] for the same display.
    pub fn new(entry: &Entry, instance: &ash::Instance, window: &NativeWindow) -> Result<Self> {
        let raw = unsafe { create_platform_surface(entry, instance, window)? };
        log::info!("Created presentation surface");

        Ok(Self {
            loader: khr::Surface::new(entry, instance),
            raw,
        })
    }
}

unsafe fn create_platform_surface(
    entry: &Entry,
    instance: &ash::Instance,
    window: &NativeWindow,
) -> Result<vk::SurfaceKHR> {
    match (window.display, window.window) {
        (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(handle)) => {
            let hinstance = handle.hinstance.map(|h| h.get()).unwrap_or(0) as *const std::ffi::c_void;
            let hwnd = handle.hwnd.get() as *const std::ffi::c_void;
            let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                .hinstance(hinstance)
                .hwnd(hwnd);
            khr::Win32Surface::new(entry, instance)
                .create_win32_surface(&create_info, None)
                .creating("Win32 surface")
        }
        (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(handle)) => {
            let dpy = display.display.ok_or_else(|| {
                Error::UnsupportedWindowSystem("Xlib display handle without a display".into())
            })?;
            let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                .dpy(dpy.as_ptr().cast())
                .window(handle.window);
            khr::XlibSurface::new(entry, instance)
                .create_xlib_surface(&create_info, None)
                .creating("Xlib surface")
        }
        (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(handle)) => {
            let connection = display.connection.ok_or_else(|| {
                Error::UnsupportedWindowSystem("XCB display handle without a connection".into())
            })?;
            let create_info = vk::XcbSurfaceCreateInfoKHR::builder()
                .connection(connection.as_ptr().cast())
                .window(handle.window.get());
            khr::XcbSurface::new(entry, instance)
                .create_xcb_surface(&create_info, None)
                .creating("XCB surface")
        }
        (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(handle)) => {
            let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                .display(display.display.as_ptr().cast())
                .surface(handle.surface.as_ptr().cast());
            khr::WaylandSurface::new(entry, instance)
                .create_wayland_surface(&create_info, None)
                .creating("Wayland surface")
        }
        (display, window) => Err(Error::UnsupportedWindowSystem(format!(
            "{:?} / {:?}",
            display, window
        ))),
    }
}

impl PresentationSupport for PresentationSurface {
    fn supports_presentation(&self, device: &DeviceCandidate, queue_family: u32) -> bool {
        let supported = unsafe {
            self.loader
                .get_physical_device_surface_support(device.handle, queue_family, self.raw)
        };

        supported.unwrap_or_else(|e| {
            log::warn!(
                "Surface support query failed for '{}' family {}: {}",
                device.name,
                queue_family,
                e
            );
            false
        })
    }
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.raw, None);
        }
    }
}

/// Concrete swapchain parameters for one device/surface pair
#[derive(Debug, Clone, Copy)]
pub struct SurfaceNegotiationResult {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub extent: vk::Extent2D,
}

impl SurfaceNegotiationResult {
    pub fn min_image_count(&self) -> u32 {
        self.capabilities.min_image_count
    }
}

/// Query the surface for `physical_device` and pick swapchain parameters.
///
/// `fallback_extent` is only used when the surface leaves the size up to us.
pub fn negotiate(
    surface: &PresentationSurface,
    physical_device: vk::PhysicalDevice,
    fallback_extent: vk::Extent2D,
) -> Result<SurfaceNegotiationResult> {
    let capabilities = unsafe {
        surface
            .loader
            .get_physical_device_surface_capabilities(physical_device, surface.raw)
    }
    .querying("surface capabilities")?;

    let formats = unsafe {
        surface
            .loader
            .get_physical_device_surface_formats(physical_device, surface.raw)
    }
    .querying("surface formats")?;

    let present_modes = unsafe {
        surface
            .loader
            .get_physical_device_surface_present_modes(physical_device, surface.raw)
    }
    .querying("surface present modes")?;

    let surface_format = choose_surface_format(&formats).ok_or(Error::NoSurfaceFormat)?;
    let present_mode = choose_present_mode(&present_modes);
    let extent = resolve_extent(&capabilities, fallback_extent);

    log::debug!("Surface offers {} formats, {:?}", formats.len(), present_modes);
    log::info!(
        "Surface format: {:?} / {:?}, present mode: {:?}, extent: {}x{}",
        surface_format.format,
        surface_format.color_space,
        present_mode,
        extent.width,
        extent.height
    );

    Ok(SurfaceNegotiationResult {
        surface_format,
        present_mode,
        capabilities,
        extent,
    })
}

/// Pick a surface format.
///
/// A lone `UNDEFINED` entry means any format works, so we take the preferred
/// one. Otherwise the preferred pair wins if listed, else the first entry.
/// Returns `None` only for an empty list.
pub fn choose_surface_format(supported: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    if let [only] = supported {
        if only.format == vk::Format::UNDEFINED {
            return Some(PREFERRED_SURFACE_FORMAT);
        }
    }

    supported
        .iter()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| supported.first())
        .copied()
}

/// Pick a present mode.
///
/// MAILBOX ends the scan as soon as it is seen. IMMEDIATE is only remembered,
/// so it is used just when MAILBOX never shows up. FIFO is always available
/// and is the default.
pub fn choose_present_mode(supported: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    let mut mode = vk::PresentModeKHR::FIFO;

    for &candidate in supported {
        if candidate == vk::PresentModeKHR::MAILBOX {
            return candidate;
        } else if candidate == vk::PresentModeKHR::IMMEDIATE {
            mode = candidate;
        }
    }

    mode
}

/// The surface's current extent, or `fallback` clamped to the surface bounds
/// when the current extent is the "decided by the swapchain" sentinel.
pub fn resolve_extent(capabilities: &vk::SurfaceCapabilitiesKHR, fallback: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: fallback.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: fallback.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}
