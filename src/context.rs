// =============================================================================
// GRAPHICS CONTEXT - Owns every native object
// =============================================================================
//
// Bring-up order:
// 1. Instance (+ surface extensions, validation)
// 2. Surface from the native window (presentation only)
// 3. Capability snapshot of every GPU, selection by score
// 4. Logical device and queues
// 5. Surface negotiation and swapchain (presentation only)
// 6. Command pool, primary command buffer, descriptor pool
//
// Teardown runs the other way round. Fields are declared so that the ones
// with their own Drop (device, surface, instance) go last, in that order.

use ash::vk;

use crate::backend::commands::CommandResources;
use crate::backend::descriptor::{RenderPassDescriptor, RenderPipelineDescriptor};
use crate::backend::pipeline::{self, AttachmentFormats, PipelineBlueprint};
use crate::backend::selector::{self, Headless, PresentationSupport};
use crate::backend::surface::{self, PREFERRED_SURFACE_FORMAT};
use crate::backend::swapchain::DEPTH_FORMAT;
use crate::backend::{
    shader, DeviceCandidate, LogicalDevice, PipelineHandle, PresentationSurface,
    RenderPassHandle, Requirements, ResourceRegistry, ShaderModuleHandle,
    SurfaceNegotiationResult, SwapchainState, VulkanInstance,
};
use crate::error::{Error, Result};

/// Settings that do not influence device selection
#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub app_name: String,
    pub enable_validation: bool,
    /// Swapchain size when the surface leaves it up to us
    pub fallback_extent: vk::Extent2D,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            app_name: "vulkan-context".to_string(),
            enable_validation: cfg!(debug_assertions),
            fallback_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
        }
    }
}

pub struct GraphicsContext {
    registry: ResourceRegistry,
    commands: Option<CommandResources>,
    swapchain: Option<SwapchainState>,
    negotiation: Option<SurfaceNegotiationResult>,
    selected: DeviceCandidate,

    device: LogicalDevice,
    surface: Option<PresentationSurface>,
    // Only held so it is destroyed last
    #[allow(dead_code)]
    instance: VulkanInstance,
}

impl GraphicsContext {
    /// Bring up a context for `requirements`.
    ///
    /// Fails with `MissingWindow` before touching Vulkan when presentation
    /// is required without a window.
    pub fn new(settings: &ContextSettings, requirements: Requirements) -> Result<Self> {
        let window = match (requirements.needs_presentation, requirements.window) {
            (true, None) => return Err(Error::MissingWindow),
            (true, Some(window)) => Some(window),
            (false, _) => None,
        };

        let surface_extensions = match &window {
            Some(window) => surface::required_instance_extensions(window.display)?,
            None => Vec::new(),
        };

        let instance = VulkanInstance::new(
            &settings.app_name,
            &surface_extensions,
            settings.enable_validation,
        )?;

        let surface = window
            .as_ref()
            .map(|window| PresentationSurface::new(&instance.entry, &instance.instance, window))
            .transpose()?;

        let candidates = instance.enumerate_candidates()?;
        let presentation: &dyn PresentationSupport = match &surface {
            Some(surface) => surface,
            None => &Headless,
        };
        let selected = selector::select_device(candidates, &requirements, presentation)?;
        let device = LogicalDevice::new(&instance.instance, &selected, &requirements)?;

        // From here on Drop cleans up whatever has been created
        let mut context = Self {
            registry: ResourceRegistry::new(),
            commands: None,
            swapchain: None,
            negotiation: None,
            selected: selected.candidate,
            device,
            surface,
            instance,
        };

        if context.surface.is_some() {
            context.build_swapchain(settings.fallback_extent)?;
        }

        context.commands = Some(CommandResources::new(
            &context.device.device,
            context.device.graphics_family,
        )?);

        log::info!("Graphics context ready");
        Ok(context)
    }

    fn build_swapchain(&mut self, fallback_extent: vk::Extent2D) -> Result<()> {
        let surface = self.surface.as_ref().ok_or(Error::MissingWindow)?;

        let negotiation = surface::negotiate(surface, self.device.physical_device, fallback_extent)?;
        self.negotiation = Some(negotiation);

        if negotiation.extent.width == 0 || negotiation.extent.height == 0 {
            log::debug!("Surface has zero extent, skipping swapchain");
            return Ok(());
        }

        self.swapchain = Some(SwapchainState::build(&self.device, surface, &negotiation)?);
        Ok(())
    }

    /// Tear down and rebuild the swapchain for a new window size.
    ///
    /// Framebuffers are not carried over; attach them again afterwards.
    pub fn rebuild_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        if self.surface.is_none() {
            return Err(Error::MissingWindow);
        }

        self.device.wait_idle()?;
        if let Some(mut old) = self.swapchain.take() {
            unsafe { old.destroy(&self.device) };
        }

        self.build_swapchain(vk::Extent2D { width, height })
    }

    // =========================================================================
    // RESOURCES
    // =========================================================================

    pub fn create_shader_module(&mut self, code: &[u32]) -> Result<ShaderModuleHandle> {
        let module = shader::create_shader_module(&self.device.device, code)?;
        let handle = self.registry.insert_shader_module(module);

        log::debug!("Created shader module {}", handle);
        Ok(handle)
    }

    /// Shader module from a SPIR-V binary as read from disk
    pub fn create_shader_module_from_bytes(&mut self, bytes: &[u8]) -> Result<ShaderModuleHandle> {
        let code = shader::spirv_from_bytes(bytes)?;
        self.create_shader_module(&code)
    }

    pub fn create_shader_module_from_source(&mut self, source: &str) -> Result<ShaderModuleHandle> {
        let code = shader::compile_source(source)?;
        self.create_shader_module(&code)
    }

    pub fn create_render_pass(&mut self, descriptor: &RenderPassDescriptor) -> Result<RenderPassHandle> {
        let formats = AttachmentFormats {
            color: self
                .swapchain
                .as_ref()
                .map_or(PREFERRED_SURFACE_FORMAT.format, |swapchain| swapchain.format),
            depth: DEPTH_FORMAT,
        };

        let layout = pipeline::describe_render_pass(descriptor, formats)?;
        let entry = pipeline::create_render_pass(&self.device.device, layout)?;
        let handle = self.registry.insert_render_pass(entry);

        log::debug!(
            "Created render pass {} ({} color, depth: {})",
            handle,
            descriptor.color_attachments.len(),
            descriptor.depth_attachment.is_some()
        );
        Ok(handle)
    }

    pub fn create_render_pipeline(
        &mut self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<PipelineHandle> {
        let blueprint = PipelineBlueprint::resolve(&self.registry, descriptor)?;
        let entry = pipeline::create_pipeline(&self.device.device, &blueprint)?;
        let handle = self.registry.insert_pipeline(entry);

        log::debug!("Created pipeline {} on render pass {}", handle, descriptor.render_pass);
        Ok(handle)
    }

    /// Create one framebuffer per swapchain image for `render_pass`
    pub fn attach_framebuffers(&mut self, render_pass: RenderPassHandle) -> Result<()> {
        let entry = self.registry.render_pass(render_pass)?;
        let swapchain = self.swapchain.as_mut().ok_or(Error::MissingWindow)?;

        swapchain.attach_framebuffers(&self.device, entry)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn device(&self) -> &ash::Device {
        &self.device.device
    }

    pub fn physical_device_name(&self) -> &str {
        &self.selected.name
    }

    pub fn physical_device_type(&self) -> vk::PhysicalDeviceType {
        self.selected.device_type
    }

    pub fn graphics_queue_family(&self) -> u32 {
        self.device.graphics_family
    }

    pub fn graphics_queue(&self) -> Option<vk::Queue> {
        self.device.graphics_queue
    }

    pub fn present_queue_family(&self) -> Option<u32> {
        self.device.present_family
    }

    pub fn present_queue(&self) -> Option<vk::Queue> {
        self.device.present_queue
    }

    pub fn surface_format(&self) -> Option<vk::SurfaceFormatKHR> {
        self.negotiation.map(|n| n.surface_format)
    }

    pub fn present_mode(&self) -> Option<vk::PresentModeKHR> {
        self.negotiation.map(|n| n.present_mode)
    }

    pub fn swapchain_extent(&self) -> Option<vk::Extent2D> {
        self.swapchain.as_ref().map(|s| s.extent)
    }

    pub fn swapchain_image_count(&self) -> usize {
        self.swapchain.as_ref().map_or(0, |s| s.images.len())
    }

    pub fn framebuffer(&self, image_index: usize) -> Option<vk::Framebuffer> {
        self.swapchain
            .as_ref()
            .and_then(|s| s.framebuffers.get(image_index).copied())
    }

    pub fn command_buffer(&self) -> Option<vk::CommandBuffer> {
        self.commands.as_ref().map(|c| c.command_buffer)
    }

    pub fn descriptor_pool(&self) -> Option<vk::DescriptorPool> {
        self.commands.as_ref().map(|c| c.descriptor_pool)
    }
}

/// Objects the context destroys itself, in order. Framebuffers are built
/// from registry render passes, so they go before the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    Framebuffers,
    Registry,
    Commands,
    Swapchain,
}

const TEARDOWN_ORDER: [Teardown; 4] = [
    Teardown::Framebuffers,
    Teardown::Registry,
    Teardown::Commands,
    Teardown::Swapchain,
];

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        log::info!("Cleaning up graphics context...");

        if let Err(e) = self.device.wait_idle() {
            log::warn!("Device wait before teardown failed: {}", e);
        }

        // 1. Framebuffers  2. Pipelines, render passes, shader modules
        // 3. Command and descriptor pools  4. Swapchain, views, depth buffer
        for step in TEARDOWN_ORDER {
            match step {
                Teardown::Framebuffers => {
                    if let Some(swapchain) = self.swapchain.as_mut() {
                        swapchain.destroy_framebuffers(&self.device);
                    }
                }
                Teardown::Registry => unsafe { self.registry.destroy(&self.device.device) },
                Teardown::Commands => {
                    if let Some(commands) = self.commands.take() {
                        unsafe { commands.destroy(&self.device.device) };
                    }
                }
                Teardown::Swapchain => {
                    if let Some(mut swapchain) = self.swapchain.take() {
                        unsafe { swapchain.destroy(&self.device) };
                    }
                }
            }
        }

        // 5. Device, surface and instance drop next, in field order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presentation_without_window_fails_early() {
        let requirements = Requirements {
            needs_presentation: true,
            needs_graphics_queue: true,
            window: None,
        };

        let result = GraphicsContext::new(&ContextSettings::default(), requirements);
        assert!(matches!(result, Err(Error::MissingWindow)));
    }

    #[test]
    fn test_framebuffers_go_before_their_render_passes() {
        let position = |step| TEARDOWN_ORDER.iter().position(|&s| s == step).unwrap();

        assert!(position(Teardown::Framebuffers) < position(Teardown::Registry));
        assert!(position(Teardown::Registry) < position(Teardown::Commands));
        assert!(position(Teardown::Commands) < position(Teardown::Swapchain));
    }

    #[test]
    fn test_default_settings() {
        let settings = ContextSettings::default();
        assert_eq!(settings.fallback_extent.width, 1280);
        assert_eq!(settings.fallback_extent.height, 720);
        assert_eq!(settings.enable_validation, cfg!(debug_assertions));
    }
}
