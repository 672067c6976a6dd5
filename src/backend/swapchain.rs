// Swapchain - Window presentation images and depth attachment
//
// Builds the chain of images we render to, one view per image, a single
// depth buffer of the same size and, on request, framebuffers for a
// render pass. The whole state is torn down and rebuilt together.

use ash::vk;

use super::device::LogicalDevice;
use super::registry::RenderPassEntry;
use super::surface::{PresentationSurface, SurfaceNegotiationResult};
use crate::error::{Error, Result, VkResultExt};

/// Format of the single depth attachment
pub const DEPTH_FORMAT: vk::Format = vk::Format::D24_UNORM_S8_UINT;

pub struct SwapchainState {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,

    pub depth_image: vk::Image,
    pub depth_memory: vk::DeviceMemory,
    pub depth_view: vk::ImageView,

    /// One per swapchain image once a render pass is attached
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainState {
    fn empty(negotiation: &SurfaceNegotiationResult) -> Self {
        Self {
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: negotiation.surface_format.format,
            extent: negotiation.extent,
            depth_image: vk::Image::null(),
            depth_memory: vk::DeviceMemory::null(),
            depth_view: vk::ImageView::null(),
            framebuffers: Vec::new(),
        }
    }

    /// Build the swapchain, its views and the depth attachment.
    ///
    /// Any failing call fails the whole build. Objects this build already
    /// created are released before the error is returned; the caller should
    /// treat the context as needing a full rebuild.
    pub fn build(
        device: &LogicalDevice,
        surface: &PresentationSurface,
        negotiation: &SurfaceNegotiationResult,
    ) -> Result<Self> {
        log::info!(
            "Creating swapchain: {}x{}",
            negotiation.extent.width,
            negotiation.extent.height
        );

        let mut state = Self::empty(negotiation);
        if let Err(e) = state.populate(device, surface, negotiation) {
            log::error!("Swapchain build failed: {}", e);
            unsafe { state.destroy(device) };
            return Err(e);
        }

        Ok(state)
    }

    fn populate(
        &mut self,
        device: &LogicalDevice,
        surface: &PresentationSurface,
        negotiation: &SurfaceNegotiationResult,
    ) -> Result<()> {
        let loader = swapchain_loader(device)?;

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.raw)
            .min_image_count(negotiation.min_image_count())
            .image_format(negotiation.surface_format.format)
            .image_color_space(negotiation.surface_format.color_space)
            .image_extent(negotiation.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(negotiation.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(negotiation.present_mode)
            .clipped(true);

        self.swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .creating("swapchain")?;

        self.images = unsafe { loader.get_swapchain_images(self.swapchain) }
            .querying("swapchain images")?;

        log::info!("Created swapchain with {} images", self.images.len());

        // Create image views
        let components = component_mapping_for(self.format);
        for &image in &self.images {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format)
                .components(components)
                .subresource_range(subresource_range(vk::ImageAspectFlags::COLOR));

            let view = unsafe { device.device.create_image_view(&create_info, None) }
                .creating("swapchain image view")?;
            self.image_views.push(view);
        }

        self.create_depth_buffer(device)
    }

    fn create_depth_buffer(&mut self, device: &LogicalDevice) -> Result<()> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(DEPTH_FORMAT)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        self.depth_image = unsafe { device.device.create_image(&image_info, None) }
            .creating("depth image")?;

        let requirements = unsafe { device.device.get_image_memory_requirements(self.depth_image) };
        let memory_type_index = first_memory_type_heap(&device.memory_properties);

        if requirements.memory_type_bits & (1 << memory_type_index) == 0 {
            log::warn!(
                "Depth memory type {} is not in the image's allowed set {:#b}",
                memory_type_index,
                requirements.memory_type_bits
            );
        }

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        self.depth_memory = unsafe { device.device.allocate_memory(&alloc_info, None) }
            .creating("depth image memory")?;

        unsafe {
            device
                .device
                .bind_image_memory(self.depth_image, self.depth_memory, 0)
        }
        .creating("depth image memory binding")?;

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(self.depth_image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .subresource_range(subresource_range(vk::ImageAspectFlags::DEPTH));

        self.depth_view = unsafe { device.device.create_image_view(&view_info, None) }
            .creating("depth image view")?;

        Ok(())
    }

    /// Create one framebuffer per swapchain image for `render_pass`,
    /// replacing any previous set. The depth view is attached after the
    /// color view when the render pass has a depth attachment.
    pub fn attach_framebuffers(
        &mut self,
        device: &LogicalDevice,
        render_pass: &RenderPassEntry,
    ) -> Result<()> {
        if render_pass.color_attachment_count > 1 {
            return Err(Error::InvalidDescriptor(format!(
                "framebuffers need at most one color attachment, render pass has {}",
                render_pass.color_attachment_count
            )));
        }

        self.destroy_framebuffers(device);

        for &view in &self.image_views {
            let mut attachments = Vec::with_capacity(2);
            if render_pass.color_attachment_count == 1 {
                attachments.push(view);
            }
            if render_pass.has_depth {
                attachments.push(self.depth_view);
            }

            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass.raw)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            let framebuffer = unsafe { device.device.create_framebuffer(&framebuffer_info, None) }
                .creating("framebuffer")?;
            self.framebuffers.push(framebuffer);
        }

        log::debug!("Attached {} framebuffers", self.framebuffers.len());
        Ok(())
    }

    pub(crate) fn destroy_framebuffers(&mut self, device: &LogicalDevice) {
        for framebuffer in self.framebuffers.drain(..) {
            unsafe { device.device.destroy_framebuffer(framebuffer, None) };
        }
    }

    /// Destroy everything in reverse creation order. Null handles left by a
    /// failed build are skipped.
    ///
    /// # Safety
    /// The GPU must be done with every image, view and framebuffer.
    pub unsafe fn destroy(&mut self, device: &LogicalDevice) {
        self.destroy_framebuffers(device);

        let d = &device.device;
        if self.depth_view != vk::ImageView::null() {
            d.destroy_image_view(self.depth_view, None);
        }
        if self.depth_memory != vk::DeviceMemory::null() {
            d.free_memory(self.depth_memory, None);
        }
        if self.depth_image != vk::Image::null() {
            d.destroy_image(self.depth_image, None);
        }

        for view in self.image_views.drain(..) {
            d.destroy_image_view(view, None);
        }
        self.images.clear();

        if self.swapchain != vk::SwapchainKHR::null() {
            if let Some(loader) = &device.swapchain_loader {
                loader.destroy_swapchain(self.swapchain, None);
            }
        }

        self.depth_view = vk::ImageView::null();
        self.depth_memory = vk::DeviceMemory::null();
        self.depth_image = vk::Image::null();
        self.swapchain = vk::SwapchainKHR::null();
    }
}

fn swapchain_loader(device: &LogicalDevice) -> Result<&ash::extensions::khr::Swapchain> {
    device
        .swapchain_loader
        .as_ref()
        .ok_or(Error::MissingWindow)
}

fn subresource_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Channel mapping for a swapchain view of `format`.
///
/// Formats that store blue first get red and blue swapped; everything else
/// maps straight through.
pub fn component_mapping_for(format: vk::Format) -> vk::ComponentMapping {
    let swapped = matches!(
        format,
        vk::Format::B8G8R8A8_UNORM
            | vk::Format::B8G8R8A8_SRGB
            | vk::Format::B8G8R8A8_SNORM
            | vk::Format::B8G8R8A8_UINT
            | vk::Format::B8G8R8A8_SINT
    );

    if swapped {
        vk::ComponentMapping {
            r: vk::ComponentSwizzle::B,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::R,
            a: vk::ComponentSwizzle::IDENTITY,
        }
    } else {
        vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        }
    }
}

/// Memory type for the depth buffer: the heap index of the first reported
/// memory type.
///
/// Known-naive: it ignores the image's `memory_type_bits` and required
/// property flags, and a heap index is not a memory type index. The build
/// logs a warning when the result is not allowed for the image.
pub fn first_memory_type_heap(memory_properties: &vk::PhysicalDeviceMemoryProperties) -> u32 {
    memory_properties.memory_types[0].heap_index
}
