// Backend module - Vulkan abstraction layer
//
// Thin wrappers around ash. Leaves first: capability inspection and device
// selection, surface negotiation, swapchain, then the resource registry and
// the creation paths that feed it.

pub mod capability;
pub mod commands;
pub mod descriptor;
pub mod device;
pub mod instance;
pub mod pipeline;
pub mod registry;
pub mod selector;
pub mod shader;
pub mod surface;
pub mod swapchain;

pub use capability::DeviceCandidate;
pub use device::LogicalDevice;
pub use instance::VulkanInstance;
pub use registry::{PipelineHandle, RenderPassHandle, ResourceRegistry, ShaderModuleHandle};
pub use selector::{Requirements, SelectedDevice};
pub use surface::{NativeWindow, PresentationSurface, SurfaceNegotiationResult};
pub use swapchain::SwapchainState;
