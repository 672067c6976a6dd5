// vulkan-context - Vulkan bootstrap and resource registry
//
// Picks a GPU, stands up a logical device and a presentable swapchain, and
// hands out typed handles for shader modules, render passes and pipelines.
//
// ┌─────────────────────────────────────────────────────────────────┐
// │  GraphicsContext                                                │
// │    ├── VulkanInstance (+ debug messenger)                       │
// │    ├── PresentationSurface (optional)                           │
// │    ├── LogicalDevice (selected by score)                        │
// │    ├── SwapchainState (images, views, depth, framebuffers)      │
// │    ├── CommandResources                                         │
// │    └── ResourceRegistry (handles → native objects)              │
// └─────────────────────────────────────────────────────────────────┘

pub mod backend;
pub mod context;
pub mod error;

pub use backend::descriptor::{
    AttachmentTarget, ColorAttachmentDescriptor, DataType, DepthAttachmentDescriptor,
    DepthStencilState, LoadAction, PrimitiveTopology, RenderPassDescriptor,
    RenderPipelineDescriptor, ShaderStage, ShaderStageDescriptor, VertexAttributeDescriptor,
    Viewport,
};
pub use backend::{
    NativeWindow, PipelineHandle, RenderPassHandle, Requirements, ShaderModuleHandle,
};
pub use context::{ContextSettings, GraphicsContext};
pub use error::{Error, Result};
