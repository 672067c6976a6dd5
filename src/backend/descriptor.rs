// Resource descriptors - Plain-value requests for registry objects
//
// Callers describe render passes and pipelines with these types; the
// backend translates them into native create-infos. No Vulkan types leak
// through here.

use glam::Vec4;

use super::registry::{RenderPassHandle, ShaderModuleHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    UnsignedByte,
    Byte,
    UnsignedInt16,
    Int16,
    UnsignedInt32,
    Int32,
    UnsignedInt64,
    Int64,
    Float16,
    Float32,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadAction {
    /// Previous contents are undefined
    #[default]
    None,
    Load,
    Clear,
}

/// Images owned by the context that a render pass can draw into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentTarget {
    SwapchainImage,
    DepthBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachmentDescriptor {
    pub load_action: LoadAction,
    pub target: AttachmentTarget,
    pub clear_colour: Vec4,
}

impl Default for ColorAttachmentDescriptor {
    fn default() -> Self {
        Self {
            load_action: LoadAction::Clear,
            target: AttachmentTarget::SwapchainImage,
            clear_colour: Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAttachmentDescriptor {
    pub load_action: LoadAction,
    pub target: AttachmentTarget,
    pub clear_depth: f32,
}

impl Default for DepthAttachmentDescriptor {
    fn default() -> Self {
        Self {
            load_action: LoadAction::Clear,
            target: AttachmentTarget::DepthBuffer,
            clear_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPassDescriptor {
    pub color_attachments: Vec<ColorAttachmentDescriptor>,
    pub depth_attachment: Option<DepthAttachmentDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    TessellationControl,
    TessellationEvaluation,
    Compute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStageDescriptor {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub module: ShaderModuleHandle,
}

impl ShaderStageDescriptor {
    pub fn new(stage: ShaderStage, module: ShaderModuleHandle) -> Self {
        Self {
            stage,
            entry_point: "main".to_string(),
            module,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttributeDescriptor {
    pub data_type: DataType,
    pub elements: u8,
    pub offset: u32,
    pub location: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-target viewport with the usual 0..1 depth range
    pub fn with_size(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepthStencilState {
    pub test: bool,
    pub write: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveTopology {
    Points,
    Lines,
    #[default]
    Triangles,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPipelineDescriptor {
    pub render_pass: RenderPassHandle,
    pub shader_stages: Vec<ShaderStageDescriptor>,
    pub vertex_attributes: Vec<VertexAttributeDescriptor>,
    pub viewports: Vec<Viewport>,
    pub depth_stencil: DepthStencilState,
    pub topology: PrimitiveTopology,
    pub primitive_restart: bool,
    /// Size of a vertex-stage push constant block, 0 for none
    pub push_constant_bytes: u32,
}

impl RenderPipelineDescriptor {
    pub fn new(render_pass: RenderPassHandle) -> Self {
        Self {
            render_pass,
            shader_stages: Vec::new(),
            vertex_attributes: Vec::new(),
            viewports: Vec::new(),
            depth_stencil: DepthStencilState::default(),
            topology: PrimitiveTopology::default(),
            primitive_restart: false,
            push_constant_bytes: 0,
        }
    }
}
