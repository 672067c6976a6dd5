// Render pass and graphics pipeline creation
//
// Translates caller descriptors into native create-infos. Translation is
// kept apart from the native calls so handle resolution and format mapping
// fail before anything is created on the device.

use ash::vk;
use std::ffi::CString;
use std::fmt;

use super::descriptor::{
    AttachmentTarget, DataType, LoadAction, PrimitiveTopology, RenderPassDescriptor,
    RenderPipelineDescriptor, ShaderStage, VertexAttributeDescriptor, Viewport,
};
use super::registry::{PipelineEntry, RenderPassEntry, RenderPassHandle, ResourceRegistry};
use crate::error::{Error, Result, VkResultExt};

// =============================================================================
// RENDER PASS
// =============================================================================

/// Formats of the images render pass targets resolve to
#[derive(Debug, Clone, Copy)]
pub struct AttachmentFormats {
    pub color: vk::Format,
    pub depth: vk::Format,
}

/// Attachment descriptions and references for a single-subpass render pass
#[derive(Clone)]
pub struct RenderPassLayout {
    pub attachments: Vec<vk::AttachmentDescription>,
    pub color_refs: Vec<vk::AttachmentReference>,
    pub depth_ref: Option<vk::AttachmentReference>,
    pub clear_values: Vec<vk::ClearValue>,
}

impl fmt::Debug for RenderPassLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPassLayout")
            .field("attachments", &self.attachments)
            .field("color_refs", &self.color_refs)
            .field("depth_ref", &self.depth_ref)
            .field("clear_values", &self.clear_values.len())
            .finish()
    }
}

pub fn load_op(action: LoadAction) -> vk::AttachmentLoadOp {
    match action {
        LoadAction::None => vk::AttachmentLoadOp::DONT_CARE,
        LoadAction::Load => vk::AttachmentLoadOp::LOAD,
        LoadAction::Clear => vk::AttachmentLoadOp::CLEAR,
    }
}

/// Translate a render pass descriptor.
///
/// Color attachments come first in descriptor order, the depth attachment
/// (if any) last. An empty descriptor is valid and yields no attachments.
pub fn describe_render_pass(
    descriptor: &RenderPassDescriptor,
    formats: AttachmentFormats,
) -> Result<RenderPassLayout> {
    let mut layout = RenderPassLayout {
        attachments: Vec::with_capacity(descriptor.color_attachments.len() + 1),
        color_refs: Vec::with_capacity(descriptor.color_attachments.len()),
        depth_ref: None,
        clear_values: Vec::with_capacity(descriptor.color_attachments.len() + 1),
    };

    for (index, attachment) in descriptor.color_attachments.iter().enumerate() {
        if attachment.target != AttachmentTarget::SwapchainImage {
            return Err(Error::InvalidDescriptor(format!(
                "color attachment {} targets {:?}",
                index, attachment.target
            )));
        }

        // Loading needs the image to arrive in the layout it was left in
        let initial_layout = match attachment.load_action {
            LoadAction::Load => vk::ImageLayout::PRESENT_SRC_KHR,
            _ => vk::ImageLayout::UNDEFINED,
        };

        layout.attachments.push(
            vk::AttachmentDescription::builder()
                .format(formats.color)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(load_op(attachment.load_action))
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(initial_layout)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                .build(),
        );
        layout.color_refs.push(
            vk::AttachmentReference::builder()
                .attachment(index as u32)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .build(),
        );
        layout.clear_values.push(vk::ClearValue {
            color: vk::ClearColorValue {
                float32: attachment.clear_colour.to_array(),
            },
        });
    }

    if let Some(depth) = &descriptor.depth_attachment {
        if depth.target != AttachmentTarget::DepthBuffer {
            return Err(Error::InvalidDescriptor(format!(
                "depth attachment targets {:?}",
                depth.target
            )));
        }

        let initial_layout = match depth.load_action {
            LoadAction::Load => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            _ => vk::ImageLayout::UNDEFINED,
        };

        layout.attachments.push(
            vk::AttachmentDescription::builder()
                .format(formats.depth)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(load_op(depth.load_action))
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(initial_layout)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build(),
        );
        layout.depth_ref = Some(
            vk::AttachmentReference::builder()
                .attachment(descriptor.color_attachments.len() as u32)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build(),
        );
        layout.clear_values.push(vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: depth.clear_depth,
                stencil: 0,
            },
        });
    }

    Ok(layout)
}

/// Create a single-subpass render pass from a translated layout
pub fn create_render_pass(device: &ash::Device, layout: RenderPassLayout) -> Result<RenderPassEntry> {
    let mut subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&layout.color_refs);
    if let Some(depth_ref) = layout.depth_ref.as_ref() {
        subpass = subpass.depth_stencil_attachment(depth_ref);
    }

    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
        .build();

    let subpasses = [subpass.build()];
    let dependencies = [dependency];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&layout.attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let raw = unsafe { device.create_render_pass(&render_pass_info, None) }
        .creating("render pass")?;

    Ok(RenderPassEntry {
        raw,
        color_attachment_count: layout.color_refs.len() as u32,
        has_depth: layout.depth_ref.is_some(),
        clear_values: layout.clear_values,
    })
}

// =============================================================================
// GRAPHICS PIPELINE
// =============================================================================

/// Native format for a vertex attribute.
///
/// Only 32-bit float and signed int with 1 to 4 components are mapped.
pub fn vertex_format(data_type: DataType, elements: u8) -> Result<vk::Format> {
    let format = match (data_type, elements) {
        (DataType::Float32, 1) => vk::Format::R32_SFLOAT,
        (DataType::Float32, 2) => vk::Format::R32G32_SFLOAT,
        (DataType::Float32, 3) => vk::Format::R32G32B32_SFLOAT,
        (DataType::Float32, 4) => vk::Format::R32G32B32A32_SFLOAT,
        (DataType::Int32, 1) => vk::Format::R32_SINT,
        (DataType::Int32, 2) => vk::Format::R32G32_SINT,
        (DataType::Int32, 3) => vk::Format::R32G32B32_SINT,
        (DataType::Int32, 4) => vk::Format::R32G32B32A32_SINT,
        _ => {
            return Err(Error::UnsupportedVertexFormat {
                data_type,
                elements,
            })
        }
    };

    Ok(format)
}

pub fn primitive_topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::Points => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::Lines => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::Triangles => vk::PrimitiveTopology::TRIANGLE_LIST,
    }
}

pub fn shader_stage_flags(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
        ShaderStage::TessellationControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ShaderStage::TessellationEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

/// Vertex input for a single interleaved binding
#[derive(Debug, Clone, Default)]
pub struct VertexInput {
    pub binding: Option<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

/// Translate attributes into binding 0. The stride is the end of the
/// furthest attribute.
pub fn translate_vertex_input(attributes: &[VertexAttributeDescriptor]) -> Result<VertexInput> {
    let mut input = VertexInput::default();
    let mut stride = 0;

    for attribute in attributes {
        let format = vertex_format(attribute.data_type, attribute.elements)?;
        // Every mapped format uses 4-byte components
        let end = attribute
            .offset
            .checked_add(4 * u32::from(attribute.elements))
            .ok_or_else(|| {
                Error::InvalidDescriptor(format!(
                    "vertex attribute at location {} ends past u32::MAX (offset {})",
                    attribute.location, attribute.offset
                ))
            })?;
        stride = stride.max(end);

        input.attributes.push(
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(attribute.location)
                .format(format)
                .offset(attribute.offset)
                .build(),
        );
    }

    if !input.attributes.is_empty() {
        input.binding = Some(
            vk::VertexInputBindingDescription::builder()
                .binding(0)
                .stride(stride)
                .input_rate(vk::VertexInputRate::VERTEX)
                .build(),
        );
    }

    Ok(input)
}

#[derive(Debug, Clone)]
pub struct ResolvedStage {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
    pub entry_point: CString,
}

/// A pipeline descriptor with every handle resolved and every enum mapped
#[derive(Debug, Clone)]
pub struct PipelineBlueprint {
    pub render_pass_handle: RenderPassHandle,
    pub render_pass: vk::RenderPass,
    pub color_attachment_count: u32,
    pub stages: Vec<ResolvedStage>,
    pub vertex_input: VertexInput,
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart: bool,
    pub viewports: Vec<vk::Viewport>,
    pub scissors: Vec<vk::Rect2D>,
    pub depth_test: bool,
    pub depth_write: bool,
    pub push_constant_bytes: u32,
}

impl PipelineBlueprint {
    pub fn resolve(registry: &ResourceRegistry, descriptor: &RenderPipelineDescriptor) -> Result<Self> {
        let render_pass = registry.render_pass(descriptor.render_pass)?;
        let vertex_input = translate_vertex_input(&descriptor.vertex_attributes)?;

        let stages = descriptor
            .shader_stages
            .iter()
            .map(|stage| {
                if stage.stage == ShaderStage::Compute {
                    return Err(Error::InvalidDescriptor(
                        "compute stage in a graphics pipeline".to_string(),
                    ));
                }
                let module = registry.shader_module(stage.module)?;
                let entry_point = CString::new(stage.entry_point.as_str()).map_err(|_| {
                    Error::InvalidDescriptor(format!(
                        "entry point {:?} contains NUL",
                        stage.entry_point
                    ))
                })?;

                Ok(ResolvedStage {
                    stage: shader_stage_flags(stage.stage),
                    module,
                    entry_point,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if descriptor.push_constant_bytes % 4 != 0 {
            return Err(Error::InvalidDescriptor(format!(
                "push constant size {} is not a multiple of 4",
                descriptor.push_constant_bytes
            )));
        }

        Ok(Self {
            render_pass_handle: descriptor.render_pass,
            render_pass: render_pass.raw,
            color_attachment_count: render_pass.color_attachment_count,
            stages,
            vertex_input,
            topology: primitive_topology(descriptor.topology),
            primitive_restart: descriptor.primitive_restart,
            viewports: descriptor.viewports.iter().map(native_viewport).collect(),
            scissors: descriptor.viewports.iter().map(scissor_for).collect(),
            depth_test: descriptor.depth_stencil.test,
            depth_write: descriptor.depth_stencil.write,
            push_constant_bytes: descriptor.push_constant_bytes,
        })
    }
}

fn native_viewport(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x,
        y: viewport.y,
        width: viewport.width,
        height: viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

/// Scissor covering exactly the viewport rectangle
fn scissor_for(viewport: &Viewport) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D {
            x: viewport.x as i32,
            y: viewport.y as i32,
        },
        extent: vk::Extent2D {
            width: viewport.width.max(0.0) as u32,
            height: viewport.height.max(0.0) as u32,
        },
    }
}

/// Create the pipeline and its layout objects.
///
/// Nothing is left behind on failure.
pub fn create_pipeline(device: &ash::Device, blueprint: &PipelineBlueprint) -> Result<PipelineEntry> {
    // Empty set layout; descriptor binding happens elsewhere
    let set_layout_info = vk::DescriptorSetLayoutCreateInfo::builder();
    let set_layout = unsafe { device.create_descriptor_set_layout(&set_layout_info, None) }
        .creating("descriptor set layout")?;

    let push_constant_ranges: Vec<_> = (blueprint.push_constant_bytes > 0)
        .then(|| {
            vk::PushConstantRange::builder()
                .stage_flags(vk::ShaderStageFlags::VERTEX)
                .offset(0)
                .size(blueprint.push_constant_bytes)
                .build()
        })
        .into_iter()
        .collect();

    let set_layouts = [set_layout];
    let layout_info = vk::PipelineLayoutCreateInfo::builder()
        .set_layouts(&set_layouts)
        .push_constant_ranges(&push_constant_ranges);

    let layout = match unsafe { device.create_pipeline_layout(&layout_info, None) } {
        Ok(layout) => layout,
        Err(result) => {
            unsafe { device.destroy_descriptor_set_layout(set_layout, None) };
            return Err(Error::NativeCreation {
                what: "pipeline layout",
                result,
            });
        }
    };

    match unsafe { create_graphics_pipeline(device, blueprint, layout) } {
        Ok(raw) => Ok(PipelineEntry {
            raw,
            layout,
            set_layout,
            render_pass: blueprint.render_pass_handle,
        }),
        Err(e) => {
            unsafe {
                device.destroy_pipeline_layout(layout, None);
                device.destroy_descriptor_set_layout(set_layout, None);
            }
            Err(e)
        }
    }
}

unsafe fn create_graphics_pipeline(
    device: &ash::Device,
    blueprint: &PipelineBlueprint,
    layout: vk::PipelineLayout,
) -> Result<vk::Pipeline> {
    // Shader stages
    let shader_stages: Vec<_> = blueprint
        .stages
        .iter()
        .map(|stage| {
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(stage.stage)
                .module(stage.module)
                .name(&stage.entry_point)
                .build()
        })
        .collect();

    // Vertex input
    let bindings: Vec<_> = blueprint.vertex_input.binding.into_iter().collect();
    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&blueprint.vertex_input.attributes);

    // Input assembly
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(blueprint.topology)
        .primitive_restart_enable(blueprint.primitive_restart);

    // Viewport and scissor; dynamic when the descriptor gave none
    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);
    let viewport_state = if blueprint.viewports.is_empty() {
        vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1)
    } else {
        vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&blueprint.viewports)
            .scissors(&blueprint.scissors)
    };

    // Rasterization
    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false);

    // Multisampling (disabled)
    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(blueprint.depth_test)
        .depth_write_enable(blueprint.depth_write)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    // Color blending (no blending, opaque), one state per color attachment
    let color_blend_attachments: Vec<_> = (0..blueprint.color_attachment_count)
        .map(|_| {
            vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false)
                .build()
        })
        .collect();
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let mut pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .layout(layout)
        .render_pass(blueprint.render_pass)
        .subpass(0);
    if blueprint.viewports.is_empty() {
        pipeline_info = pipeline_info.dynamic_state(&dynamic_state);
    }

    let pipelines = device
        .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
        .map_err(|(_, e)| e)
        .creating("graphics pipeline")?;

    Ok(pipelines[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::descriptor::{
        ColorAttachmentDescriptor, DepthAttachmentDescriptor, DepthStencilState,
        ShaderStageDescriptor,
    };
    use crate::backend::registry::ResourceKind;
    use ash::vk::Handle as _;
    use glam::Vec4;

    const FORMATS: AttachmentFormats = AttachmentFormats {
        color: vk::Format::B8G8R8A8_UNORM,
        depth: vk::Format::D24_UNORM_S8_UINT,
    };

    fn attribute(data_type: DataType, elements: u8, offset: u32, location: u32) -> VertexAttributeDescriptor {
        VertexAttributeDescriptor {
            data_type,
            elements,
            offset,
            location,
        }
    }

    fn registry_with_pass(raw: u64) -> (ResourceRegistry, RenderPassHandle) {
        let mut registry = ResourceRegistry::new();
        let handle = registry.insert_render_pass(RenderPassEntry {
            raw: vk::RenderPass::from_raw(raw),
            color_attachment_count: 1,
            has_depth: true,
            clear_values: Vec::new(),
        });
        (registry, handle)
    }

    #[test]
    fn test_vertex_format_table() {
        let expected = [
            (DataType::Float32, 1, vk::Format::R32_SFLOAT),
            (DataType::Float32, 2, vk::Format::R32G32_SFLOAT),
            (DataType::Float32, 3, vk::Format::R32G32B32_SFLOAT),
            (DataType::Float32, 4, vk::Format::R32G32B32A32_SFLOAT),
            (DataType::Int32, 1, vk::Format::R32_SINT),
            (DataType::Int32, 2, vk::Format::R32G32_SINT),
            (DataType::Int32, 3, vk::Format::R32G32B32_SINT),
            (DataType::Int32, 4, vk::Format::R32G32B32A32_SINT),
        ];

        for (data_type, elements, format) in expected {
            assert_eq!(vertex_format(data_type, elements).unwrap(), format);
        }
    }

    #[test]
    fn test_unmapped_vertex_formats_are_rejected() {
        for (data_type, elements) in [
            (DataType::Float32, 5),
            (DataType::Float32, 0),
            (DataType::Int32, 5),
            (DataType::Double, 3),
            (DataType::UnsignedByte, 4),
            (DataType::Float16, 2),
        ] {
            match vertex_format(data_type, elements) {
                Err(Error::UnsupportedVertexFormat {
                    data_type: dt,
                    elements: n,
                }) => {
                    assert_eq!(dt, data_type);
                    assert_eq!(n, elements);
                }
                other => panic!("{:?} x {} gave {:?}", data_type, elements, other),
            }
        }
    }

    #[test]
    fn test_vertex_input_stride_and_binding() {
        let input = translate_vertex_input(&[
            attribute(DataType::Float32, 3, 0, 0),
            attribute(DataType::Float32, 2, 12, 1),
            attribute(DataType::Int32, 1, 20, 2),
        ])
        .unwrap();

        let binding = input.binding.unwrap();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 24);
        assert_eq!(input.attributes.len(), 3);
        assert_eq!(input.attributes[1].location, 1);
        assert_eq!(input.attributes[1].offset, 12);
        assert_eq!(input.attributes[2].format, vk::Format::R32_SINT);
    }

    #[test]
    fn test_attribute_end_overflow_is_rejected() {
        let result = translate_vertex_input(&[attribute(DataType::Float32, 4, u32::MAX - 3, 0)]);
        assert!(matches!(result, Err(Error::InvalidDescriptor(_))));

        // Ending exactly at u32::MAX is still representable
        let input = translate_vertex_input(&[attribute(DataType::Float32, 1, u32::MAX - 4, 0)]).unwrap();
        assert_eq!(input.binding.unwrap().stride, u32::MAX);
    }

    #[test]
    fn test_no_attributes_no_binding() {
        let input = translate_vertex_input(&[]).unwrap();
        assert!(input.binding.is_none());
        assert!(input.attributes.is_empty());
    }

    #[test]
    fn test_topology_mapping() {
        assert_eq!(
            primitive_topology(PrimitiveTopology::Points),
            vk::PrimitiveTopology::POINT_LIST
        );
        assert_eq!(
            primitive_topology(PrimitiveTopology::Lines),
            vk::PrimitiveTopology::LINE_LIST
        );
        assert_eq!(
            primitive_topology(PrimitiveTopology::Triangles),
            vk::PrimitiveTopology::TRIANGLE_LIST
        );
    }

    #[test]
    fn test_load_actions_are_distinct() {
        assert_eq!(load_op(LoadAction::None), vk::AttachmentLoadOp::DONT_CARE);
        assert_eq!(load_op(LoadAction::Load), vk::AttachmentLoadOp::LOAD);
        assert_eq!(load_op(LoadAction::Clear), vk::AttachmentLoadOp::CLEAR);
    }

    #[test]
    fn test_empty_render_pass_is_degenerate_but_valid() {
        let layout = describe_render_pass(&RenderPassDescriptor::default(), FORMATS).unwrap();
        assert!(layout.attachments.is_empty());
        assert!(layout.color_refs.is_empty());
        assert!(layout.depth_ref.is_none());
        assert!(layout.clear_values.is_empty());
        assert!(format!("{:?}", layout).contains("clear_values: 0"));
    }

    #[test]
    fn test_color_and_depth_attachments() {
        let descriptor = RenderPassDescriptor {
            color_attachments: vec![ColorAttachmentDescriptor {
                load_action: LoadAction::Clear,
                target: AttachmentTarget::SwapchainImage,
                clear_colour: Vec4::new(0.1, 0.2, 0.8, 1.0),
            }],
            depth_attachment: Some(DepthAttachmentDescriptor::default()),
        };

        let layout = describe_render_pass(&descriptor, FORMATS).unwrap();
        assert_eq!(layout.attachments.len(), 2);
        assert_eq!(layout.attachments[0].format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(layout.attachments[0].load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(
            layout.attachments[0].final_layout,
            vk::ImageLayout::PRESENT_SRC_KHR
        );
        assert_eq!(layout.attachments[1].format, vk::Format::D24_UNORM_S8_UINT);
        assert_eq!(layout.color_refs.len(), 1);
        assert_eq!(layout.depth_ref.unwrap().attachment, 1);

        let clear_colour = unsafe { layout.clear_values[0].color.float32 };
        assert_eq!(clear_colour, [0.1, 0.2, 0.8, 1.0]);
        let clear_depth = unsafe { layout.clear_values[1].depth_stencil.depth };
        assert_eq!(clear_depth, 1.0);
    }

    #[test]
    fn test_load_keeps_previous_layout() {
        let descriptor = RenderPassDescriptor {
            color_attachments: vec![ColorAttachmentDescriptor {
                load_action: LoadAction::Load,
                ..Default::default()
            }],
            depth_attachment: None,
        };

        let layout = describe_render_pass(&descriptor, FORMATS).unwrap();
        assert_eq!(layout.attachments[0].load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(
            layout.attachments[0].initial_layout,
            vk::ImageLayout::PRESENT_SRC_KHR
        );
    }

    #[test]
    fn test_color_attachment_cannot_target_depth_buffer() {
        let descriptor = RenderPassDescriptor {
            color_attachments: vec![ColorAttachmentDescriptor {
                target: AttachmentTarget::DepthBuffer,
                ..Default::default()
            }],
            depth_attachment: None,
        };

        assert!(matches!(
            describe_render_pass(&descriptor, FORMATS),
            Err(Error::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_blueprint_resolves_same_render_pass() {
        let (mut registry, pass) = registry_with_pass(0xFEED);
        let vertex = registry.insert_shader_module(vk::ShaderModule::from_raw(1));
        let fragment = registry.insert_shader_module(vk::ShaderModule::from_raw(2));

        let mut descriptor = RenderPipelineDescriptor::new(pass);
        descriptor.shader_stages = vec![
            ShaderStageDescriptor::new(ShaderStage::Vertex, vertex),
            ShaderStageDescriptor::new(ShaderStage::Fragment, fragment),
        ];
        descriptor.vertex_attributes = vec![attribute(DataType::Float32, 3, 0, 0)];
        descriptor.viewports = vec![Viewport::with_size(800.0, 600.0)];
        descriptor.depth_stencil = DepthStencilState {
            test: true,
            write: true,
        };

        let blueprint = PipelineBlueprint::resolve(&registry, &descriptor).unwrap();
        assert_eq!(blueprint.render_pass, registry.render_pass(pass).unwrap().raw);
        assert_eq!(blueprint.render_pass.as_raw(), 0xFEED);
        assert_eq!(blueprint.stages.len(), 2);
        assert_eq!(blueprint.stages[0].module.as_raw(), 1);
        assert_eq!(blueprint.stages[1].stage, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(blueprint.stages[0].entry_point.to_str().unwrap(), "main");
        assert_eq!(blueprint.scissors[0].extent.width, 800);
        assert_eq!(blueprint.scissors[0].extent.height, 600);
        assert!(blueprint.depth_test && blueprint.depth_write);
    }

    #[test]
    fn test_blueprint_with_unknown_render_pass() {
        let (registry, _) = registry_with_pass(1);
        // Second pass of another registry; index 1 does not exist here
        let (mut other, _) = registry_with_pass(2);
        let foreign = other.insert_render_pass(RenderPassEntry {
            raw: vk::RenderPass::from_raw(3),
            color_attachment_count: 0,
            has_depth: false,
            clear_values: Vec::new(),
        });

        let result = PipelineBlueprint::resolve(&registry, &RenderPipelineDescriptor::new(foreign));
        assert!(matches!(
            result,
            Err(Error::UnresolvedHandle {
                kind: ResourceKind::RenderPass,
                index: 1
            })
        ));
    }

    #[test]
    fn test_blueprint_with_unknown_shader_module() {
        let (registry, pass) = registry_with_pass(1);
        let mut other = ResourceRegistry::new();
        let stray = other.insert_shader_module(vk::ShaderModule::from_raw(9));

        let mut descriptor = RenderPipelineDescriptor::new(pass);
        descriptor.shader_stages = vec![ShaderStageDescriptor::new(ShaderStage::Vertex, stray)];

        assert!(matches!(
            PipelineBlueprint::resolve(&registry, &descriptor),
            Err(Error::UnresolvedHandle {
                kind: ResourceKind::ShaderModule,
                ..
            })
        ));
    }

    #[test]
    fn test_blueprint_rejects_five_float_attribute() {
        let (registry, pass) = registry_with_pass(1);
        let mut descriptor = RenderPipelineDescriptor::new(pass);
        descriptor.vertex_attributes = vec![attribute(DataType::Float32, 5, 0, 0)];

        assert!(matches!(
            PipelineBlueprint::resolve(&registry, &descriptor),
            Err(Error::UnsupportedVertexFormat {
                data_type: DataType::Float32,
                elements: 5
            })
        ));
    }

    #[test]
    fn test_blueprint_rejects_bad_entry_point() {
        let (mut registry, pass) = registry_with_pass(1);
        let module = registry.insert_shader_module(vk::ShaderModule::from_raw(4));

        let mut descriptor = RenderPipelineDescriptor::new(pass);
        let mut stage = ShaderStageDescriptor::new(ShaderStage::Vertex, module);
        stage.entry_point = "ma\0in".to_string();
        descriptor.shader_stages = vec![stage];

        assert!(matches!(
            PipelineBlueprint::resolve(&registry, &descriptor),
            Err(Error::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_blueprint_rejects_compute_stage() {
        let (mut registry, pass) = registry_with_pass(1);
        let module = registry.insert_shader_module(vk::ShaderModule::from_raw(4));

        let mut descriptor = RenderPipelineDescriptor::new(pass);
        descriptor.shader_stages = vec![ShaderStageDescriptor::new(ShaderStage::Compute, module)];

        assert!(matches!(
            PipelineBlueprint::resolve(&registry, &descriptor),
            Err(Error::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_push_constant_size_must_be_word_aligned() {
        let (registry, pass) = registry_with_pass(1);
        let mut descriptor = RenderPipelineDescriptor::new(pass);
        descriptor.push_constant_bytes = 6;

        assert!(matches!(
            PipelineBlueprint::resolve(&registry, &descriptor),
            Err(Error::InvalidDescriptor(_))
        ));

        descriptor.push_constant_bytes = 128;
        assert!(PipelineBlueprint::resolve(&registry, &descriptor).is_ok());
    }
}
