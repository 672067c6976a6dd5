// Resource registry - Handle-based ownership of derived GPU objects
//
// Shader modules, render passes and pipelines live in append-only arenas.
// A handle is the arena index at insertion time. Nothing is ever removed,
// so handles are never recycled or invalidated while the registry lives.
// If removal is ever added, handles need a generation counter to detect
// stale references.

use ash::vk;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{Error, Result};

/// Opaque index into one of the registry arenas.
///
/// The type parameter keeps a render pass handle from being passed where a
/// shader module handle is expected.
pub struct Handle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

// Manual impls: derives would require `T: Clone` etc.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

impl<T> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

pub type ShaderModuleHandle = Handle<vk::ShaderModule>;
pub type RenderPassHandle = Handle<RenderPassEntry>;
pub type PipelineHandle = Handle<PipelineEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ShaderModule,
    RenderPass,
    Pipeline,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::ShaderModule => "shader module",
            ResourceKind::RenderPass => "render pass",
            ResourceKind::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

/// Growable, append-only storage addressed by [`Handle`].
#[derive(Debug)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Arena<T> {
    pub fn push(&mut self, item: T) -> Handle<T> {
        self.items.push(item);
        Handle::new(self.items.len() - 1)
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Empties the arena, newest entries first.
    fn drain_newest_first(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..).rev()
    }
}

/// A created render pass plus what pipelines and framebuffers need to know
/// about its attachments.
#[derive(Clone)]
pub struct RenderPassEntry {
    pub raw: vk::RenderPass,
    pub color_attachment_count: u32,
    pub has_depth: bool,
    pub clear_values: Vec<vk::ClearValue>,
}

// ClearValue is a union, so only the count is shown
impl fmt::Debug for RenderPassEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPassEntry")
            .field("raw", &self.raw)
            .field("color_attachment_count", &self.color_attachment_count)
            .field("has_depth", &self.has_depth)
            .field("clear_values", &self.clear_values.len())
            .finish()
    }
}

/// A created pipeline together with the layout objects it was built with.
#[derive(Debug, Clone, Copy)]
pub struct PipelineEntry {
    pub raw: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub set_layout: vk::DescriptorSetLayout,
    pub render_pass: RenderPassHandle,
}

/// Owns every shader module, render pass and pipeline created through the
/// context. Destroying the registry destroys all of them.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    shader_modules: Arena<vk::ShaderModule>,
    render_passes: Arena<RenderPassEntry>,
    pipelines: Arena<PipelineEntry>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_shader_module(&mut self, module: vk::ShaderModule) -> ShaderModuleHandle {
        self.shader_modules.push(module)
    }

    pub(crate) fn insert_render_pass(&mut self, entry: RenderPassEntry) -> RenderPassHandle {
        self.render_passes.push(entry)
    }

    pub(crate) fn insert_pipeline(&mut self, entry: PipelineEntry) -> PipelineHandle {
        self.pipelines.push(entry)
    }

    pub fn shader_module(&self, handle: ShaderModuleHandle) -> Result<vk::ShaderModule> {
        self.shader_modules
            .get(handle)
            .copied()
            .ok_or(Error::UnresolvedHandle {
                kind: ResourceKind::ShaderModule,
                index: handle.index,
            })
    }

    pub fn render_pass(&self, handle: RenderPassHandle) -> Result<&RenderPassEntry> {
        self.render_passes.get(handle).ok_or(Error::UnresolvedHandle {
            kind: ResourceKind::RenderPass,
            index: handle.index,
        })
    }

    pub fn pipeline(&self, handle: PipelineHandle) -> Result<&PipelineEntry> {
        self.pipelines.get(handle).ok_or(Error::UnresolvedHandle {
            kind: ResourceKind::Pipeline,
            index: handle.index,
        })
    }

    pub fn shader_module_count(&self) -> usize {
        self.shader_modules.len()
    }

    pub fn render_pass_count(&self) -> usize {
        self.render_passes.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Destroy everything the registry owns.
    ///
    /// Pipelines go first since they reference render passes and shader
    /// modules. The registry is empty afterwards.
    ///
    /// # Safety
    /// `device` must be the device every registered object was created on,
    /// and none of the objects may still be in use by the GPU.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        log::debug!(
            "Destroying registry: {} pipelines, {} render passes, {} shader modules",
            self.pipelines.len(),
            self.render_passes.len(),
            self.shader_modules.len()
        );

        for entry in self.pipelines.drain_newest_first() {
            device.destroy_pipeline(entry.raw, None);
            device.destroy_pipeline_layout(entry.layout, None);
            device.destroy_descriptor_set_layout(entry.set_layout, None);
        }

        for entry in self.render_passes.drain_newest_first() {
            device.destroy_render_pass(entry.raw, None);
        }

        for module in self.shader_modules.drain_newest_first() {
            device.destroy_shader_module(module, None);
        }
    }
}
