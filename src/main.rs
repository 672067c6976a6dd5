// =============================================================================
// VULKAN CONTEXT DEMO - Window collaborator for the library
// =============================================================================
//
// Opens a winit window, brings up a GraphicsContext on it and registers a
// render pass (and, when SPIR-V paths are configured, a pipeline). Resizing
// rebuilds the swapchain and re-attaches framebuffers. Nothing is drawn.
//
// With `[device] presentation = false` the context is brought up headless
// and the program exits straight away.

mod config;

use anyhow::{Context, Result};
use config::Config;
use glam::Vec4;
use std::sync::Arc;
use vulkan_context::{
    ColorAttachmentDescriptor, DepthAttachmentDescriptor, DepthStencilState, GraphicsContext,
    LoadAction, NativeWindow, PipelineHandle, RenderPassDescriptor, RenderPassHandle,
    RenderPipelineDescriptor, ShaderStage, ShaderStageDescriptor,
};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting Vulkan context demo");

    if !config.device.presentation {
        return run_headless(&config);
    }

    log::info!(
        "Window: {}x{}",
        config.window.width,
        config.window.height
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_logging(config: &Config) {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or(config.debug.log_level.as_str())).init();
}

fn run_headless(config: &Config) -> Result<()> {
    let context = GraphicsContext::new(&config.context_settings(), config.requirements(None))
        .context("Failed to create headless graphics context")?;

    log::info!(
        "Headless context on {} ({:?}), graphics family {}",
        context.physical_device_name(),
        context.physical_device_type(),
        context.graphics_queue_family()
    );
    Ok(())
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// The context is declared before the window so the surface is destroyed
/// while the window still exists.
struct App {
    config: Config,
    context: Option<GraphicsContext>,
    window: Option<Arc<Window>>,

    render_pass: Option<RenderPassHandle>,
    pipeline: Option<PipelineHandle>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            context: None,
            window: None,
            render_pass: None,
            pipeline: None,
        }
    }

    fn init_context(&mut self, window: &Window) -> Result<()> {
        log::info!("Initializing Vulkan...");

        let native = NativeWindow::from_window(window).context("Failed to get window handles")?;

        let mut settings = self.config.context_settings();
        let size = window.inner_size();
        settings.fallback_extent.width = size.width;
        settings.fallback_extent.height = size.height;

        let mut context = GraphicsContext::new(&settings, self.config.requirements(Some(native)))
            .context("Failed to create graphics context")?;

        log::info!(
            "Running on {} ({:?})",
            context.physical_device_name(),
            context.physical_device_type()
        );

        let render_pass = context
            .create_render_pass(&RenderPassDescriptor {
                color_attachments: vec![ColorAttachmentDescriptor {
                    load_action: LoadAction::Clear,
                    clear_colour: Vec4::new(0.1, 0.2, 0.8, 1.0),
                    ..Default::default()
                }],
                depth_attachment: Some(DepthAttachmentDescriptor::default()),
            })
            .context("Failed to create render pass")?;

        if context.swapchain_image_count() > 0 {
            context
                .attach_framebuffers(render_pass)
                .context("Failed to attach framebuffers")?;
        }

        if let Some((vertex_path, fragment_path)) = self.config.shader_paths() {
            let vertex = std::fs::read(vertex_path)
                .with_context(|| format!("Failed to read {:?}", vertex_path))?;
            let fragment = std::fs::read(fragment_path)
                .with_context(|| format!("Failed to read {:?}", fragment_path))?;

            let vertex = context
                .create_shader_module_from_bytes(&vertex)
                .context("Failed to create vertex shader module")?;
            let fragment = context
                .create_shader_module_from_bytes(&fragment)
                .context("Failed to create fragment shader module")?;

            let mut descriptor = RenderPipelineDescriptor::new(render_pass);
            descriptor.shader_stages = vec![
                ShaderStageDescriptor::new(ShaderStage::Vertex, vertex),
                ShaderStageDescriptor::new(ShaderStage::Fragment, fragment),
            ];
            // No viewports: dynamic state, so resizes keep the pipeline valid
            descriptor.depth_stencil = DepthStencilState {
                test: true,
                write: true,
            };

            let pipeline = context
                .create_render_pipeline(&descriptor)
                .context("Failed to create pipeline")?;
            self.pipeline = Some(pipeline);
        } else {
            log::info!("No shaders configured, skipping pipeline");
        }

        self.render_pass = Some(render_pass);
        self.context = Some(context);

        log::info!("Vulkan initialized successfully!");
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let (Some(context), Some(render_pass)) = (self.context.as_mut(), self.render_pass) else {
            return Ok(());
        };

        context.rebuild_swapchain(width, height)?;
        if context.swapchain_image_count() > 0 {
            context.attach_framebuffers(render_pass)?;
        }

        log::debug!(
            "Swapchain rebuilt: {:?}, pipeline {:?}",
            context.swapchain_extent(),
            self.pipeline
        );
        Ok(())
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_context(&window) {
            log::error!("Failed to initialize Vulkan: {:?}", e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);

                // Minimized; keep the old swapchain until we get a real size
                if size.width == 0 || size.height == 0 {
                    return;
                }

                if let Err(e) = self.resize(size.width, size.height) {
                    log::error!("Swapchain rebuild failed: {:?}", e);
                    event_loop.exit();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }
}
