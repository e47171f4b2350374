use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use log::{error, info, trace, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use glam::Vec2;

mod config;
mod error;
mod math;
mod renderer;
mod scene;
mod ui;

use config::SceneConfig;
use error::{SceneError, SceneResult};
use renderer::{FrameSource, GpuState, StillImageFeed, TestPatternFeed};
use scene::frame::plan_frame;
use scene::{RenderMode, SceneState, StereoMode};
use ui::{PanelInfo, UiActions, UiState, apply_theme, draw_help_overlay, draw_side_panel};

const TEST_PATTERN: &str = "test-pattern";

#[derive(Parser, Debug)]
#[command(name = "stereo-surface", version, about = "Anaglyph stereo viewer for a spindle torus")]
struct Cli {
    /// JSON scene configuration; missing fields use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Background image file, or `test-pattern` for a synthetic feed
    #[arg(short, long)]
    background: Option<String>,

    /// Start with the marker animation stopped (redraw on input only)
    #[arg(long)]
    still: bool,

    /// Start in single-view mode instead of red/cyan anaglyph
    #[arg(long)]
    mono: bool,
}

fn open_background(arg: Option<&str>) -> anyhow::Result<Option<Box<dyn FrameSource>>> {
    let Some(arg) = arg else { return Ok(None) };
    let feed: Box<dyn FrameSource> = if arg == TEST_PATTERN {
        Box::new(TestPatternFeed::new(640, 480))
    } else {
        let path = PathBuf::from(arg);
        Box::new(
            StillImageFeed::open(&path)
                .with_context(|| format!("failed to open background {}", path.display()))?,
        )
    };
    info!("Background: {}", feed.describe());
    Ok(Some(feed))
}

struct App {
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    egui_state: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
    egui_ctx: egui::Context,

    config: SceneConfig,
    scene: SceneState,
    ui_state: UiState,

    background: Option<Box<dyn FrameSource>>,
    background_name: Option<String>,
    background_ready: bool,

    clock: Instant,
    frame_count: u32,
    fps_timer: Instant,
    fps: f32,
    cursor: Vec2,

    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: SceneConfig, background: Option<Box<dyn FrameSource>>) -> SceneResult<Self> {
        let scene = SceneState::new(&config)?;
        let ui_state = UiState::from_config(&config);
        let background_name = background.as_ref().map(|feed| feed.describe());

        Ok(Self {
            window: None,
            gpu: None,
            egui_state: None,
            egui_renderer: None,
            egui_ctx: egui::Context::default(),

            config,
            scene,
            ui_state,

            background,
            background_name,
            background_ready: false,

            clock: Instant::now(),
            frame_count: 0,
            fps_timer: Instant::now(),
            fps: 0.0,
            cursor: Vec2::ZERO,

            fatal: None,
        })
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> SceneResult<()> {
        let gpu = pollster::block_on(GpuState::new(window.clone(), self.config.window.vsync))?;

        let egui_state = egui_winit::State::new(
            self.egui_ctx.clone(),
            self.egui_ctx.viewport_id(),
            &window,
            Some(window.scale_factor() as f32),
            None,
            Some(2048),
        );

        let egui_renderer =
            egui_wgpu::Renderer::new(&gpu.device, gpu.config.format, None, 1, false);

        apply_theme(&self.egui_ctx);

        let size = window.inner_size();
        self.scene.resize(size.width, size.height);

        self.window = Some(window);
        self.gpu = Some(gpu);
        self.egui_state = Some(egui_state);
        self.egui_renderer = Some(egui_renderer);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: SceneError) {
        error!("{}", err);
        self.fatal = Some(anyhow::Error::new(err).context("rendering could not continue"));
        event_loop.exit();
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn tick_fps(&mut self) {
        self.frame_count += 1;
        let elapsed = self.fps_timer.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            self.fps = self.frame_count as f32 / elapsed;
            self.frame_count = 0;
            self.fps_timer = Instant::now();
        }
    }

    fn apply_ui_actions(
        scene: &mut SceneState,
        ui_state: &mut UiState,
        gpu: &mut GpuState,
        actions: UiActions,
    ) {
        for change in actions.parameter_changes {
            if let Err(e) = scene.apply(change) {
                ui_state.stereo.revert(change, scene.camera.settings());
                ui_state.last_error = Some(e.to_string());
            }
        }

        if let Some(params) = actions.surface {
            ui_state.last_error = scene.set_surface_params(params).err().map(|e| e.to_string());
        }

        if let Some(display) = actions.display {
            scene.display = display;
        }

        if let Some(vsync) = actions.vsync {
            gpu.set_vsync(vsync);
        }

        if actions.reset_view {
            scene.trackball.reset();
        }
    }

    /// Draws one frame at `now` seconds since startup.
    fn render_frame(&mut self, now: f64) -> SceneResult<()> {
        self.tick_fps();

        let (Some(window), Some(gpu), Some(egui_state), Some(egui_renderer)) = (
            self.window.as_ref(),
            self.gpu.as_mut(),
            self.egui_state.as_mut(),
            self.egui_renderer.as_mut(),
        ) else {
            return Err(SceneError::ResourceNotReady("graphics device"));
        };

        let raw_input = egui_state.take_egui_input(window);

        let info = PanelInfo {
            fps: self.fps,
            adapter: &gpu.adapter_name,
            surface_vertices: gpu.buffers.surface_vertex_count as usize,
            line_strips: gpu.buffers.line_strips.len(),
            marker: self.scene.marker.position(),
            mix: self.scene.panner.mix(),
            background: self.background_name.as_deref(),
            background_ready: self.background_ready,
        };
        let stereo_mode = self.scene.display.stereo_mode;
        let ui_state = &mut self.ui_state;

        let mut ui_actions = UiActions::default();
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            ui_actions = draw_side_panel(ctx, ui_state, &info);
            draw_help_overlay(ctx, stereo_mode);
        });

        egui_state.handle_platform_output(window, full_output.platform_output);

        let ui_wants_redraw = ui_actions.needs_redraw()
            || full_output
                .viewport_output
                .get(&egui::ViewportId::ROOT)
                .is_some_and(|viewport| viewport.repaint_delay.is_zero());
        Self::apply_ui_actions(&mut self.scene, &mut self.ui_state, gpu, ui_actions);

        gpu.upload_pending(&mut self.scene)?;

        self.background_ready = match self.background.as_mut() {
            Some(feed) => poll_background(feed.as_mut(), gpu, now),
            None => false,
        };

        let plan = plan_frame(&mut self.scene, now, self.background_ready);

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.resize(gpu.size);
                window.request_redraw();
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(SceneError::DeviceUnavailable("out of GPU memory".to_string()));
            }
            Err(e) => {
                trace!("Skipping frame: {}", e);
                return Ok(());
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, delta) in full_output.textures_delta.set {
            egui_renderer.update_texture(&gpu.device, &gpu.queue, id, &delta);
        }

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        egui_renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        gpu.draw_scene(&plan, &view, &mut encoder)?;

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut render_pass = render_pass.forget_lifetime();
            egui_renderer.render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        for id in full_output.textures_delta.free {
            egui_renderer.free_texture(&id);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        if ui_wants_redraw {
            window.request_redraw();
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode, event_loop: &ActiveEventLoop) {
        match key {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::KeyR => self.scene.trackball.reset(),
            KeyCode::Space => {
                self.scene.display.animate = !self.scene.display.animate;
                self.ui_state.display.animate = self.scene.display.animate;
            }
            KeyCode::KeyM => {
                let mode = match self.scene.display.stereo_mode {
                    StereoMode::Anaglyph => StereoMode::Mono,
                    StereoMode::Mono => StereoMode::Anaglyph,
                };
                self.scene.display.stereo_mode = mode;
                self.ui_state.display.stereo_mode = mode;
            }
            _ => return,
        }
        self.request_redraw();
    }
}

fn poll_background(feed: &mut dyn FrameSource, gpu: &mut GpuState, now: f64) -> bool {
    if !feed.is_ready(now) {
        trace!("Background feed not ready, skipping");
        return false;
    }
    match feed
        .current_frame(now)
        .and_then(|frame| gpu.update_background(frame))
    {
        Ok(()) => true,
        Err(e) => {
            warn!("Skipping background this frame: {}", e);
            false
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, SceneError::DeviceUnavailable(e.to_string()));
                return;
            }
        };

        if let Err(e) = self.init_gpu(window) {
            self.fail(event_loop, e);
            return;
        }
        self.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let (Some(egui_state), Some(window)) = (&mut self.egui_state, &self.window) {
            let response = egui_state.on_window_event(window, &event);
            if response.repaint {
                window.request_redraw();
            }
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size);
                }
                self.scene.resize(size.width, size.height);
                self.request_redraw();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    if let PhysicalKey::Code(key) = event.physical_key {
                        self.handle_key(key, event_loop);
                    }
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                if self.scene.trackball.is_dragging() && self.scene.trackball.drag_to(self.cursor) {
                    self.request_redraw();
                }
            }

            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => match state {
                ElementState::Pressed => self.scene.trackball.begin_drag(self.cursor),
                ElementState::Released => self.scene.trackball.end_drag(),
            },

            WindowEvent::RedrawRequested => {
                let now = self.clock.elapsed().as_secs_f64();
                if let Err(e) = self.render_frame(now) {
                    if e.is_fatal() {
                        self.fail(event_loop, e);
                    } else {
                        warn!("Frame skipped: {}", e);
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        match self.scene.render_mode() {
            RenderMode::Animating => {
                event_loop.set_control_flow(ControlFlow::Poll);
                self.request_redraw();
            }
            RenderMode::Idle => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SceneConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => SceneConfig::default(),
    };
    if cli.still {
        config.display.animate = false;
    }
    if cli.mono {
        config.display.stereo_mode = StereoMode::Mono;
    }

    let background = open_background(cli.background.as_deref())?;
    let mut app = App::new(config, background).context("failed to build the scene")?;

    let event_loop = EventLoop::new().context("failed to create the event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);
    event_loop.run_app(&mut app).context("event loop terminated abnormally")?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_background_and_flags() {
        let cli = Cli::parse_from([
            "stereo-surface",
            "--background",
            "test-pattern",
            "--still",
            "--mono",
        ]);
        assert_eq!(cli.background.as_deref(), Some(TEST_PATTERN));
        assert!(cli.still && cli.mono);
        assert!(cli.config.is_none());
    }

    #[test]
    fn missing_background_is_none() {
        assert!(open_background(None).unwrap().is_none());
        let feed = open_background(Some(TEST_PATTERN)).unwrap().unwrap();
        assert!(feed.describe().starts_with("test pattern"));
    }

    #[test]
    fn unreadable_background_is_an_error() {
        assert!(open_background(Some("/nonexistent/background.png")).is_err());
    }
}
