use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context;
use glam::Vec2;
use imgui::{FontConfig, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    assets::AssetSource,
    config::ViewerConfig,
    engine,
    platform::{desktop::DesktopPlatform, DisplayPlatform},
    rendering::renderer::Renderer,
    session::{Capabilities, PresentationMode},
    ui::ControlPanel,
    viewer::Viewer,
};

/// Pixels of trackpad scroll that count as one wheel step.
const PIXELS_PER_SCROLL_STEP: f32 = 50.0;

pub struct LaunchOptions {
    pub model: Option<PathBuf>,
    pub config: ViewerConfig,
    pub emulate_handheld: bool,
}

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
}

#[derive(Default)]
struct MouseState {
    position: Option<Vec2>,
    rotating: bool,
    panning: bool,
}

struct App {
    options: LaunchOptions,
    runtime: tokio::runtime::Handle,
    platform: DesktopPlatform,
    panel: ControlPanel,
    renderer: Option<Renderer>,
    viewer: Option<Viewer>,
    imgui: Option<ImguiState>,
    mouse: MouseState,
    last_frame: Instant,
}

impl App {
    fn new(options: LaunchOptions, runtime: tokio::runtime::Handle) -> Self {
        Self {
            platform: DesktopPlatform::new(options.emulate_handheld),
            options,
            runtime,
            panel: ControlPanel::default(),
            renderer: None,
            viewer: None,
            imgui: None,
            mouse: MouseState::default(),
            last_frame: Instant::now(),
        }
    }

    fn setup_imgui(&mut self, window: &Window) {
        let mut context = imgui::Context::create();
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(
            context.io_mut(),
            window,
            imgui_winit_support::HiDpiMode::Default,
        );

        let font_size = 14.0;
        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        // Disable INI support because it's broken in the published version of imgui
        context.set_ini_filename(None);

        self.imgui = Some(ImguiState { context, platform });
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title("stereoview")
            .with_inner_size(LogicalSize::new(1280, 720));
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("Failed to create window")?,
        );
        self.setup_imgui(&window);

        let imgui = self.imgui.as_mut().context("Imgui was not set up")?;
        let renderer = pollster::block_on(Renderer::new(window.clone(), &mut imgui.context))?;
        self.platform.attach_window(window);

        let mut viewer = Viewer::new(
            self.options.config.clone(),
            Capabilities::detect(&self.platform),
            self.runtime.clone(),
            self.platform.container_size(),
        );
        if let Some(path) = self.options.model.take() {
            viewer.load_model(AssetSource::Path(path));
        }

        self.renderer = Some(renderer);
        self.viewer = Some(viewer);
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(viewer), Some(imgui)) =
            (self.renderer.as_mut(), self.viewer.as_mut(), self.imgui.as_mut())
        else {
            return;
        };

        let delta_time = self.last_frame.elapsed();
        let now = Instant::now();
        imgui.context.io_mut().update_delta_time(delta_time);
        self.last_frame = now;

        renderer.window.request_redraw();

        match renderer.begin_frame() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.resize(renderer.physical_size());
                return;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of memory");
                event_loop.exit();
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timeout");
                return;
            }
            Err(other) => {
                log::error!("Unexpected error: {:?}", other);
                return;
            }
        }

        if let Err(err) = imgui
            .platform
            .prepare_frame(imgui.context.io_mut(), &renderer.window)
        {
            log::error!("Failed to prepare Imgui frame: {err}");
        }

        let ui = imgui.context.new_frame();
        let actions = self.panel.draw(ui, viewer, renderer.supports_wireframe());
        imgui.platform.prepare_render(ui, &renderer.window);

        for action in actions {
            action.apply(viewer, &mut self.platform, renderer);
        }
        engine::update(viewer, &mut self.platform, renderer, delta_time.as_secs_f32());

        renderer.finish_frame(&mut imgui.context);
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        let (Some(renderer), Some(viewer)) = (self.renderer.as_mut(), self.viewer.as_mut()) else {
            return;
        };
        if event.state != ElementState::Pressed {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };

        if code == KeyCode::Escape {
            viewer.exit_current_mode(&mut self.platform, renderer);
            return;
        }
        if self.platform.orientation.is_listening() {
            self.platform.orientation.handle_key(code);
        }
    }

    fn handle_cursor(&mut self, position: Vec2) {
        let previous = self.mouse.position.replace(position);
        let (Some(previous), Some(renderer), Some(viewer)) =
            (previous, self.renderer.as_ref(), self.viewer.as_mut())
        else {
            return;
        };
        if viewer.mode() != PresentationMode::Normal {
            return;
        }

        let delta = position - previous;
        let height = renderer.physical_size().height as f32;
        if self.mouse.rotating {
            viewer.controls.rotate(delta.x, delta.y, height);
        } else if self.mouse.panning {
            viewer.controls.pan(delta.x, delta.y, height, &viewer.camera);
        }
    }

    fn wants_mouse(&self) -> bool {
        self.imgui
            .as_ref()
            .is_some_and(|imgui| imgui.context.io().want_capture_mouse)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }

        if let Err(err) = self.init(event_loop) {
            log::error!("Failed to start viewer: {err:#}");
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match &event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let (Some(renderer), Some(viewer)) = (self.renderer.as_mut(), self.viewer.as_mut()) {
                    renderer.resize(*new_size);
                    viewer.handle_resize(new_size.width, new_size.height, renderer);
                    viewer.on_fullscreen_changed(&self.platform, self.platform.is_fullscreen(), renderer);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = *state == ElementState::Pressed && !self.wants_mouse();
                match button {
                    MouseButton::Left => self.mouse.rotating = pressed,
                    MouseButton::Right | MouseButton::Middle => self.mouse.panning = pressed,
                    _ => {}
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_SCROLL_STEP,
                };
                let captured = self.wants_mouse();
                if let Some(viewer) = self.viewer.as_mut() {
                    if !captured && viewer.mode() == PresentationMode::Normal {
                        viewer.controls.zoom(steps);
                    }
                }
            }
            WindowEvent::DroppedFile(path) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.load_model(AssetSource::Path(path.clone()));
                }
            }
            _ => (),
        }

        if let (Some(imgui), Some(renderer)) = (self.imgui.as_mut(), self.renderer.as_ref()) {
            imgui.platform.handle_event::<()>(
                imgui.context.io_mut(),
                &renderer.window,
                &Event::WindowEvent { window_id, event },
            );
        }
    }
}

pub async fn run(options: LaunchOptions, runtime: tokio::runtime::Handle) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(options, runtime);
    event_loop.run_app(&mut app)?;

    Ok(())
}
