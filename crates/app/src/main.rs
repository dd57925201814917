//! tessera - spinning textured model
//!
//! Opens a window, builds the renderer once the event loop resumes and draws
//! a frame on every redraw until the window closes or a GPU error occurs.

use anyhow::{Result, anyhow};
use tracing::{error, info, trace};
use winit::application::ApplicationHandler;
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::window::WindowId;

use tessera_core::{RendererConfig, Timer};
use tessera_platform::{EventLoop, Window, WindowEvent};
use tessera_renderer::Renderer;

struct App {
    config: RendererConfig,
    // Dropped before the window so the surface goes first
    renderer: Option<Renderer>,
    window: Option<Window>,
    failure: Option<anyhow::Error>,
    frame_timer: Timer,
}

impl App {
    fn new(config: RendererConfig) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            failure: None,
            frame_timer: Timer::new(),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.failure = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match Window::new(
            event_loop,
            self.config.window_width,
            self.config.window_height,
            &self.config.window_title,
        ) {
            Ok(window) => window,
            Err(e) => {
                self.fail(event_loop, anyhow!("failed to create window: {e}"));
                return;
            }
        };

        match Renderer::new(&window, &self.config) {
            Ok(renderer) => {
                info!("Initialization complete, entering main loop");
                self.renderer = Some(renderer);
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, anyhow!("failed to create renderer: {e}")),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                let result = renderer.render_frame();
                let delta = self.frame_timer.delta_secs();
                match result {
                    Ok(status) => trace!("{:?} in {:.2} ms", status, delta * 1000.0),
                    Err(e) => self.fail(event_loop, anyhow!("render error: {e}")),
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref()
            && !window.is_minimized()
        {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    tessera_core::init_logging();

    let config = RendererConfig::from_env_or_default()?;
    info!("Starting {}", config.window_title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // Tear down GPU objects before reporting the outcome
    app.renderer = None;
    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
