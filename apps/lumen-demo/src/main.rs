//! Lumen demo: a windowed Vulkan scene with a fly camera.
//!
//! Expects precompiled SPIR-V at `shaders/scene.vert.spv` and
//! `shaders/scene.frag.spv` relative to the working directory.
//!
//! Controls: WASD to move, Space/Shift for up/down, mouse to look,
//! Escape to quit. `RUST_LOG` adjusts log verbosity.

mod controller;

use ash::vk;
use glam::Vec3;
use lumen_render::{FlyCamera, Renderer, RendererConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::controller::CameraController;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const TITLE: &str = "Lumen Demo";

const MOUSE_SENSITIVITY: f32 = 0.002;
const CAMERA_SPEED: f32 = 0.1;

struct DemoState {
    // The renderer's surface is created from the window, so the renderer
    // must drop first.
    renderer: Renderer,
    window: Arc<Window>,
    controller: CameraController,
}

#[derive(Default)]
struct DemoApp {
    state: Option<DemoState>,
}

impl DemoApp {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<DemoState> {
        let window_attrs = Window::default_attributes()
            .with_title(TITLE)
            .with_inner_size(PhysicalSize::new(WIDTH, HEIGHT));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let size = window.inner_size();
        let renderer = Renderer::new(
            window.as_ref(),
            vk::Extent2D {
                width: size.width,
                height: size.height,
            },
            &RendererConfig {
                app_name: TITLE.to_string(),
                ..Default::default()
            },
        )?;

        let camera = FlyCamera::new(Vec3::new(0.0, 0.0, -3.0), MOUSE_SENSITIVITY, CAMERA_SPEED);

        Ok(DemoState {
            renderer,
            window,
            controller: CameraController::new(camera),
        })
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                info!("Demo ready");
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => {
                error!("Failed to initialize: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.state = None;
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                if code == KeyCode::Escape && key_state == ElementState::Pressed {
                    info!("Escape pressed, exiting");
                    self.state = None;
                    event_loop.exit();
                    return;
                }
                state
                    .controller
                    .handle_key(code, key_state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                state.controller.handle_cursor(position.x, position.y);
            }
            WindowEvent::Resized(size) => {
                if let Err(e) = state.renderer.resize(size.width, size.height) {
                    error!("Resize failed: {e}");
                    self.state = None;
                    event_loop.exit();
                }
            }
            WindowEvent::RedrawRequested => {
                state.controller.apply_movement();
                tracing::trace!(position = ?state.controller.camera.position, "frame");
                if let Err(e) = state.renderer.render() {
                    error!("Render failed: {e}");
                    self.state = None;
                    event_loop.exit();
                    return;
                }
                state.window.request_redraw();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("{TITLE} starting...");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DemoApp::default();
    event_loop.run_app(&mut app)?;

    Ok(())
}
