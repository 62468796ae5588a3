use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::window::{Fullscreen, Window, WindowId};
use softbuffer::Surface;

use crate::loader::UserEvent;
use crate::ui::state::{AppState, KeyOutcome};
use crate::viewer::Now;

pub mod render;
pub mod state;
pub mod view;

/// Pixels per wheel "line" when converting line deltas to DOM-like pixel deltas.
const LINE_HEIGHT_PX: f32 = 40.0;

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

pub struct App {
    pub state: AppState,
    pub window: Option<Arc<Window>>,
    pub context: Option<softbuffer::Context<Arc<Window>>>,
    pub surface: Option<Surface<Arc<Window>, Arc<Window>>>,
    pub next_redraw: Option<Instant>,
    title: String,
}

impl App {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            window: None,
            context: None,
            surface: None,
            next_redraw: None,
            title: String::new(),
        }
    }

    fn request_redraw(&self) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn sync_title(&mut self) {
        let title = self.state.window_title();
        if title != self.title {
            if let Some(ref window) = self.window {
                window.set_title(&title);
            }
            self.title = title;
        }
    }

    fn resize_surface(&mut self, PhysicalSize { width, height }: PhysicalSize<u32>) {
        let (Some(w), Some(h)) = (NonZeroU32::new(width.max(1)), NonZeroU32::new(height.max(1))) else {
            return;
        };
        if let Some(ref mut surface) = self.surface {
            if let Err(e) = surface.resize(w, h) {
                log::warn!("Could not resize surface: {}", e);
            }
        }
        let scale = self.window.as_ref().map(|w| w.scale_factor()).unwrap_or(1.0);
        self.state.set_surface(width, height, scale);
    }

    fn on_touch(&mut self, touch: Touch) {
        let now = Now::capture();
        let pos = (touch.location.x as f32, touch.location.y as f32);
        match touch.phase {
            TouchPhase::Started => self.state.touch_start(touch.id, pos, now),
            TouchPhase::Moved => self.state.touch_move(touch.id, pos, now),
            TouchPhase::Ended => self.state.touch_end(touch.id, now),
            TouchPhase::Cancelled => self.state.touch_cancel(now),
        }
    }
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title("gv")
            .with_inner_size(LogicalSize::new(1280u32, 800u32));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Could not create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        let context = match softbuffer::Context::new(Arc::clone(&window)) {
            Ok(c) => c,
            Err(e) => {
                log::error!("Could not create drawing context: {}", e);
                event_loop.exit();
                return;
            }
        };
        let surface = match Surface::new(&context, Arc::clone(&window)) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Could not create surface: {}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        self.window = Some(window);
        self.context = Some(context);
        self.surface = Some(surface);
        self.resize_surface(size);
        self.sync_title();
        self.request_redraw();
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::SourceReady(path) | UserEvent::ThumbnailReady(path) => {
                log::debug!("[source] ready {}", path);
            }
            UserEvent::LoaderUpdate => {}
        }
        self.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                self.resize_surface(size);
                self.request_redraw();
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    self.resize_surface(size);
                }
                self.request_redraw();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                match self.state.key(&event.logical_key, Now::capture()) {
                    KeyOutcome::Quit => {
                        event_loop.exit();
                        return;
                    }
                    KeyOutcome::ToggleFullscreen => {
                        if let Some(ref window) = self.window {
                            let next = match window.fullscreen() {
                                Some(_) => None,
                                None => Some(Fullscreen::Borderless(None)),
                            };
                            window.set_fullscreen(next);
                        }
                    }
                    KeyOutcome::Handled | KeyOutcome::Ignored => {}
                }
                self.sync_title();
                self.request_redraw();
            }

            WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => {
                let now = Now::capture();
                match state {
                    ElementState::Pressed => self.state.mouse_press(now),
                    ElementState::Released => self.state.mouse_release(now),
                }
                self.sync_title();
                self.request_redraw();
            }

            WindowEvent::CursorMoved { position: PhysicalPosition { x, y }, .. } => {
                self.state.cursor_moved((x as f32, y as f32));
                self.request_redraw();
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y * LINE_HEIGHT_PX,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => y as f32,
                };
                // winit reports scrolling up as positive; the zoom engine expects the DOM sign.
                self.state.wheel(-y, Now::capture());
                self.request_redraw();
            }

            WindowEvent::Touch(touch) => {
                self.on_touch(touch);
                self.sync_title();
                self.request_redraw();
            }

            WindowEvent::RedrawRequested => {
                let Some(window) = self.window.clone() else { return };
                let size = window.inner_size();
                let fb_w = size.width.max(1);
                let fb_h = size.height.max(1);
                let now = Now::capture();

                if let Some(ref mut surface) = self.surface {
                    match surface.buffer_mut() {
                        Ok(mut buffer) => {
                            self.state.render(&mut buffer, fb_w, fb_h, now);
                            if let Err(e) = buffer.present() {
                                log::warn!("Could not present frame: {}", e);
                            }
                        }
                        Err(e) => log::warn!("Could not get frame buffer: {}", e),
                    }
                }
                self.next_redraw = self.state.next_frame(Instant::now());
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(when) = self.next_redraw {
            if Instant::now() >= when {
                self.next_redraw = None;
                self.request_redraw();
            } else {
                event_loop.set_control_flow(ControlFlow::WaitUntil(when));
            }
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }
}
