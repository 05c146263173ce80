//! Window and event pump.

use std::sync::Arc;
use std::time::Duration;

use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::platform::pump_events::EventLoopExtPumpEvents;
use winit::window::{Fullscreen, Window, WindowBuilder};

use arc_config::WindowSettings;
use arc_input::InputSystem;

use crate::{Error, Result};

/// What one pump produced for the frame loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformRequests {
    pub close_requested: bool,
    /// New drawable size in physical pixels, when it changed.
    pub resized: Option<(u32, u32)>,
}

/// One top-level window plus its event loop, pumped cooperatively from
/// the frame loop.
pub struct Platform {
    event_loop: EventLoop<()>,
    window: Arc<Window>,
    vsync: bool,
}

impl Platform {
    /// Creates the window. Initialization failure is fatal.
    pub fn new(settings: &WindowSettings) -> Result<Self> {
        let event_loop = EventLoop::new().map_err(|err| Error::Platform(err.to_string()))?;
        let mut builder = WindowBuilder::new()
            .with_title(&settings.title)
            .with_inner_size(LogicalSize::new(settings.width, settings.height));
        if settings.fullscreen {
            // Desktop (borderless) fullscreen; no mode switch.
            builder = builder.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = builder
            .build(&event_loop)
            .map_err(|err| Error::Platform(err.to_string()))?;
        Ok(Self {
            event_loop,
            window: Arc::new(window),
            vsync: settings.vsync,
        })
    }

    pub fn window(&self) -> Arc<Window> {
        self.window.clone()
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    /// Drawable size in physical pixels.
    pub fn drawable_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    pub fn set_fullscreen(&self, fullscreen: bool) {
        self.window.set_fullscreen(if fullscreen {
            Some(Fullscreen::Borderless(None))
        } else {
            None
        });
    }

    /// Pumps pending events into the input system and returns the
    /// platform-level requests. Never blocks.
    pub fn pump(&mut self, input: &mut InputSystem) -> PlatformRequests {
        let mut requests = PlatformRequests::default();
        let window_id = self.window.id();
        self.event_loop
            .pump_events(Some(Duration::ZERO), |event, _target| {
                if let Event::WindowEvent { window_id: id, event } = event {
                    if id != window_id {
                        return;
                    }
                    match &event {
                        WindowEvent::CloseRequested => requests.close_requested = true,
                        WindowEvent::Resized(size) => {
                            requests.resized = Some((size.width, size.height));
                        }
                        _ => {}
                    }
                    input.handle_window_event(&event);
                }
            });
        input.poll_gamepads();
        requests
    }
}
