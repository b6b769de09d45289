#![allow(
    dead_code,
    unused_variables,
    clippy::too_many_arguments,
    clippy::unnecessary_wraps
)]

use std::time::Instant;

use anyhow::Result;
use log::error;
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::{Window, WindowBuilder};

mod config;
mod renderer;
mod vulkan;

pub use config::Config;
pub use renderer::Renderer;

pub use nalgebra;

pub type Mat4 = nalgebra::Matrix4<f32>;

#[derive(Debug)]
pub struct Engine {
    window: Window,
    renderer: Renderer,
    event_loop: EventLoop<()>,
}

impl Engine {
    pub fn new(config: Config) -> Result<Engine> {
        // Window
        let event_loop = EventLoop::new()?;
        let window = WindowBuilder::new()
            .with_title(&config.app_name)
            .with_inner_size(LogicalSize::new(config.window_width, config.window_height))
            .with_resizable(false)
            .build(&event_loop)?;

        let renderer = unsafe { Renderer::create(&window, &config)? };

        Ok(Engine {
            window,
            renderer,
            event_loop,
        })
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Drives the event loop, calling `on_frame` with the elapsed seconds
    /// before each frame is rendered.
    pub fn run<F>(self, mut on_frame: F) -> Result<()>
    where
        F: FnMut(&mut Renderer, f32) -> Result<()> + 'static,
    {
        let Engine {
            window,
            mut renderer,
            event_loop,
        } = self;

        let mut last_frame = Instant::now();

        event_loop.run(move |event, elwt| {
            match event {
                // Request a redraw when all events were processed.
                Event::AboutToWait => window.request_redraw(),
                Event::WindowEvent { event, .. } => match event {
                    // Render a frame if we are not being destroyed.
                    WindowEvent::RedrawRequested if !elwt.exiting() => {
                        let now = Instant::now();
                        let delta = now.duration_since(last_frame).as_secs_f32();
                        last_frame = now;

                        let frame = on_frame(&mut renderer, delta)
                            .and_then(|()| unsafe { renderer.render() });
                        if let Err(err) = frame {
                            error!("{:#}", err);
                            elwt.exit();
                        }
                    }
                    // Drain the GPU and tear down.
                    WindowEvent::CloseRequested => {
                        elwt.exit();
                        unsafe {
                            renderer.destroy();
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        })?;

        Ok(())
    }
}
