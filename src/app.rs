//! Windowed runner.
//!
//! [`run`] opens a window, creates a [`WgpuDevice`] for it and drives an
//! [`Engine`] from the winit event loop: every redraw pumps pending loads,
//! updates the scene and draws it. The scene comes from the `setup` future,
//! which runs on the engine's executor so it can await shaders and textures on
//! both native and web targets. Until it resolves frames are skipped.

use std::rc::Rc;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, RemoteHandle};
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::gpu::wgpu_device::WgpuDevice;
use crate::resources::{AssetFetcher, ResourceCache};
use crate::scene::Scene;

/// Builds the scene once the engine exists.
pub type SetupFuture = LocalBoxFuture<'static, anyhow::Result<Scene>>;
type Setup = Box<dyn FnOnce(ResourceCache) -> SetupFuture>;

/// Install the platform logger. Safe to call more than once.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            log::debug!("logger already installed: {e}");
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::debug!("logger already installed: {e}");
        }
    }
}

enum AppEvent {
    #[cfg(target_arch = "wasm32")]
    DeviceReady(anyhow::Result<WgpuDevice>),
}

struct Running {
    device: Rc<WgpuDevice>,
    engine: Engine,
    setup: Option<RemoteHandle<anyhow::Result<Scene>>>,
    last_frame: Instant,
}

struct App {
    config: EngineConfig,
    #[cfg(target_arch = "wasm32")]
    proxy: winit::event_loop::EventLoopProxy<AppEvent>,
    setup: Option<Setup>,
    running: Option<Running>,
    error: Option<anyhow::Error>,
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn start(&mut self, device: WgpuDevice) -> anyhow::Result<()> {
        let Some(setup) = self.setup.take() else {
            anyhow::bail!("the engine was already started");
        };
        let device = Rc::new(device);
        let fetcher = Rc::new(AssetFetcher::new(&self.config.asset_root)?);
        let engine = Engine::new(self.config.clone(), device.clone(), fetcher);
        let handle = engine.spawn(setup(engine.resources().clone()))?;

        let (width, height) = device.window_size();
        device.resize(width, height);
        device.request_redraw();

        self.running = Some(Running {
            device,
            engine,
            setup: Some(handle),
            last_frame: Instant::now(),
        });
        Ok(())
    }

    fn redraw(running: &mut Running) -> anyhow::Result<()> {
        let now = Instant::now();
        let dt = now - running.last_frame;
        running.last_frame = now;

        running.engine.pump();
        if let Some(handle) = running.setup.as_mut() {
            if let Some(scene) = handle.now_or_never() {
                running.setup = None;
                running.engine.set_scene(scene?);
                log::info!("scene ready");
            }
        }
        running.engine.step(dt)?;
        running.device.request_redraw();
        Ok(())
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes =
            Window::default_attributes().with_title(self.config.window_title.clone());

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID));
            window_attributes = window_attributes.with_canvas(canvas.map(JsCast::unchecked_into));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let started = futures::executor::block_on(WgpuDevice::new(window))
                .and_then(|device| self.start(device));
            if let Err(e) = started {
                self.fail(event_loop, e);
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let device = WgpuDevice::new(window).await;
                if proxy.send_event(AppEvent::DeviceReady(device)).is_err() {
                    log::error!("the event loop closed before the device was ready");
                }
            });
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::DeviceReady(device) => {
                if let Err(e) = device.and_then(|device| self.start(device)) {
                    self.fail(event_loop, e);
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => running.device.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                if let Err(e) = Self::redraw(running) {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }
}

/// Open a window and run the engine until the window closes or a frame fails.
///
/// `setup` receives the resource cache and resolves to the scene to draw:
///
/// ```no_run
/// use futures::FutureExt;
/// use kiln_ngin::{EngineConfig, Scene, app};
///
/// app::run(EngineConfig::default(), |resources| {
///     async move {
///         let _shader = resources.load_shader_program("shaders/basic").await?;
///         let mut scene = Scene::new();
///         let camera = scene.create_camera();
///         scene.set_active_camera(camera);
///         Ok::<_, anyhow::Error>(scene)
///     }
///     .boxed_local()
/// })
/// .unwrap();
/// ```
pub fn run(
    config: EngineConfig,
    setup: impl FnOnce(ResourceCache) -> SetupFuture + 'static,
) -> anyhow::Result<()> {
    init_logging();

    let event_loop: EventLoop<AppEvent> = EventLoop::with_user_event().build()?;
    let mut app = App {
        config,
        #[cfg(target_arch = "wasm32")]
        proxy: event_loop.create_proxy(),
        setup: Some(Box::new(setup)),
        running: None,
        error: None,
    };

    event_loop.run_app(&mut app)?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
