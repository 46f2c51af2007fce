use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::rc::Rc;

use futures::FutureExt;
use futures::executor::LocalPool;
use futures::future::LocalBoxFuture;
use kiln_ngin::gpu::headless::HeadlessDevice;
use kiln_ngin::resources::{Fetch, ShaderProgram};
use kiln_ngin::ResourceCache;

pub const BASIC_VS: &str = "\
uniform mat4 u_proj;
uniform mat4 u_view;
uniform mat4 u_model;
uniform vec3 u_cameraPos;
void main() {}
";

pub const BASIC_FS: &str = "\
uniform vec4 u_color;
uniform float u_time;
uniform sampler2D u_albedo;
uniform sampler2D u_normal;
void main() {}
";

/// Serves a fixed set of files and counts how often each URL was fetched.
/// Unknown URLs fail like a 404.
#[derive(Default)]
pub struct MockFetcher {
    files: RefCell<HashMap<String, Vec<u8>>>,
    fetches: RefCell<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, url: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }

    pub fn with_png(self, url: &str, rgba: [u8; 4]) -> Self {
        self.with_file(url, png(1, 1, &rgba))
    }

    /// A shader folder with both required stages.
    pub fn with_shader(self, folder: &str) -> Self {
        let base = folder.trim_end_matches('/').rsplit('/').next().unwrap_or(folder);
        self.with_file(&format!("{folder}/{base}.vs"), BASIC_VS)
            .with_file(&format!("{folder}/{base}.fs"), BASIC_FS)
    }

    pub fn insert(&self, url: &str, bytes: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(url.to_owned(), bytes.into());
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.borrow().get(url).copied().unwrap_or(0)
    }
}

impl Fetch for MockFetcher {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, anyhow::Result<Vec<u8>>> {
        *self.fetches.borrow_mut().entry(url.to_owned()).or_default() += 1;
        let found = self.files.borrow().get(url).cloned();
        let url = url.to_owned();
        async move { found.ok_or_else(|| anyhow::anyhow!("404 {url}")) }.boxed_local()
    }
}

/// Encode an RGBA8 image as PNG.
pub fn png(width: u32, height: u32, rgba: &[u8]) -> Vec<u8> {
    let pixels: Vec<u8> = rgba.iter().copied().cycle().take((width * height * 4) as usize).collect();
    let image = image::RgbaImage::from_raw(width, height, pixels).expect("pixel buffer size");
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("png encoding");
    bytes.into_inner()
}

/// A resource cache on a headless device with an executor the test drives by
/// hand.
pub struct Harness {
    pub pool: LocalPool,
    pub device: Rc<HeadlessDevice>,
    pub fetcher: Rc<MockFetcher>,
    pub resources: ResourceCache,
}

impl Harness {
    pub fn new(fetcher: MockFetcher) -> Self {
        let pool = LocalPool::new();
        let device = Rc::new(HeadlessDevice::new());
        let fetcher = Rc::new(fetcher);
        let resources = ResourceCache::new(device.clone(), fetcher.clone(), pool.spawner());
        Self {
            pool,
            device,
            fetcher,
            resources,
        }
    }

    /// Run every spawned load as far as it gets.
    pub fn pump(&mut self) {
        self.pool.run_until_stalled();
    }

    pub fn shader(&mut self, folder: &str) -> ShaderProgram {
        let load = self.resources.load_shader_program(folder);
        self.pool.run_until(load).expect("shader loads")
    }
}
