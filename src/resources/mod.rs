//! The resource cache: single owner of texture and shader program handles.
//!
//! Loads are keyed by URL. While a load is in flight every request for the same
//! key receives a clone of one shared future, so a key is fetched, decoded and
//! uploaded at most once at a time. Loads are spawned on the engine's local
//! executor and only make progress when it is pumped, which means a load
//! requested during a frame never completes inside that frame.
//!
//! A failed load leaves a failed entry behind; the next request for the key
//! starts over.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::executor::LocalSpawner;
use futures::future::{self, LocalBoxFuture, Shared};
use futures::task::LocalSpawnExt;
use futures::{Future, FutureExt};
use instant::Instant;

use crate::error::LoadError;
use crate::gpu::{Color, GpuDevice, ProgramId, TextureId};

mod fetch;
pub mod primitives;
mod shader;
mod texture;

pub use fetch::{AssetFetcher, Fetch};
pub use shader::{ShaderProgram, folder_basename, load_shader_sources, normalize_folder};
pub use texture::{DecodedImage, decode_texture};

pub type LoadFuture<T> = Shared<LocalBoxFuture<'static, Result<T, LoadError>>>;
/// Shared handle on a texture load. Clones resolve to the same outcome.
pub type TextureLoad = LoadFuture<TextureId>;
/// Shared handle on a shader program load.
pub type ShaderLoad = LoadFuture<ShaderProgram>;

/// Observable state of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Ready,
    Failed(LoadError),
}

/// Counters for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub loads_started: u64,
    pub loads_failed: u64,
    pub color_textures_created: u64,
    pub color_textures_evicted: u64,
}

enum Entry<T> {
    Pending(LoadFuture<T>),
    Ready(T),
    Failed(LoadError),
}

impl<T> Entry<T> {
    fn state(&self) -> LoadState {
        match self {
            Entry::Pending(_) => LoadState::Pending,
            Entry::Ready(_) => LoadState::Ready,
            Entry::Failed(e) => LoadState::Failed(e.clone()),
        }
    }
}

struct ColorTexture {
    texture: TextureId,
    last_used: Instant,
}

#[derive(Default)]
struct CacheState {
    textures: HashMap<String, Entry<TextureId>>,
    shaders: HashMap<String, Entry<ShaderProgram>>,
    colors: HashMap<[u8; 4], ColorTexture>,
    stats: CacheStats,
}

struct CacheInner {
    device: Rc<dyn GpuDevice>,
    fetcher: Rc<dyn Fetch>,
    spawner: LocalSpawner,
    state: RefCell<CacheState>,
}

/// Cheaply cloneable handle on the cache. All clones share one state.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Rc<CacheInner>,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("ResourceCache")
            .field("textures", &state.textures.len())
            .field("shaders", &state.shaders.len())
            .field("colors", &state.colors.len())
            .field("stats", &state.stats)
            .finish()
    }
}

impl ResourceCache {
    pub fn new(device: Rc<dyn GpuDevice>, fetcher: Rc<dyn Fetch>, spawner: LocalSpawner) -> Self {
        Self {
            inner: Rc::new(CacheInner {
                device,
                fetcher,
                spawner,
                state: RefCell::new(CacheState::default()),
            }),
        }
    }

    pub fn device(&self) -> &Rc<dyn GpuDevice> {
        &self.inner.device
    }

    /// Start loading `url`, or join the load already in flight.
    pub fn load_texture(&self, url: &str) -> TextureLoad {
        let mut state = self.inner.state.borrow_mut();
        match state.textures.get(url) {
            Some(Entry::Ready(texture)) => return future::ready(Ok(*texture)).boxed_local().shared(),
            Some(Entry::Pending(load)) => return load.clone(),
            Some(Entry::Failed(_)) | None => {}
        }

        let load = texture_load(Rc::downgrade(&self.inner), url.to_owned());
        state
            .textures
            .insert(url.to_owned(), Entry::Pending(load.clone()));
        state.stats.loads_started += 1;
        drop(state);

        log::debug!("loading texture {url}");
        self.spawn(load.clone());
        load
    }

    /// Make sure `url` is loaded or loading, without waiting for it.
    pub fn request_texture(&self, url: &str) {
        // Dropping the handle is fine: the spawned task drives the load.
        let _ = self.load_texture(url);
    }

    /// The texture of `url` if it has finished loading.
    pub fn get_texture(&self, url: &str) -> Option<TextureId> {
        match self.inner.state.borrow().textures.get(url) {
            Some(Entry::Ready(texture)) => Some(*texture),
            _ => None,
        }
    }

    pub fn texture_state(&self, url: &str) -> Option<LoadState> {
        self.inner.state.borrow().textures.get(url).map(Entry::state)
    }

    /// Start loading the shader folder `folder`, or join the load in flight.
    /// Trailing slashes do not matter.
    pub fn load_shader_program(&self, folder: &str) -> ShaderLoad {
        let key = normalize_folder(folder);
        let mut state = self.inner.state.borrow_mut();
        match state.shaders.get(key) {
            Some(Entry::Ready(program)) => {
                return future::ready(Ok(program.clone())).boxed_local().shared();
            }
            Some(Entry::Pending(load)) => return load.clone(),
            Some(Entry::Failed(_)) | None => {}
        }

        let load = shader_load(Rc::downgrade(&self.inner), key.to_owned());
        state
            .shaders
            .insert(key.to_owned(), Entry::Pending(load.clone()));
        state.stats.loads_started += 1;
        drop(state);

        log::debug!("loading shader folder {key}");
        self.spawn(load.clone());
        load
    }

    pub fn get_shader_program(&self, folder: &str) -> Option<ShaderProgram> {
        match self.inner.state.borrow().shaders.get(normalize_folder(folder)) {
            Some(Entry::Ready(program)) => Some(program.clone()),
            _ => None,
        }
    }

    pub fn shader_state(&self, folder: &str) -> Option<LoadState> {
        self.inner
            .state
            .borrow()
            .shaders
            .get(normalize_folder(folder))
            .map(Entry::state)
    }

    /// A 1×1 texture of `color`, created on first use.
    ///
    /// Colours are quantised to 8 bits per channel first, so colours that only
    /// differ below that precision share one texture.
    pub fn get_or_create_color_texture(&self, color: Color) -> Result<TextureId, LoadError> {
        let key = color.to_rgba8();
        let now = Instant::now();
        let mut state = self.inner.state.borrow_mut();
        if let Some(entry) = state.colors.get_mut(&key) {
            entry.last_used = now;
            return Ok(entry.texture);
        }

        let label = format!("color {key:?}");
        let texture = self
            .inner
            .device
            .create_texture(1, 1, &key, &label)
            .map_err(|e| LoadError::device(&label, &e))?;
        state.colors.insert(
            key,
            ColorTexture {
                texture,
                last_used: now,
            },
        );
        state.stats.color_textures_created += 1;
        log::debug!("created fallback texture {texture} for {label}");
        Ok(texture)
    }

    /// Release the texture of `url`. Returns whether an entry was removed.
    /// Loads still in flight are kept.
    pub fn delete_texture(&self, url: &str) -> bool {
        let mut state = self.inner.state.borrow_mut();
        match state.textures.get(url) {
            Some(Entry::Pending(_)) => {
                log::debug!("not evicting {url}: still loading");
                false
            }
            Some(_) => {
                if let Some(Entry::Ready(texture)) = state.textures.remove(url) {
                    self.inner.release_texture(texture, url);
                }
                true
            }
            None => false,
        }
    }

    /// Release every loaded texture and every colour texture. Loads still in
    /// flight are kept and cached when they complete.
    pub fn clear_textures(&self) {
        let mut state = self.inner.state.borrow_mut();
        let urls: Vec<String> = state
            .textures
            .iter()
            .filter(|(_, e)| !matches!(e, Entry::Pending(_)))
            .map(|(url, _)| url.clone())
            .collect();
        for url in urls {
            if let Some(Entry::Ready(texture)) = state.textures.remove(&url) {
                self.inner.release_texture(texture, &url);
            }
        }
        let evicted = state.colors.len() as u64;
        for (key, color) in state.colors.drain() {
            self.inner.release_texture(color.texture, &format!("color {key:?}"));
        }
        state.stats.color_textures_evicted += evicted;
    }

    /// Release the program of `folder`, returning its id so dependent caches
    /// can be invalidated. Loads still in flight are kept.
    pub fn delete_shader_program(&self, folder: &str) -> Option<ProgramId> {
        let key = normalize_folder(folder);
        let mut state = self.inner.state.borrow_mut();
        match state.shaders.get(key)? {
            Entry::Pending(_) => {
                log::debug!("not evicting {key}: still loading");
                None
            }
            Entry::Failed(_) => {
                state.shaders.remove(key);
                None
            }
            Entry::Ready(_) => {
                let Some(Entry::Ready(program)) = state.shaders.remove(key) else {
                    return None;
                };
                self.inner.release_program(&program);
                Some(program.id())
            }
        }
    }

    /// Release every loaded program and return their ids.
    pub fn clear_shader_programs(&self) -> Vec<ProgramId> {
        let mut state = self.inner.state.borrow_mut();
        let mut released = Vec::new();
        state.shaders.retain(|_, entry| match entry {
            Entry::Pending(_) => true,
            Entry::Failed(_) => false,
            Entry::Ready(program) => {
                self.inner.release_program(program);
                released.push(program.id());
                false
            }
        });
        released
    }

    /// Release colour textures not used within the last `max_age`.
    pub fn evict_stale_color_textures(&self, max_age: Duration) -> usize {
        match Instant::now().checked_sub(max_age) {
            Some(cutoff) => self.evict_color_textures_unused_since(cutoff),
            None => 0,
        }
    }

    /// Release colour textures last used before `cutoff`.
    pub fn evict_color_textures_unused_since(&self, cutoff: Instant) -> usize {
        let mut state = self.inner.state.borrow_mut();
        let before = state.colors.len();
        state.colors.retain(|key, color| {
            if color.last_used >= cutoff {
                return true;
            }
            self.inner.release_texture(color.texture, &format!("color {key:?}"));
            false
        });
        let evicted = before - state.colors.len();
        state.stats.color_textures_evicted += evicted as u64;
        if evicted > 0 {
            log::debug!("evicted {evicted} stale colour textures");
        }
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.state.borrow().stats
    }

    /// Number of loaded URL textures.
    pub fn texture_count(&self) -> usize {
        let state = self.inner.state.borrow();
        state
            .textures
            .values()
            .filter(|e| matches!(e, Entry::Ready(_)))
            .count()
    }

    pub fn color_texture_count(&self) -> usize {
        self.inner.state.borrow().colors.len()
    }

    /// Whether any load is still in flight.
    pub fn has_pending_loads(&self) -> bool {
        let state = self.inner.state.borrow();
        state
            .textures
            .values()
            .any(|e| matches!(e, Entry::Pending(_)))
            || state
                .shaders
                .values()
                .any(|e| matches!(e, Entry::Pending(_)))
    }

    fn spawn<T: Clone + 'static>(&self, load: LoadFuture<T>) {
        if let Err(e) = self.inner.spawner.spawn_local(load.map(drop)) {
            // The executor is gone; awaiting callers still drive the load.
            log::warn!("could not schedule a load: {e}");
        }
    }
}

impl CacheInner {
    fn release_texture(&self, texture: TextureId, what: &str) {
        if let Err(e) = self.device.delete_texture(texture) {
            log::error!("could not release texture {texture} ({what}): {e:#}");
        }
    }

    fn release_program(&self, program: &ShaderProgram) {
        if let Err(e) = self.device.delete_program(program.id()) {
            log::error!("could not release program {program:?}: {e:#}");
        }
    }

    fn finish<T: Clone>(
        entries: &mut HashMap<String, Entry<T>>,
        stats: &mut CacheStats,
        key: &str,
        result: &Result<T, LoadError>,
    ) {
        match result {
            Ok(value) => {
                log::debug!("loaded {key}");
                entries.insert(key.to_owned(), Entry::Ready(value.clone()));
            }
            Err(e) => {
                log::error!("{e}");
                stats.loads_failed += 1;
                entries.insert(key.to_owned(), Entry::Failed(e.clone()));
            }
        }
    }
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        let state = std::mem::take(self.state.get_mut());
        for (url, entry) in state.textures {
            if let Entry::Ready(texture) = entry {
                self.release_texture(texture, &url);
            }
        }
        for (key, color) in state.colors {
            self.release_texture(color.texture, &format!("color {key:?}"));
        }
        for (_, entry) in state.shaders {
            if let Entry::Ready(program) = entry {
                self.release_program(&program);
            }
        }
    }
}

fn share<T: Clone + 'static>(
    load: impl Future<Output = Result<T, LoadError>> + 'static,
) -> LoadFuture<T> {
    load.boxed_local().shared()
}

fn texture_load(cache: Weak<CacheInner>, url: String) -> TextureLoad {
    share(async move {
        let (device, fetcher) = match cache.upgrade() {
            Some(inner) => (inner.device.clone(), inner.fetcher.clone()),
            None => {
                return Err(LoadError::Fetch {
                    url,
                    reason: "the resource cache was dropped".to_owned(),
                });
            }
        };

        let result = async {
            let bytes = fetcher
                .fetch(&url)
                .await
                .map_err(|e| LoadError::fetch(&url, &e))?;
            let image = decode_texture(&bytes, &url)?;
            device
                .create_texture(image.width, image.height, &image.rgba, &url)
                .map_err(|e| LoadError::device(&url, &e))
        }
        .await;

        match cache.upgrade() {
            Some(inner) => {
                let state = &mut *inner.state.borrow_mut();
                CacheInner::finish(&mut state.textures, &mut state.stats, &url, &result);
            }
            None => {
                if let Ok(texture) = result {
                    // Nobody owns the handle anymore.
                    if let Err(e) = device.delete_texture(texture) {
                        log::error!("could not release orphaned texture {url}: {e:#}");
                    }
                }
            }
        }
        result
    })
}

fn shader_load(cache: Weak<CacheInner>, folder: String) -> ShaderLoad {
    share(async move {
        let (device, fetcher) = match cache.upgrade() {
            Some(inner) => (inner.device.clone(), inner.fetcher.clone()),
            None => {
                return Err(LoadError::Fetch {
                    url: folder,
                    reason: "the resource cache was dropped".to_owned(),
                });
            }
        };

        let result = async {
            let sources = load_shader_sources(fetcher.as_ref(), &folder).await?;
            let id = device
                .create_program(&sources, &folder)
                .map_err(|e| LoadError::device(&folder, &e))?;
            Ok(ShaderProgram::new(id, folder.as_str()))
        }
        .await;

        match cache.upgrade() {
            Some(inner) => {
                let state = &mut *inner.state.borrow_mut();
                CacheInner::finish(&mut state.shaders, &mut state.stats, &folder, &result);
            }
            None => {
                if let Ok(program) = &result {
                    if let Err(e) = device.delete_program(program.id()) {
                        log::error!("could not release orphaned program {folder}: {e:#}");
                    }
                }
            }
        }
        result
    })
}
