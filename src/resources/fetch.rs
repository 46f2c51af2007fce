//! Turning URLs into bytes.

use futures::FutureExt;
use futures::future::LocalBoxFuture;

/// Resolves an asset URL to its contents.
///
/// URLs are opaque to the engine; implementations decide what they point at.
pub trait Fetch {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, anyhow::Result<Vec<u8>>>;

    fn fetch_text(&self, url: &str) -> LocalBoxFuture<'static, anyhow::Result<String>> {
        let bytes = self.fetch(url);
        let url = url.to_owned();
        async move {
            let bytes = bytes.await?;
            String::from_utf8(bytes).map_err(|e| anyhow::anyhow!("{url} is not UTF-8: {e}"))
        }
        .boxed_local()
    }
}

/// Reads assets from disk on native targets and over HTTP on the web.
///
/// On native, URLs are paths relative to the asset root and reads happen on a
/// small blocking pool so the frame loop never waits for the disk. On wasm,
/// URLs are resolved against `<page origin>/<asset root>/`.
#[derive(Debug)]
pub struct AssetFetcher {
    root: std::path::PathBuf,
    #[cfg(not(target_arch = "wasm32"))]
    io: tokio::runtime::Runtime,
}

impl AssetFetcher {
    pub fn new(root: impl Into<std::path::PathBuf>) -> anyhow::Result<Self> {
        #[cfg(not(target_arch = "wasm32"))]
        let io = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("kiln-io")
            .enable_all()
            .build()?;
        Ok(Self {
            root: root.into(),
            #[cfg(not(target_arch = "wasm32"))]
            io,
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn resolve(&self, url: &str) -> anyhow::Result<std::path::PathBuf> {
        if url.contains("://") {
            anyhow::bail!("remote URL {url} cannot be read from disk");
        }
        Ok(self.root.join(url.trim_start_matches('/')))
    }

    #[cfg(target_arch = "wasm32")]
    fn resolve(&self, url: &str) -> anyhow::Result<reqwest::Url> {
        use anyhow::Context;

        let window = web_sys::window().context("no browser window")?;
        let origin = window
            .location()
            .origin()
            .map_err(|e| anyhow::anyhow!("no page origin: {e:?}"))?;
        let root = self.root.to_string_lossy();
        let base = reqwest::Url::parse(&format!("{origin}/{}/", root.trim_matches('/')))?;
        Ok(base.join(url.trim_start_matches('/'))?)
    }
}

impl Fetch for AssetFetcher {
    #[cfg(not(target_arch = "wasm32"))]
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, anyhow::Result<Vec<u8>>> {
        let path = self.resolve(url);
        let read = path.map(|path| self.io.spawn_blocking(move || std::fs::read(path)));
        async move {
            let bytes = read?.await??;
            Ok(bytes)
        }
        .boxed_local()
    }

    #[cfg(target_arch = "wasm32")]
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, anyhow::Result<Vec<u8>>> {
        let url = self.resolve(url);
        async move {
            let response = reqwest::get(url?).await?.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        }
        .boxed_local()
    }
}
