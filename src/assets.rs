#[cfg(test)]
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::thread;

use crate::errors::{FetchError, SceneLoadError};
use crate::schema::{SceneId, ShaderInfo, ShaderIndex};

/// Where shader descriptions and sources come from.
pub trait AssetSource: Send + Sync {
    fn fetch_text(&self, name: &str) -> Result<String, FetchError>;
}

/// Assets read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirAssets {
    base: PathBuf,
}

impl DirAssets {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl AssetSource for DirAssets {
    fn fetch_text(&self, name: &str) -> Result<String, FetchError> {
        let path = self.base.join(name);
        std::fs::read_to_string(&path).map_err(|source| FetchError::Io { path, source })
    }
}

/// In-memory assets, keyed by file name.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: HashMap<String, String>,
}

#[cfg(test)]
impl MemoryAssets {
    pub fn with(mut self, name: &str, contents: &str) -> Self {
        self.files.insert(name.to_string(), contents.to_string());
        self
    }
}

#[cfg(test)]
impl AssetSource for MemoryAssets {
    fn fetch_text(&self, name: &str) -> Result<String, FetchError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::Io {
                path: PathBuf::from(name),
                source: std::io::ErrorKind::NotFound.into(),
            })
    }
}

pub fn load_index(assets: &dyn AssetSource, name: &str) -> Result<ShaderIndex, SceneLoadError> {
    Ok(ShaderIndex::parse(&assets.fetch_text(name)?)?)
}

/// A description plus the GLSL it points at, validated but not yet compiled.
#[derive(Debug, Clone)]
pub struct FetchedShader {
    pub info: ShaderInfo,
    pub source: String,
}

/// One description fetch, then one source fetch. The description must
/// validate completely before the source is requested.
pub fn fetch_shader(assets: &dyn AssetSource, description: &str) -> Result<FetchedShader, SceneLoadError> {
    let info = ShaderInfo::parse(&assets.fetch_text(description)?)?;
    let source = assets.fetch_text(&info.file_name)?;
    Ok(FetchedShader { info, source })
}

pub struct Fetched {
    pub id: SceneId,
    pub result: Result<FetchedShader, SceneLoadError>,
}

/// Runs fetches off the render thread and hands results back through a
/// channel drained once per frame.
pub struct ShaderFetcher {
    assets: Arc<dyn AssetSource>,
    sender: mpsc::Sender<Fetched>,
    receiver: mpsc::Receiver<Fetched>,
}

impl ShaderFetcher {
    pub fn new(assets: Arc<dyn AssetSource>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            assets,
            sender,
            receiver,
        }
    }

    pub fn fetch_now(&self, description: &str) -> Result<FetchedShader, SceneLoadError> {
        fetch_shader(self.assets.as_ref(), description)
    }

    pub fn spawn(&self, id: SceneId, description: &str) {
        let assets = self.assets.clone();
        let sender = self.sender.clone();
        let description = description.to_string();
        thread::spawn(move || {
            let result = fetch_shader(assets.as_ref(), &description);
            // Receiver gone means the renderer was dropped; nothing to report to.
            let _ = sender.send(Fetched { id, result });
        });
    }

    pub fn try_next(&self) -> Option<Fetched> {
        self.receiver.try_recv().ok()
    }

    #[cfg(test)]
    pub fn wait_next(&self, timeout: std::time::Duration) -> Option<Fetched> {
        self.receiver.recv_timeout(timeout).ok()
    }
}
