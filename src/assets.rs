use anyhow::{Context, Result};
use glam::UVec2;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Path value meaning "no texture was ever assigned".
pub const UNDEFINED_PATH: &str = "undefined_path";

/// Decoded texture data produced by a [`TextureLoader`].
pub struct TextureResource {
    pub path: String,
    pub size: UVec2,
    pub rgba: Vec<u8>,
}

impl fmt::Debug for TextureResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureResource").field("path", &self.path).field("size", &self.size).finish()
    }
}

/// Shared reference to a cached texture. Cloning never reloads.
#[derive(Debug, Clone)]
pub struct TextureHandle {
    id: u32,
    resource: Arc<TextureResource>,
}

impl TextureHandle {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.resource.path
    }

    pub fn size(&self) -> UVec2 {
        self.resource.size
    }

    pub fn resource(&self) -> &Arc<TextureResource> {
        &self.resource
    }

    pub fn ptr_eq(&self, other: &TextureHandle) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Turns a path into a texture. Loaders never cache; [`TextureCache`] does.
pub trait TextureLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<TextureResource>;
}

impl<F> TextureLoader for F
where
    F: Fn(&str) -> Result<TextureResource> + Send + Sync,
{
    fn load(&self, path: &str) -> Result<TextureResource> {
        self(path)
    }
}

/// Decodes image files relative to a root directory.
pub struct ImageTextureLoader {
    root: PathBuf,
}

impl ImageTextureLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
}

impl Default for ImageTextureLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl TextureLoader for ImageTextureLoader {
    fn load(&self, path: &str) -> Result<TextureResource> {
        let full_path = self.root.join(path);
        let bytes = fs::read(&full_path).with_context(|| format!("Reading texture {}", full_path.display()))?;
        let img = image::load_from_memory(&bytes)
            .with_context(|| format!("Decoding texture {}", full_path.display()))?
            .to_rgba8();
        let (w, h) = img.dimensions();
        Ok(TextureResource { path: path.to_string(), size: UVec2::new(w, h), rgba: img.into_raw() })
    }
}

/// Path-keyed texture cache. Entries live until [`TextureCache::clear`], whether or not anything
/// still references them.
pub struct TextureCache {
    loader: Box<dyn TextureLoader>,
    textures: HashMap<String, TextureHandle>,
    next_id: u32,
}

impl TextureCache {
    pub fn new(loader: impl TextureLoader + 'static) -> Self {
        Self { loader: Box::new(loader), textures: HashMap::new(), next_id: 0 }
    }

    pub fn set_loader(&mut self, loader: impl TextureLoader + 'static) {
        self.loader = Box::new(loader);
    }

    /// Returns the cached texture for `path`, loading it on first request.
    ///
    /// The undefined path sentinel (and an empty path) yields `Ok(None)` with a warning.
    pub fn load(&mut self, path: &str) -> Result<Option<TextureHandle>> {
        if path.is_empty() || path == UNDEFINED_PATH {
            log::warn!("[assets] texture requested with undefined path");
            return Ok(None);
        }
        if let Some(handle) = self.textures.get(path) {
            return Ok(Some(handle.clone()));
        }
        let resource = self.loader.load(path).with_context(|| format!("Loading texture '{path}'"))?;
        let handle = TextureHandle { id: self.next_id, resource: Arc::new(resource) };
        self.next_id += 1;
        log::debug!("[assets] loaded texture '{path}' ({}x{})", handle.size().x, handle.size().y);
        self.textures.insert(path.to_string(), handle.clone());
        Ok(Some(handle))
    }

    pub fn get(&self, path: &str) -> Option<&TextureHandle> {
        self.textures.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.textures.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new(ImageTextureLoader::default())
    }
}
