use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use image::GrayImage;

/// Decoded reference images, keyed by file name (case-insensitive).
///
/// Entries are created on first request and never change afterwards. Reads
/// share a lock. A miss decodes without holding any lock, then takes the
/// write lock only to insert; if another thread inserted the same name in
/// the meantime, its entry wins so every caller sees one shared image.
pub struct TemplateStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<GrayImage>>>,
    decodes: AtomicUsize,
}

fn cache_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
            decodes: AtomicUsize::new(0),
        }
    }

    /// Store seeded with in-memory images. Names not seeded fall through to
    /// an empty directory and resolve to `None`.
    pub fn preloaded<I, S>(images: I) -> Self
    where
        I: IntoIterator<Item = (S, GrayImage)>,
        S: AsRef<str>,
    {
        let cache = images
            .into_iter()
            .map(|(name, img)| (cache_key(name.as_ref()), Arc::new(img)))
            .collect();
        Self {
            dir: PathBuf::new(),
            cache: RwLock::new(cache),
            decodes: AtomicUsize::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Number of image files decoded from disk so far.
    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::Relaxed)
    }

    /// Cached intensity image for `name`, or `None` if the file is missing
    /// or cannot be decoded.
    pub fn get(&self, name: &str) -> Option<Arc<GrayImage>> {
        let key = cache_key(name);
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(img) = cache.get(&key) {
                return Some(Arc::clone(img));
            }
        }

        let decoded = Arc::new(self.decode(name)?);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Some(Arc::clone(cache.entry(key).or_insert(decoded)))
    }

    /// Decode `name` from disk again, bypassing the cache. Seeded entries are
    /// returned as copies when there is no backing file.
    pub fn load_fresh(&self, name: &str) -> Option<GrayImage> {
        self.decode(name).or_else(|| {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            cache.get(&cache_key(name)).map(|img| img.as_ref().clone())
        })
    }

    /// Names without a backing file (and no seeded entry).
    pub fn missing<'a>(&self, names: &[&'a str]) -> Vec<&'a str> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        names
            .iter()
            .copied()
            .filter(|name| !cache.contains_key(&cache_key(name)) && !self.path_of(name).is_file())
            .collect()
    }

    fn decode(&self, name: &str) -> Option<GrayImage> {
        if self.dir.as_os_str().is_empty() {
            return None;
        }
        let path = self.path_of(name);
        if !path.is_file() {
            return None;
        }
        match image::open(&path) {
            Ok(img) => {
                self.decodes.fetch_add(1, Ordering::Relaxed);
                Some(img.to_luma8())
            }
            Err(e) => {
                tracing::warn!("Failed to decode template {}: {}", path.display(), e);
                None
            }
        }
    }
}
