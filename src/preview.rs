//! Revocable preview handles (object URLs) for the studio slots.
//!
//! [`PreviewRegistry`] is the only place handles are created or released.
//! It keeps at most one live handle per [`Slot`] and always releases the old
//! one before asking the backend for a new one.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use uuid::Uuid;

use crate::asset::AssetFile;
use crate::workflow::Slot;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("could not create a preview for `{name}`: {reason}")]
    Platform { name: String, reason: String },
}

/// Something that can turn file bytes into a short-lived URL and revoke it again.
pub trait PreviewBackend {
    fn create(&mut self, file: &AssetFile) -> Result<String, PreviewError>;
    fn revoke(&mut self, url: &str);
}

/// Opaque reference to a live preview. Only the registry can mint one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHandle {
    url: String,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

pub struct PreviewRegistry<B: PreviewBackend> {
    backend: B,
    live: HashMap<Slot, PreviewHandle>,
}

impl<B: PreviewBackend> PreviewRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self { backend, live: HashMap::new() }
    }

    /// Releases whatever `slot` currently holds, then creates a fresh handle for `file`.
    ///
    /// If creation fails the slot is left empty; the old handle is gone either way.
    pub fn install(
        &mut self,
        slot: Slot,
        file: &AssetFile,
    ) -> Result<&PreviewHandle, PreviewError> {
        self.release(slot);
        let url = self.backend.create(file)?;
        log::debug!("preview for {slot:?} -> {url}");
        Ok(self.live.entry(slot).or_insert(PreviewHandle { url }))
    }

    /// Returns `true` if a handle was actually revoked.
    pub fn release(&mut self, slot: Slot) -> bool {
        match self.live.remove(&slot) {
            Some(handle) => {
                self.backend.revoke(&handle.url);
                log::debug!("released {slot:?} preview {}", handle.url);
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) -> usize {
        let slots: Vec<Slot> = self.live.keys().copied().collect();
        slots.into_iter().filter(|slot| self.release(*slot)).count()
    }

    pub fn get(&self, slot: Slot) -> Option<&PreviewHandle> {
        self.live.get(&slot)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: PreviewBackend> Drop for PreviewRegistry<B> {
    fn drop(&mut self) {
        let released = self.release_all();
        if released > 0 {
            log::debug!("released {released} preview(s) on teardown");
        }
    }
}

// ----------------------------- backends -----------------------------

/// In-process backend used off the web. Keeps a journal so callers can audit lifetimes.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    live: HashSet<String>,
    created: Vec<String>,
    revoked: Vec<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.live.contains(url)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn created(&self) -> &[String] {
        &self.created
    }

    pub fn revoked(&self) -> &[String] {
        &self.revoked
    }
}

impl PreviewBackend for MemoryBackend {
    fn create(&mut self, file: &AssetFile) -> Result<String, PreviewError> {
        let url = format!("mem://preview/{}", Uuid::new_v4());
        log::trace!("memory preview {url} for {} ({} bytes)", file.name, file.len());
        self.live.insert(url.clone());
        self.created.push(url.clone());
        Ok(url)
    }

    fn revoke(&mut self, url: &str) {
        if self.live.remove(url) {
            self.revoked.push(url.to_owned());
        }
    }
}

/// `URL.createObjectURL` / `URL.revokeObjectURL` over a `Blob` of the file bytes.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
pub struct ObjectUrlBackend;

#[cfg(target_arch = "wasm32")]
impl PreviewBackend for ObjectUrlBackend {
    fn create(&mut self, file: &AssetFile) -> Result<String, PreviewError> {
        let platform = |reason: String| PreviewError::Platform { name: file.name.clone(), reason };
        let blob = crate::web::blob_from_file(file).map_err(platform)?;
        web_sys::Url::create_object_url_with_blob(&blob)
            .map_err(|e| platform(crate::web::js_err_string(&e)))
    }

    fn revoke(&mut self, url: &str) {
        if let Err(e) = web_sys::Url::revoke_object_url(url) {
            log::warn!("revokeObjectURL({url}) failed: {}", crate::web::js_err_string(&e));
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub type PlatformBackend = ObjectUrlBackend;
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformBackend = MemoryBackend;
