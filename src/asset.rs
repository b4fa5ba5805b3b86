//! Ingested files and the image / 3D model split.
//!
//! Classification only looks at the extension (text after the final `.`,
//! compared case-insensitively). Anything that is not a known model format is
//! treated as a raster image, including names without an extension.

use std::sync::Arc;

/// Extensions routed to the 3D model slot.
pub const MODEL_EXTENSIONS: &[&str] = &["glb", "gltf", "usdz", "obj", "fbx"];

/// Extensions offered by the picture-mode file picker.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
    Model3D,
}

/// Lower-cased extension of `filename`, if it has one.
pub fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

pub fn classify(filename: &str) -> AssetKind {
    match extension(filename) {
        Some(ext) if MODEL_EXTENSIONS.contains(&ext.as_str()) => AssetKind::Model3D,
        _ => AssetKind::Image,
    }
}

/// Best-effort MIME type for a file name; used when the platform gave us none.
pub fn mime_for(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("glb") => "model/gltf-binary",
        Some("gltf") => "model/gltf+json",
        Some("usdz") => "model/vnd.usdz+zip",
        Some("obj") => "model/obj",
        _ => "application/octet-stream",
    }
}

/// A file handed to the studio by a picker or a drop.
///
/// The bytes are shared so that the render payload can reference the same
/// buffer the slot owns without copying it.
#[derive(Clone, PartialEq, Eq)]
pub struct AssetFile {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl AssetFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let mime = mime_for(&name).to_owned();
        Self { name, mime, bytes: bytes.into() }
    }

    /// Keeps a platform-supplied MIME type, falling back to the extension table.
    pub fn with_mime(mut self, mime: &str) -> Self {
        if !mime.trim().is_empty() {
            self.mime = mime.to_owned();
        }
        self
    }

    pub fn kind(&self) -> AssetKind {
        classify(&self.name)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for AssetFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}
