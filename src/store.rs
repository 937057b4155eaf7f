//! The file store: an append-only map of immutable artifacts.
//!
//! Every transform invocation mints fresh ids for what it produces, so two
//! independent node executions can never write the same key. The store is
//! backed by a [`DashMap`]: inserts are atomic per key and readers never
//! block writers on unrelated shards.
//!
//! Artifacts hold their bytes in an `Arc<[u8]>`; handing a file to a worker
//! or to several consumers clones a pointer, not the document.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Identifier of a stored artifact, `"<prefix>-<uuid>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    /// Mint a new, globally unique id.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Semantic content class of an artifact, used for port compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    Pdf,
    Image,
    Text,
    Other,
}

impl FileClass {
    /// Sniff the class from magic bytes, falling back to the file name.
    pub fn detect(name: &str, data: &[u8]) -> Self {
        if data.starts_with(b"%PDF") {
            return FileClass::Pdf;
        }
        if data.starts_with(b"\x89PNG\r\n\x1a\n") || data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return FileClass::Image;
        }
        match extension(name).as_deref() {
            Some("pdf") => FileClass::Pdf,
            Some("png" | "jpg" | "jpeg") => FileClass::Image,
            Some("txt") => FileClass::Text,
            _ => FileClass::Other,
        }
    }
}

/// Raster formats the engine can embed into PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpg,
}

impl ImageFormat {
    /// Determine the format from magic bytes, then from the file name.
    pub fn detect(name: &str, data: &[u8]) -> Option<Self> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(ImageFormat::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpg);
        }
        match extension(name).as_deref() {
            Some("png") => Some(ImageFormat::Png),
            Some("jpg" | "jpeg") => Some(ImageFormat::Jpg),
            _ => None,
        }
    }
}

/// Lower-cased extension of a file name, if any.
pub fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// File name without its extension: `"report.final.pdf"` → `"report.final"`.
pub fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    }
}

/// MIME type inferred from the file-name extension.
pub fn mime_for(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// An immutable named byte buffer.
#[derive(Clone)]
pub struct FileArtifact {
    pub id: FileId,
    pub name: String,
    pub data: Arc<[u8]>,
    /// Id of a PNG artifact showing this file, when one was produced.
    pub preview: Option<FileId>,
}

impl FileArtifact {
    pub fn new(id: FileId, name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id,
            name: name.into(),
            data: data.into(),
            preview: None,
        }
    }

    pub fn class(&self) -> FileClass {
        FileClass::detect(&self.name, &self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for FileArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileArtifact")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .field("preview", &self.preview)
            .finish()
    }
}

/// Shared, concurrently writable artifact store. Cloning shares the map.
#[derive(Clone, Default)]
pub struct FileStore {
    files: Arc<DashMap<FileId, FileArtifact>>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store user-supplied bytes under a fresh id.
    pub fn add(&self, name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> FileId {
        let id = FileId::generate("file");
        self.insert(FileArtifact::new(id.clone(), name, data));
        id
    }

    /// Insert an artifact. Stored artifacts are immutable: if the id is
    /// already present the store keeps the existing one and returns `false`.
    pub fn insert(&self, file: FileArtifact) -> bool {
        match self.files.entry(file.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!("Store ← {} '{}' ({} bytes)", file.id, file.name, file.data.len());
                slot.insert(file);
                true
            }
        }
    }

    pub fn get(&self, id: &FileId) -> Option<FileArtifact> {
        self.files.get(id).map(|f| f.value().clone())
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.files.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Drop every artifact not in `referenced` (and not a preview of one).
    ///
    /// Returns how many artifacts were removed.
    pub fn retain_referenced(&self, referenced: &HashSet<FileId>) -> usize {
        let mut keep: HashSet<FileId> = referenced.clone();
        for id in referenced {
            if let Some(preview) = self.files.get(id).and_then(|f| f.preview.clone()) {
                keep.insert(preview);
            }
        }
        let before = self.files.len();
        self.files.retain(|id, _| keep.contains(id));
        before - self.files.len()
    }
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore").field("files", &self.files.len()).finish()
    }
}
