//! Scoped preview resources.
//!
//! A [`PreviewHandle`] lets a front end show the selected image without a
//! network round trip. Handles are not `Clone`: releasing one consumes it, so a
//! handle can never be released twice.

use crate::file::SelectedFile;
use std::{
    collections::HashMap,
    io::Cursor,
    sync::{Arc, Mutex},
};

/// A live, locally resolvable reference to a selected file's bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    id: u64,
    url: String,
}

impl PreviewHandle {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            url: format!("preview://{id}"),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Locator the front end hands to its image view.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Acquire/release contract for preview resources.
///
/// Front ends with their own resource model (texture caches, object URLs)
/// implement this trait; [`InMemoryPreviewStore`] is the default.
pub trait PreviewStore {
    /// Creates a new preview for `file`.
    fn acquire(&mut self, file: &SelectedFile) -> PreviewHandle;

    /// Releases a preview created by [`PreviewStore::acquire`].
    fn release(&mut self, handle: PreviewHandle);
}

#[derive(Default)]
struct PreviewTable {
    next_id: u64,
    live: HashMap<u64, Arc<[u8]>>,
    acquired: usize,
    released: usize,
}

/// Preview store keeping the bytes of live previews in memory.
///
/// Clones share the same table, so a front end can keep a clone to resolve
/// handles while the widget owns another.
#[derive(Clone, Default)]
pub struct InMemoryPreviewStore {
    table: Arc<Mutex<PreviewTable>>,
}

impl InMemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bytes behind a live handle.
    pub fn resolve(&self, handle: &PreviewHandle) -> Option<Arc<[u8]>> {
        self.table.lock().unwrap().live.get(&handle.id).cloned()
    }

    /// Reads the pixel dimensions of a live preview from its header.
    pub fn dimensions(&self, handle: &PreviewHandle) -> Option<(u32, u32)> {
        let bytes = self.resolve(handle)?;
        image::ImageReader::new(Cursor::new(&bytes[..]))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }

    /// Number of previews currently alive.
    pub fn live_count(&self) -> usize {
        self.table.lock().unwrap().live.len()
    }

    /// Total number of previews ever acquired.
    pub fn acquired_count(&self) -> usize {
        self.table.lock().unwrap().acquired
    }

    /// Total number of previews released.
    pub fn released_count(&self) -> usize {
        self.table.lock().unwrap().released
    }
}

impl PreviewStore for InMemoryPreviewStore {
    fn acquire(&mut self, file: &SelectedFile) -> PreviewHandle {
        let mut table = self.table.lock().unwrap();
        table.next_id += 1;
        let id = table.next_id;
        table.live.insert(id, file.bytes().clone());
        table.acquired += 1;
        log::debug!("Acquired preview {id} for {}", file.name());
        PreviewHandle::new(id)
    }

    fn release(&mut self, handle: PreviewHandle) {
        let mut table = self.table.lock().unwrap();
        if table.live.remove(&handle.id).is_some() {
            table.released += 1;
            log::debug!("Released preview {}", handle.id);
        } else {
            log::warn!("Preview {} was not live", handle.id);
        }
    }
}
