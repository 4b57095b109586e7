use crate::domain::{FileHandle, PreviewRef};
use std::collections::BTreeMap;

/// What the host shows for a locally attached file before upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub display_name: String,
    pub mime: String,
    pub size: u64,
}

impl Preview {
    pub fn describe(&self) -> String {
        let kb = self.size.div_ceil(1024);
        format!("{} ({}, {kb} KiB)", self.display_name, self.mime)
    }
}

/// Owner of process-local preview resources.
///
/// Every [`PreviewRef`] handed out stays outstanding until released; the
/// wizard releases a slot's previous preview when it is reassigned and
/// everything on teardown.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next: u64,
    live: BTreeMap<PreviewRef, Preview>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, handle: &FileHandle, display_name: &str) -> PreviewRef {
        self.next += 1;
        let preview = PreviewRef(self.next);
        self.live.insert(
            preview,
            Preview {
                display_name: display_name.to_string(),
                mime: handle.mime.clone(),
                size: handle.size,
            },
        );
        tracing::trace!(preview = preview.0, display_name, "preview acquired");
        preview
    }

    /// Returns whether `preview` was still outstanding.
    pub fn release(&mut self, preview: PreviewRef) -> bool {
        let released = self.live.remove(&preview).is_some();
        if released {
            tracing::trace!(preview = preview.0, "preview released");
        }
        released
    }

    pub fn release_all(&mut self) -> usize {
        let count = self.live.len();
        self.live.clear();
        count
    }

    pub fn get(&self, preview: PreviewRef) -> Option<&Preview> {
        self.live.get(&preview)
    }

    pub fn outstanding(&self) -> usize {
        self.live.len()
    }
}
