use std::collections::BTreeMap;
use std::fmt;

use tracing::trace;

use crate::state::FileHandle;

const PREVIEW_SCHEME: &str = "blob:report-form";

/// Object-URL style handle pointing at a picked file's preview.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a live preview handle resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEntry {
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: usize,
}

/// Issues preview handles and keeps them index-aligned with each image
/// field's file sequence. Handles are revoked when their file is removed
/// or the store is reset.
#[derive(Debug, Default)]
pub struct PreviewStore {
    next_id: u64,
    by_field: BTreeMap<String, Vec<PreviewHandle>>,
    live: BTreeMap<PreviewHandle, PreviewEntry>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a preview for `file` at the end of the field's sequence.
    pub fn issue(&mut self, field_id: &str, file: &FileHandle) -> PreviewHandle {
        self.next_id += 1;
        let handle = PreviewHandle(format!("{}/{}", PREVIEW_SCHEME, self.next_id));
        self.live.insert(
            handle.clone(),
            PreviewEntry {
                file_name: file.name.clone(),
                content_type: file.content_type.clone(),
                size: file.len(),
            },
        );
        self.by_field
            .entry(field_id.to_string())
            .or_default()
            .push(handle.clone());
        handle
    }

    /// Removes and revokes the preview at `index`.
    pub fn remove(&mut self, field_id: &str, index: usize) -> Option<PreviewHandle> {
        let handles = self.by_field.get_mut(field_id)?;
        if index >= handles.len() {
            return None;
        }
        let handle = handles.remove(index);
        self.revoke(&handle);
        Some(handle)
    }

    /// Revokes every preview of a field and issues fresh ones for `files`.
    pub fn replace_field(&mut self, field_id: &str, files: &[FileHandle]) -> Vec<PreviewHandle> {
        self.revoke_field(field_id);
        files.iter().map(|file| self.issue(field_id, file)).collect()
    }

    pub fn revoke_field(&mut self, field_id: &str) {
        if let Some(handles) = self.by_field.remove(field_id) {
            for handle in &handles {
                self.revoke(handle);
            }
        }
    }

    pub fn revoke_all(&mut self) {
        let fields = self.by_field.keys().cloned().collect::<Vec<_>>();
        for field in fields {
            self.revoke_field(&field);
        }
    }

    pub fn previews(&self, field_id: &str) -> &[PreviewHandle] {
        self.by_field
            .get(field_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn resolve(&self, handle: &PreviewHandle) -> Option<&PreviewEntry> {
        self.live.get(handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    fn revoke(&mut self, handle: &PreviewHandle) {
        if self.live.remove(handle).is_some() {
            trace!(preview = %handle, "revoked preview");
        }
    }
}

impl Drop for PreviewStore {
    fn drop(&mut self) {
        self.revoke_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> FileHandle {
        FileHandle::new(name, vec![0; 4])
    }

    #[test]
    fn remove_keeps_remaining_previews_aligned() {
        let mut store = PreviewStore::new();
        let first = store.issue("photos", &file("a.png"));
        let second = store.issue("photos", &file("b.png"));
        let third = store.issue("photos", &file("c.png"));

        assert_eq!(store.remove("photos", 1), Some(second.clone()));
        assert_eq!(store.previews("photos"), &[first.clone(), third.clone()]);
        assert!(store.resolve(&second).is_none());
        assert_eq!(
            store.resolve(&third).map(|entry| entry.file_name.as_str()),
            Some("c.png")
        );
    }

    #[test]
    fn revoke_all_releases_every_handle() {
        let mut store = PreviewStore::new();
        store.issue("photos", &file("a.png"));
        store.issue("evidence", &file("b.png"));
        assert_eq!(store.live_count(), 2);
        store.revoke_all();
        assert_eq!(store.live_count(), 0);
        assert!(store.previews("photos").is_empty());
    }

    #[test]
    fn handles_are_never_reused() {
        let mut store = PreviewStore::new();
        let first = store.issue("photos", &file("a.png"));
        store.remove("photos", 0);
        let second = store.issue("photos", &file("a.png"));
        assert_ne!(first, second);
    }
}
