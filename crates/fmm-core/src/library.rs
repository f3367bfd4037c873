// crates/fmm-core/src/library.rs
//
// Persistent registry of imported media and overlay templates. Neither is
// on the playback critical path — this is a CRUD store with stable ids,
// serialized alongside (not inside) the project file.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration_ms: i64,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: Uuid,
    pub path: String,
    pub kind: MediaKind,
    pub thumbnail_path: Option<String>,
    pub metadata: Option<MediaMetadata>,
    pub favorite: bool,
}

impl MediaItem {
    pub fn new(path: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            kind,
            thumbnail_path: None,
            metadata: None,
            favorite: false,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MediaLibrary {
    pub items: Vec<MediaItem>,
}

impl MediaLibrary {
    pub fn add(&mut self, item: MediaItem) -> Uuid {
        let id = item.id;
        self.items.push(item);
        id
    }

    pub fn remove(&mut self, id: Uuid) -> Result<MediaItem, ModelError> {
        let pos = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| ModelError::OutOfRange(format!("no media item with id {id}")))?;
        Ok(self.items.remove(pos))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn list(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn mark_favorite(&mut self, id: Uuid, favorite: bool) -> Result<(), ModelError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| ModelError::OutOfRange(format!("no media item with id {id}")))?;
        item.favorite = favorite;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateCategory {
    Intro,
    Outro,
    LowerThird,
    Callout,
    Custom,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayTemplate {
    pub id: Uuid,
    pub name: String,
    pub category: TemplateCategory,
    pub default_x_percent: f32,
    pub default_y_percent: f32,
    pub default_scale_percent: f32,
}

impl OverlayTemplate {
    pub fn new(name: impl Into<String>, category: TemplateCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category,
            default_x_percent: 0.0,
            default_y_percent: 0.0,
            default_scale_percent: 100.0,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TemplateStore {
    pub templates: Vec<OverlayTemplate>,
}

impl TemplateStore {
    pub fn add(&mut self, template: OverlayTemplate) -> Uuid {
        let id = template.id;
        self.templates.push(template);
        id
    }

    pub fn remove(&mut self, id: Uuid) -> Result<OverlayTemplate, ModelError> {
        let pos = self
            .templates
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ModelError::OutOfRange(format!("no template with id {id}")))?;
        Ok(self.templates.remove(pos))
    }

    pub fn list(&self) -> &[OverlayTemplate] {
        &self.templates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_list_remove_roundtrip() {
        let mut lib = MediaLibrary::default();
        let id = lib.add(MediaItem::new("/videos/a.mp4", MediaKind::Video));
        assert_eq!(lib.list().len(), 1);
        lib.mark_favorite(id, true).unwrap();
        assert!(lib.list()[0].favorite);
        lib.remove(id).unwrap();
        assert!(lib.list().is_empty());
    }

    #[test]
    fn remove_unknown_id_errors() {
        let mut lib = MediaLibrary::default();
        assert!(lib.remove(Uuid::new_v4()).is_err());
    }

    #[test]
    fn clear_empties_library() {
        let mut lib = MediaLibrary::default();
        lib.add(MediaItem::new("/a.mp4", MediaKind::Video));
        lib.add(MediaItem::new("/b.png", MediaKind::Image));
        lib.clear();
        assert!(lib.list().is_empty());
    }

    #[test]
    fn template_store_crud() {
        let mut store = TemplateStore::default();
        let id = store.add(OverlayTemplate::new("Lower Third A", TemplateCategory::LowerThird));
        assert_eq!(store.list().len(), 1);
        store.remove(id).unwrap();
        assert!(store.list().is_empty());
    }
}
