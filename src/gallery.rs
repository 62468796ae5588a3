//! Gallery entries, viewer props, and the locale-prefixed routes between them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Prev,
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerImage {
    pub id: String,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_thumb_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub is_live_photo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_photo_video_path: Option<String>,
}

impl ViewerImage {
    #[cfg(test)]
    pub fn new(id: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file_path: file_path.into(),
            medium_path: None,
            small_thumb_path: None,
            title: None,
            is_live_photo: false,
            live_photo_video_path: None,
        }
    }

    #[cfg(test)]
    pub fn with_medium(mut self, medium: impl Into<String>) -> Self {
        self.medium_path = Some(medium.into());
        self
    }

    /// The path a quick preview should use: the medium proxy when one exists.
    pub fn preview_path(&self) -> &str {
        self.medium_path.as_deref().unwrap_or(&self.file_path)
    }

    pub fn alt_text(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub id: String,
    pub file_path: String,
    pub small_thumb_path: Option<String>,
    pub medium_path: Option<String>,
}

impl Thumbnail {
    pub fn strip_path(&self) -> &str {
        self.small_thumb_path
            .as_deref()
            .or(self.medium_path.as_deref())
            .unwrap_or(&self.file_path)
    }
}

impl From<&ViewerImage> for Thumbnail {
    fn from(img: &ViewerImage) -> Self {
        Self {
            id: img.id.clone(),
            file_path: img.file_path.clone(),
            small_thumb_path: img.small_thumb_path.clone(),
            medium_path: img.medium_path.clone(),
        }
    }
}

/// Everything the viewer is handed for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerProps {
    pub image: ViewerImage,
    pub prev_id: Option<String>,
    pub next_id: Option<String>,
    pub prev_path: Option<String>,
    pub next_path: Option<String>,
    pub locale: String,
    pub thumbnails: Option<Vec<Thumbnail>>,
    pub current_id: Option<String>,
}

/// One neighbour resolved for navigation: its id and the full-resolution path to preload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub id: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbors {
    pub prev: Option<Neighbor>,
    pub next: Option<Neighbor>,
}

impl Neighbors {
    pub fn get(&self, direction: Direction) -> Option<&Neighbor> {
        match direction {
            Direction::Prev => self.prev.as_ref(),
            Direction::Next => self.next.as_ref(),
        }
    }
}

impl ViewerProps {
    /// Canonical prev/next. A thumbnail strip that contains the current image
    /// wins over the raw neighbour ids so arrows follow the visible order.
    pub fn resolve_neighbors(&self) -> Neighbors {
        let current = self.current_id.as_deref().unwrap_or(&self.image.id);
        if let Some(thumbs) = &self.thumbnails {
            if let Some(pos) = thumbs.iter().position(|t| t.id == current) {
                let to_neighbor = |t: &Thumbnail| Neighbor {
                    id: t.id.clone(),
                    path: Some(t.file_path.clone()),
                };
                return Neighbors {
                    prev: pos.checked_sub(1).and_then(|i| thumbs.get(i)).map(to_neighbor),
                    next: thumbs.get(pos + 1).map(to_neighbor),
                };
            }
        }
        Neighbors {
            prev: self.prev_id.clone().map(|id| Neighbor { id, path: self.prev_path.clone() }),
            next: self.next_id.clone().map(|id| Neighbor { id, path: self.next_path.clone() }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Gallery {
    images: Vec<ViewerImage>,
}

impl Gallery {
    pub fn new(images: Vec<ViewerImage>) -> Self {
        Self { images }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[ViewerImage] {
        &self.images
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.images.iter().position(|img| img.id == id)
    }

    pub fn props_for(&self, id: &str, locale: &str, with_thumbnails: bool) -> Option<ViewerProps> {
        let idx = self.position(id)?;
        let prev = idx.checked_sub(1).and_then(|i| self.images.get(i));
        let next = self.images.get(idx + 1);
        Some(ViewerProps {
            image: self.images[idx].clone(),
            prev_id: prev.map(|p| p.id.clone()),
            next_id: next.map(|n| n.id.clone()),
            prev_path: prev.map(|p| p.file_path.clone()),
            next_path: next.map(|n| n.file_path.clone()),
            locale: locale.to_string(),
            thumbnails: with_thumbnails.then(|| self.images.iter().map(Thumbnail::from).collect()),
            current_id: Some(id.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn gallery_path(locale: &str) -> String {
    format!("/{}/gallery", locale)
}

pub fn image_path(locale: &str, id: &str) -> String {
    format!("/{}/gallery/{}", locale, id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Index { locale: String },
    Image { locale: String, id: String },
}

impl Route {
    pub fn parse(path: &str) -> Option<Route> {
        let mut parts = path.trim_matches('/').split('/');
        let locale = parts.next().filter(|s| !s.is_empty())?.to_string();
        if parts.next()? != "gallery" {
            return None;
        }
        match (parts.next(), parts.next()) {
            (None, _) => Some(Route::Index { locale }),
            (Some(id), None) if !id.is_empty() => Some(Route::Image { locale, id: id.to_string() }),
            _ => None,
        }
    }
}

pub trait Router {
    fn push(&mut self, path: String);
}

/// Router that holds the latest push until the app drains it after the event.
#[derive(Debug, Default)]
pub struct History {
    pending: Option<String>,
}

impl History {
    pub fn take_pending(&mut self) -> Option<String> {
        self.pending.take()
    }
}

impl Router for History {
    fn push(&mut self, path: String) {
        log::debug!("[route] push {}", path);
        self.pending = Some(path);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn gallery() -> Gallery {
        Gallery::new(vec![
            ViewerImage::new("a", "/img/a.jpg").with_medium("/img/a.med.webp"),
            ViewerImage::new("b", "/img/b.jpg"),
            ViewerImage::new("c", "/img/c.jpg"),
        ])
    }

    #[test]
    fn routes_round_trip() {
        assert_eq!(Route::parse(&gallery_path("en")), Some(Route::Index { locale: "en".into() }));
        assert_eq!(
            Route::parse(&image_path("zh", "b")),
            Some(Route::Image { locale: "zh".into(), id: "b".into() })
        );
        assert_eq!(Route::parse("/en/blog/x"), None);
        assert_eq!(Route::parse("/en/gallery/a/b"), None);
        assert_eq!(Route::parse(""), None);
    }

    #[test]
    fn props_carry_neighbours_and_full_paths() {
        let p = gallery().props_for("b", "en", false).unwrap();
        assert_eq!(p.prev_id.as_deref(), Some("a"));
        assert_eq!(p.prev_path.as_deref(), Some("/img/a.jpg"));
        assert_eq!(p.next_id.as_deref(), Some("c"));
        assert!(p.thumbnails.is_none());
        assert!(gallery().props_for("zz", "en", false).is_none());
    }

    #[test]
    fn thumbnail_order_overrides_raw_neighbours() {
        let mut p = gallery().props_for("b", "en", false).unwrap();
        p.thumbnails = Some(vec![
            Thumbnail::from(&ViewerImage::new("c", "/img/c.jpg")),
            Thumbnail::from(&ViewerImage::new("b", "/img/b.jpg")),
        ]);
        let n = p.resolve_neighbors();
        assert_eq!(n.prev.as_ref().map(|n| n.id.as_str()), Some("c"));
        assert!(n.next.is_none());
    }

    #[test]
    fn raw_neighbours_used_when_current_not_in_strip() {
        let mut p = gallery().props_for("b", "en", false).unwrap();
        p.thumbnails = Some(vec![Thumbnail::from(&ViewerImage::new("x", "/img/x.jpg"))]);
        let n = p.resolve_neighbors();
        assert_eq!(n.get(Direction::Prev).map(|n| n.id.as_str()), Some("a"));
        assert_eq!(n.get(Direction::Next).map(|n| n.id.as_str()), Some("c"));
    }

    #[test]
    fn history_keeps_latest_pending() {
        let mut h = History::default();
        h.push("/en/gallery/a".into());
        h.push("/en/gallery/b".into());
        assert_eq!(h.take_pending().as_deref(), Some("/en/gallery/b"));
        assert_eq!(h.take_pending(), None);
    }
}
