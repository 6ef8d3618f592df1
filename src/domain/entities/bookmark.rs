//! Bookmark tree nodes exchanged with the bookmark manager.

use serde::Serialize;

/// A bookmark or folder. Folders have no `url`.
///
/// `children` is only populated by [`crate::domain::repositories::BookmarkManager::get_tree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bookmark {
    pub id: String,
    pub parent_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Bookmark>,
}

impl Bookmark {
    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }
}

/// Input for creating a bookmark or, with `url: None`, a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    pub parent_id: String,
    pub title: String,
    pub url: Option<String>,
}

impl NewBookmark {
    pub fn folder(parent_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            title: title.into(),
            url: None,
        }
    }

    pub fn link(
        parent_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            parent_id: parent_id.into(),
            title: title.into(),
            url: Some(url.into()),
        }
    }
}
