//! Process-local bookmark tree.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::entities::{Bookmark, NewBookmark};
use crate::domain::repositories::{BookmarkError, BookmarkManager};

/// Id of the invisible tree root.
pub const TREE_ROOT_ID: &str = "0";
/// Id of the first top-level folder ("Bookmarks Bar").
pub const BOOKMARKS_BAR_ID: &str = "1";
/// Id of the second top-level folder ("Other Bookmarks").
pub const OTHER_BOOKMARKS_ID: &str = "2";

#[derive(Debug, Clone)]
struct Node {
    parent_id: Option<String>,
    title: String,
    url: Option<String>,
    children: Vec<String>,
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<String, Node>,
    next_id: u64,
}

impl Tree {
    fn to_bookmark(&self, id: &str, node: &Node, deep: bool) -> Bookmark {
        let children = if deep {
            node.children
                .iter()
                .filter_map(|child| {
                    self.nodes
                        .get(child)
                        .map(|n| self.to_bookmark(child, n, true))
                })
                .collect()
        } else {
            Vec::new()
        };

        Bookmark {
            id: id.to_string(),
            parent_id: node.parent_id.clone(),
            title: node.title.clone(),
            url: node.url.clone(),
            children,
        }
    }

    fn find(&self, matches: impl Fn(&Node) -> bool) -> Vec<Bookmark> {
        let mut found: Vec<Bookmark> = self
            .nodes
            .iter()
            .filter(|(id, node)| id.as_str() != TREE_ROOT_ID && matches(node))
            .map(|(id, node)| self.to_bookmark(id, node, false))
            .collect();
        found.sort_by_key(|b| b.id.parse::<u64>().unwrap_or(u64::MAX));
        found
    }
}

/// [`BookmarkManager`] backed by an in-memory tree shaped like a browser's:
/// an untitled root with "Bookmarks Bar" and "Other Bookmarks" beneath it.
///
/// Ids are assigned sequentially as decimal strings.
#[derive(Debug)]
pub struct InMemoryBookmarks {
    tree: Mutex<Tree>,
}

impl InMemoryBookmarks {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            TREE_ROOT_ID.to_string(),
            Node {
                parent_id: None,
                title: String::new(),
                url: None,
                children: vec![BOOKMARKS_BAR_ID.to_string(), OTHER_BOOKMARKS_ID.to_string()],
            },
        );
        let top_level = [
            (BOOKMARKS_BAR_ID, "Bookmarks Bar"),
            (OTHER_BOOKMARKS_ID, "Other Bookmarks"),
        ];
        for (id, title) in top_level {
            nodes.insert(
                id.to_string(),
                Node {
                    parent_id: Some(TREE_ROOT_ID.to_string()),
                    title: title.to_string(),
                    url: None,
                    children: Vec::new(),
                },
            );
        }

        Self {
            tree: Mutex::new(Tree { nodes, next_id: 3 }),
        }
    }

    /// Total number of bookmarks (not folders) in the tree.
    pub fn link_count(&self) -> usize {
        self.lock().nodes.values().filter(|n| n.url.is_some()).count()
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryBookmarks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookmarkManager for InMemoryBookmarks {
    async fn search_by_url(&self, url: &str) -> Result<Vec<Bookmark>, BookmarkError> {
        Ok(self.lock().find(|n| n.url.as_deref() == Some(url)))
    }

    async fn search_by_title(&self, title: &str) -> Result<Vec<Bookmark>, BookmarkError> {
        Ok(self.lock().find(|n| n.title == title))
    }

    async fn get_tree(&self) -> Result<Vec<Bookmark>, BookmarkError> {
        let tree = self.lock();
        let root = tree
            .nodes
            .get(TREE_ROOT_ID)
            .ok_or_else(|| BookmarkError::NotFound(TREE_ROOT_ID.to_string()))?;
        Ok(vec![tree.to_bookmark(TREE_ROOT_ID, root, true)])
    }

    async fn create(&self, new: NewBookmark) -> Result<Bookmark, BookmarkError> {
        let mut tree = self.lock();

        match tree.nodes.get(&new.parent_id) {
            None => return Err(BookmarkError::NotFound(new.parent_id)),
            Some(parent) if parent.url.is_some() => {
                return Err(BookmarkError::Rejected(format!(
                    "parent {} is not a folder",
                    new.parent_id
                )));
            }
            Some(_) => {}
        }

        let id = tree.next_id.to_string();
        tree.next_id += 1;

        let node = Node {
            parent_id: Some(new.parent_id.clone()),
            title: new.title,
            url: new.url,
            children: Vec::new(),
        };
        let bookmark = tree.to_bookmark(&id, &node, false);

        if let Some(parent) = tree.nodes.get_mut(&new.parent_id) {
            parent.children.push(id.clone());
        }
        tree.nodes.insert(id, node);

        Ok(bookmark)
    }

    async fn get_children(&self, folder_id: &str) -> Result<Vec<Bookmark>, BookmarkError> {
        let tree = self.lock();
        let folder = tree
            .nodes
            .get(folder_id)
            .ok_or_else(|| BookmarkError::NotFound(folder_id.to_string()))?;

        Ok(folder
            .children
            .iter()
            .filter_map(|id| tree.nodes.get(id).map(|n| tree.to_bookmark(id, n, false)))
            .collect())
    }
}
