//! In-memory [`BlogStore`].

use super::{BlogCursor, BlogDocument, BlogStore};
use async_trait::async_trait;
use blog_tonic_core::Result;
use bson::oid::ObjectId;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;

/// Blog store kept in process memory.
///
/// Keys are generated with [`ObjectId::new`], so identifiers look exactly like
/// the ones MongoDB hands out. `list` snapshots the map when called.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlogStore {
    blogs: Arc<RwLock<BTreeMap<ObjectId, BlogDocument>>>,
}

impl MemoryBlogStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn count(&self) -> usize {
        self.blogs.read().await.len()
    }
}

#[async_trait]
impl BlogStore for MemoryBlogStore {
    async fn insert(&self, doc: BlogDocument) -> Result<ObjectId> {
        let id = ObjectId::new();
        self.blogs.write().await.insert(
            id,
            BlogDocument {
                id: Some(id),
                ..doc
            },
        );
        Ok(id)
    }

    async fn find(&self, id: ObjectId) -> Result<Option<BlogDocument>> {
        Ok(self.blogs.read().await.get(&id).cloned())
    }

    async fn replace(&self, id: ObjectId, doc: BlogDocument) -> Result<Option<BlogDocument>> {
        let mut blogs = self.blogs.write().await;
        Ok(blogs.get_mut(&id).map(|stored| {
            *stored = BlogDocument {
                id: Some(id),
                ..doc
            };
            stored.clone()
        }))
    }

    async fn delete(&self, id: ObjectId) -> Result<u64> {
        Ok(u64::from(self.blogs.write().await.remove(&id).is_some()))
    }

    async fn list(&self) -> Result<BlogCursor> {
        let snapshot: Vec<_> = self.blogs.read().await.values().cloned().collect();
        Ok(Box::pin(futures::stream::iter(snapshot.into_iter().map(Ok))))
    }

    async fn close(&self) {
        tracing::info!("Discarding {} in-memory blogs", self.count().await);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn doc(author: &str) -> BlogDocument {
        BlogDocument {
            id: None,
            author_id: author.into(),
            content: "content".into(),
            title: "title".into(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_key_and_find_returns_it() {
        let store = MemoryBlogStore::new();
        let id = store.insert(doc("a")).await.unwrap();
        let found = store.find(id).await.unwrap().unwrap();
        assert_eq!(found.id, Some(id));
        assert_eq!(found.author_id, "a");
    }

    #[tokio::test]
    async fn replace_keeps_key_and_ignores_supplied_id() {
        let store = MemoryBlogStore::new();
        let id = store.insert(doc("a")).await.unwrap();
        let other = ObjectId::new();
        let replaced = store
            .replace(
                id,
                BlogDocument {
                    id: Some(other),
                    ..doc("b")
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replaced.id, Some(id));
        assert_eq!(replaced.author_id, "b");
        assert!(store.find(other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_and_delete_missing_key() {
        let store = MemoryBlogStore::new();
        assert!(store.replace(ObjectId::new(), doc("a")).await.unwrap().is_none());
        assert_eq!(store.delete(ObjectId::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_removes_exactly_once() {
        let store = MemoryBlogStore::new();
        let id = store.insert(doc("a")).await.unwrap();
        assert_eq!(store.delete(id).await.unwrap(), 1);
        assert_eq!(store.delete(id).await.unwrap(), 0);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn close_keeps_contents_until_dropped() {
        let store = MemoryBlogStore::new();
        store.insert(doc("a")).await.unwrap();
        store.close().await;
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn list_yields_every_document() {
        let store = MemoryBlogStore::new();
        for author in ["a", "b", "c"] {
            store.insert(doc(author)).await.unwrap();
        }
        let docs: Vec<_> = store.list().await.unwrap().try_collect().await.unwrap();
        assert_eq!(docs.len(), 3);
        assert!(docs.iter().all(|d| d.id.is_some()));
    }
}
