//! Document store adapter.
//!
//! The handler talks to storage only through [`BlogStore`], which is injected
//! as a [`BlogStoreArc`]. Documents are [`BlogDocument`]s keyed by BSON
//! [`ObjectId`]s; [`key`] converts those keys to and from the hexadecimal
//! strings used on the wire.
//!
//! - [`mongo`] - MongoDB-backed store used in production.
//! - [`memory`] - In-process store for tests and local runs.

pub mod key;
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use blog_tonic_core::{Result, proto::Blog};
use bson::oid::ObjectId;
use core::{fmt::Debug, pin::Pin};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A blog as persisted in the `blog` collection.
///
/// `id` is omitted on insert so the store generates the primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub author_id: String,
    pub content: String,
    pub title: String,
}

impl BlogDocument {
    /// Builds an unkeyed document from the mutable fields of `blog`.
    ///
    /// The blog's own `id` is deliberately not carried over.
    pub fn from_blog(blog: &Blog) -> Self {
        Self {
            id: None,
            author_id: blog.author_id.clone(),
            content: blog.content.clone(),
            title: blog.title.clone(),
        }
    }

    /// Converts the document into its wire form.
    ///
    /// Documents read back from a store always carry an `id`; an unkeyed
    /// document renders with an empty id.
    pub fn into_blog(self) -> Blog {
        Blog {
            id: self.id.as_ref().map(key::render_key).unwrap_or_default(),
            author_id: self.author_id,
            title: self.title,
            content: self.content,
        }
    }
}

/// Lazily decoded documents from a list query.
///
/// Dropping the stream releases the underlying cursor.
pub type BlogCursor = Pin<Box<dyn Stream<Item = Result<BlogDocument>> + Send>>;

/// Storage operations backing the blog service.
///
/// Every method other than [`BlogStore::list`] performs a single round trip.
#[async_trait]
pub trait BlogStore: Debug + Send + Sync {
    /// Inserts `doc` and returns the key the store generated for it.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the write fails and `UnexpectedKey` if the generated
    /// key is not an [`ObjectId`].
    async fn insert(&self, doc: BlogDocument) -> Result<ObjectId>;

    /// Looks up the document keyed by `id`.
    ///
    /// # Errors
    ///
    /// Returns `Store` on connectivity or decode failure.
    async fn find(&self, id: ObjectId) -> Result<Option<BlogDocument>>;

    /// Overwrites author, title and content of the document keyed by `id`.
    ///
    /// Returns the document as stored after the replacement, or `None` if no
    /// document has that key.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the write fails.
    async fn replace(&self, id: ObjectId, doc: BlogDocument) -> Result<Option<BlogDocument>>;

    /// Removes the document keyed by `id` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the delete fails.
    async fn delete(&self, id: ObjectId) -> Result<u64>;

    /// Opens a cursor over every stored document.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the query cannot be started. Failures while
    /// iterating surface as `Err` items on the cursor.
    async fn list(&self) -> Result<BlogCursor>;

    /// Releases driver resources. Called once during shutdown.
    async fn close(&self) {}
}

/// Shared handle to a blog store.
pub type BlogStoreArc = Arc<dyn BlogStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_blog_drops_the_wire_id() {
        let blog = Blog::draft("xans", "title", "body").with_id("65f0c0ffee0000000000beef");
        let doc = BlogDocument::from_blog(&blog);
        assert_eq!(doc.id, None);
        assert_eq!(doc.author_id, "xans");
    }

    #[test]
    fn into_blog_renders_hex_id() {
        let key = ObjectId::new();
        let blog = BlogDocument {
            id: Some(key),
            author_id: "a".into(),
            content: "c".into(),
            title: "t".into(),
        }
        .into_blog();
        assert_eq!(blog.id, key.to_hex());
        assert_eq!(blog.title, "t");
    }

    #[test]
    fn unkeyed_document_omits_id_field() {
        let doc = BlogDocument::from_blog(&Blog::draft("a", "t", "c"));
        let bson = bson::to_document(&doc).unwrap();
        assert!(!bson.contains_key("_id"));
        assert_eq!(bson.get_str("author_id").unwrap(), "a");
        assert_eq!(bson.get_str("content").unwrap(), "c");
        assert_eq!(bson.get_str("title").unwrap(), "t");
    }
}
