//! # Blog helpers and defaults
//!
//! Convenience constructors on the generated [`Blog`] message and the default
//! addresses shared by the server and the example client.

use crate::proto::Blog;

/// Address the server listens on when none is configured.
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:50051";

/// Endpoint the example client dials when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:50051";

/// MongoDB connection string used when none is configured.
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";

/// Database holding the blog collection.
pub const DEFAULT_DATABASE: &str = "mydb";

/// Collection holding one document per blog.
pub const DEFAULT_COLLECTION: &str = "blog";

impl Blog {
    /// Builds a blog that has not been persisted yet (empty id).
    pub fn draft(
        author_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            author_id: author_id.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    /// Returns a copy of this blog carrying `id`.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// True once the store has assigned an identifier.
    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    /// Compares author, title and content, ignoring the identifier.
    pub fn same_fields(&self, other: &Blog) -> bool {
        self.author_id == other.author_id
            && self.title == other.title
            && self.content == other.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_has_no_id() {
        let blog = Blog::draft("xans", "My First Blog", "Content of the first blog");
        assert!(!blog.is_persisted());
        assert_eq!(blog.author_id, "xans");
    }

    #[test]
    fn same_fields_ignores_id() {
        let a = Blog::draft("a", "t", "c");
        let b = a.clone().with_id("65f0c0ffee0000000000beef");
        assert!(b.is_persisted());
        assert!(a.same_fields(&b));
        assert!(!a.same_fields(&Blog::draft("a", "t", "other")));
    }
}
