//! MongoDB-backed [`BlogStore`].

use super::{BlogCursor, BlogDocument, BlogStore};
use async_trait::async_trait;
use blog_tonic_core::{Error, Result};
use bson::{doc, oid::ObjectId};
use futures::StreamExt;
use mongodb::{Client, Collection, options::ReturnDocument};

/// Blog store over a single MongoDB collection.
///
/// The collection handle is created once at startup and shared read-only by
/// every request; the driver owns connection pooling.
#[derive(Debug, Clone)]
pub struct MongoBlogStore {
    client: Client,
    collection: Collection<BlogDocument>,
}

impl MongoBlogStore {
    /// Connects to `uri` and verifies the connection with a `ping`.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the URI is invalid or the server does not answer.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self> {
        tracing::info!("Connecting to MongoDB at {uri}");

        let client = Client::with_uri_str(uri)
            .await
            .map_err(store_error("failed to connect to MongoDB"))?;

        client
            .database(database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(store_error("MongoDB ping failed"))?;

        tracing::info!("Connected to MongoDB collection '{database}.{collection}'");

        let collection = client.database(database).collection(collection);
        Ok(Self { client, collection })
    }
}

fn store_error(context: &'static str) -> impl FnOnce(mongodb::error::Error) -> Error {
    move |e| Error::Store {
        context: format!("{context}: {e}"),
    }
}

#[async_trait]
impl BlogStore for MongoBlogStore {
    async fn insert(&self, doc: BlogDocument) -> Result<ObjectId> {
        let res = self
            .collection
            .insert_one(doc)
            .await
            .map_err(store_error("cannot insert blog"))?;

        res.inserted_id
            .as_object_id()
            .ok_or_else(|| Error::UnexpectedKey {
                context: format!("inserted id {} is not an ObjectId", res.inserted_id),
            })
    }

    async fn find(&self, id: ObjectId) -> Result<Option<BlogDocument>> {
        self.collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(store_error("cannot read blog"))
    }

    async fn replace(&self, id: ObjectId, doc: BlogDocument) -> Result<Option<BlogDocument>> {
        let replacement = BlogDocument { id: None, ..doc };
        self.collection
            .find_one_and_replace(doc! { "_id": id }, replacement)
            .return_document(ReturnDocument::After)
            .await
            .map_err(store_error("cannot update blog"))
    }

    async fn delete(&self, id: ObjectId) -> Result<u64> {
        let res = self
            .collection
            .delete_one(doc! { "_id": id })
            .await
            .map_err(store_error("cannot delete blog"))?;
        Ok(res.deleted_count)
    }

    async fn list(&self) -> Result<BlogCursor> {
        let cursor = self
            .collection
            .find(doc! {})
            .await
            .map_err(store_error("cannot list blogs"))?;

        Ok(Box::pin(cursor.map(|item| {
            item.map_err(store_error("error while decoding blog"))
        })))
    }

    async fn close(&self) {
        tracing::info!("Closing the MongoDB connection");
        self.client.clone().shutdown().await;
    }
}
