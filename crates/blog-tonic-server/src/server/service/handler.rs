//! gRPC service implementation for blog CRUD.
//!
//! This module defines [`BlogHandler`], the concrete implementation of the
//! [`BlogService`] gRPC service defined in `blog.proto`. Each
//! unary RPC maps to exactly one [`BlogStore`] call; `ListBlog` opens a cursor
//! and streams documents back as they are decoded.
//!
//! ## Responsibilities
//!
//! - Translate wire identifiers to store keys through [`parse_key`] and
//!   [`render_key`] only.
//! - Map store outcomes to status codes: malformed ids are `INVALID_ARGUMENT`,
//!   missing documents are `NOT_FOUND`, store failures are `INTERNAL`.
//! - Dispatch `ListBlog` cursors to [`feed_blogs`] and track the resulting
//!   streams for graceful shutdown.
//!
//! [`BlogStore`]: crate::server::store::BlogStore

use crate::server::{
    config::ServerConfig,
    service::tracker::StreamTracker,
    store::{
        BlogDocument, BlogStoreArc,
        key::{parse_key, render_key},
    },
    streaming::feeder::feed_blogs,
    telemetry::{increment_request_errors, increment_requests, record_stream_duration},
};
use blog_tonic_core::{
    Error, Result,
    proto::{
        Blog, CreateBlogRequest, CreateBlogResponse, DeleteBlogRequest, DeleteBlogResponse,
        ListBlogRequest, ListBlogResponse, ReadBlogRequest, ReadBlogResponse, UpdateBlogRequest,
        UpdateBlogResponse, blog_service_server::BlogService,
    },
};
use core::{pin::Pin, time::Duration};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status};
use tracing::Instrument;

const CREATE: &str = "CreateBlog";
const READ: &str = "ReadBlog";
const UPDATE: &str = "UpdateBlog";
const DELETE: &str = "DeleteBlog";
const LIST: &str = "ListBlog";

/// gRPC service for blog CRUD over a [`BlogStoreArc`].
///
/// The handler holds no mutable state of its own; the store handle and the
/// stream tracker are shared, so cloning is cheap and every clone serves the
/// same data.
#[derive(Clone)]
pub struct BlogHandler {
    config: ServerConfig,
    store: BlogStoreArc,
    tracker: Arc<StreamTracker>,
}

impl BlogHandler {
    pub fn new(config: ServerConfig, store: BlogStoreArc) -> Self {
        Self {
            config,
            store,
            tracker: Arc::new(StreamTracker::new()),
        }
    }

    /// Refuses new requests and drains in-flight `ListBlog` streams.
    ///
    /// Streams still running after `shutdown_timeout` seconds are cancelled.
    pub async fn shutdown(&self) {
        self.tracker
            .shutdown(Duration::from_secs(self.config.shutdown_timeout))
            .await;
    }

    /// A missing payload is stored as a blog with empty fields.
    async fn create(&self, blog: Option<Blog>) -> Result<Blog> {
        let blog = blog.unwrap_or_default();
        let key = self.store.insert(BlogDocument::from_blog(&blog)).await?;
        Ok(blog.with_id(render_key(&key)))
    }

    async fn read(&self, blog_id: &str) -> Result<Blog> {
        let key = parse_key(blog_id)?;
        self.store
            .find(key)
            .await?
            .map(BlogDocument::into_blog)
            .ok_or_else(|| not_found(blog_id))
    }

    async fn update(&self, blog: Option<Blog>) -> Result<Blog> {
        let blog = required_blog(blog)?;
        let key = parse_key(&blog.id)?;
        self.store
            .replace(key, BlogDocument::from_blog(&blog))
            .await?
            .map(BlogDocument::into_blog)
            .ok_or_else(|| not_found(&blog.id))
    }

    async fn delete(&self, blog_id: String) -> Result<String> {
        let key = parse_key(&blog_id)?;
        match self.store.delete(key).await? {
            0 => Err(not_found(&blog_id)),
            _ => Ok(blog_id),
        }
    }
}

fn required_blog(blog: Option<Blog>) -> Result<Blog> {
    blog.ok_or_else(|| Error::InvalidRequest {
        reason: "request is missing a blog".to_string(),
    })
}

fn not_found(blog_id: &str) -> Error {
    Error::NotFound {
        id: blog_id.to_string(),
    }
}

/// Records a failed `rpc` and converts the error into its gRPC status.
fn failed(rpc: &'static str, e: Error) -> Status {
    increment_request_errors(rpc);
    tracing::warn!(rpc, "Request failed: {e}");
    e.into()
}

fn respond<T>(rpc: &'static str, result: Result<T>) -> core::result::Result<Response<T>, Status> {
    result.map(Response::new).map_err(|e| failed(rpc, e))
}

#[tonic::async_trait]
impl BlogService for BlogHandler {
    type ListBlogStream =
        Pin<Box<dyn Stream<Item = core::result::Result<ListBlogResponse, Status>> + Send>>;

    #[tracing::instrument(skip_all)]
    async fn create_blog(
        &self,
        req: Request<CreateBlogRequest>,
    ) -> core::result::Result<Response<CreateBlogResponse>, Status> {
        increment_requests(CREATE);
        let result = match self.tracker.ensure_open() {
            Ok(()) => self.create(req.into_inner().blog).await,
            Err(e) => Err(e),
        };
        if let Ok(blog) = &result {
            tracing::info!(blog_id = %blog.id, "Blog created");
        }
        respond(CREATE, result.map(|blog| CreateBlogResponse { blog: Some(blog) }))
    }

    #[tracing::instrument(skip_all, fields(blog_id = %req.get_ref().blog_id))]
    async fn read_blog(
        &self,
        req: Request<ReadBlogRequest>,
    ) -> core::result::Result<Response<ReadBlogResponse>, Status> {
        increment_requests(READ);
        let result = match self.tracker.ensure_open() {
            Ok(()) => self.read(&req.get_ref().blog_id).await,
            Err(e) => Err(e),
        };
        respond(READ, result.map(|blog| ReadBlogResponse { blog: Some(blog) }))
    }

    #[tracing::instrument(
        skip_all,
        fields(blog_id = %req.get_ref().blog.as_ref().map(|b| b.id.as_str()).unwrap_or_default())
    )]
    async fn update_blog(
        &self,
        req: Request<UpdateBlogRequest>,
    ) -> core::result::Result<Response<UpdateBlogResponse>, Status> {
        increment_requests(UPDATE);
        let result = match self.tracker.ensure_open() {
            Ok(()) => self.update(req.into_inner().blog).await,
            Err(e) => Err(e),
        };
        respond(UPDATE, result.map(|blog| UpdateBlogResponse { blog: Some(blog) }))
    }

    #[tracing::instrument(skip_all, fields(blog_id = %req.get_ref().blog_id))]
    async fn delete_blog(
        &self,
        req: Request<DeleteBlogRequest>,
    ) -> core::result::Result<Response<DeleteBlogResponse>, Status> {
        increment_requests(DELETE);
        let result = match self.tracker.ensure_open() {
            Ok(()) => self.delete(req.into_inner().blog_id).await,
            Err(e) => Err(e),
        };
        respond(DELETE, result.map(|blog_id| DeleteBlogResponse { blog_id }))
    }

    /// Streams every stored blog.
    ///
    /// The cursor is opened before the response is returned, so a failing
    /// query surfaces as the call's status. After that, documents are pushed
    /// through a channel of `stream_buffer_size` by a spawned feeder task that
    /// owns the cursor; a slow client applies backpressure to the cursor.
    #[tracing::instrument(skip_all)]
    async fn list_blog(
        &self,
        _req: Request<ListBlogRequest>,
    ) -> core::result::Result<Response<Self::ListBlogStream>, Status> {
        let start = std::time::Instant::now();
        increment_requests(LIST);

        let opened = match self.tracker.enter() {
            Ok(guard) => self.store.list().await.map(|cursor| (guard, cursor)),
            Err(e) => Err(e),
        };
        let (guard, cursor) = opened.map_err(|e| failed(LIST, e))?;

        let (resp_tx, resp_rx) =
            mpsc::channel::<core::result::Result<ListBlogResponse, Status>>(
                self.config.stream_buffer_size,
            );
        let shutdown = self.tracker.token().clone();

        let fut = async move {
            // Held until the feeder exits so shutdown can wait on it.
            let _guard = guard;
            match feed_blogs(cursor, resp_tx, shutdown).await {
                Ok(sent) => {
                    record_stream_duration(start.elapsed().as_millis() as f64);
                    tracing::debug!(sent, "ListBlog stream complete");
                }
                Err(e) => {
                    increment_request_errors(LIST);
                    tracing::warn!("ListBlog stream ended early: {e}");
                }
            }
        };
        tokio::spawn(fut.instrument(tracing::info_span!("streaming")));

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}
