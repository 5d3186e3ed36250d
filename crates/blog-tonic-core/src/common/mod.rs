//! Shared contract between the blog server and its clients.
//!
//! - [`proto`] - Generated protobuf messages and tonic service bindings.
//! - [`error`] - The service-wide [`Error`] and its mapping to gRPC status
//!   codes.
//! - [`types`] - Helpers on the generated [`proto::Blog`] and default
//!   endpoints.

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from `proto/blog.proto`.
///
/// ## Service
///
/// - `CreateBlog`, `ReadBlog`, `UpdateBlog`, `DeleteBlog` - unary CRUD calls.
/// - `ListBlog` - server-streaming call emitting one [`ListBlogResponse`] per
///   stored blog.
///
/// Blog identifiers travel as 24-character hexadecimal strings.
///
/// [`ListBlogResponse`]: crate::proto::ListBlogResponse
pub mod proto {
    tonic::include_proto!("blog");

    /// Encoded file descriptor set for gRPC server reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("blog_descriptor");
}
