//! Server-streaming plumbing for `ListBlog`.
//!
//! - [`feeder`] - Drains a store cursor into the response channel.

pub mod feeder;
