//! gRPC service implementation and stream lifecycle.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`BlogHandler`).
//! - [`tracker`] - In-flight stream accounting for graceful shutdown.

pub mod handler;
pub mod tracker;
