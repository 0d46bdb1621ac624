//! Server module for building the HTTP server
//!
//! This module provides:
//! - an ordered pattern router dispatching on `METHOD:/path`
//! - the timesheet handlers and their route table
//! - a `ServerBuilder` wiring configuration and collaborators together

pub mod builder;
pub mod handlers;
pub mod router;

pub use builder::ServerBuilder;
pub use handlers::{AppState, build_routes};
pub use router::{Handler, PatternRouter, PatternRouterBuilder, RequestId, RouteParams};
