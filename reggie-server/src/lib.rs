//! # Reggie Registry Server
//!
//! The HTTP layer over [`reggie_store`]: Reggie's own upload/download API plus
//! the slice of the npm registry protocol that `npm install` and
//! `npm publish` need.
//!
//! ## Key Modules
//!
//! - [`api`]: package API (`/package`, `/versions`, `/index`, `/info`)
//! - [`npm`]: npm protocol documents and handlers
//! - [`server`]: router assembly and startup
//! - [`config`]: server configuration
//! - [`upstream`]: fallback to the public npm registry
//! - [`error`]: error responses

pub mod api;
pub mod config;
pub mod error;
pub mod npm;
pub mod server;
pub mod state;
pub mod upstream;

pub use config::ServerConfig;
pub use error::{ApiError, ApiErrorResponse, ApiResult, ErrorCode};
pub use server::{build_router, run_server};
pub use state::AppState;
pub use upstream::{UpstreamClient, UpstreamConfig};
