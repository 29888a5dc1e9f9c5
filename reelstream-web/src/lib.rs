//! Reelstream Web - JSON API server

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Exposes session creation, file streaming, settings, proxy checks,
//! `.torrent` conversion and indexer search over HTTP.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, build_router, run_server};
