//! HTTP ingest and query surface of the metrix server.
//!
//! [`app::build_http_app`] wires the handlers in [`api`] around a shared
//! [`state::AppState`]; the binary adds configuration, restore-on-start,
//! the snapshot scheduler and graceful shutdown.

pub mod api;
pub mod app;
pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod state;
