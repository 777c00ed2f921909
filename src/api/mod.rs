//! Macrodrive HTTP surface.
//!
//! One upload endpoint plus a health probe. Run with `macrodrive serve`.

pub mod handlers;
pub mod server;

pub use server::{router, run_server, ServerConfig};
