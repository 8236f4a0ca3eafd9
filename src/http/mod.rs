//! HTTP layer.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (resolve caller address, device label)
//!     → auth.rs (extract credential from headers)
//!     → handlers.rs (invoke the admission gate)
//!     → status-code mapping back to the caller
//! ```

pub mod auth;
pub mod client_ip;
pub mod handlers;
pub mod server;

pub use server::{build_router, AppState, HttpServer};
