//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, limits)
//!     → gateway_handler (buffer body, spawn engine task)
//!     → gateway engine
//!     → GatewayResponse into axum Response
//!     → Send to client
//! ```

pub mod server;

pub use server::{AppState, HttpServer, X_REQUEST_ID};
