//! Upload server.
//!
//! Receives uploads over HTTP, stores each one as a site and serves the
//! stored files back under `/p/<site>/`.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
