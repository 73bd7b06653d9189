pub mod api;
pub mod auth;
pub mod utils;

mod server;
pub use server::{router, server};

// Re-export for OpenAPI documentation
pub use api::ApiDoc;
