mod error;
pub use error::AppError;

mod env;
pub use env::{AppEnv, AuthEnv};
