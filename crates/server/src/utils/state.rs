use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::TokenVerifier;

#[derive(Clone)]
pub struct AppState {
  pub db: DatabaseConnection,
  /// Present when bearer tokens are required on the API
  pub auth: Option<Arc<TokenVerifier>>,
}

impl AppState {
  #[must_use]
  pub const fn new(db: DatabaseConnection, auth: Option<Arc<TokenVerifier>>) -> Self {
    Self { db, auth }
  }
}
