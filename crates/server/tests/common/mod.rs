#![allow(dead_code)]

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, Response},
};
use commandapi_core::{Command, NewCommand};
use commandapi_migration::{Migrator, MigratorTrait};
use commandapi_server::{auth::TokenVerifier, router, utils::AppState};
use http_body_util::BodyExt;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::Value;
use tower::ServiceExt;

/// Fresh, migrated in-memory database.
pub async fn memory_db() -> DatabaseConnection {
  // a single connection, since each sqlite memory connection is its own database
  let mut opts = ConnectOptions::new("sqlite::memory:");
  opts.max_connections(1).min_connections(1).sqlx_logging(false);
  let db = Database::connect(opts).await.unwrap();
  Migrator::up(&db, None).await.unwrap();
  db
}

pub fn app(db: &DatabaseConnection, auth: Option<Arc<TokenVerifier>>) -> Router {
  router(AppState::new(db.clone(), auth))
}

pub async fn seed(db: &DatabaseConnection, platform: &str) -> Command {
  Command::create(
    NewCommand {
      how_to: "Do Something".to_owned(),
      platform: platform.to_owned(),
      command_line: "Some CommandLine".to_owned(),
    },
    db,
  )
  .await
  .unwrap()
}

pub async fn send(app: Router, req: Request<Body>) -> Response<Body> {
  app.oneshot(req).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
  Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
  Request::builder()
    .method("DELETE")
    .uri(uri)
    .body(Body::empty())
    .unwrap()
}

pub fn json(method: &str, uri: &str, body: &Value) -> Request<Body> {
  Request::builder()
    .method(method)
    .uri(uri)
    .header("content-type", "application/json")
    .body(Body::from(body.to_string()))
    .unwrap()
}

pub async fn body_json(res: Response<Body>) -> Value {
  let bytes = res.into_body().collect().await.unwrap().to_bytes();
  serde_json::from_slice(&bytes).unwrap()
}
