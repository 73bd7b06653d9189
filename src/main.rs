use std::sync::Arc;

use commandapi_migration::{Migrator, MigratorTrait};
use commandapi_server::{auth::TokenVerifier, server, utils::AppState};
use commandapi_shared::{AppEnv, AppError};
use sea_orm::Database;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{}=debug,commandapi_server=debug,tower_http=info", env!("CARGO_CRATE_NAME")).into()
      }),
    )
    .with(tracing_subscriber::fmt::layer())
    .with(tracing_error::ErrorLayer::default())
    .init();

  let env = AppEnv::from_env()?;

  let db = Database::connect(env.database_url.as_str()).await?;

  // Apply all pending migrations
  // https://www.sea-ql.org/SeaORM/docs/migration/running-migration/#migrating-programmatically
  Migrator::up(&db, None).await?;

  let auth = match &env.auth {
    Some(auth) => {
      let verifier = TokenVerifier::discover(&auth.authority, &auth.audience).await?;
      tracing::info!(
        issuer = verifier.issuer(),
        audience = verifier.audience(),
        "bearer authentication enabled"
      );
      Some(Arc::new(verifier))
    }
    None => {
      tracing::warn!("AUTH_* not set, API is open to unauthenticated requests");
      None
    }
  };

  server(AppState::new(db, auth), &env.server_addr).await
}
