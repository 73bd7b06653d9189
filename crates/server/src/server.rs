use axum::{Router, response::Html, routing::get};
use commandapi_shared::AppError;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
  api,
  utils::{AppState, shutdown_signal},
};

#[axum::debug_handler]
async fn handler() -> Html<&'static str> {
  Html(r#"<h1>Command API</h1><p>See <a href="/openapi/">/openapi/</a>.</p>"#)
}

/// Full application router with state applied.
pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/", get(handler))
    .merge(api::app(&state))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

pub async fn server(state: AppState, addr: &str) -> Result<(), AppError> {
  let auth = state.auth.is_some();
  let app = router(state);

  let listener = TcpListener::bind(addr).await?;

  tracing::info!(auth, "server started at http://{}", listener.local_addr()?);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  Ok(())
}
