use axum::{Json, Router, middleware, routing::get};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{auth::require_bearer, utils::AppState};

mod commands;

#[derive(OpenApi)]
#[openapi(
  info(
    title = "Command API",
    version = "0.0.1",
    description = "Store and look up command lines by what they do and where they run"
  ),
  paths(
    commands::list_commands,
    commands::get_command,
    commands::create_command,
    commands::update_command,
    commands::delete_command,
  ),
  components(schemas(commandapi_core::Command, commandapi_core::NewCommand))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
  Json(ApiDoc::openapi())
}

pub fn app(state: &AppState) -> Router<AppState> {
  let commands = Router::new()
    .route(
      "/api/commands",
      get(commands::list_commands).post(commands::create_command),
    )
    .route(
      "/api/commands/{id}",
      get(commands::get_command)
        .put(commands::update_command)
        .delete(commands::delete_command),
    )
    .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

  Router::new()
    .merge(commands)
    .route("/openapi.json", get(openapi_json))
    .merge(Scalar::with_url("/openapi/", ApiDoc::openapi()))
}
