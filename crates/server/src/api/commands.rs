use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::{StatusCode, header},
  response::IntoResponse,
};
use commandapi_core::{Command, NewCommand};
use commandapi_shared::AppError;

use crate::utils::AppState;

/// Unwrap a JSON body, turning every rejection except a wrong content type into a 400.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
  match payload {
    Ok(Json(value)) => Ok(value),
    Err(JsonRejection::MissingJsonContentType(rejection)) => Err(AppError::with_status(
      rejection.status(),
      anyhow::anyhow!(rejection.body_text()),
    )),
    Err(rejection) => Err(AppError::bad_request(rejection.body_text())),
  }
}

fn not_found(id: i32) -> AppError {
  AppError::not_found(format!("command {id} not found"))
}

/// List every stored command
#[utoipa::path(
  get,
  path = "/api/commands",
  responses(
    (status = 200, description = "All commands, possibly empty", body = Vec<Command>),
    (status = 401, description = "Missing or invalid bearer token"),
  )
)]
#[axum::debug_handler]
pub async fn list_commands(State(state): State<AppState>) -> Result<Json<Vec<Command>>, AppError> {
  Ok(Json(Command::list(&state.db).await?))
}

/// Fetch a single command by id
#[utoipa::path(
  get,
  path = "/api/commands/{id}",
  params(("id" = i32, Path, description = "Command id")),
  responses(
    (status = 200, description = "The command", body = Command),
    (status = 404, description = "No command with this id"),
  )
)]
#[axum::debug_handler]
pub async fn get_command(
  State(state): State<AppState>,
  Path(id): Path<i32>,
) -> Result<Json<Command>, AppError> {
  Command::find(id, &state.db)
    .await?
    .map(Json)
    .ok_or_else(|| not_found(id))
}

/// Store a new command
#[utoipa::path(
  post,
  path = "/api/commands",
  request_body = NewCommand,
  responses(
    (status = 201, description = "Created; `Location` points at the new command", body = Command),
    (status = 400, description = "Malformed body or a required field is empty"),
  )
)]
#[axum::debug_handler]
pub async fn create_command(
  State(state): State<AppState>,
  payload: Result<Json<NewCommand>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
  let new = json_body(payload)?;
  new.validate()?;

  let command = Command::create(new, &state.db).await?;
  let location = format!("/api/commands/{}", command.id);

  Ok((
    StatusCode::CREATED,
    [(header::LOCATION, location)],
    Json(command),
  ))
}

/// Replace a command
#[utoipa::path(
  put,
  path = "/api/commands/{id}",
  params(("id" = i32, Path, description = "Command id")),
  request_body = Command,
  responses(
    (status = 204, description = "Updated"),
    (status = 400, description = "Body id differs from path id, or the body is invalid"),
    (status = 404, description = "No command with this id"),
  )
)]
#[axum::debug_handler]
pub async fn update_command(
  State(state): State<AppState>,
  Path(id): Path<i32>,
  payload: Result<Json<Command>, JsonRejection>,
) -> Result<StatusCode, AppError> {
  let command = json_body(payload)?;
  if command.id != id {
    return Err(AppError::bad_request(format!(
      "body id {} does not match path id {id}",
      command.id
    )));
  }
  command.validate()?;

  match command.update(&state.db).await? {
    Some(_) => Ok(StatusCode::NO_CONTENT),
    None => Err(not_found(id)),
  }
}

/// Delete a command, returning what was removed
#[utoipa::path(
  delete,
  path = "/api/commands/{id}",
  params(("id" = i32, Path, description = "Command id")),
  responses(
    (status = 200, description = "The deleted command", body = Command),
    (status = 404, description = "No command with this id"),
  )
)]
#[axum::debug_handler]
pub async fn delete_command(
  State(state): State<AppState>,
  Path(id): Path<i32>,
) -> Result<Json<Command>, AppError> {
  Command::delete(id, &state.db)
    .await?
    .map(Json)
    .ok_or_else(|| not_found(id))
}
