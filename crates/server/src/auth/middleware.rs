use axum::{
  extract::{Request, State},
  http::header::AUTHORIZATION,
  middleware::Next,
  response::Response,
};
use commandapi_shared::AppError;

use crate::utils::AppState;

fn bearer_token(req: &Request) -> Option<&str> {
  let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
  let (scheme, token) = value.split_once(' ')?;
  let token = token.trim();
  (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Rejects requests without a valid bearer token when auth is configured.
/// Validated [`Claims`](super::Claims) are stored in the request extensions.
pub async fn require_bearer(
  State(state): State<AppState>,
  mut req: Request,
  next: Next,
) -> Result<Response, AppError> {
  let Some(verifier) = &state.auth else {
    return Ok(next.run(req).await);
  };

  let token = bearer_token(&req)
    .map(str::to_owned)
    .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;
  let claims = verifier.verify(&token).await?;
  tracing::debug!(sub = ?claims.sub, "authenticated request");

  req.extensions_mut().insert(claims);
  Ok(next.run(req).await)
}
