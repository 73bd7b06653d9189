use std::{
  backtrace::{Backtrace, BacktraceStatus},
  fmt::Display,
};

use axum::{
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};

#[derive(Debug)]
pub struct AppError {
  err: anyhow::Error,
  status_code: StatusCode,
}

impl AppError {
  /// Create with 500 status
  pub fn new<E: Into<anyhow::Error>>(err: E) -> Self {
    Self {
      err: err.into(),
      status_code: StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Create with custom status
  pub fn with_status<E: Into<anyhow::Error>>(status: StatusCode, err: E) -> Self {
    Self {
      err: err.into(),
      status_code: status,
    }
  }

  pub fn bad_request(msg: impl Display) -> Self {
    Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!("{msg}"))
  }

  pub fn not_found(msg: impl Display) -> Self {
    Self::with_status(StatusCode::NOT_FOUND, anyhow::anyhow!("{msg}"))
  }

  pub fn unauthorized(msg: impl Display) -> Self {
    Self::with_status(StatusCode::UNAUTHORIZED, anyhow::anyhow!("{msg}"))
  }

  #[must_use]
  pub const fn status_code(&self) -> StatusCode {
    self.status_code
  }

  /// Get backtrace from anyhow (requires `RUST_BACKTRACE=1` to capture)
  pub fn backtrace(&self) -> &Backtrace {
    self.err.backtrace()
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    if self.status_code.is_server_error() {
      tracing::error!(error = %self.err, "request failed");
    } else {
      tracing::debug!(status = %self.status_code, error = %self.err, "request rejected");
    }

    // Backtraces only make sense for failures on our side
    let body = if cfg!(debug_assertions) && self.status_code.is_server_error() {
      let bt = self.err.backtrace();
      if bt.status() == BacktraceStatus::Captured {
        format!("{}\nBacktrace:\n{}", self.err, bt)
      } else {
        format!(
          "{}\n(hint: set RUST_BACKTRACE=1 to enable backtrace)",
          self.err
        )
      }
    } else {
      self.err.to_string()
    };

    let mut res = (self.status_code, body).into_response();
    if self.status_code == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}

impl Display for AppError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}] {}", self.status_code, self.err)
  }
}

impl<E> From<E> for AppError
where
  E: Into<anyhow::Error>,
{
  fn from(err: E) -> Self {
    Self::new(err)
  }
}
