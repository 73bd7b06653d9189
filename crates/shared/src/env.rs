use std::env;

use anyhow::{Context, bail};
use url::Url;

const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:3000";

/// Identity provider settings for bearer-token validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthEnv {
  /// Instance and tenant joined, e.g. `https://login.microsoftonline.com/<tenant>`
  pub authority: String,
  /// Expected `aud` claim
  pub audience: String,
}

#[derive(Clone, Debug)]
pub struct AppEnv {
  pub database_url: String,
  pub server_addr: String,
  /// `None` leaves the API open
  pub auth: Option<AuthEnv>,
}

impl AppEnv {
  /// Read configuration from the process environment, loading `.env` first if present.
  pub fn from_env() -> anyhow::Result<Self> {
    dotenvy::dotenv().ok();
    Self::from_lookup(|key| env::var(key).ok())
  }

  pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
    let database_url = with_credentials(
      &database_url,
      get("DATABASE_USER").as_deref(),
      get("DATABASE_PASSWORD").as_deref(),
    )?;

    let server_addr = get("SERVER_ADDR").unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_owned());

    let auth = match (
      get("AUTH_INSTANCE"),
      get("AUTH_TENANT"),
      get("AUTH_AUDIENCE"),
    ) {
      (Some(instance), Some(tenant), Some(audience)) => Some(AuthEnv {
        authority: format!("{instance}{tenant}"),
        audience,
      }),
      (None, None, None) => None,
      _ => bail!("AUTH_INSTANCE, AUTH_TENANT and AUTH_AUDIENCE must be set together"),
    };

    Ok(Self {
      database_url,
      server_addr,
      auth,
    })
  }
}

/// Overlay a username and/or password onto a connection string, keeping
/// secrets out of the URL that lives in config files.
fn with_credentials(
  database_url: &str,
  user: Option<&str>,
  password: Option<&str>,
) -> anyhow::Result<String> {
  if user.is_none() && password.is_none() {
    return Ok(database_url.to_owned());
  }

  let mut url = Url::parse(database_url).context("DATABASE_URL is not a valid url")?;
  if let Some(user) = user
    && url.set_username(user).is_err()
  {
    bail!("DATABASE_URL does not accept a username");
  }
  if let Some(password) = password
    && url.set_password(Some(password)).is_err()
  {
    bail!("DATABASE_URL does not accept a password");
  }

  Ok(url.into())
}
