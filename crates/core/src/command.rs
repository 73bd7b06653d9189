use commandapi_entities::command;
use commandapi_shared::AppError;
use sea_orm::{
  ActiveModelTrait, ActiveValue::NotSet, DatabaseConnection, EntityTrait, IntoActiveModel,
  PaginatorTrait, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A remembered command line: what it does, where it runs, and how to type it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Command {
  pub id: i32,
  /// What the command achieves, e.g. "Run all unit tests"
  pub how_to: String,
  /// Tool or environment the command belongs to, e.g. "cargo"
  pub platform: String,
  /// The command line itself, e.g. "cargo test --workspace"
  pub command_line: String,
}

/// Payload for creating a [`Command`]; the id is assigned by the database.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewCommand {
  pub how_to: String,
  pub platform: String,
  pub command_line: String,
}

fn require_fields(fields: [(&str, &str); 3]) -> Result<(), AppError> {
  let missing = fields
    .iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| *name)
    .collect::<Vec<_>>();

  if missing.is_empty() {
    Ok(())
  } else {
    Err(AppError::bad_request(format!(
      "required fields are empty: {}",
      missing.join(", ")
    )))
  }
}

impl NewCommand {
  pub fn validate(&self) -> Result<(), AppError> {
    require_fields([
      ("howTo", &self.how_to),
      ("platform", &self.platform),
      ("commandLine", &self.command_line),
    ])
  }
}

impl Command {
  pub fn from_model(model: command::Model) -> Self {
    Self {
      id: model.id,
      how_to: model.how_to,
      platform: model.platform,
      command_line: model.command_line,
    }
  }

  pub fn validate(&self) -> Result<(), AppError> {
    require_fields([
      ("howTo", &self.how_to),
      ("platform", &self.platform),
      ("commandLine", &self.command_line),
    ])
  }

  pub async fn list(db: &DatabaseConnection) -> Result<Vec<Self>, AppError> {
    let models = command::Entity::find()
      .order_by_asc(command::Column::Id)
      .all(db)
      .await?;

    Ok(models.into_iter().map(Self::from_model).collect())
  }

  pub async fn find(id: i32, db: &DatabaseConnection) -> Result<Option<Self>, AppError> {
    let model = command::Entity::find_by_id(id).one(db).await?;
    Ok(model.map(Self::from_model))
  }

  pub async fn count(db: &DatabaseConnection) -> Result<u64, AppError> {
    Ok(command::Entity::find().count(db).await?)
  }

  pub async fn create(new: NewCommand, db: &DatabaseConnection) -> Result<Self, AppError> {
    let model = command::ActiveModel {
      id: NotSet,
      how_to: Set(new.how_to),
      platform: Set(new.platform),
      command_line: Set(new.command_line),
    }
    .insert(db)
    .await?;

    tracing::debug!(id = model.id, "command created");
    Ok(Self::from_model(model))
  }

  /// Overwrite the stored row with `self`. Returns `None` if no row has `self.id`.
  pub async fn update(&self, db: &DatabaseConnection) -> Result<Option<Self>, AppError> {
    let Some(model) = command::Entity::find_by_id(self.id).one(db).await? else {
      return Ok(None);
    };

    let mut active = model.into_active_model();
    active.how_to = Set(self.how_to.clone());
    active.platform = Set(self.platform.clone());
    active.command_line = Set(self.command_line.clone());
    let model = active.update(db).await?;

    tracing::debug!(id = model.id, "command updated");
    Ok(Some(Self::from_model(model)))
  }

  /// Remove a row, returning what was stored.
  pub async fn delete(id: i32, db: &DatabaseConnection) -> Result<Option<Self>, AppError> {
    let Some(model) = command::Entity::find_by_id(id).one(db).await? else {
      return Ok(None);
    };

    let res = command::Entity::delete_by_id(id).exec(db).await?;
    if res.rows_affected == 0 {
      // lost a race with another delete
      return Ok(None);
    }

    tracing::debug!(id, "command deleted");
    Ok(Some(Self::from_model(model)))
  }
}
