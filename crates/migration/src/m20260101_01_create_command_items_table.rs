use sea_orm_migration::{
  prelude::*,
  schema::{pk_auto, text},
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(CommandItems::Table)
          .if_not_exists()
          .col(pk_auto(CommandItems::Id))
          .col(text(CommandItems::HowTo))
          .col(text(CommandItems::Platform))
          .col(text(CommandItems::CommandLine))
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(CommandItems::Table).to_owned())
      .await
  }
}

#[derive(Iden)]
pub enum CommandItems {
  Table,
  Id,
  // what the command does, e.g. "Run a migration"
  HowTo,
  // where it runs, e.g. "dotnet", "cargo", "bash"
  Platform,
  CommandLine,
}
