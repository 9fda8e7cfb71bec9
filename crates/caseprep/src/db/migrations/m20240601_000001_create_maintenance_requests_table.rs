//! Creates the maintenance requests table.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MaintenanceRequests::Table)
                    .if_not_exists()
                    .col(string_len(MaintenanceRequests::CustomerId, 50))
                    .col(string_len(MaintenanceRequests::CaseId, 50).primary_key())
                    .col(text(MaintenanceRequests::Description))
                    .col(string_len(MaintenanceRequests::ImageUrl, 2083))
                    .col(boolean(MaintenanceRequests::MouldDetected).default(false))
                    .col(string_len(MaintenanceRequests::FileName, 2083))
                    .col(timestamp_with_time_zone(MaintenanceRequests::DateOpened))
                    .col(string_len(MaintenanceRequests::JobAssigned, 3))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(MaintenanceRequests::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum MaintenanceRequests {
    #[sea_orm(iden = "MaintenanceRequests")]
    Table,
    #[sea_orm(iden = "CustomerID")]
    CustomerId,
    #[sea_orm(iden = "CaseID")]
    CaseId,
    #[sea_orm(iden = "Description")]
    Description,
    #[sea_orm(iden = "ImageURL")]
    ImageUrl,
    #[sea_orm(iden = "MouldDetected")]
    MouldDetected,
    #[sea_orm(iden = "FileName")]
    FileName,
    #[sea_orm(iden = "DateOpened")]
    DateOpened,
    #[sea_orm(iden = "JobAssigned")]
    JobAssigned,
}
