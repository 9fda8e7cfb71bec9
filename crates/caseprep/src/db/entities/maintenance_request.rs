//! Maintenance request entity.

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;

use crate::case::{JobAssigned, MaintenanceCase};

/// One row of the `MaintenanceRequests` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "MaintenanceRequests")]
pub struct Model {
    #[sea_orm(column_name = "CustomerID")]
    pub customer_id: String,
    #[sea_orm(primary_key, auto_increment = false, column_name = "CaseID")]
    pub case_id: String,
    /// Empty string until enrichment has run.
    #[sea_orm(column_name = "Description", column_type = "Text")]
    pub description: String,
    #[sea_orm(column_name = "ImageURL")]
    pub image_url: String,
    #[sea_orm(column_name = "MouldDetected", default_value = false)]
    pub mould_detected: bool,
    #[sea_orm(column_name = "FileName")]
    pub file_name: String,
    #[sea_orm(column_name = "DateOpened")]
    pub date_opened: DateTimeUtc,
    #[sea_orm(column_name = "JobAssigned")]
    pub job_assigned: JobAssigned,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for MaintenanceCase {
    fn from(row: Model) -> Self {
        Self {
            customer_id: row.customer_id,
            case_id: row.case_id,
            description: row.description,
            image_url: row.image_url,
            mould_detected: row.mould_detected,
            file_name: row.file_name,
            date_opened: row.date_opened,
            job_assigned: row.job_assigned,
        }
    }
}

impl From<&MaintenanceCase> for ActiveModel {
    fn from(case: &MaintenanceCase) -> Self {
        Self {
            customer_id: Set(case.customer_id.clone()),
            case_id: Set(case.case_id.clone()),
            description: Set(case.description.clone()),
            image_url: Set(case.image_url.clone()),
            mould_detected: Set(case.mould_detected),
            file_name: Set(case.file_name.clone()),
            date_opened: Set(case.date_opened),
            job_assigned: Set(case.job_assigned),
        }
    }
}
