//! Case repository: reads and updates for the `MaintenanceRequests` table.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use super::entities::maintenance_request::{self, Column};
use super::entities::MaintenanceRequest;
use super::{DatabaseError, Migrator};
use crate::case::MaintenanceCase;

/// Handle to the maintenance request table. Clones share one pool.
#[derive(Clone)]
pub struct CaseRepository {
    db: DatabaseConnection,
}

impl CaseRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Returns every case whose description is still empty, ordered by case id.
    ///
    /// A single statement, so the result is one consistent snapshot.
    pub async fn list_pending(&self) -> Result<Vec<MaintenanceCase>, DatabaseError> {
        let rows = MaintenanceRequest::find()
            .filter(Column::Description.eq(""))
            .order_by_asc(Column::CaseId)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(MaintenanceCase::from).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<MaintenanceCase>, DatabaseError> {
        let rows = MaintenanceRequest::find()
            .order_by_asc(Column::CaseId)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(MaintenanceCase::from).collect())
    }

    pub async fn find(&self, case_id: &str) -> Result<Option<MaintenanceCase>, DatabaseError> {
        let row = MaintenanceRequest::find_by_id(case_id.to_owned())
            .one(&self.db)
            .await?;
        Ok(row.map(MaintenanceCase::from))
    }

    /// Writes the description and mould flag for one case.
    ///
    /// Only those two columns change. Re-applying the same values is a no-op
    /// in effect. An unknown `case_id` rolls back and yields
    /// [`DatabaseError::CaseNotFound`].
    pub async fn apply_enrichment(
        &self,
        case_id: &str,
        description: &str,
        mould_detected: bool,
    ) -> Result<(), DatabaseError> {
        let txn = self.db.begin().await?;

        let result = MaintenanceRequest::update_many()
            .col_expr(Column::Description, Expr::value(description))
            .col_expr(Column::MouldDetected, Expr::value(mould_detected))
            .filter(Column::CaseId.eq(case_id))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(DatabaseError::CaseNotFound {
                case_id: case_id.to_owned(),
            });
        }

        txn.commit().await?;
        Ok(())
    }

    pub async fn insert(&self, case: &MaintenanceCase) -> Result<(), DatabaseError> {
        MaintenanceRequest::insert(maintenance_request::ActiveModel::from(case))
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    /// Drops and recreates the table, discarding every row.
    pub async fn reset_table(&self) -> Result<(), DatabaseError> {
        Migrator::refresh(&self.db).await?;
        log::info!("MaintenanceRequests table recreated");
        Ok(())
    }

    /// Closes the shared pool. Every clone of this repository stops working.
    pub async fn close(self) -> Result<(), DatabaseError> {
        self.db.close().await?;
        Ok(())
    }
}
