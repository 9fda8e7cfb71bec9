//! Database error types.

use thiserror::Error;

/// Errors from record store operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Connection, query or constraint error reported by the backend.
    #[error("Database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    /// An update targeted a case id that has no row.
    #[error("No maintenance request with case id '{case_id}'")]
    CaseNotFound { case_id: String },
}
