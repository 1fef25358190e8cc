//! Error type shared by the record, record set and broker layers.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(Error, Debug)]
pub enum BrokerError {
    /// A record or record set was declared with no fields.
    #[error("schema must name at least one field")]
    EmptySchema,

    /// A value tuple does not line up with the schema.
    #[error("expected {expected} values, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    /// The same field name appears twice in one schema.
    #[error("duplicate field: {0}")]
    DuplicateField(String),

    /// Rows of two different schemas would end up in one set.
    #[error("record set schema ({current}) conflicts with ({incoming})")]
    SchemaConflict { current: String, incoming: String },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("record has no values")]
    Unset,

    #[error("row index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("table not found: {0}")]
    UnknownTable(String),

    /// Update/delete without any predicate.
    #[error("refusing to {0} without conditions")]
    UnboundedWrite(&'static str),

    #[error("bad condition: {0}")]
    BadCondition(String),

    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("failed to open database {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

impl BrokerError {
    /// Stable code reported to IPC clients.
    pub fn code(&self) -> &'static str {
        match self {
            BrokerError::EmptySchema
            | BrokerError::SchemaMismatch { .. }
            | BrokerError::SchemaConflict { .. }
            | BrokerError::DuplicateField(_) => "schema_mismatch",
            BrokerError::UnknownField(_) => "unknown_field",
            BrokerError::Unset => "record_unset",
            BrokerError::IndexOutOfRange { .. } | BrokerError::UnknownTable(_) => "not_found",
            BrokerError::UnboundedWrite(_)
            | BrokerError::BadCondition(_)
            | BrokerError::UnsupportedValue(_) => "bad_params",
            BrokerError::Open { .. } => "db_open_failed",
            BrokerError::Sql(e) => match e.sqlite_error_code() {
                Some(ErrorCode::ConstraintViolation) => "db_constraint",
                _ => "db_query_failed",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_group_by_kind() {
        assert_eq!(
            BrokerError::SchemaMismatch {
                expected: 2,
                actual: 3
            }
            .code(),
            "schema_mismatch"
        );
        assert_eq!(
            BrokerError::IndexOutOfRange { index: 4, count: 1 }.code(),
            "not_found"
        );
        assert_eq!(BrokerError::UnboundedWrite("delete").code(), "bad_params");
        assert_eq!(
            BrokerError::DuplicateField("first".into()).code(),
            "schema_mismatch"
        );
    }

    #[test]
    fn constraint_failures_are_reported_as_such() {
        let conn = rusqlite::Connection::open_in_memory().expect("open");
        conn.execute("CREATE TABLE t(id INTEGER PRIMARY KEY)", [])
            .expect("create");
        conn.execute("INSERT INTO t(id) VALUES(1)", []).expect("insert");
        let e = conn
            .execute("INSERT INTO t(id) VALUES(1)", [])
            .expect_err("duplicate key");
        assert_eq!(BrokerError::from(e).code(), "db_constraint");
    }
}
