//! Generic table access over one SQLite connection.
//!
//! A [`Table`] is the result of binding a table name: it carries the column
//! list discovered at bind time and is passed explicitly to every data
//! operation. Values are always bound as parameters; identifiers are checked
//! against the discovered columns and quoted.

use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Statement};

use crate::condition::{self, quote_ident, Condition, Select};
use crate::error::{BrokerError, Result};
use crate::record::Record;
use crate::record_set::RecordSet;

/// A bound table: its name and columns in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.columns
    }
}

/// Output of [`DataBroker::commit`].
#[derive(Debug, Clone, Default)]
pub struct CommitResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Rows changed by a writing statement; 0 for read-only statements.
    pub affected: usize,
}

impl CommitResult {
    pub fn into_record_set(self) -> Result<RecordSet> {
        let mut rs = RecordSet::new(self.columns)?;
        rs.copy_db(self.rows)?;
        Ok(rs)
    }
}

#[derive(Debug)]
pub struct DataBroker {
    conn: Connection,
    path: Option<PathBuf>,
}

impl DataBroker {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| BrokerError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.to_string_lossy(), "database opened");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens `path` and binds `table` in one step.
    pub fn connect(path: impl AsRef<Path>, table: &str) -> Result<(Self, Table)> {
        let broker = Self::open(path)?;
        let table = broker.bind(table)?;
        Ok((broker, table))
    }

    pub fn from_connection(conn: Connection) -> Self {
        let path = conn
            .path()
            .map(PathBuf::from)
            .filter(|p| !p.as_os_str().is_empty());
        Self { conn, path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| BrokerError::Sql(e))
    }

    /// Checks that `name` is a table or view and captures its columns.
    pub fn bind(&self, name: &str) -> Result<Table> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                [name],
                |r| r.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(BrokerError::UnknownTable(name.to_string()));
        }

        let stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} LIMIT 1", quote_ident(name)))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        tracing::debug!(table = %name, columns = ?columns, "table bound");
        Ok(Table {
            name: name.to_string(),
            columns,
        })
    }

    /// Runs one statement with bound parameters, fetching any rows it yields.
    pub fn commit(&self, sql: &str, params: &[Value]) -> Result<CommitResult> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let before = self.total_changes()?;
        let rows = if columns.is_empty() {
            stmt.execute(params_from_iter(params.iter()))?;
            Vec::new()
        } else {
            fetch_rows(&mut stmt, params)?
        };
        // `changes()` keeps the count of the last DML statement across DDL,
        // so measure this statement on its own.
        let affected = usize::try_from(self.total_changes()? - before).unwrap_or(0);
        Ok(CommitResult {
            columns,
            rows,
            affected,
        })
    }

    fn total_changes(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT total_changes()", [], |r| r.get(0))?)
    }

    /// Runs `f` inside a transaction; any error rolls everything back.
    ///
    /// Called while a transaction is already open, `f` runs in a savepoint
    /// of it instead, so only its own work is undone on error.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return self.in_savepoint(f);
        }
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    fn in_savepoint<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("SAVEPOINT broker_nested")?;
        match f(self) {
            Ok(out) => {
                self.conn.execute_batch("RELEASE broker_nested")?;
                Ok(out)
            }
            Err(e) => {
                if let Err(undo) = self
                    .conn
                    .execute_batch("ROLLBACK TO broker_nested; RELEASE broker_nested")
                {
                    tracing::warn!(error = %undo, "savepoint rollback failed");
                }
                Err(e)
            }
        }
    }

    pub fn get_data(
        &self,
        table: &Table,
        fields: &[&str],
        conditions: &[Condition],
    ) -> Result<RecordSet> {
        self.select(
            table,
            &Select {
                fields: fields.iter().map(|f| f.to_string()).collect(),
                conditions: conditions.to_vec(),
                ..Select::default()
            },
        )
    }

    pub fn select(&self, table: &Table, query: &Select) -> Result<RecordSet> {
        let fields: Vec<&str> = if query.fields.is_empty() {
            table.columns.iter().map(String::as_str).collect()
        } else {
            query
                .fields
                .iter()
                .map(|f| condition::check_field(&table.columns, f))
                .collect::<Result<_>>()?
        };
        let mut rs = RecordSet::new(fields.iter().copied())?;
        let cols = fields
            .iter()
            .map(|f| quote_ident(f))
            .collect::<Vec<_>>()
            .join(", ");
        let (where_sql, params) = condition::where_clause(&table.columns, &query.conditions, 1)?;
        let order_sql = condition::order_clause(&table.columns, &query.order_by)?;
        let limit_sql = query
            .limit
            .map(|n| format!(" LIMIT {n}"))
            .unwrap_or_default();
        let sql = format!(
            "SELECT {} FROM {}{}{}{}",
            cols,
            quote_ident(&table.name),
            where_sql,
            order_sql,
            limit_sql
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = fetch_rows(&mut stmt, &params)?;
        tracing::debug!(table = %table.name, rows = rows.len(), "select");
        rs.copy_db(rows)?;
        Ok(rs)
    }

    /// Inserts one record and returns the new rowid.
    pub fn set_data(&self, table: &Table, record: &Record) -> Result<i64> {
        let sql = insert_sql(table, record.fields())?;
        let values = record.values().ok_or(BrokerError::Unset)?;
        self.conn.execute(&sql, params_from_iter(values.iter()))?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(table = %table.name, rowid = id, "insert");
        Ok(id)
    }

    /// Inserts every row of `records` in one transaction.
    pub fn set_many(&self, table: &Table, records: &RecordSet) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let sql = insert_sql(table, records.fields())?;
        self.in_transaction(|b| {
            let mut stmt = b.conn.prepare(&sql)?;
            for rec in records.iter() {
                let values = rec.values().ok_or(BrokerError::Unset)?;
                stmt.execute(params_from_iter(values.iter()))?;
            }
            Ok(records.count())
        })
    }

    /// Sets the fields present in `changes` on every row matching `conditions`.
    pub fn update_data(
        &self,
        table: &Table,
        changes: &Record,
        conditions: &[Condition],
    ) -> Result<usize> {
        if conditions.is_empty() {
            return Err(BrokerError::UnboundedWrite("update"));
        }
        let values = changes.values().ok_or(BrokerError::Unset)?;
        let sets = changes
            .fields()
            .iter()
            .enumerate()
            .map(|(i, f)| {
                condition::check_field(&table.columns, f)
                    .map(|f| format!("{} = ?{}", quote_ident(f), i + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        let (where_sql, where_params) =
            condition::where_clause(&table.columns, conditions, values.len() + 1)?;
        let sql = format!(
            "UPDATE {} SET {}{}",
            quote_ident(&table.name),
            sets.join(", "),
            where_sql
        );
        let params = values.iter().chain(where_params.iter());
        let n = self.conn.execute(&sql, params_from_iter(params))?;
        tracing::debug!(table = %table.name, rows = n, "update");
        Ok(n)
    }

    /// Deletes rows where every `field = value` pair matches.
    pub fn del_data<I, K>(&self, table: &Table, specs: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let conditions: Vec<Condition> = specs
            .into_iter()
            .map(|(k, v)| Condition::eq(k, v))
            .collect();
        self.delete_where(table, &conditions)
    }

    pub fn delete_where(&self, table: &Table, conditions: &[Condition]) -> Result<usize> {
        if conditions.is_empty() {
            return Err(BrokerError::UnboundedWrite("delete"));
        }
        let (where_sql, params) = condition::where_clause(&table.columns, conditions, 1)?;
        let sql = format!("DELETE FROM {}{}", quote_ident(&table.name), where_sql);
        let n = self.conn.execute(&sql, params_from_iter(params.iter()))?;
        tracing::debug!(table = %table.name, rows = n, "delete");
        Ok(n)
    }

    pub fn count(&self, table: &Table, conditions: &[Condition]) -> Result<i64> {
        let (where_sql, params) = condition::where_clause(&table.columns, conditions, 1)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", quote_ident(&table.name), where_sql);
        let n = self
            .conn
            .query_row(&sql, params_from_iter(params.iter()), |r| r.get(0))?;
        Ok(n)
    }
}

fn insert_sql(table: &Table, fields: &[String]) -> Result<String> {
    let cols = fields
        .iter()
        .map(|f| condition::check_field(&table.columns, f).map(quote_ident))
        .collect::<Result<Vec<_>>>()?;
    let placeholders = (1..=cols.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "INSERT INTO {}({}) VALUES({})",
        quote_ident(&table.name),
        cols.join(", "),
        placeholders
    ))
}

fn fetch_rows(stmt: &mut Statement<'_>, params: &[Value]) -> Result<Vec<Vec<Value>>> {
    let n = stmt.column_count();
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            (0..n)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
