//! Structured filter predicates.
//!
//! Field names are never spliced into SQL as given: they are checked against
//! the bound table's columns and quoted. Values always travel as bound
//! parameters.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::Value;

use crate::error::{BrokerError, Result};
use crate::value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    IsNull,
    IsNotNull,
}

impl Op {
    fn sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Like => "LIKE",
            Op::IsNull => "IS NULL",
            Op::IsNotNull => "IS NOT NULL",
        }
    }

    fn takes_value(self) -> bool {
        !matches!(self, Op::IsNull | Op::IsNotNull)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

impl FromStr for Op {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        let norm = s.split_whitespace().collect::<Vec<_>>().join(" ");
        let op = match norm.to_ascii_lowercase().as_str() {
            "=" | "==" => Op::Eq,
            "!=" | "<>" => Op::Ne,
            "<" => Op::Lt,
            "<=" => Op::Le,
            ">" => Op::Gt,
            ">=" => Op::Ge,
            "like" => Op::Like,
            "is null" => Op::IsNull,
            "is not null" => Op::IsNotNull,
            _ => return Err(BrokerError::BadCondition(format!("unknown operator: {s}"))),
        };
        Ok(op)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Op::Eq, value)
    }

    /// `{"field": "sid", "op": "=", "value": 1}`; `op` defaults to `=`.
    pub fn from_json(v: &serde_json::Value) -> Result<Self> {
        let field = v
            .get("field")
            .and_then(|f| f.as_str())
            .ok_or_else(|| BrokerError::BadCondition("missing field".into()))?;
        let op = match v.get("op") {
            None => Op::Eq,
            Some(o) => o
                .as_str()
                .ok_or_else(|| BrokerError::BadCondition("op must be a string".into()))?
                .parse()?,
        };
        let value = match v.get("value") {
            Some(raw) => value::from_json(raw)?,
            None if !op.takes_value() => Value::Null,
            None => {
                return Err(BrokerError::BadCondition(format!(
                    "missing value for {field}"
                )))
            }
        };
        Ok(Self::new(field, op, value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// `"last"` or `{"field": "last", "desc": true}`.
    pub fn from_json(v: &serde_json::Value) -> Result<Self> {
        if let Some(s) = v.as_str() {
            return Ok(Self::asc(s));
        }
        let field = v
            .get("field")
            .and_then(|f| f.as_str())
            .ok_or_else(|| BrokerError::BadCondition("orderBy entry needs a field".into()))?;
        let descending = v.get("desc").and_then(|d| d.as_bool()).unwrap_or(false);
        Ok(Self {
            field: field.to_string(),
            descending,
        })
    }
}

/// A select against one bound table. Empty `fields` means every column.
#[derive(Debug, Clone, Default)]
pub struct Select {
    pub fields: Vec<String>,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u32>,
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn check_field<'a>(known: &[String], field: &'a str) -> Result<&'a str> {
    if known.iter().any(|k| k == field) {
        Ok(field)
    } else {
        Err(BrokerError::UnknownField(field.to_string()))
    }
}

/// Builds ` WHERE a = ?1 AND ...` (or an empty string) with parameters
/// numbered from `first_param`.
pub(crate) fn where_clause(
    known: &[String],
    conditions: &[Condition],
    first_param: usize,
) -> Result<(String, Vec<Value>)> {
    let mut parts = Vec::with_capacity(conditions.len());
    let mut params = Vec::new();
    for c in conditions {
        let col = quote_ident(check_field(known, &c.field)?);
        // `= NULL` never matches in SQL; compare NULL by identity instead.
        let op = match (c.op, &c.value) {
            (Op::Eq, Value::Null) => Op::IsNull,
            (Op::Ne, Value::Null) => Op::IsNotNull,
            (op, _) => op,
        };
        if op.takes_value() {
            params.push(c.value.clone());
            parts.push(format!("{} {} ?{}", col, op, first_param + params.len() - 1));
        } else {
            parts.push(format!("{} {}", col, op));
        }
    }
    if parts.is_empty() {
        return Ok((String::new(), params));
    }
    Ok((format!(" WHERE {}", parts.join(" AND ")), params))
}

pub(crate) fn order_clause(known: &[String], order_by: &[OrderBy]) -> Result<String> {
    if order_by.is_empty() {
        return Ok(String::new());
    }
    let parts = order_by
        .iter()
        .map(|o| {
            let col = quote_ident(check_field(known, &o.field)?);
            Ok(if o.descending {
                format!("{col} DESC")
            } else {
                col
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(" ORDER BY {}", parts.join(", ")))
}
