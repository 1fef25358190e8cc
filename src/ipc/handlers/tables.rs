use crate::condition::{Condition, OrderBy, Select};
use crate::ipc::error::{respond, HandlerError, HandlerResult};
use crate::ipc::helpers::{opt_str, param_str, require_broker, wants_html};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_tables_columns(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let table = param_str(req, "table")?;
    let t = broker.bind(&table)?;
    Ok(json!({ "table": t.name(), "columns": t.fields() }))
}

fn parse_list<T>(
    req: &Request,
    key: &str,
    parse: impl Fn(&serde_json::Value) -> crate::error::Result<T>,
) -> Result<Vec<T>, HandlerError> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| parse(v).map_err(HandlerError::from))
            .collect(),
        Some(_) => Err(HandlerError::bad_params(format!("{key} must be an array"))),
    }
}

/// Generic filtered read over any table, e.g.
/// `{"table": "students", "fields": ["first"], "conditions": [{"field": "sid", "op": "=", "value": 0}]}`.
fn handle_tables_query(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let table = param_str(req, "table")?;
    let t = broker.bind(&table)?;

    let fields = parse_list(req, "fields", |v| {
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| crate::error::BrokerError::BadCondition("fields must be strings".into()))
    })?;
    let query = Select {
        fields,
        conditions: parse_list(req, "conditions", Condition::from_json)?,
        order_by: parse_list(req, "orderBy", OrderBy::from_json)?,
        limit: match req.params.get("limit") {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(
                v.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| HandlerError::bad_params("limit must be a non-negative integer"))?,
            ),
        },
    };

    let rs = broker.select(&t, &query)?;
    let mut result = json!({
        "columns": rs.fields(),
        "rows": rs.to_json(),
        "count": rs.count(),
    });
    if wants_html(req) {
        result["html"] = json!(rs.html_table(opt_str(req, "caption"), &[]));
    }
    Ok(result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "tables.columns" => handle_tables_columns(state, req),
        "tables.query" => handle_tables_query(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
