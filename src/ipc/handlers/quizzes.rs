use crate::condition::{Condition, OrderBy, Select};
use crate::ipc::error::{respond, HandlerError, HandlerResult};
use crate::ipc::helpers::{param_i64, param_str, require_broker};
use crate::ipc::types::{AppState, Request};
use crate::record::Record;
use chrono::NaiveDate;
use rusqlite::types::Value;
use serde_json::json;

fn handle_quizzes_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let t = broker.bind("quizzes")?;
    let rs = broker.select(
        &t,
        &Select {
            order_by: vec![OrderBy::asc("date"), OrderBy::asc("qid")],
            ..Select::default()
        },
    )?;
    Ok(json!({ "quizzes": rs.to_json() }))
}

fn handle_quizzes_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let date = param_str(req, "date")?;
    let subject = param_str(req, "subject")?;
    let questions = param_i64(req, "questions")?;

    // Stored as ISO text so that ordering by date is lexical.
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| HandlerError::bad_params(format!("date must be YYYY-MM-DD: {e}")))?;
    if questions <= 0 {
        return Err(HandlerError::bad_params("questions must be positive"));
    }

    let t = broker.bind("quizzes")?;
    let rec = Record::with_values(
        ["date", "subject", "questions"],
        vec![
            Value::Text(date.format("%Y-%m-%d").to_string()),
            Value::Text(subject),
            Value::Integer(questions),
        ],
    )?;
    let qid = broker.set_data(&t, &rec)?;
    tracing::info!(quiz_id = qid, "quiz created");
    Ok(json!({ "quizId": qid }))
}

fn handle_quizzes_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let qid = param_i64(req, "quizId")?;
    let quizzes = broker.bind("quizzes")?;
    if broker.count(&quizzes, &[Condition::eq("qid", qid)])? == 0 {
        return Err(HandlerError::not_found("quiz not found").with_details(json!({ "quizId": qid })));
    }
    let results = broker.bind("results")?;

    let results_deleted = broker.in_transaction(|b| {
        let n = b.del_data(&results, [("qid", Value::Integer(qid))])?;
        b.del_data(&quizzes, [("qid", Value::Integer(qid))])?;
        Ok(n)
    })?;
    tracing::info!(quiz_id = qid, results_deleted, "quiz deleted");
    Ok(json!({ "deleted": true, "resultsDeleted": results_deleted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "quizzes.list" => handle_quizzes_list(state, req),
        "quizzes.create" => handle_quizzes_create(state, req),
        "quizzes.delete" => handle_quizzes_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
