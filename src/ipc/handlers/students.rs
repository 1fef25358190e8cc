use crate::broker::{DataBroker, Table};
use crate::condition::{Condition, OrderBy, Select};
use crate::ipc::error::{respond, HandlerError, HandlerResult};
use crate::ipc::helpers::{param_i64, param_str, require_broker, wants_html};
use crate::ipc::types::{AppState, Request};
use crate::record::Record;
use crate::value;
use rusqlite::types::Value;
use serde_json::json;

fn find_student(broker: &DataBroker, t: &Table, sid: i64) -> Result<Record, HandlerError> {
    let mut rs = broker.get_data(t, &["sid", "first", "last"], &[Condition::eq("sid", sid)])?;
    if rs.is_empty() {
        return Err(HandlerError::not_found("student not found")
            .with_details(json!({ "studentId": sid })));
    }
    Ok(rs.del_row(0)?)
}

fn handle_students_list(state: &mut AppState, _req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let t = broker.bind("students")?;
    let rs = broker.select(
        &t,
        &Select {
            order_by: vec![OrderBy::asc("last"), OrderBy::asc("first")],
            ..Select::default()
        },
    )?;
    Ok(json!({ "students": rs.to_json() }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let first = param_str(req, "first")?;
    let last = param_str(req, "last")?;

    let t = broker.bind("students")?;
    let rec = Record::with_values(["first", "last"], vec![Value::Text(first), Value::Text(last)])?;
    let sid = broker.set_data(&t, &rec)?;
    tracing::info!(student_id = sid, "student created");
    Ok(json!({ "studentId": sid }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let sid = param_i64(req, "studentId")?;
    let students = broker.bind("students")?;
    find_student(broker, &students, sid)?;
    let results = broker.bind("results")?;

    let results_deleted = broker.in_transaction(|b| {
        let n = b.del_data(&results, [("sid", Value::Integer(sid))])?;
        b.del_data(&students, [("sid", Value::Integer(sid))])?;
        Ok(n)
    })?;
    tracing::info!(student_id = sid, results_deleted, "student deleted");
    Ok(json!({ "deleted": true, "resultsDeleted": results_deleted }))
}

/// One student's scores with quiz details, plus their mean score.
fn handle_students_results(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let sid = param_i64(req, "studentId")?;
    let students = broker.bind("students")?;
    let student = find_student(broker, &students, sid)?;

    let rs = broker
        .commit(
            "SELECT r.rid, q.qid, q.date, q.subject, q.questions, r.score
             FROM results r
             JOIN quizzes q ON q.qid = r.qid
             WHERE r.sid = ?1
             ORDER BY q.date, q.qid",
            &[Value::Integer(sid)],
        )?
        .into_record_set()?;

    let scores: Vec<f64> = rs
        .iter()
        .filter_map(|r| match r.get_field("score") {
            Ok(Value::Real(f)) => Some(*f),
            Ok(Value::Integer(i)) => Some(*i as f64),
            _ => None,
        })
        .collect();
    let average = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let mut result = json!({
        "student": student.to_json(),
        "results": rs.to_json(),
        "average": average,
    });
    if rs.is_empty() {
        result["message"] = json!("No results");
    }
    if wants_html(req) {
        let name = format!(
            "{} {}",
            value::display(student.get_field("first")?),
            value::display(student.get_field("last")?)
        );
        result["html"] = json!(rs.html_table(Some(&name), &[("class", "results")]));
    }
    Ok(result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "students.list" => handle_students_list(state, req),
        "students.create" => handle_students_create(state, req),
        "students.delete" => handle_students_delete(state, req),
        "students.results" => handle_students_results(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
