use crate::condition::Condition;
use crate::ipc::error::{respond, HandlerError, HandlerResult};
use crate::ipc::helpers::{param_f64, param_i64, require_broker, wants_html};
use crate::ipc::types::{AppState, Request};
use crate::record::Record;
use rusqlite::types::Value;
use serde_json::json;

fn param_score(req: &Request) -> Result<f64, HandlerError> {
    let score = param_f64(req, "score")?;
    if !score.is_finite() || score < 0.0 {
        return Err(HandlerError::bad_params("score must be a non-negative number"));
    }
    Ok(score)
}

fn handle_results_add(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let sid = param_i64(req, "studentId")?;
    let qid = param_i64(req, "quizId")?;
    let score = param_score(req)?;

    let students = broker.bind("students")?;
    if broker.count(&students, &[Condition::eq("sid", sid)])? == 0 {
        return Err(HandlerError::not_found("student not found")
            .with_details(json!({ "studentId": sid })));
    }
    let quizzes = broker.bind("quizzes")?;
    if broker.count(&quizzes, &[Condition::eq("qid", qid)])? == 0 {
        return Err(HandlerError::not_found("quiz not found").with_details(json!({ "quizId": qid })));
    }

    let results = broker.bind("results")?;
    let rec = Record::with_values(
        ["sid", "qid", "score"],
        vec![Value::Integer(sid), Value::Integer(qid), Value::Real(score)],
    )?;
    let rid = broker.set_data(&results, &rec).map_err(|e| {
        HandlerError::from(e).with_details(json!({ "studentId": sid, "quizId": qid }))
    })?;
    tracing::info!(result_id = rid, student_id = sid, quiz_id = qid, "result recorded");
    Ok(json!({ "resultId": rid }))
}

fn handle_results_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let rid = param_i64(req, "resultId")?;
    let score = param_score(req)?;

    let results = broker.bind("results")?;
    let change = Record::with_values(["score"], vec![Value::Real(score)])?;
    let n = broker.update_data(&results, &change, &[Condition::eq("rid", rid)])?;
    if n == 0 {
        return Err(HandlerError::not_found("result not found")
            .with_details(json!({ "resultId": rid })));
    }
    Ok(json!({ "updated": n }))
}

fn handle_results_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let rid = param_i64(req, "resultId")?;
    let results = broker.bind("results")?;
    let n = broker.del_data(&results, [("rid", Value::Integer(rid))])?;
    if n == 0 {
        return Err(HandlerError::not_found("result not found")
            .with_details(json!({ "resultId": rid })));
    }
    Ok(json!({ "deleted": n }))
}

/// Every recorded score with the student's name and the quiz, optionally for one quiz.
fn handle_results_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let quiz_filter = match req.params.get("quizId") {
        Some(_) => Some(param_i64(req, "quizId")?),
        None => None,
    };

    let mut sql = String::from(
        "SELECT r.rid, s.sid, s.first, s.last, q.qid, q.date, q.subject, r.score
         FROM results r
         JOIN students s ON s.sid = r.sid
         JOIN quizzes q ON q.qid = r.qid",
    );
    let mut params = Vec::new();
    if let Some(qid) = quiz_filter {
        sql.push_str(" WHERE r.qid = ?1");
        params.push(Value::Integer(qid));
    }
    sql.push_str(" ORDER BY q.date, q.qid, s.last, s.first");

    let rs = broker.commit(&sql, &params)?.into_record_set()?;
    let mut result = json!({ "results": rs.to_json() });
    if wants_html(req) {
        result["html"] = json!(rs.html_table(Some("Results"), &[("class", "results")]));
    }
    Ok(result)
}

/// Per-quiz aggregates. Quizzes without scores report a count of 0 and null stats.
fn handle_results_summary(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;
    let rs = broker
        .commit(
            "SELECT q.qid, q.date, q.subject, q.questions,
                    COUNT(r.rid) AS count,
                    AVG(r.score) AS average,
                    MIN(r.score) AS min,
                    MAX(r.score) AS max
             FROM quizzes q
             LEFT JOIN results r ON r.qid = q.qid
             GROUP BY q.qid
             ORDER BY q.date, q.qid",
            &[],
        )?
        .into_record_set()?;
    let mut result = json!({ "quizzes": rs.to_json() });
    if wants_html(req) {
        result["html"] = json!(rs.html_table(Some("Quiz summary"), &[("class", "summary")]));
    }
    Ok(result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "results.add" => handle_results_add(state, req),
        "results.update" => handle_results_update(state, req),
        "results.delete" => handle_results_delete(state, req),
        "results.list" => handle_results_list(state, req),
        "results.summary" => handle_results_summary(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
