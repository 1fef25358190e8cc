use crate::condition::{OrderBy, Select};
use crate::ipc::error::{respond, HandlerResult};
use crate::ipc::helpers::{require_broker, wants_html};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Roster and quiz list in one reply, as the teacher's landing page shows them.
fn handle_dashboard(state: &mut AppState, req: &Request) -> HandlerResult {
    let broker = require_broker(state)?;

    let students_t = broker.bind("students")?;
    let students = broker.select(
        &students_t,
        &Select {
            order_by: vec![OrderBy::asc("last"), OrderBy::asc("first")],
            ..Select::default()
        },
    )?;

    let quizzes_t = broker.bind("quizzes")?;
    let quizzes = broker.select(
        &quizzes_t,
        &Select {
            order_by: vec![OrderBy::asc("date"), OrderBy::asc("qid")],
            ..Select::default()
        },
    )?;

    let mut result = json!({
        "students": students.to_json(),
        "quizzes": quizzes.to_json(),
        "studentCount": students.count(),
        "quizCount": quizzes.count(),
    });
    if wants_html(req) {
        result["html"] = json!({
            "students": students.html_table(Some("Students"), &[("class", "students")]),
            "quizzes": quizzes.html_table(Some("Quizzes"), &[("class", "quizzes")]),
        });
    }
    Ok(result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "dashboard" => handle_dashboard(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
