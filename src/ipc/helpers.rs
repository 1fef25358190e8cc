use crate::broker::DataBroker;
use crate::ipc::error::HandlerError;
use crate::ipc::types::{AppState, Request};

pub fn require_broker(state: &AppState) -> Result<&DataBroker, HandlerError> {
    state
        .broker
        .as_ref()
        .ok_or_else(|| HandlerError::new("no_workspace", "select a workspace first"))
}

/// Trimmed, non-empty string parameter.
pub fn param_str(req: &Request, key: &str) -> Result<String, HandlerError> {
    let v = req
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerError::bad_params(format!("missing {key}")))?;
    if v.is_empty() {
        return Err(HandlerError::bad_params(format!("{key} must not be empty")));
    }
    Ok(v)
}

pub fn opt_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

/// Integer parameter; numeric strings are accepted as form fields often send them.
pub fn param_i64(req: &Request, key: &str) -> Result<i64, HandlerError> {
    let raw = req
        .params
        .get(key)
        .ok_or_else(|| HandlerError::bad_params(format!("missing {key}")))?;
    raw.as_i64()
        .or_else(|| raw.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| HandlerError::bad_params(format!("{key} must be an integer")))
}

pub fn param_f64(req: &Request, key: &str) -> Result<f64, HandlerError> {
    let raw = req
        .params
        .get(key)
        .ok_or_else(|| HandlerError::bad_params(format!("missing {key}")))?;
    raw.as_f64()
        .or_else(|| raw.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| HandlerError::bad_params(format!("{key} must be a number")))
}

pub fn wants_html(req: &Request) -> bool {
    opt_str(req, "format").is_some_and(|f| f.eq_ignore_ascii_case("html"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(params: serde_json::Value) -> Request {
        Request {
            id: "1".into(),
            method: "test".into(),
            params,
        }
    }

    #[test]
    fn string_params_are_trimmed_and_required() {
        let r = req(json!({ "first": "  Jack ", "last": "   " }));
        assert_eq!(param_str(&r, "first").unwrap(), "Jack");
        assert_eq!(param_str(&r, "last").unwrap_err().code, "bad_params");
        assert_eq!(param_str(&r, "middle").unwrap_err().code, "bad_params");
    }

    #[test]
    fn numeric_params_accept_strings() {
        let r = req(json!({ "a": 3, "b": "4", "c": "x", "d": 2.5 }));
        assert_eq!(param_i64(&r, "a").unwrap(), 3);
        assert_eq!(param_i64(&r, "b").unwrap(), 4);
        assert!(param_i64(&r, "c").is_err());
        assert_eq!(param_f64(&r, "d").unwrap(), 2.5);
        assert_eq!(param_f64(&r, "a").unwrap(), 3.0);
    }

    #[test]
    fn format_flag() {
        assert!(wants_html(&req(json!({ "format": "HTML" }))));
        assert!(!wants_html(&req(json!({}))));
    }

    #[test]
    fn broker_required() {
        let state = AppState::default();
        assert_eq!(require_broker(&state).unwrap_err().code, "no_workspace");
    }
}
