use serde_json::json;

use crate::error::BrokerError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Failure returned by a handler; rendered with [`err`].
#[derive(Debug, Clone)]
pub struct HandlerError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<BrokerError> for HandlerError {
    fn from(e: BrokerError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerError>;

pub fn respond(id: &str, res: HandlerResult) -> serde_json::Value {
    match res {
        Ok(result) => ok(id, result),
        Err(e) => {
            tracing::warn!(id = %id, code = e.code, message = %e.message, "request failed");
            err(id, e.code, e.message, e.details)
        }
    }
}
