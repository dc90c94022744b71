//! Classification of HTTP results into outcomes.

use serde_json::Value;

use crate::{
    Result,
    ngsi::{ActionType, codec},
    transport::HttpResponse,
};

/// Synthetic status reported when no HTTP response exists.
pub const SYNTHETIC_STATUS: u16 = 500;

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Success {
        status_code: u16,
        body: Option<Value>,
    },
    /// The service answered with a status other than the expected one.
    Error {
        status_code: u16,
        message: String,
        detail: Vec<String>,
        body: Option<Value>,
    },
    /// No response was received.
    TransportFailure {
        message: String,
    },
}

impl ResponseOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            ResponseOutcome::Success {
                status_code,
                ..
            }
            | ResponseOutcome::Error {
                status_code,
                ..
            } => *status_code,
            ResponseOutcome::TransportFailure {
                ..
            } => SYNTHETIC_STATUS,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseOutcome::Success { .. })
    }
}

/// Options that affect how a successful body is post-processed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoding {
    pub forbidden: bool,
    pub key_values: bool,
    /// the body is one bare attribute rather than entities
    pub attribute: bool,
}

/// Classify a response against the success code of `action`.
pub fn classify(
    action: ActionType,
    response: &HttpResponse,
    decoding: Decoding,
) -> ResponseOutcome {
    if response.status != action.success_status() {
        return ResponseOutcome::Error {
            status_code: response.status,
            message: format!("{} {}", response.status, response.status_text).trim_end().to_string(),
            detail: error_detail(response.body.as_ref()),
            body: response.body.clone(),
        };
    }

    let body = if action.is_read() {
        response.body.as_ref().map(|b| {
            if decoding.attribute {
                codec::decode_attribute(b, decoding.forbidden)
            } else {
                codec::decode_entities(b, decoding.forbidden, decoding.key_values)
            }
        })
    } else {
        response.body.clone()
    };

    ResponseOutcome::Success {
        status_code: response.status,
        body,
    }
}

/// Classify the result of a transport call, including "no response".
pub fn classify_result(
    action: ActionType,
    result: Result<HttpResponse>,
    decoding: Decoding,
) -> ResponseOutcome {
    match result {
        Ok(response) => classify(action, &response, decoding),
        Err(err) => ResponseOutcome::TransportFailure {
            message: err.to_string(),
        },
    }
}

/// `description` and `orionError` details of an upstream error body.
fn error_detail(body: Option<&Value>) -> Vec<String> {
    let mut detail = Vec::new();
    let Some(Value::Object(obj)) = body else {
        return detail;
    };

    if let Some(description) = obj.get("description") {
        detail.push(value_text(description));
    }
    if let Some(orion_error) = obj.get("orionError") {
        let text = match orion_error.get("details") {
            Some(details) => value_text(details),
            None => value_text(orion_error),
        };
        detail.push(text);
    }
    detail
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
