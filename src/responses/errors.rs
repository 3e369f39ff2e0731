use astra::{Body, Response, ResponseBuilder};

use crate::errors::ServerError;

pub type ResultResp = Result<Response, ServerError>;

/// Convert a ServerError into a JSON error response
pub fn error_to_response(err: ServerError) -> Response {
    let (status, message) = match &err {
        ServerError::NotFound => (404, "Not Found".to_string()),
        ServerError::BadRequest(msg) => (400, msg.clone()),
        ServerError::Unauthorized(msg) => (401, msg.clone()),
        ServerError::TooManyRequests(msg) => (429, msg.clone()),
        ServerError::DbError(msg) => (500, msg.clone()),
        ServerError::XlsxError(msg) => (500, msg.clone()),
        ServerError::InternalError => (500, "Internal Server Error".to_string()),
    };

    json_error_response(status, &message)
}

/// Build a JSON error body ({"error": "..."})
pub fn json_error_response(status: u16, message: &str) -> Response {
    let body = serde_json::json!({ "error": message }).to_string();

    ResponseBuilder::new()
        .status(status)
        .header("Content-Type", mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::from("Internal Server Error")))
}
