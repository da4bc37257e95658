use error_stack::Report;
use fastly::http::{header, StatusCode};
use fastly::Response;
use serde_json::json;

use adplus_common::error::AdplusError;

/// Render an error report as a JSON error response.
pub fn to_error_response(report: Report<AdplusError>) -> Response {
    let error = report.current_context();
    let status = StatusCode::from_u16(error.status_code().as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    log::error!("Request failed with {}: {:?}", status, report);

    Response::from_status(status)
        .with_header(header::CONTENT_TYPE, "application/json")
        .with_body(json!({ "error": error.to_string() }).to_string())
}
