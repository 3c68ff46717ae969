use axum::http::StatusCode;

use crate::app::errors;

/// Parse a path segment into a typed id, or produce the 400 response.
pub fn parse_id<T: std::str::FromStr>(
    raw: &str,
    what: &'static str,
) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}
