//! Middleware for logging requests and responses.

use axum::{extract::Request, middleware::Next, response::Response};

use crate::endpoints;

/// Log each request and its response at the `info` level.
///
/// Static asset requests are passed through untouched. Bodies longer than
/// [LOG_BODY_LENGTH_LIMIT] bytes are truncated at `info` and logged in
/// full at `debug`.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    if request.uri().path().starts_with(endpoints::STATIC) {
        return next.run(request).await;
    }

    let (parts, body_text) = buffer_request(request).await;
    log_payload("Received request", &format!("{parts:#?}"), &body_text);

    let request = Request::from_parts(parts, body_text.into());
    let response = next.run(request).await;

    let (parts, body_text) = buffer_response(response).await;
    log_payload("Sending response", &format!("{parts:#?}"), &body_text);

    Response::from_parts(parts, body_text.into())
}

async fn buffer_request(request: Request) -> (axum::http::request::Parts, String) {
    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

    (parts, String::from_utf8_lossy(&body_bytes).to_string())
}

async fn buffer_response(response: Response) -> (axum::http::response::Parts, String) {
    let (parts, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

    (parts, String::from_utf8_lossy(&body_bytes).to_string())
}

const LOG_BODY_LENGTH_LIMIT: usize = 64;

fn log_payload(direction: &str, parts: &str, body: &str) {
    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "{direction}: {parts}\nbody: {}...",
            &body[..LOG_BODY_LENGTH_LIMIT]
        );
        tracing::debug!("Full body: {body:?}");
    } else {
        tracing::info!("{direction}: {parts}\nbody: {body:?}");
    }
}
