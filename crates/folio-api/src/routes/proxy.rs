//! Fetch interception: every request not addressed to a control route

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use folio_core::{EventHandler, ExtendableEvent, FetchOutcome};
use folio_storage::Request;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the id of the host client (page) issuing the request
pub const CLIENT_HEADER: &str = "x-folio-client";

/// Headers recomputed by the server for the outgoing body
const SKIPPED_RESPONSE_HEADERS: &[&str] = &["content-length", "transfer-encoding", "connection"];

/// Fallback handler: offer the request to the worker, or forward it
pub async fn intercept(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let url = request_url(&state, &uri)?;
    let request = build_request(method, url, &headers, body);

    let event = ExtendableEvent::new();
    let outcome = state.worker.on_fetch(&event, request.clone()).await;

    // Pending cache writes outlive the response but not the server
    state.tracker.spawn(event.settled());

    let response = match outcome {
        FetchOutcome::Respond(response) => response,
        FetchOutcome::Passthrough => {
            debug!("Forwarding {} {}", request.method, request.url);
            state.fetcher.fetch(&request).await?
        }
    };

    into_http(response)
}

/// Absolute-form URIs are used verbatim; origin-form paths are resolved
/// against the configured origin.
fn request_url(state: &AppState, uri: &Uri) -> Result<String, ApiError> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Ok(uri.to_string());
    }

    let origin = state.origin.as_ref().ok_or_else(|| {
        ApiError::BadRequest(format!("no origin configured to resolve {}", uri))
    })?;

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    origin
        .join(path)
        .map(String::from)
        .map_err(|e| ApiError::BadRequest(format!("{}: {}", path, e)))
}

fn build_request(method: Method, url: String, headers: &HeaderMap, body: Bytes) -> Request {
    let mut request = Request::new(method, url).with_body(body);

    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }

    if let Some(client) = headers.get(CLIENT_HEADER).and_then(|v| v.to_str().ok()) {
        request = request.with_client(client);
    }

    request
}

fn into_http(response: folio_storage::Response) -> Result<Response, ApiError> {
    let status = StatusCode::from_u16(response.status)
        .map_err(|e| ApiError::Internal(format!("status {}: {}", response.status, e)))?;

    let mut out = (status, Body::from(response.body)).into_response();
    let headers = out.headers_mut();
    for (name, value) in &response.headers {
        if SKIPPED_RESPONSE_HEADERS
            .iter()
            .any(|h| name.eq_ignore_ascii_case(h))
        {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }

    Ok(out)
}
