use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use url::form_urlencoded;
use uuid::Uuid;

use crate::application::error::ErrorReport;

/// Per-request identity plus the editor mode the request was made in.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
    pub edit_id: Option<String>,
}

impl RequestContext {
    fn from_request(request: &Request<Body>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            edit_id: request.uri().query().and_then(edit_id_from_query),
        }
    }

    pub fn mode(&self) -> &'static str {
        if self.edit_id.is_some() {
            "edit"
        } else {
            "create"
        }
    }
}

fn edit_id_from_query(query: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::from_request(&request);
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::from_request(&request));

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let edit_id = ctx.edit_id.as_deref().unwrap_or("");

    if status.is_redirection() {
        // Form actions land back on the page for whatever mode the editor is in now.
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        debug!(
            target = "postdesk::http::response",
            method = %method,
            path = %path,
            location = location,
            elapsed_ms = elapsed_ms,
            request_id = %ctx.request_id,
            "editor action handled",
        );
        return response;
    }

    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, messages) = match report {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        error!(
            target = "postdesk::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            mode = ctx.mode(),
            edit_id = edit_id,
            elapsed_ms = elapsed_ms,
            source = source,
            detail = %detail,
            chain = ?messages,
            request_id = %ctx.request_id,
            "request failed",
        );
    } else {
        warn!(
            target = "postdesk::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            mode = ctx.mode(),
            edit_id = edit_id,
            elapsed_ms = elapsed_ms,
            source = source,
            detail = %detail,
            request_id = %ctx.request_id,
            "client request error",
        );
    }

    response
}
