//! HTTP surface of the gateway.
//!
//! Two endpoints: `GET /` serves the static upload page, `POST /` takes a
//! `multipart/form-data` upload in field `file` and answers with the
//! sanitized PDF as an attachment. Failures use a JSON envelope with a
//! single user-visible string; internal detail stays in the process log.
//!
//! When the pre-scan flagged the input, the (still sanitized) delivery
//! carries `X-Threat-Warning` and `X-Threat-Details` headers so the UI can
//! tell the user what was neutralized.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::error;

use flatpress_core::{ContainerBackend, JobController, SanitizedDelivery, MAX_UPLOAD_BYTES};

/// Controller shared across requests.
pub type SharedController = Arc<JobController<ContainerBackend>>;

/// Body ceiling for the multipart envelope: the upload limit plus headroom
/// for boundaries and part headers. The exact 100 MiB rule is enforced on
/// the decoded field by the controller so the client sees the documented
/// error message, not a framework 413.
const BODY_LIMIT: usize = MAX_UPLOAD_BYTES as usize + 4 * 1024 * 1024;

/// Build the router.
pub fn router(controller: SharedController) -> Router {
    Router::new()
        .route("/", get(upload_page).post(submit))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(controller)
}

async fn upload_page() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn submit(State(controller): State<SharedController>, mut multipart: Multipart) -> Response {
    let Some((file_name, bytes)) = read_file_field(&mut multipart).await else {
        return error_response(StatusCode::BAD_REQUEST, "No file provided");
    };

    // Detached task: a client that disconnects mid-job must not cancel the
    // pipeline — partial cancellation would leave a container alive. The
    // job runs to a terminal state and cleans its own staging either way.
    let job = tokio::spawn(async move { controller.process(&file_name, &bytes).await });

    match job.await {
        Ok(Ok(delivery)) => delivery_response(delivery),
        Ok(Err(e)) if e.is_client_error() => {
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
        Ok(Err(e)) => {
            error!(error = %e, "sanitization failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Sanitization failed")
        }
        Err(e) => {
            error!(error = %e, "job task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Sanitization failed")
        }
    }
}

/// Pull the `file` field out of the multipart stream.
async fn read_file_field(multipart: &mut Multipart) -> Option<(String, Bytes)> {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name()?.to_string();
        if file_name.is_empty() {
            return None;
        }
        let bytes = field.bytes().await.ok()?;
        return Some((file_name, bytes));
    }
    None
}

fn delivery_response(delivery: SanitizedDelivery) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", delivery.file_name),
        );

    if let Some(threat) = &delivery.threat {
        builder = builder
            .header("X-Threat-Warning", threat.banner)
            .header("X-Threat-Details", threat.detail.as_str());
    }

    match builder.body(Body::from(delivery.bytes)) {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "could not assemble delivery response");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Sanitization failed")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
