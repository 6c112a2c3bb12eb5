//! HTTP endpoints for Goosebin.
//!
//! Handlers are thin: each turns a [`StoreResult`] or [`LoadResult`] into a
//! status code, a `Cache-Control` directive, and a [`Page`]. Every request
//! gets a child of the process shutdown token, so backend retries stop when
//! the server drains.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::FormRejection, DefaultBodyLimit, Form, Path, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use pastekv::{LoadResult, PasteEngine, PasteKey, StoreResult};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use handlebars::TemplateError;

use crate::pages::{Page, Pages};

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=UTF-8";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=UTF-8";

/// `Cache-Control` for anything that must not be cached.
pub const NO_STORE: &str = "no-store, max-age=0";

/// Static pages may be cached for a day.
const STATIC_MAX_AGE: Duration = Duration::from_secs(86_400);

const ROBOTS_TXT: &str = include_str!("../static/robots.txt");

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: PasteEngine,
    /// Cancelled when the server starts draining.
    pub shutdown: CancellationToken,
    pub start_time: Instant,
    pub pages: Arc<Pages>,
}

impl AppState {
    /// Fails only if an embedded template does not parse.
    pub fn new(engine: PasteEngine, shutdown: CancellationToken) -> Result<Self, TemplateError> {
        Ok(Self {
            engine,
            shutdown,
            start_time: Instant::now(),
            pages: Arc::new(Pages::new()?),
        })
    }

    fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    fn html(&self, status: StatusCode, cache_control: String, page: Page) -> Response {
        match self.pages.render(&page) {
            Ok(body) => html_response(status, cache_control, body),
            Err(e) => {
                tracing::error!(template = page.template_name(), error = %e, "failed to render page");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [
                        (header::CONTENT_TYPE, TEXT_CONTENT_TYPE),
                        (header::CACHE_CONTROL, NO_STORE),
                    ],
                    "Server Error\n",
                )
                    .into_response()
            }
        }
    }

    fn server_error(&self, uri: &Uri) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        self.html(
            status,
            NO_STORE.to_string(),
            Page::ServerError {
                code: status.as_u16(),
                path: uri.path().to_string(),
            },
        )
    }
}

/// Largest request body accepted: a form field is at most three bytes per
/// content byte once percent-encoded, plus room for the field name.
pub fn body_limit_for(size_limit: usize) -> usize {
    size_limit.saturating_mul(3).saturating_add(1024)
}

pub fn router(state: AppState) -> Router {
    let body_limit = body_limit_for(state.engine.policy().size_limit);

    Router::new()
        .route("/", get(show_home))
        .route("/create-paste", get(new_paste).post(create_paste))
        .route("/paste/{key}", get(show_paste))
        .route("/paste/{key}/raw", get(raw_paste))
        .route("/robots.txt", get(robots))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn max_age(ttl: Duration) -> String {
    format!("max-age={}", ttl.as_secs())
}

fn html_response(status: StatusCode, cache_control: String, body: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, HTML_CONTENT_TYPE.to_string()),
            (header::CACHE_CONTROL, cache_control),
        ],
        body,
    )
        .into_response()
}

async fn show_home(State(state): State<AppState>) -> Response {
    state.html(StatusCode::OK, max_age(STATIC_MAX_AGE), Page::Home)
}

async fn new_paste(State(state): State<AppState>) -> Response {
    state.html(
        StatusCode::OK,
        max_age(STATIC_MAX_AGE),
        Page::NewPaste {
            size_limit: state.engine.policy().size_limit,
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct CreatePasteForm {
    paste: Option<String>,
}

#[tracing::instrument(
    name = "http.paste.create",
    skip_all,
    fields(paste.key = tracing::field::Empty, paste.size = tracing::field::Empty)
)]
async fn create_paste(
    State(state): State<AppState>,
    uri: Uri,
    form: Result<Form<CreatePasteForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "rejected create-paste body");
            let why = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                format!(
                    "Paste is too large, it must be at most {} bytes.",
                    state.engine.policy().size_limit
                )
            } else {
                rejection.body_text()
            };
            return state.html(rejection.status(), NO_STORE.to_string(), Page::Failed { why });
        }
    };

    let Some(content) = form.paste else {
        return state.html(
            StatusCode::BAD_REQUEST,
            NO_STORE.to_string(),
            Page::Failed {
                why: "The form is missing the paste field.".to_string(),
            },
        );
    };

    let span = tracing::Span::current();
    span.record("paste.size", content.len());

    match state.engine.store(content.as_bytes(), &state.request_token()).await {
        StoreResult::Created(key) => {
            span.record("paste.key", key.encode().as_str());
            state.html(StatusCode::OK, NO_STORE.to_string(), Page::Created { key })
        }
        StoreResult::AlreadyExists(key) => {
            span.record("paste.key", key.encode().as_str());
            state.html(StatusCode::BAD_REQUEST, NO_STORE.to_string(), Page::Exists { key })
        }
        StoreResult::TooLarge { limit } => state.html(
            StatusCode::BAD_REQUEST,
            NO_STORE.to_string(),
            Page::Failed {
                why: format!("Paste is too large, it must be at most {} bytes.", limit),
            },
        ),
        StoreResult::BackendFailure(e) => {
            tracing::error!(error = %e, "create-paste failed");
            state.server_error(&uri)
        }
    }
}

#[tracing::instrument(name = "http.paste.show", skip(state, uri))]
async fn show_paste(State(state): State<AppState>, Path(key): Path<String>, uri: Uri) -> Response {
    match state.engine.load(&key, &state.request_token()).await {
        LoadResult::Found {
            content,
            remaining_ttl,
        } => {
            // load() only returns Found for a key that decodes.
            let Ok(key) = key.parse::<PasteKey>() else {
                return state.server_error(&uri);
            };
            state.html(
                StatusCode::OK,
                max_age(remaining_ttl),
                Page::Show {
                    key,
                    content: String::from_utf8_lossy(&content).into_owned(),
                    remaining_ttl,
                },
            )
        }
        LoadResult::NotFoundOrInvalidKey => state.html(
            StatusCode::NOT_FOUND,
            NO_STORE.to_string(),
            Page::NotFound {
                path: uri.path().to_string(),
            },
        ),
        LoadResult::BackendFailure(e) => {
            tracing::error!(error = %e, "show-paste failed");
            state.server_error(&uri)
        }
    }
}

#[tracing::instrument(name = "http.paste.raw", skip(state))]
async fn raw_paste(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.engine.load(&key, &state.request_token()).await {
        LoadResult::Found {
            content,
            remaining_ttl,
        } => {
            tracing::debug!(bytes = content.len(), "serving raw paste");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, TEXT_CONTENT_TYPE.to_string()),
                    (header::CACHE_CONTROL, max_age(remaining_ttl)),
                ],
                content,
            )
                .into_response()
        }
        LoadResult::NotFoundOrInvalidKey => (
            StatusCode::NOT_FOUND,
            [
                (header::CONTENT_TYPE, TEXT_CONTENT_TYPE),
                (header::CACHE_CONTROL, NO_STORE),
            ],
            "Not Found\n",
        )
            .into_response(),
        LoadResult::BackendFailure(e) => {
            tracing::error!(error = %e, "raw-paste failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [
                    (header::CONTENT_TYPE, TEXT_CONTENT_TYPE),
                    (header::CACHE_CONTROL, NO_STORE),
                ],
                "Server Error\n",
            )
                .into_response()
        }
    }
}

async fn robots() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
        ROBOTS_TXT,
    )
        .into_response()
}

#[tracing::instrument(name = "http.health", skip(state))]
async fn health(State(state): State<AppState>) -> Response {
    let backend = state.engine.backend().name();
    let (status, label, error) = match state.engine.check_backend(&state.request_token()).await {
        Ok(()) => (StatusCode::OK, "healthy", None),
        Err(e) => {
            tracing::warn!(error = %e, backend, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", Some(e.to_string()))
        }
    };

    (
        status,
        [(header::CACHE_CONTROL, NO_STORE)],
        Json(serde_json::json!({
            "status": label,
            "uptime_secs": state.start_time.elapsed().as_secs(),
            "version": env!("CARGO_PKG_VERSION"),
            "backend": {
                "name": backend,
                "error": error,
            },
        })),
    )
        .into_response()
}
