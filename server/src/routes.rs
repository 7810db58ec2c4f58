use std::sync::Arc;

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Path, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{DateTime, Utc};
use ephemeral_common::{
    parse_test_now, CreatePaste, CreatedPaste, ErrorBody, Health, PasteView, API_ENDPOINT,
    TEST_NOW_HEADER_NAME, VIEW_SEGMENT,
};
use serde::Deserialize;
use tokio::task;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Error, Result, StorageError, ValidationError};
use crate::paste::Paste;
use crate::render;

const UNAVAILABLE: &str = "Paste unavailable";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(engine: Engine, config: Config) -> Self {
        Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/ui/create", post(ui_create))
        .route(&format!("{API_ENDPOINT}/healthz"), get(healthz))
        .route(&format!("{API_ENDPOINT}/pastes"), post(create_paste))
        .route(&format!("{API_ENDPOINT}/pastes/:id"), get(fetch_paste))
        .route(&format!("/{VIEW_SEGMENT}/:id"), get(view_paste))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_of(&self);
        let error = match self {
            Self::Validation(e) => e.to_string(),
            Self::Storage(_) => "Storage unavailable, retry later".to_string(),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

fn status_of(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::Storage(e) => {
            error!("Storage failure: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn html_error(error: &Error) -> Response {
    let status = status_of(error);
    let message = match error {
        Error::Validation(e) => e.to_string(),
        Error::Storage(_) => "Storage unavailable, retry later".to_string(),
    };
    (status, Html(render::error_page(&message))).into_response()
}

/// Runs an engine call on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f).await.map_err(StorageError::from)?
}

/// The instant a request should be evaluated at, if the client overrode it.
fn request_now(config: &Config, headers: &HeaderMap) -> Option<DateTime<Utc>> {
    if !config.test_mode {
        return None;
    }

    headers
        .get(&*TEST_NOW_HEADER_NAME)?
        .to_str()
        .ok()
        .and_then(parse_test_now)
}

fn share_url(config: &Config, headers: &HeaderMap, id: &str) -> String {
    let base = config.base_url.clone().unwrap_or_else(|| {
        let host = headers
            .get(HOST)
            .and_then(|host| host.to_str().ok())
            .unwrap_or("localhost");
        format!("http://{host}")
    });
    format!("{base}/{VIEW_SEGMENT}/{id}")
}

async fn create(state: &AppState, headers: &HeaderMap, request: CreatePaste) -> Result<Paste> {
    let now = request_now(&state.config, headers);
    let engine = Arc::clone(&state.engine);
    let paste = run_blocking(move || match now {
        Some(now) => engine.create_at(request, now),
        None => engine.create(request),
    })
    .await?;
    info!(id = %paste.id, "Created paste");
    Ok(paste)
}

async fn fetch(state: &AppState, headers: &HeaderMap, id: String) -> Result<Option<PasteView>> {
    let now = request_now(&state.config, headers);
    let engine = Arc::clone(&state.engine);
    run_blocking(move || match now {
        Some(now) => engine.fetch_at(&id, now),
        None => engine.fetch(&id),
    })
    .await
}

#[instrument(skip_all, err)]
async fn create_paste(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreatePaste>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedPaste>)> {
    let Json(request) = body.map_err(|e| ValidationError::MalformedRequest(e.body_text()))?;
    let paste = create(&state, &headers, request).await?;
    let url = share_url(&state.config, &headers, &paste.id);

    Ok((StatusCode::CREATED, Json(CreatedPaste { id: paste.id, url })))
}

#[instrument(skip(state, headers), err)]
async fn fetch_paste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    Ok(match fetch(&state, &headers, id).await? {
        Some(view) => Json(view).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: UNAVAILABLE.to_string(),
            }),
        )
            .into_response(),
    })
}

#[instrument(skip(state, headers))]
async fn view_paste(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    match fetch(&state, &headers, id).await {
        Ok(Some(view)) => Html(render::paste_page(&view)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Html(render::unavailable_page())).into_response(),
        Err(e) => html_error(&e),
    }
}

async fn home() -> Html<String> {
    Html(render::home_page())
}

/// Fields of the home page form. Browsers submit empty strings for fields
/// left blank.
#[derive(Deserialize, Debug)]
struct CreateForm {
    content: Option<String>,
    ttl_seconds: Option<String>,
    max_views: Option<String>,
}

impl TryFrom<CreateForm> for CreatePaste {
    type Error = ValidationError;

    fn try_from(form: CreateForm) -> Result<Self, Self::Error> {
        fn field(value: Option<String>) -> Option<String> {
            value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        }

        Ok(Self {
            content: form.content,
            ttl_seconds: field(form.ttl_seconds)
                .map(|ttl| ttl.parse().map_err(|_| ValidationError::InvalidTtl))
                .transpose()?,
            max_views: field(form.max_views)
                .map(|views| views.parse().map_err(|_| ValidationError::InvalidMaxViews))
                .transpose()?,
        })
    }
}

#[instrument(skip_all)]
async fn ui_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    form: Result<Form<CreateForm>, FormRejection>,
) -> Response {
    let request = match form {
        Ok(Form(form)) => CreatePaste::try_from(form),
        Err(e) => Err(ValidationError::MalformedRequest(e.body_text())),
    };

    let created = match request {
        Ok(request) => create(&state, &headers, request).await,
        Err(e) => Err(e.into()),
    };

    match created {
        Ok(paste) => {
            let url = share_url(&state.config, &headers, &paste.id);
            Html(render::created_page(&url)).into_response()
        }
        Err(e) => html_error(&e),
    }
}

#[instrument(skip_all)]
async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let engine = Arc::clone(&state.engine);
    match task::spawn_blocking(move || engine.store().ping()).await {
        Ok(Ok(())) => (StatusCode::OK, Json(Health { ok: true })),
        e => {
            warn!("Health check failed: {:?}", e);
            (StatusCode::SERVICE_UNAVAILABLE, Json(Health { ok: false }))
        }
    }
}
