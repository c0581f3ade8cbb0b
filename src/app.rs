#![cfg(feature = "web")]
//! HTTP surface of the explorer
//!
//! Handlers resolve the browser's session from the `session` cookie, run
//! parsing on the blocking pool and answer with JSON. Failures are mapped to a
//! status code and a `{status, message}` body by [`AppError`].

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::cache::IngestCache;
use crate::config::Config;
use crate::error::{ChartError, DataError};
use crate::graph::{self, ChartSpec, ChartType, LineDash, TickPreset, Visualization};
use crate::loader::{Ingested, UploadedFile, Workbook};
use crate::plot;
use crate::session::{SESSION_COOKIE, Session, SessionStore};
use crate::stats::{self, Inspection};
use crate::table::Table;

const INDEX_TEMPLATE: &str = "index";

/// Shared state of the web application
pub struct AppState {
    pub config: Config,
    pub cache: IngestCache,
    pub sessions: SessionStore,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(true);
        templates.register_template_string(INDEX_TEMPLATE, include_str!("./static/index.html"))?;

        Ok(AppState {
            cache: IngestCache::new(config.cache_capacity),
            sessions: SessionStore::new(config.session_ttl()),
            config,
            templates,
        })
    }
}

/// Errors returned by the HTTP handlers
#[derive(Debug)]
pub enum AppError {
    Data(DataError),
    Chart(ChartError),
    BadRequest(String),
    Internal(String),
}

impl From<DataError> for AppError {
    fn from(e: DataError) -> Self {
        AppError::Data(e)
    }
}

impl From<ChartError> for AppError {
    fn from(e: ChartError) -> Self {
        AppError::Chart(e)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Data(e @ DataError::UnsupportedFileType(_)) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string())
            }
            AppError::Data(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Chart(e @ ChartError::Render(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Chart(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (
            status,
            Json(ErrorResponse {
                status: "error",
                message,
            }),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
struct SheetRequest {
    name: String,
}

/// Inspection panel contents returned after upload and sheet selection
#[derive(Serialize)]
struct TableResponse {
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sheets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected_sheet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inspection: Option<Inspection>,
}

impl TableResponse {
    fn from_session(session: &Session, preview_rows: usize) -> Self {
        let inspection = session
            .table
            .as_deref()
            .map(|t| stats::inspect(t, preview_rows));

        TableResponse {
            state: if inspection.is_some() {
                "table"
            } else if session.workbook.is_some() {
                "workbook"
            } else {
                "no_table"
            },
            file_name: session.file_name.clone(),
            cached: None,
            sheets: session.sheet_names().map(<[String]>::to_vec),
            selected_sheet: session.workbook.as_ref().and_then(|w| w.selected.clone()),
            inspection,
        }
    }
}

/// Builds the application router
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/", get(serve_index))
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/sheet", post(select_sheet))
        .route("/api/table", get(get_table))
        .route("/api/chart", post(chart))
        .route("/api/chart.svg", post(chart_svg))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let address = config.bind_address();
    let state = Arc::new(AppState::new(config)?);
    let app = router(state);

    let listener = TcpListener::bind(&address).await?;
    log::info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Resolves the session of the request, setting the cookie for new sessions
fn session_id(state: &AppState, jar: CookieJar) -> (String, CookieJar) {
    let current = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let (id, created) = state.sessions.resolve(current.as_deref());

    if created {
        let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
            .path("/")
            .http_only(true);
        (id, jar.add(cookie))
    } else {
        (id, jar)
    }
}

fn current_session(state: &AppState, id: &str) -> Result<Session, AppError> {
    state
        .sessions
        .get(id)
        .ok_or_else(|| AppError::Internal("session vanished".to_string()))
}

/// Runs blocking parse work off the async executor
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, DataError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(AppError::from)
}

async fn health() -> &'static str {
    "ok"
}

async fn serve_index(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let chart_types: Vec<serde_json::Value> = [
        ChartType::Line,
        ChartType::Bars,
        ChartType::Histogram,
        ChartType::Pie,
    ]
    .iter()
    .map(|t| {
        serde_json::json!({
            "value": serde_json::to_value(t).unwrap_or_default(),
            "label": t.to_string(),
        })
    })
    .collect();
    let dashes: Vec<serde_json::Value> = LineDash::ALL
        .iter()
        .map(|d| serde_json::to_value(d).unwrap_or_default())
        .collect();
    let presets: Vec<serde_json::Value> = TickPreset::ALL
        .iter()
        .map(|p| {
            serde_json::json!({
                "value": serde_json::to_value(p).unwrap_or_default(),
                "label": p.label(),
            })
        })
        .collect();

    let page = state
        .templates
        .render(
            INDEX_TEMPLATE,
            &serde_json::json!({
                "preview_rows": state.config.preview_rows,
                "max_upload_mb": state.config.max_upload_mb,
                "chart_types": chart_types,
                "dashes": dashes,
                "presets": presets,
            }),
        )
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Html(page))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<(CookieJar, Json<TableResponse>), AppError> {
    let (id, jar) = session_id(&state, jar);

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().map(str::to_string);
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        file = Some(UploadedFile::new(name, content_type, bytes.to_vec()));
    }

    let file = file
        .filter(|f| !f.bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("No file data received".to_string()))?;

    log::info!(
        "upload {:?} ({}, {} bytes)",
        file.name.as_deref().unwrap_or("unnamed"),
        file.content_type,
        file.bytes.len()
    );

    let file_name = file.name.clone();
    let worker = Arc::clone(&state);
    let cached = blocking(move || worker.cache.load(&file))
        .await
        .inspect_err(|e| log::warn!("upload rejected: {:?}", e))?;

    match cached.value {
        Ingested::Table(table) => {
            state
                .sessions
                .update(&id, |s| s.set_table(file_name, table));
        }
        Ingested::Workbook(workbook) => {
            let first = workbook.sheet_names().first().cloned();
            state.sessions.update(&id, |s| {
                s.set_workbook(file_name, cached.key.clone(), Arc::clone(&workbook))
            });

            if let Some(sheet) = first {
                let table = parse_sheet(Arc::clone(&workbook), sheet.clone()).await?;
                state.sessions.update(&id, |s| s.set_sheet(sheet, table));
            }
        }
    }

    let session = current_session(&state, &id)?;
    let mut response = TableResponse::from_session(&session, state.config.preview_rows);
    response.cached = Some(cached.hit);

    Ok((jar, Json(response)))
}

async fn parse_sheet(
    workbook: Arc<Workbook>,
    name: String,
) -> Result<Arc<Table>, AppError> {
    log::info!("parsing sheet {:?}", name);
    blocking(move || workbook.parse_sheet(&name).map(Arc::new)).await
}

async fn select_sheet(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Result<Json<SheetRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<TableResponse>), AppError> {
    let Json(request) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let (id, jar) = session_id(&state, jar);

    let session = current_session(&state, &id)?;
    let open = session
        .workbook
        .ok_or_else(|| AppError::BadRequest("No workbook uploaded".to_string()))?;

    let table = parse_sheet(open.workbook, request.name.clone()).await?;
    state
        .sessions
        .update(&id, |s| s.set_sheet(request.name, table));

    let session = current_session(&state, &id)?;
    Ok((
        jar,
        Json(TableResponse::from_session(
            &session,
            state.config.preview_rows,
        )),
    ))
}

async fn get_table(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TableResponse>), AppError> {
    let (id, jar) = session_id(&state, jar);
    let session = current_session(&state, &id)?;

    Ok((
        jar,
        Json(TableResponse::from_session(
            &session,
            state.config.preview_rows,
        )),
    ))
}

fn visualize_request(
    state: &AppState,
    id: &str,
    body: Result<Json<ChartSpec>, JsonRejection>,
) -> Result<Visualization, AppError> {
    let Json(spec) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let session = current_session(state, id)?;

    log::debug!(
        "chart request: x={:?}, {} series",
        spec.x_column,
        spec.series.len()
    );
    Ok(graph::visualize(session.table.as_deref(), &spec)?)
}

async fn chart(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Result<Json<ChartSpec>, JsonRejection>,
) -> Result<(CookieJar, Json<Visualization>), AppError> {
    let (id, jar) = session_id(&state, jar);
    let visualization = visualize_request(&state, &id, body)?;
    Ok((jar, Json(visualization)))
}

async fn chart_svg(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Result<Json<ChartSpec>, JsonRejection>,
) -> Result<(CookieJar, Response), AppError> {
    let (id, jar) = session_id(&state, jar);

    let response = match visualize_request(&state, &id, body)? {
        Visualization::Chart { figure } => {
            let svg = plot::render_svg(&figure, state.config.svg_size())?;
            ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()
        }
        Visualization::NoTable | Visualization::NoSeries => StatusCode::NO_CONTENT.into_response(),
    };

    Ok((jar, response))
}
