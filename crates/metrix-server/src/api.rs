use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use metrix_common::{CollectError, MetricKind, MetricRecord, Metrics};
use metrix_storage::PersistError;
use std::fmt::Write;

/// Handler failure, rendered as a plain-text body with the matching status.
#[derive(Debug)]
pub enum ApiError {
    Collect(CollectError),
    Persist(PersistError),
    /// `/ping` without a configured backend.
    NoBackend,
}

impl From<CollectError> for ApiError {
    fn from(err: CollectError) -> Self {
        ApiError::Collect(err)
    }
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        ApiError::Persist(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Collect(CollectError::InvalidArgument(_))
            | ApiError::Collect(CollectError::KindMismatch { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Collect(CollectError::UnsupportedKind(_)) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Collect(CollectError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Collect(CollectError::Serialization(_))
            | ApiError::Persist(_)
            | ApiError::NoBackend => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Collect(err) => err.to_string(),
            ApiError::Persist(err) => err.to_string(),
            ApiError::NoBackend => "no persistence backend configured".to_string(),
        };
        (self.status(), message).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_json<T: serde::de::DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| CollectError::InvalidArgument(format!("malformed JSON: {e}")).into())
}

fn parse_value(kind: MetricKind, name: &str, raw: &str) -> ApiResult<MetricRecord> {
    let invalid =
        || CollectError::InvalidArgument(format!("cannot parse '{raw}' as a {kind} value"));
    let record = match kind {
        MetricKind::Counter => {
            MetricRecord::counter(name, raw.parse::<i64>().map_err(|_| invalid())?)
        }
        MetricKind::Gauge => MetricRecord::gauge(name, raw.parse::<f64>().map_err(|_| invalid())?),
    };
    Ok(record)
}

/// Looks up `id` and requires it to be stored with `kind`.
fn lookup(state: &AppState, kind: MetricKind, id: &str) -> ApiResult<MetricRecord> {
    let record = state.store.get(id)?;
    if record.kind() != kind {
        return Err(CollectError::NotFound(id.to_string()).into());
    }
    Ok(record)
}

fn plain_text(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

/// `POST /update/{type}/{name}/{value}`: responds with the stored value after the merge.
pub async fn update_path(
    State(state): State<AppState>,
    Path((mtype, name, value)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let kind: MetricKind = mtype.parse()?;
    let record = parse_value(kind, &name, &value)?;
    let merged = state.store.collect(record)?;
    Ok(plain_text(merged.value.to_string()))
}

/// `POST /update/`: one JSON metric in, the post-merge record out.
pub async fn update_json(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<MetricRecord>> {
    let wire: Metrics = parse_json(&body)?;
    let record = MetricRecord::try_from(wire)?;
    Ok(Json(state.store.collect(record)?))
}

/// `POST /updates/`: a JSON array applied atomically.
pub async fn update_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Vec<MetricRecord>>> {
    let wires: Vec<Metrics> = parse_json(&body)?;
    let records = wires
        .into_iter()
        .map(MetricRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let merged = state.store.collect_batch(records)?;
    tracing::debug!(count = merged.len(), "Applied metric batch");
    Ok(Json(merged))
}

/// `GET /value/{type}/{name}`: the current value as plain text.
pub async fn value_path(
    State(state): State<AppState>,
    Path((mtype, name)): Path<(String, String)>,
) -> ApiResult<Response> {
    let kind: MetricKind = mtype.parse()?;
    let record = lookup(&state, kind, &name)?;
    Ok(plain_text(record.value.to_string()))
}

/// `POST /value/`: `{"id", "type"}` in, the stored record out.
pub async fn value_json(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<MetricRecord>> {
    let query: Metrics = parse_json(&body)?;
    if query.id.is_empty() {
        return Err(CollectError::InvalidArgument("metric id is empty".to_string()).into());
    }
    let kind: MetricKind = query.mtype.parse()?;
    Ok(Json(lookup(&state, kind, &query.id)?))
}

/// `GET /ping`: round trip to the active persistence backend.
pub async fn ping(State(state): State<AppState>) -> ApiResult<&'static str> {
    let backend = state.persistence.as_ref().ok_or(ApiError::NoBackend)?;
    backend.ping().await?;
    Ok("pong")
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// `GET /`: every known metric id, in first-write order.
pub async fn list_metrics(State(state): State<AppState>) -> Html<String> {
    let ids = state.store.list_ids();
    let mut page =
        String::from("<!DOCTYPE html>\n<html><head><title>metrix</title></head><body>\n");
    let _ = writeln!(
        page,
        "<h1>Metrics</h1>\n<p>{} metrics, up since {}</p>\n<ul>",
        ids.len(),
        state.start_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for id in &ids {
        let _ = writeln!(page, "<li>{}</li>", escape_html(id));
    }
    page.push_str("</ul>\n</body></html>\n");
    Html(page)
}
