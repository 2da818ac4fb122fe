use std::sync::Arc;

use axum::{
    Form, Json, Router,
    body::Bytes,
    extract::State,
    http::header,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    error::ServiceError,
    export::{DocumentRenderer, RENDERER_NAME},
    page::PageTemplate,
    pipeline::Summarizer,
    prompt::StyleTag,
};

#[derive(Clone)]
pub struct AppState {
    pub summarizer: Summarizer,
    pub page: Arc<PageTemplate>,
    /// `None` when the crate is built without a document renderer.
    pub renderer: Option<Arc<dyn DocumentRenderer>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageForm {
    pub text: Option<String>,
    pub style: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub summary: String,
    pub formal: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

pub fn build_router(
    summarizer: Summarizer,
    renderer: Option<Arc<dyn DocumentRenderer>>,
) -> Result<Router, ServiceError> {
    let state = AppState {
        summarizer,
        page: Arc::new(PageTemplate::new()?),
        renderer,
    };

    let router = Router::new()
        .route("/", get(index).post(index_submit))
        .route("/api", post(summarize_api))
        .route("/export/pdf", post(export_pdf))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    Ok(router)
}

/// Request body as JSON; anything unparsable reads as an empty object.
fn lenient_json(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| Value::Object(Default::default()))
}

/// A field's value when it is a JSON string; any other type reads as absent.
fn string_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, ServiceError> {
    Ok(Html(state.page.render_index("", StyleTag::News, None)?))
}

async fn index_submit(
    State(state): State<AppState>,
    form: Option<Form<PageForm>>,
) -> Result<Html<String>, ServiceError> {
    let form = form.map(|Form(form)| form).unwrap_or_default();
    let style = StyleTag::parse(form.style.as_deref());
    let text = form.text.as_deref().unwrap_or_default().trim();

    if text.is_empty() {
        return Ok(Html(state.page.render_index("", style, None)?));
    }

    let artifact = state.summarizer.summarize_request(text, style).await?;
    Ok(Html(state.page.render_index(text, style, Some(&artifact))?))
}

async fn summarize_api(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SummarizeResponse>, ServiceError> {
    let request = lenient_json(&body);
    let style = StyleTag::parse(string_field(&request, "style"));
    let text = string_field(&request, "text").unwrap_or_default();

    let artifact = state.summarizer.summarize_request(text, style).await?;
    Ok(Json(SummarizeResponse {
        summary: artifact.summary,
        formal: artifact.formal,
        truncated: artifact.truncated,
    }))
}

async fn export_pdf(State(state): State<AppState>, body: Bytes) -> Result<Response, ServiceError> {
    let request = lenient_json(&body);
    let content = string_field(&request, "text").unwrap_or_default().trim();
    if content.is_empty() {
        return Err(ServiceError::NoContent);
    }

    let renderer = state
        .renderer
        .as_ref()
        .ok_or(ServiceError::ExportUnavailable(RENDERER_NAME))?;
    let document = renderer.render("Summary", content)?;
    info!(bytes = document.len(), "summary exported");

    let disposition = format!("attachment; filename=\"{}\"", renderer.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, renderer.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document,
    )
        .into_response())
}
