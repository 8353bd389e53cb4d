//! HTTP surface for uploading transcripts from a browser.
//!
//! `GET /prompt` returns the active system prompt. `POST /process` takes a
//! `.docx` transcript as multipart `file` (plus an optional one-off
//! `system_prompt`), summarizes it and posts the card.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{info, warn};
use minutes_core::card::summary_attachment_name;
use minutes_core::prompt::effective_prompt;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::board::TrelloClient;
use crate::config::Settings;
use crate::docx::extract_text_from_docx;
use crate::pipeline::publish_summary;
use crate::prelude::{eprintln, *};
use crate::summarize::summarize_markdown;

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, clap::Args)]
pub struct ServeOptions {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Directory for uploaded transcripts and generated summaries
    #[arg(long, default_value = "uploads")]
    uploads_dir: PathBuf,
}

struct AppState {
    settings: Settings,
    uploads_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct PromptResponse {
    prompt: String,
}

#[derive(Debug, Serialize)]
struct ProcessResponse {
    #[serde(rename = "cardUrl")]
    card_url: Option<String>,
    #[serde(rename = "cardId")]
    card_id: String,
    title: String,
}

/// Handler failure rendered as `{"error": ...}`
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/prompt", get(prompt_handler))
        .route("/process", post(process_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

pub async fn run(options: ServeOptions, global: crate::Global) -> Result<()> {
    let settings = Settings::from_env()?;
    let addr = format!("{}:{}", options.host, options.port);

    let state = Arc::new(AppState {
        settings,
        uploads_dir: options.uploads_dir,
    });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| eyre!("Failed to bind to {}: {}", addr, e))?;

    if global.verbose {
        eprintln!("Listening on http://{}", addr);
        eprintln!("Prompt endpoint: http://{}/prompt", addr);
        eprintln!("Process endpoint: http://{}/process", addr);
    }
    info!("Serving on {addr}");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| eyre!("Server error: {e}"))?;

    Ok(())
}

async fn prompt_handler(State(state): State<Arc<AppState>>) -> Json<PromptResponse> {
    Json(PromptResponse {
        prompt: state.settings.summary_system_prompt.clone(),
    })
}

/// Parts of the multipart upload we care about
#[derive(Default)]
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
    system_prompt: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> std::result::Result<Upload, ApiError> {
    let mut upload = Upload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                upload.file_name = field.file_name().unwrap_or_default().to_string();
                upload.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?
                    .to_vec();
            }
            "system_prompt" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                upload.system_prompt = Some(text).filter(|t| !t.trim().is_empty());
            }
            _ => {}
        }
    }

    if upload.file_name.is_empty() {
        return Err(ApiError::bad_request("No file provided"));
    }
    if !upload.file_name.to_lowercase().ends_with(".docx") {
        return Err(ApiError::bad_request("Only .docx files supported"));
    }

    Ok(upload)
}

async fn attach_best_effort(client: &TrelloClient, card_id: &str, path: &Path, name: &str) {
    if let Err(e) = client.add_attachment(card_id, path, Some(name)).await {
        warn!("Ignoring attachment failure for {}: {e}", path.display());
    }
}

async fn process_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> std::result::Result<Json<ProcessResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let settings = &state.settings;

    tokio::fs::create_dir_all(&state.uploads_dir)
        .await
        .map_err(ApiError::internal)?;
    let stem = uuid::Uuid::new_v4().simple().to_string();
    let transcript_path = state.uploads_dir.join(format!("{stem}.docx"));
    tokio::fs::write(&transcript_path, &upload.bytes)
        .await
        .map_err(ApiError::internal)?;
    info!("Saved upload '{}' as {}", upload.file_name, transcript_path.display());

    let docx_path = transcript_path.clone();
    let transcript = tokio::task::spawn_blocking(move || extract_text_from_docx(&docx_path))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;

    let prompt = effective_prompt(
        &settings.summary_system_prompt,
        upload.system_prompt.as_deref(),
    );
    let summary_md = summarize_markdown(settings, &transcript, prompt)
        .await
        .map_err(ApiError::internal)?;

    let summary_path = state
        .uploads_dir
        .join(format!("{}.md", uuid::Uuid::new_v4().simple()));
    let summary_path = match tokio::fs::write(&summary_path, &summary_md).await {
        Ok(()) => Some(summary_path),
        Err(e) => {
            warn!("Could not save summary to {}: {e}", summary_path.display());
            None
        }
    };

    let (client, _, published) = publish_summary(settings, &summary_md)
        .await
        .map_err(ApiError::internal)?;

    attach_best_effort(&client, &published.card_id, &transcript_path, &upload.file_name).await;
    if let Some(path) = &summary_path {
        let name = summary_attachment_name(&published.title);
        attach_best_effort(&client, &published.card_id, path, &name).await;
    }

    Ok(Json(ProcessResponse {
        card_url: published.card_url,
        card_id: published.card_id,
        title: published.title,
    }))
}
