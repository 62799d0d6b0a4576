use crate::config::Config;
use crate::error::{AppError, Result};
use crate::source::PdfSource;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdffill::{FieldDescriptor, FillRequest};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared, read-only request context
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

/// Build the application router with the default configuration
pub fn app() -> Router {
    app_with_config(Config::default())
}

/// Build the application router with all routes configured
pub fn app_with_config(config: Config) -> Router {
    let body_limit = config.max_upload_bytes;
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/api/fields", post(list_fields))
        .route("/api/fill", post(fill_form))
        .route("/api/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Multipart parts shared by the form endpoints
#[derive(Debug, Default)]
pub struct FormParts {
    pub pdf: Option<Bytes>,
    pub pdf_url: Option<String>,
    pub password: Option<String>,
    pub fields: Option<String>,
    pub flatten: Option<String>,
}

impl FormParts {
    /// Read the known parts; unknown parts are ignored.
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut parts = FormParts::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "pdf" => parts.pdf = Some(field.bytes().await?),
                "pdfUrl" => parts.pdf_url = Some(field.text().await?),
                "password" => parts.password = Some(field.text().await?),
                "fields" => parts.fields = Some(field.text().await?),
                "flatten" => parts.flatten = Some(field.text().await?),
                _ => {}
            }
        }
        Ok(parts)
    }

    fn source(&mut self) -> Result<PdfSource> {
        PdfSource::from_parts(self.pdf.take(), self.pdf_url.as_deref())
    }

    /// An empty password means none.
    fn password(&self) -> Option<String> {
        self.password.clone().filter(|password| !password.is_empty())
    }

    fn flatten(&self) -> Result<bool> {
        parse_flag(self.flatten.as_deref())
    }
}

/// Parse the `flatten` part; absent or blank means `true`.
pub fn parse_flag(raw: Option<&str>) -> Result<bool> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(true);
    };
    if raw.eq_ignore_ascii_case("true") || raw == "1" || raw.eq_ignore_ascii_case("on") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("false") || raw == "0" || raw.eq_ignore_ascii_case("off") {
        Ok(false)
    } else {
        Err(AppError::BadRequest(format!(
            "flatten must be true or false, got {raw:?}"
        )))
    }
}

/// Describe the form fields of a PDF
pub async fn list_fields(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<FieldDescriptor>>> {
    let mut parts = FormParts::read(multipart?).await?;
    let password = parts.password();
    let bytes = parts.source()?.load(state.config.fetch_timeout).await?;

    let fields = run_blocking(move || pdffill::inspect(&bytes, password.as_deref())).await?;
    info!("Listed {} fields", fields.len());
    Ok(Json(fields))
}

/// Fill the form fields of a PDF and return the new document
pub async fn fill_form(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let mut parts = FormParts::read(multipart?).await?;

    // Validate everything before fetching the document
    let fields = parts
        .fields
        .as_deref()
        .map(str::trim)
        .filter(|fields| !fields.is_empty())
        .ok_or_else(|| AppError::BadRequest("`fields` (JSON object) is required".to_string()))?;
    let request = FillRequest::from_json(fields, parts.flatten()?)?;
    let password = parts.password();
    let bytes = parts.source()?.load(state.config.fetch_timeout).await?;

    let filled =
        run_blocking(move || pdffill::fill(&bytes, password.as_deref(), &request)).await?;
    info!(
        "Filled {} fields, skipped {:?}",
        filled.report.applied.len(),
        filled.report.skipped
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"filled.pdf\"",
            ),
        ],
        filled.bytes,
    )
        .into_response())
}

/// Health check endpoint for monitoring and load balancing
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "pdffill API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Run CPU-bound PDF work off the async reactor.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> pdffill::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("PDF worker failed: {e}")))?
        .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(None).unwrap());
        assert!(parse_flag(Some("")).unwrap());
        assert!(parse_flag(Some("TRUE")).unwrap());
        assert!(!parse_flag(Some("false")).unwrap());
        assert!(!parse_flag(Some(" False ")).unwrap());
        assert!(matches!(parse_flag(Some("maybe")), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_empty_password_is_none() {
        let parts = FormParts {
            password: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(parts.password(), None);
    }
}
