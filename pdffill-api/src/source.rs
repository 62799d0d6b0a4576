//! Where the PDF comes from: an uploaded part or a URL to fetch

use crate::error::{AppError, Result};
use axum::body::Bytes;
use pdffill::is_pdf;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Input document of a request
#[derive(Debug, Clone)]
pub enum PdfSource {
    Upload(Bytes),
    Url(String),
}

impl PdfSource {
    /// Pick the source from the `pdf` and `pdfUrl` parts. A non-blank URL wins.
    pub fn from_parts(upload: Option<Bytes>, url: Option<&str>) -> Result<Self> {
        if let Some(url) = url.map(str::trim).filter(|url| !url.is_empty()) {
            return Ok(PdfSource::Url(url.to_string()));
        }
        match upload {
            Some(bytes) => Ok(PdfSource::Upload(bytes)),
            None => Err(AppError::BadRequest(
                "A `pdf` file or a `pdfUrl` is required".to_string(),
            )),
        }
    }

    /// Materialize the document bytes and check the `%PDF` signature.
    pub async fn load(self, timeout: Duration) -> Result<Bytes> {
        let bytes = match self {
            PdfSource::Upload(bytes) => bytes,
            PdfSource::Url(url) => download(&normalize_drive_url(&url), timeout).await?,
        };
        if !is_pdf(&bytes) {
            return Err(AppError::BadRequest("Source is not a PDF file".to_string()));
        }
        Ok(bytes)
    }
}

/// Rewrite Google Drive share links into direct download links.
///
/// `/file/d/<id>/...` paths and `?id=<id>` queries on `drive.google.com`
/// become `https://drive.google.com/uc?export=download&id=<id>`. Every other
/// URL, and anything unparsable, is returned unchanged.
pub fn normalize_drive_url(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.to_string();
    };
    if !parsed
        .host_str()
        .is_some_and(|host| host.contains("drive.google.com"))
    {
        return raw.to_string();
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let id = match segments.as_slice() {
        ["file", "d", id, ..] => Some(id.to_string()),
        _ => parsed
            .query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned())
            .filter(|id| !id.trim().is_empty()),
    };

    match id {
        Some(id) => format!("https://drive.google.com/uc?export=download&id={id}"),
        None => raw.to_string(),
    }
}

async fn download(url: &str, timeout: Duration) -> Result<Bytes> {
    info!("Downloading PDF from {}", url);

    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Download(format!("Request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Download(format!(
            "Upstream returned status {}",
            status.as_u16()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Download(format!("Failed to read response body: {e}")))?;
    debug!("Downloaded {} bytes", bytes.len());
    Ok(bytes)
}
