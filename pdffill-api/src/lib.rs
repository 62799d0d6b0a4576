//! # pdffill-api
//!
//! HTTP service exposing pdffill field inspection and filling
//!

mod api;
pub mod config;
pub mod error;
pub mod source;

pub use api::{
    app, app_with_config, fill_form, health_check, list_fields, parse_flag, AppState, FormParts,
};
pub use config::Config;
pub use error::{AppError, ErrorResponse};
pub use source::{normalize_drive_url, PdfSource};
