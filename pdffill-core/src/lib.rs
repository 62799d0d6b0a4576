//! # pdffill
//!
//! Inspect, fill and flatten the AcroForm fields of existing PDF documents.
//!
//! ## Features
//!
//! - **Field inspection**: name, kind, value, choice options, page and rectangle of every field
//! - **Field filling**: per-kind value coercion with regenerated text appearances
//! - **Flattening**: widget appearances become static page content
//! - **Encrypted input**: open documents with a user password
//!
//! ## Quick Start
//!
//! ### Inspecting fields
//!
//! ```rust,no_run
//! use pdffill::inspect;
//!
//! # fn main() -> pdffill::Result<()> {
//! let bytes = std::fs::read("form.pdf")?;
//! for field in inspect(&bytes, None)? {
//!     println!("{} ({}): {:?}", field.name, field.kind, field.value);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Filling fields
//!
//! ```rust,no_run
//! use pdffill::{fill, FillRequest};
//!
//! # fn main() -> pdffill::Result<()> {
//! let bytes = std::fs::read("form.pdf")?;
//! let request = FillRequest::new()
//!     .value("name", "Jane Doe")
//!     .value("agree", "true")
//!     .flatten(true);
//!
//! let filled = fill(&bytes, None, &request)?;
//! std::fs::write("filled.pdf", &filled.bytes)?;
//! println!("applied: {:?}, skipped: {:?}", filled.report.applied, filled.report.skipped);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`document`] - Opening, decrypting and serializing documents
//! - [`forms`] - Field tree traversal, value writes, appearances and flattening
//! - [`mod@inspect`] and [`mod@fill`] - The two document operations

pub mod document;
pub mod error;
pub mod fill;
pub mod forms;
pub mod inspect;
mod objects;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use document::{is_pdf, FormDocument, PDF_MAGIC};
pub use error::{FormError, Result};
pub use fill::{fill, FillReport, FillRequest, FilledDocument};
pub use forms::{FieldDescriptor, FieldFlags, FieldKind, FormField};
pub use inspect::inspect;

/// Current version of pdffill
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
    }
}
