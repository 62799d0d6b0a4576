use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header: source is not a PDF file")]
    InvalidHeader,

    #[error("Failed to open PDF: {0}")]
    Open(String),

    #[error("Document is encrypted and no password was supplied")]
    Encrypted,

    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),

    #[error("Failed to serialize PDF: {0}")]
    Serialize(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FormError {
    /// Whether the error happened while opening (parsing or decrypting) the document.
    pub fn is_open_failure(&self) -> bool {
        matches!(self, FormError::Open(_) | FormError::Encrypted)
    }
}

impl From<lopdf::Error> for FormError {
    fn from(err: lopdf::Error) -> Self {
        FormError::InvalidStructure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FormError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_form_error_display() {
        let error = FormError::InvalidStructure("test message".to_string());
        assert_eq!(error.to_string(), "Invalid PDF structure: test message");

        let error = FormError::Open("bad xref".to_string());
        assert_eq!(error.to_string(), "Failed to open PDF: bad xref");
    }

    #[test]
    fn test_form_error_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let form_error = FormError::from(io_error);

        match form_error {
            FormError::Io(ref err) => {
                assert_eq!(err.kind(), ErrorKind::NotFound);
            }
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_open_failure_classification() {
        assert!(FormError::Encrypted.is_open_failure());
        assert!(FormError::Open("x".to_string()).is_open_failure());
        assert!(!FormError::InvalidHeader.is_open_failure());
        assert!(!FormError::Serialize("x".to_string()).is_open_failure());
    }

    #[test]
    fn test_all_form_error_variants() {
        let errors = vec![
            FormError::InvalidHeader,
            FormError::Open("open".to_string()),
            FormError::Encrypted,
            FormError::InvalidStructure("structure".to_string()),
            FormError::Serialize("serialize".to_string()),
            FormError::InvalidInput("input".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
