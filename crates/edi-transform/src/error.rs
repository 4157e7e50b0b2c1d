use edi_model::StructureError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("generated template is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("example document: {0}")]
    Example(String),
}

pub type Result<T> = std::result::Result<T, TransformError>;
