use thiserror::Error;

/// Document-level failures. Field-level lookups never produce one of these;
/// a missing marker just leaves the field empty.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unrecognized document format")]
    UnrecognizedFormat,

    #[error("document contains no paragraphs")]
    EmptyDocument,

    #[error("no [QUESTION_START] blocks found")]
    NoQuestionBlocks,

    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error("image storage failed: {0}")]
    Storage(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ImportError>;
