use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("field not found: '{field}' in path '{path}'")]
    FieldNotFound { path: String, field: String },

    #[error("type mismatch for path '{path}': requires {expected}, found {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: String,
    },

    #[error("path '{path}' requires a sequence dataset")]
    UnsupportedMediaType { path: String },

    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("execution engine failure: {0}")]
    Engine(String),

    #[error("sample body must be a JSON object")]
    NotAnObject,

    #[error("frame index must be 1 or greater, got {0}")]
    InvalidFrameIndex(u32),
}

pub type Result<T> = std::result::Result<T, Error>;
