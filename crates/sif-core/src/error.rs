use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConvertError {
    #[error("layer '{layer}' links to bone '{bone}' which is not declared in its canvas")]
    DanglingBone { bone: String, layer: String },
    #[error("layer '{layer}' references undefined value '{id}'")]
    DanglingReference { id: String, layer: String },
    #[error("bone '{bone}' is its own ancestor")]
    BoneCycle { bone: String },
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        context: String,
    },
    #[error("layer '{layer}' is missing required parameter '{param}'")]
    MissingParam { layer: String, param: String },
    #[error("invalid time value '{0}'")]
    InvalidTime(String),
    #[error("animated value in {context} has no waypoints")]
    EmptyAnimation { context: String },
    #[error("unsupported {kind}")]
    Unsupported { kind: String },
}

impl ConvertError {
    /// Fatal errors abort the enclosing layer. Everything else is reported
    /// and conversion carries on.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ConvertError::Unsupported { .. })
    }

    pub(crate) fn mismatch(expected: &str, found: &str, context: &str) -> Self {
        ConvertError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
            context: context.to_string(),
        }
    }
}

impl From<sif_data::LoadError> for ConvertError {
    fn from(err: sif_data::LoadError) -> Self {
        match err {
            sif_data::LoadError::InvalidTime(t) => ConvertError::InvalidTime(t),
            other => ConvertError::TypeMismatch {
                expected: "well formed document".to_string(),
                found: other.to_string(),
                context: "document".to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
