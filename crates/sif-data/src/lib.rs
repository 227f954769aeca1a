pub mod model;

pub use model::*;

use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("malformed scene document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid time value '{0}'")]
    InvalidTime(String),
    #[error("document has a degenerate view box {0:?}")]
    DegenerateViewBox([f64; 4]),
}

/// Parses a scene document from JSON text.
pub fn from_str(text: &str) -> Result<Document, LoadError> {
    let doc: Document = serde_json::from_str(text)?;
    validate(doc)
}

/// Parses a scene document from a reader.
pub fn from_reader<R: Read>(reader: R) -> Result<Document, LoadError> {
    let doc: Document = serde_json::from_reader(reader)?;
    validate(doc)
}

fn validate(doc: Document) -> Result<Document, LoadError> {
    if (doc.view_box[2] - doc.view_box[0]).abs() < f64::EPSILON {
        return Err(LoadError::DegenerateViewBox(doc.view_box));
    }
    doc.begin_time.to_seconds(doc.fps)?;
    doc.end_time.to_seconds(doc.fps)?;
    Ok(doc)
}
