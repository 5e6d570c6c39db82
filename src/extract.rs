use crate::error::{Error, Result};

/// Turns the raw bytes of a content file into indexable text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String>;

    /// Content type recorded for files this extractor accepted.
    fn content_type(&self) -> &str {
        "text/plain"
    }
}

/// Accepts UTF-8 text. Anything containing NUL bytes is treated as binary
/// and rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        if bytes.contains(&0) {
            return Err(Error::Parse("binary content (NUL byte)".into()));
        }
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Parse(format!("content is not UTF-8: {e}")))
    }
}
