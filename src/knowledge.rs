//! Static knowledge base for the Verification responder
//!
//! One immutable text blob loaded at process start. There is no query
//! language: `lookup` hands the whole text to the prompt and the model is
//! instructed to answer only from it. Reload boundary is process restart.

use crate::error::AgentError;
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// FAQ text shipped with the crate, used when no external file is configured.
const BUNDLED_KB: &str = include_str!("../data/verification_kb.md");

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    text: Arc<str>,
}

impl KnowledgeBase {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Arc::from(text.into()),
        }
    }

    /// Load the knowledge base from an external text resource.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;

        if text.trim().is_empty() {
            return Err(AgentError::KnowledgeBase(format!(
                "knowledge base file is empty: {}",
                path.display()
            )));
        }

        info!(path = %path.display(), bytes = text.len(), "Knowledge base loaded");
        Ok(Self::from_text(text))
    }

    /// The verification FAQ bundled into the binary.
    pub fn bundled() -> Self {
        Self::from_text(BUNDLED_KB)
    }

    /// The full knowledge-base text. Topic selection happens in the prompt,
    /// not here.
    pub fn lookup(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_kb_covers_platforms() {
        let kb = KnowledgeBase::bundled();
        assert!(!kb.is_empty());
        assert!(kb.lookup().contains("Spotify for Artists"));
        assert!(kb.lookup().contains("Яндекс Музыка"));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let result = KnowledgeBase::load("/nonexistent/kb.md");
        assert!(result.is_err());
    }
}
