//! Translation of DESCRIBE results before they reach the user.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("translator unavailable: {0}")]
    Unavailable(String),
}

/// Chat-completion backed translation, provided by the embedding
/// application.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

/// Returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        Ok(text.to_string())
    }
}
